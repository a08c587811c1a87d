//! Layer planning and mesh cross-sectioning.
//!
//! Each slicing plane cuts every triangle whose z-range strictly brackets
//! it into one oriented segment (solid interior to the left of travel),
//! then a spatial-hash stitcher fuses shared endpoints into closed rings.
//! Planes landing on mesh vertices are nudged upward deterministically so
//! no triangle is ever tangent to its plane.

use std::collections::HashMap;

use kasynel_math::{Point2, Tolerance, Vec2};
use kasynel_mesh::TriangleMesh;

use crate::error::{warn, Result, SlicerError, Warning};
use crate::params::JobParams;
use crate::path::{Polygon, PolygonSet};
use crate::CancelToken;

/// Clearance below the object top for the partial top layer's plane; large
/// enough that vertex nudging cannot push the plane out of the solid.
const TOP_CLEARANCE: f64 = 1e-4;

/// How often the triangle loop polls the cancel token.
const CANCEL_STRIDE: usize = 4096;

/// One planned layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerStep {
    /// Layer index, 0 = first printed layer.
    pub index: usize,
    /// Top of the layer (mm); what `; Z:` reports.
    pub z_top: f64,
    /// Elevation the cross-section is taken at (mm).
    pub slice_z: f64,
    /// Extruded thickness of this layer (mm).
    pub height: f64,
}

/// Enumerate layer elevations for an object of height `z_max`.
///
/// Layer 0 tops out at `first_layer_height`, each further layer adds
/// `layer_height`. A partial top layer keeps its planned elevation but is
/// cross-sectioned just below `z_max` so it still produces geometry.
pub fn plan_layers(z_max: f64, params: &JobParams) -> Result<Vec<LayerStep>> {
    let h0 = params.first_layer_height;
    let h = params.layer_height;
    if z_max < h0 {
        return Err(SlicerError::EmptyJob);
    }

    let count = ((((z_max - h0) / h) - 1e-9).ceil().max(0.0) as usize) + 1;
    let mut steps = Vec::with_capacity(count);
    for index in 0..count {
        let z_top = h0 + index as f64 * h;
        let slice_z = if z_top > z_max - TOP_CLEARANCE {
            z_max - TOP_CLEARANCE
        } else {
            z_top
        };
        steps.push(LayerStep {
            index,
            z_top,
            slice_z,
            height: if index == 0 { h0 } else { h },
        });
    }
    Ok(steps)
}

/// A triangle prepared for plane intersection.
#[derive(Debug, Clone, Copy)]
struct Tri {
    v: [[f64; 3]; 3],
    z_min: f64,
    z_max: f64,
}

/// Mesh triangles extracted once per job.
#[derive(Debug)]
pub struct SectionInput {
    tris: Vec<Tri>,
}

impl SectionInput {
    /// Extract triangles from a placed mesh.
    pub fn from_mesh(mesh: &TriangleMesh) -> Self {
        let mut tris = Vec::with_capacity(mesh.num_triangles());
        for t in 0..mesh.num_triangles() {
            let [a, b, c] = mesh.triangle(t);
            let v = [[a.x, a.y, a.z], [b.x, b.y, b.z], [c.x, c.y, c.z]];
            tris.push(Tri {
                v,
                z_min: a.z.min(b.z).min(c.z),
                z_max: a.z.max(b.z).max(c.z),
            });
        }
        Self { tris }
    }

    /// Number of triangles available to the sectioner.
    pub fn len(&self) -> usize {
        self.tris.len()
    }

    /// True when no triangles were extracted.
    pub fn is_empty(&self) -> bool {
        self.tris.is_empty()
    }
}

/// Cross-section the mesh at one elevation.
///
/// Returns the layer outline as a polygon set. Unstitchable open chains
/// are discarded with a warning; they never fail the job.
pub fn cross_section(
    input: &SectionInput,
    z: f64,
    layer: usize,
    tol: &Tolerance,
    cancel: &CancelToken,
    warnings: &mut Vec<Warning>,
) -> Result<PolygonSet> {
    let z = nudged_plane(input, z, tol);

    let mut segments: Vec<(Point2, Point2)> = Vec::new();
    for (i, tri) in input.tris.iter().enumerate() {
        if i % CANCEL_STRIDE == 0 && cancel.is_cancelled() {
            return Err(SlicerError::Cancelled);
        }
        // Only triangles whose z-range strictly brackets the plane cut it.
        if tri.z_min >= z || tri.z_max <= z {
            continue;
        }
        if let Some(seg) = intersect(tri, z) {
            segments.push(seg);
        }
    }

    let rings = stitch(segments, tol, layer, warnings);
    Ok(PolygonSet::assemble(rings))
}

/// Lift the plane until no vertex sits on it.
fn nudged_plane(input: &SectionInput, mut z: f64, tol: &Tolerance) -> f64 {
    for _ in 0..4 {
        let hit = input.tris.iter().any(|t| {
            t.z_min <= z + tol.plane_nudge
                && t.z_max >= z - tol.plane_nudge
                && t.v.iter().any(|v| (v[2] - z).abs() <= tol.plane_nudge)
        });
        if !hit {
            break;
        }
        z += tol.plane_nudge;
    }
    z
}

/// Intersect one bracketing triangle, orienting the segment so the solid
/// interior lies to its left.
fn intersect(tri: &Tri, z: f64) -> Option<(Point2, Point2)> {
    let mut pts: [Point2; 2] = [Point2::origin(); 2];
    let mut count = 0;

    for (ia, ib) in [(0, 1), (1, 2), (2, 0)] {
        let a = tri.v[ia];
        let b = tri.v[ib];
        let da = a[2] - z;
        let db = b[2] - z;
        if (da > 0.0) == (db > 0.0) {
            continue;
        }
        let t = da / (da - db);
        let p = Point2::new(a[0] + t * (b[0] - a[0]), a[1] + t * (b[1] - a[1]));
        if count < 2 {
            pts[count] = p;
            count += 1;
        }
    }
    if count != 2 || (pts[1] - pts[0]).norm() < 1e-9 {
        return None;
    }

    // Outward triangle normal crossed with +Z gives the travel direction
    // that keeps the interior on the left.
    let e1 = [
        tri.v[1][0] - tri.v[0][0],
        tri.v[1][1] - tri.v[0][1],
        tri.v[1][2] - tri.v[0][2],
    ];
    let e2 = [
        tri.v[2][0] - tri.v[0][0],
        tri.v[2][1] - tri.v[0][1],
        tri.v[2][2] - tri.v[0][2],
    ];
    let nx = e1[1] * e2[2] - e1[2] * e2[1];
    let ny = e1[2] * e2[0] - e1[0] * e2[2];
    let along = Vec2::new(-ny, nx);

    if (pts[1] - pts[0]).dot(&along) < 0.0 {
        pts.swap(0, 1);
    }
    Some((pts[0], pts[1]))
}

/// Quantized-endpoint key for the stitching hash.
fn hash_key(p: &Point2, cell: f64) -> (i64, i64) {
    ((p.x / cell).round() as i64, (p.y / cell).round() as i64)
}

/// Fuse oriented segments end-to-start into closed rings.
///
/// The adjacency is a hash from quantized start points to segment
/// indices; chaining walks the hash instead of an object graph. Chains
/// that never close are dropped and recorded once per layer.
fn stitch(
    segments: Vec<(Point2, Point2)>,
    tol: &Tolerance,
    layer: usize,
    warnings: &mut Vec<Warning>,
) -> Vec<Polygon> {
    if segments.is_empty() {
        return Vec::new();
    }

    let cell = tol.fuse * 4.0;
    let mut by_start: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, seg) in segments.iter().enumerate() {
        by_start.entry(hash_key(&seg.0, cell)).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];
    let mut rings = Vec::new();
    let mut dropped_open = false;

    for seed in 0..segments.len() {
        if used[seed] {
            continue;
        }
        used[seed] = true;
        let mut chain = vec![segments[seed].0, segments[seed].1];

        let closed = loop {
            let end = *chain.last().unwrap();
            if chain.len() >= 4 && tol.points_fuse(&end, &chain[0]) {
                chain.pop();
                break true;
            }

            let (kx, ky) = hash_key(&end, cell);
            let mut next: Option<(usize, f64)> = None;
            for dx in -1..=1 {
                for dy in -1..=1 {
                    let Some(bucket) = by_start.get(&(kx + dx, ky + dy)) else {
                        continue;
                    };
                    for &j in bucket {
                        if used[j] {
                            continue;
                        }
                        let d = (segments[j].0 - end).norm();
                        if d < tol.fuse && next.is_none_or(|(_, best)| d < best) {
                            next = Some((j, d));
                        }
                    }
                }
            }

            match next {
                Some((j, _)) => {
                    used[j] = true;
                    chain.push(segments[j].1);
                }
                None => break false,
            }
        };

        if closed && chain.len() >= 3 {
            rings.push(Polygon::new(chain));
        } else if !closed {
            dropped_open = true;
        }
    }

    if dropped_open {
        warn(warnings, Warning::OpenContourDiscarded { layer });
    }
    rings
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kasynel_mesh::make_box;

    fn section_box() -> SectionInput {
        SectionInput::from_mesh(&make_box([0.0, 0.0, 0.0], [20.0, 20.0, 20.0]))
    }

    #[test]
    fn test_plan_cube_layers() {
        let params = JobParams::default();
        let steps = plan_layers(20.0, &params).unwrap();
        assert_eq!(steps.len(), 100);
        assert_relative_eq!(steps[0].z_top, 0.3);
        assert_relative_eq!(steps[0].height, 0.3);
        assert_relative_eq!(steps[1].z_top, 0.5);
        assert_relative_eq!(steps[99].z_top, 0.3 + 99.0 * 0.2, epsilon = 1e-9);
        // The partial top layer is sectioned inside the solid.
        assert!(steps[99].slice_z < 20.0);
        for w in steps.windows(2) {
            assert!(w[1].z_top > w[0].z_top);
        }
    }

    #[test]
    fn test_plan_rejects_too_short_object() {
        let params = JobParams::default();
        assert!(matches!(plan_layers(0.1, &params), Err(SlicerError::EmptyJob)));
    }

    #[test]
    fn test_section_cube_is_square() {
        let input = section_box();
        let cancel = CancelToken::new();
        let mut warnings = Vec::new();
        let set = cross_section(&input, 5.0, 10, &Tolerance::DEFAULT, &cancel, &mut warnings)
            .unwrap();
        assert_eq!(set.rings.len(), 1);
        assert!(set.rings[0].is_ccw());
        assert_relative_eq!(set.rings[0].signed_area(), 400.0, epsilon = 1e-6);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_section_on_vertex_plane_nudges() {
        // z = 0 touches the bottom face; the nudge must lift the plane into
        // the solid rather than produce slivers.
        let input = section_box();
        let cancel = CancelToken::new();
        let mut warnings = Vec::new();
        let set = cross_section(&input, 0.0, 0, &Tolerance::DEFAULT, &cancel, &mut warnings)
            .unwrap();
        assert_eq!(set.rings.len(), 1);
        assert_relative_eq!(set.rings[0].signed_area(), 400.0, epsilon = 1e-3);
    }

    #[test]
    fn test_section_above_object_is_empty() {
        let input = section_box();
        let cancel = CancelToken::new();
        let mut warnings = Vec::new();
        let set = cross_section(&input, 25.0, 0, &Tolerance::DEFAULT, &cancel, &mut warnings)
            .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_section_cancellation() {
        let input = section_box();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut warnings = Vec::new();
        let err = cross_section(&input, 5.0, 0, &Tolerance::DEFAULT, &cancel, &mut warnings)
            .unwrap_err();
        assert!(matches!(err, SlicerError::Cancelled));
    }
}
