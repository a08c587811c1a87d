#![warn(missing_docs)]

//! Normalized triangle mesh for the Kasynel slicing core.
//!
//! File decoding lives with the host; the core consumes this in-memory
//! form only. The mesh is read-only once handed to the pipeline, so bed
//! placement produces a translated copy rather than mutating the input.

use kasynel_math::Point3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating or placing a mesh.
#[derive(Error, Debug)]
pub enum MeshError {
    /// Mesh has no triangles.
    #[error("mesh is empty")]
    Empty,

    /// A vertex coordinate is NaN or infinite.
    #[error("mesh contains a non-finite coordinate")]
    NonFinite,

    /// The bounding box is degenerate along at least one axis.
    #[error("mesh has zero volume (degenerate along {axis})")]
    ZeroVolume {
        /// Axis along which the extent collapses.
        axis: char,
    },

    /// The object does not fit the build volume after centering.
    #[error("object exceeds build volume along {axis}: {extent:.2}mm > {limit:.2}mm")]
    OutOfVolume {
        /// Axis that overflows.
        axis: char,
        /// Object extent along that axis (mm).
        extent: f64,
        /// Printer limit along that axis (mm).
        limit: f64,
    },
}

/// An indexed triangle mesh in millimetres.
///
/// Flat arrays keep the interchange form trivially serializable and cheap
/// to walk: `vertices` is `[x0, y0, z0, x1, ...]`, `indices` groups of
/// three vertex indices with outward-facing winding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangleMesh {
    /// Flat vertex positions: `[x0, y0, z0, x1, y1, z1, ...]`.
    pub vertices: Vec<f32>,
    /// Flat triangle indices: `[i0, i1, i2, ...]`.
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// True when the mesh carries no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty() || self.vertices.is_empty()
    }

    /// Vertex position by index.
    pub fn vertex(&self, i: usize) -> Point3 {
        Point3::new(
            self.vertices[i * 3] as f64,
            self.vertices[i * 3 + 1] as f64,
            self.vertices[i * 3 + 2] as f64,
        )
    }

    /// The three corners of a triangle by triangle index.
    pub fn triangle(&self, t: usize) -> [Point3; 3] {
        [
            self.vertex(self.indices[t * 3] as usize),
            self.vertex(self.indices[t * 3 + 1] as usize),
            self.vertex(self.indices[t * 3 + 2] as usize),
        ]
    }

    /// Validate the invariants the slicing core relies on.
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.is_empty() {
            return Err(MeshError::Empty);
        }
        if self.vertices.iter().any(|c| !c.is_finite()) {
            return Err(MeshError::NonFinite);
        }
        let (min, max) = self.bounds().ok_or(MeshError::Empty)?;
        for (axis, (lo, hi)) in [('x', (min.x, max.x)), ('y', (min.y, max.y)), ('z', (min.z, max.z))] {
            if hi - lo <= 0.0 {
                return Err(MeshError::ZeroVolume { axis });
            }
        }
        Ok(())
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Point3, Point3)> {
        if self.vertices.is_empty() {
            return None;
        }
        let mut min = Point3::new(f64::MAX, f64::MAX, f64::MAX);
        let mut max = Point3::new(f64::MIN, f64::MIN, f64::MIN);
        for i in 0..self.num_vertices() {
            let v = self.vertex(i);
            min.x = min.x.min(v.x);
            min.y = min.y.min(v.y);
            min.z = min.z.min(v.z);
            max.x = max.x.max(v.x);
            max.y = max.y.max(v.y);
            max.z = max.z.max(v.z);
        }
        Some((min, max))
    }

    /// Return a copy translated by `(dx, dy, dz)`.
    pub fn translated(&self, dx: f64, dy: f64, dz: f64) -> Self {
        let mut vertices = Vec::with_capacity(self.vertices.len());
        for chunk in self.vertices.chunks_exact(3) {
            vertices.push(chunk[0] + dx as f32);
            vertices.push(chunk[1] + dy as f32);
            vertices.push(chunk[2] + dz as f32);
        }
        Self {
            vertices,
            indices: self.indices.clone(),
        }
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

/// A mesh centered on the bed and seated on the build plate.
#[derive(Debug, Clone)]
pub struct PlacedMesh {
    /// Translated mesh, `z_min = 0`, XY centered on the bed.
    pub mesh: TriangleMesh,
    /// Top of the object after placement (mm).
    pub z_max: f64,
}

/// Center a mesh on the bed and seat it on the build plate.
///
/// Fails when the validated mesh does not fit `bed` (`[x, y, z]` in mm)
/// after centering.
pub fn place_on_bed(mesh: &TriangleMesh, bed: [f64; 3]) -> Result<PlacedMesh, MeshError> {
    mesh.validate()?;
    let (min, max) = mesh.bounds().ok_or(MeshError::Empty)?;

    let size = [max.x - min.x, max.y - min.y, max.z - min.z];
    for (axis, (extent, limit)) in [('x', (size[0], bed[0])), ('y', (size[1], bed[1])), ('z', (size[2], bed[2]))] {
        if extent > limit {
            return Err(MeshError::OutOfVolume {
                axis,
                extent,
                limit,
            });
        }
    }

    let dx = bed[0] / 2.0 - size[0] / 2.0 - min.x;
    let dy = bed[1] / 2.0 - size[1] / 2.0 - min.y;
    let dz = -min.z;

    Ok(PlacedMesh {
        mesh: mesh.translated(dx, dy, dz),
        z_max: size[2],
    })
}

/// Build an axis-aligned box mesh, used by tests and demos.
pub fn make_box(origin: [f64; 3], size: [f64; 3]) -> TriangleMesh {
    let [ox, oy, oz] = origin.map(|v| v as f32);
    let [sx, sy, sz] = size.map(|v| v as f32);
    let vertices = vec![
        ox, oy, oz,
        ox + sx, oy, oz,
        ox + sx, oy + sy, oz,
        ox, oy + sy, oz,
        ox, oy, oz + sz,
        ox + sx, oy, oz + sz,
        ox + sx, oy + sy, oz + sz,
        ox, oy + sy, oz + sz,
    ];
    // Outward winding per face: bottom, top, front, back, left, right.
    let indices = vec![
        0, 2, 1, 0, 3, 2,
        4, 5, 6, 4, 6, 7,
        0, 1, 5, 0, 5, 4,
        2, 3, 7, 2, 7, 6,
        0, 4, 7, 0, 7, 3,
        1, 2, 6, 1, 6, 5,
    ];
    TriangleMesh { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounds_of_box() {
        let mesh = make_box([0.0, 0.0, 0.0], [10.0, 20.0, 30.0]);
        let (min, max) = mesh.bounds().unwrap();
        assert_relative_eq!(min.x, 0.0);
        assert_relative_eq!(max.x, 10.0);
        assert_relative_eq!(max.y, 20.0);
        assert_relative_eq!(max.z, 30.0);
    }

    #[test]
    fn test_validate_rejects_empty() {
        let mesh = TriangleMesh::new();
        assert!(matches!(mesh.validate(), Err(MeshError::Empty)));
    }

    #[test]
    fn test_validate_rejects_flat() {
        let mesh = make_box([0.0, 0.0, 0.0], [10.0, 10.0, 0.0]);
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::ZeroVolume { axis: 'z' })
        ));
    }

    #[test]
    fn test_place_centers_and_seats() {
        let mesh = make_box([-5.0, -5.0, 2.0], [10.0, 10.0, 10.0]);
        let placed = place_on_bed(&mesh, [220.0, 220.0, 250.0]).unwrap();
        let (min, max) = placed.mesh.bounds().unwrap();
        assert_relative_eq!(min.z, 0.0, epsilon = 1e-5);
        assert_relative_eq!((min.x + max.x) / 2.0, 110.0, epsilon = 1e-4);
        assert_relative_eq!((min.y + max.y) / 2.0, 110.0, epsilon = 1e-4);
        assert_relative_eq!(placed.z_max, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn test_place_rejects_oversized() {
        let mesh = make_box([0.0, 0.0, 0.0], [300.0, 10.0, 10.0]);
        let err = place_on_bed(&mesh, [220.0, 220.0, 250.0]).unwrap_err();
        assert!(matches!(err, MeshError::OutOfVolume { axis: 'x', .. }));
    }
}
