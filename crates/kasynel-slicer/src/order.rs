//! Per-layer path ordering and seam placement.
//!
//! Region sequence within a layer is fixed: brim, then walls per
//! component, then skin, sparse fill, and support. Within a kind, paths
//! chain greedily from the nozzle's current position.

use kasynel_math::Point2;

use crate::params::JobParams;
use crate::path::{order_nearest, PathKind, Polygon, ToolPath};
use crate::regions::LayerRegions;
use crate::slice::LayerStep;

/// A fully ordered layer, ready for the emitter.
#[derive(Debug, Clone)]
pub struct OrderedLayer {
    /// Layer index.
    pub index: usize,
    /// Reported layer elevation (mm).
    pub z: f64,
    /// Extruded thickness (mm).
    pub height: f64,
    /// Printed as part of the continuous spiral.
    pub spiral: bool,
    /// Paths in print order.
    pub paths: Vec<ToolPath>,
}

/// Start index for a closed ring under the `back` seam policy: the
/// rearmost (+Y) vertex. `random`/`sharpest` reduce to this.
pub fn seam_index(ring: &Polygon) -> usize {
    let mut best = 0;
    for (i, p) in ring.points.iter().enumerate() {
        if p.y > ring.points[best].y {
            best = i;
        }
    }
    best
}

/// Order one layer's paths and advance the nozzle cursor.
pub fn order_layer(
    regions: &LayerRegions,
    skin: Vec<ToolPath>,
    fill: Vec<ToolPath>,
    support: Vec<ToolPath>,
    step: &LayerStep,
    params: &JobParams,
    cursor: &mut Point2,
) -> OrderedLayer {
    let mut paths = Vec::new();

    // Brim rings come pre-sorted outermost first.
    for ring in &regions.brim {
        let path = ToolPath::from_ring(ring, seam_index(ring), PathKind::Brim);
        if let Some(end) = path.end() {
            *cursor = end;
        }
        paths.push(path);
    }

    // Components nearest-first, walls complete per component before the
    // nozzle moves on.
    let mut comp_order: Vec<usize> = (0..regions.walls.len()).collect();
    comp_order.sort_by(|&a, &b| {
        let da = component_anchor(&regions.walls[a].levels, cursor);
        let db = component_anchor(&regions.walls[b].levels, cursor);
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });

    for ci in comp_order {
        let comp = &regions.walls[ci];
        let level_indices: Vec<usize> = if params.outer_before_inner {
            (0..comp.levels.len()).collect()
        } else {
            (0..comp.levels.len()).rev().collect()
        };
        for level in level_indices {
            let kind = if level == 0 {
                PathKind::WallOuter
            } else {
                PathKind::WallInner
            };
            let mut ring_paths: Vec<ToolPath> = comp.levels[level]
                .iter()
                .filter(|r| r.len() >= 3)
                .map(|r| ToolPath::from_ring(r, seam_index(r), kind))
                .collect();
            *cursor = order_nearest(&mut ring_paths, *cursor);
            paths.append(&mut ring_paths);
        }
    }

    for group in [skin, fill, support] {
        let mut group = group;
        *cursor = order_nearest(&mut group, *cursor);
        paths.append(&mut group);
    }

    OrderedLayer {
        index: step.index,
        z: step.z_top,
        height: step.height,
        spiral: regions.spiral,
        paths,
    }
}

/// Distance from the cursor to a component's first ring seam.
fn component_anchor(levels: &[Vec<Polygon>], cursor: &Point2) -> f64 {
    levels
        .first()
        .and_then(|rings| rings.first())
        .map(|r| (r.points[seam_index(r)] - cursor).norm())
        .unwrap_or(f64::MAX)
}
