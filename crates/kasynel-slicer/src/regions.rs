//! Per-layer region derivation: walls, inner area, skin windows, brim,
//! and overhang-driven support.
//!
//! The region builder runs as a forward pass over the full outline stack
//! (all outlines are held in memory, so skin windows can look both ways).

use crate::clip::{AreaExpr, CoverWindow};
use crate::error::{warn, Warning};
use crate::params::JobParams;
use crate::path::{Polygon, PolygonSet};
use crate::slice::LayerStep;
use crate::support::SupportPlan;

/// Wall rings for one disjoint outline component, by inset level.
///
/// `levels[k]` holds the exterior ring and grown hole rings at centerline
/// inset `line_width/2 + k*line_width`. Levels stop early where an offset
/// collapses.
#[derive(Debug, Clone)]
pub struct ComponentWalls {
    /// Rings per wall level, level 0 outermost.
    pub levels: Vec<Vec<Polygon>>,
}

/// Everything the path synthesizer needs for one layer.
#[derive(Debug, Clone)]
pub struct LayerRegions {
    /// Wall rings grouped by outline component.
    pub walls: Vec<ComponentWalls>,
    /// Area enclosed by the innermost wall.
    pub inner: PolygonSet,
    /// Skin/sparse clip expression over the skin-overlap base.
    pub skin: AreaExpr,
    /// Skin/sparse clip expression over the infill-overlap base.
    pub fill: AreaExpr,
    /// Brim rings, outermost first. First layer only.
    pub brim: Vec<Polygon>,
    /// Indices into the support plan's columns that apply at this layer.
    pub support_columns: Vec<usize>,
    /// This layer prints as part of the continuous spiral.
    pub spiral: bool,
}

/// Derive all regions for layer `step.index`.
pub fn build_regions(
    outlines: &[PolygonSet],
    step: &LayerStep,
    params: &JobParams,
    support: &SupportPlan,
    warnings: &mut Vec<Warning>,
) -> LayerRegions {
    let i = step.index;
    let outline = &outlines[i];
    let lw = params.line_width();
    let spiral = params.spiralize && (i as u32) >= params.bottom_layers;

    if spiral {
        return LayerRegions {
            walls: spiral_walls(outline, lw),
            inner: PolygonSet::new(),
            skin: AreaExpr::default(),
            fill: AreaExpr::default(),
            brim: Vec::new(),
            support_columns: Vec::new(),
            spiral: true,
        };
    }

    let (walls, inner) = build_walls(outline, params, i, warnings);

    let above = cover_window(outlines, i + 1, params.top_layers as usize, true);
    let below = if i >= params.bottom_layers as usize {
        cover_window(
            outlines,
            i - params.bottom_layers as usize,
            params.bottom_layers as usize,
            false,
        )
    } else {
        CoverWindow::truncated()
    };

    let skin_base = expand(&inner, params.skin_overlap / 100.0 * lw);
    let fill_base = expand(&inner, params.infill_overlap / 100.0 * lw);
    let skin = AreaExpr {
        base: skin_base,
        above: above.clone(),
        below: below.clone(),
    };
    let fill = AreaExpr {
        base: fill_base,
        above,
        below,
    };

    let brim = if i == 0 && params.brim_enabled {
        build_brim(outline, params.brim_width, lw)
    } else {
        Vec::new()
    };

    let support_columns = if params.support_enabled {
        support.columns_over(i)
    } else {
        Vec::new()
    };

    LayerRegions {
        walls,
        inner,
        skin,
        fill,
        brim,
        support_columns,
        spiral: false,
    }
}

/// Outline window `[start, start+len)`, marked truncated when it runs past
/// the top of the stack.
fn cover_window(outlines: &[PolygonSet], start: usize, len: usize, upward: bool) -> CoverWindow {
    if len == 0 {
        return CoverWindow::complete(Vec::new());
    }
    if upward && start + len > outlines.len() {
        return CoverWindow::truncated();
    }
    let sets = outlines[start..start + len].to_vec();
    CoverWindow::complete(sets)
}

/// Grow a set outward by `amount` (no-op for zero).
fn expand(set: &PolygonSet, amount: f64) -> PolygonSet {
    if amount <= 0.0 || set.is_empty() {
        return set.clone();
    }
    set.offset_all(-amount).0
}

/// Inset walls for every component, stopping a component early when its
/// offset collapses or a grown hole swallows the exterior.
fn build_walls(
    outline: &PolygonSet,
    params: &JobParams,
    layer: usize,
    warnings: &mut Vec<Warning>,
) -> (Vec<ComponentWalls>, PolygonSet) {
    let lw = params.line_width();
    let mut walls = Vec::new();
    let mut warned = false;
    let mut inner_rings: Vec<Polygon> = Vec::new();

    for comp in outline.components() {
        let mut levels: Vec<Vec<Polygon>> = Vec::new();
        for k in 0..params.wall_count as usize {
            let dist = lw / 2.0 + k as f64 * lw;
            match inset_component(&comp.exterior, &comp.holes, dist) {
                Some(rings) => levels.push(rings),
                None => {
                    if !warned {
                        warn(warnings, Warning::WallOffsetEmpty { layer, wall: k });
                        warned = true;
                    }
                    break;
                }
            }
        }

        // The space enclosed by the innermost wall; empty when the full
        // wall stack did not fit.
        if levels.len() == params.wall_count as usize {
            if let Some(rings) = inset_component(&comp.exterior, &comp.holes, params.wall_count as f64 * lw) {
                inner_rings.extend(rings);
            }
        }

        if !levels.is_empty() {
            walls.push(ComponentWalls { levels });
        }
    }

    (walls, PolygonSet::assemble(inner_rings))
}

/// Offset one component's rings toward the solid by `dist`.
///
/// `None` when the exterior collapses or a hole overtakes it.
fn inset_component(exterior: &Polygon, holes: &[Polygon], dist: f64) -> Option<Vec<Polygon>> {
    let ext = exterior.offset(dist)?;
    let ext_area = ext.signed_area().abs();
    let mut rings = vec![ext];
    for hole in holes {
        if let Some(grown) = hole.offset(dist) {
            if grown.signed_area().abs() >= ext_area {
                return None;
            }
            rings.push(grown);
        }
    }
    Some(rings)
}

/// Single outermost wall per component for spiral layers.
fn spiral_walls(outline: &PolygonSet, lw: f64) -> Vec<ComponentWalls> {
    outline
        .components()
        .into_iter()
        .filter_map(|comp| {
            comp.exterior.offset(lw / 2.0).map(|ring| ComponentWalls {
                levels: vec![vec![ring]],
            })
        })
        .collect()
}

/// Concentric outward rings around the first layer, outermost first.
fn build_brim(outline: &PolygonSet, brim_width: f64, lw: f64) -> Vec<Polygon> {
    let count = (brim_width / lw).ceil() as usize;
    let mut rings = Vec::new();
    for r in (0..count).rev() {
        let dist = lw / 2.0 + r as f64 * lw;
        let (set, _) = outline.offset_all(-dist);
        rings.extend(set.rings);
    }
    rings
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasynel_math::Point2;
    use crate::support::plan_support;

    fn square_outline(size: f64) -> PolygonSet {
        PolygonSet::assemble(vec![Polygon::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(size, 0.0),
            Point2::new(size, size),
            Point2::new(0.0, size),
        ])])
    }

    fn step(index: usize) -> LayerStep {
        LayerStep {
            index,
            z_top: 0.3 + index as f64 * 0.2,
            slice_z: 0.3 + index as f64 * 0.2,
            height: if index == 0 { 0.3 } else { 0.2 },
        }
    }

    fn stack(n: usize, size: f64) -> Vec<PolygonSet> {
        (0..n).map(|_| square_outline(size)).collect()
    }

    #[test]
    fn test_walls_and_inner_of_square() {
        let outlines = stack(20, 20.0);
        let params = JobParams::default();
        let plan = plan_support(&outlines, &params);
        let mut warnings = Vec::new();
        let regions = build_regions(&outlines, &step(10), &params, &plan, &mut warnings);

        assert_eq!(regions.walls.len(), 1);
        assert_eq!(regions.walls[0].levels.len(), 2);
        // Innermost wall centerline sits 0.6mm in; inner area starts 0.8mm in.
        let inner_area = regions.inner.rings[0].signed_area();
        let expected = (20.0 - 2.0 * 0.8) * (20.0 - 2.0 * 0.8);
        assert!((inner_area - expected).abs() < 1.0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_thin_pillar_drops_walls() {
        let outlines = stack(5, 1.2);
        let params = JobParams {
            wall_count: 3,
            ..Default::default()
        };
        let plan = plan_support(&outlines, &params);
        let mut warnings = Vec::new();
        let regions = build_regions(&outlines, &step(2), &params, &plan, &mut warnings);

        let survived = regions.walls.first().map_or(0, |c| c.levels.len());
        assert!(survived >= 1 && survived < 3);
        assert!(regions.inner.is_empty());
        assert!(warnings
            .iter()
            .any(|w| matches!(w, Warning::WallOffsetEmpty { layer: 2, .. })));
    }

    #[test]
    fn test_bottom_layer_window_is_truncated() {
        let outlines = stack(20, 20.0);
        let params = JobParams::default();
        let plan = plan_support(&outlines, &params);
        let mut warnings = Vec::new();
        let regions = build_regions(&outlines, &step(1), &params, &plan, &mut warnings);

        // Layer 1 of a 4-bottom-layer job: everything inside is skin.
        let p = Point2::new(10.0, 10.0);
        assert!(regions.skin.contains_skin(&p));
        assert!(!regions.fill.contains_sparse(&p));
    }

    #[test]
    fn test_middle_layer_is_sparse_inside() {
        let outlines = stack(30, 20.0);
        let params = JobParams::default();
        let plan = plan_support(&outlines, &params);
        let mut warnings = Vec::new();
        let regions = build_regions(&outlines, &step(15), &params, &plan, &mut warnings);

        let p = Point2::new(10.0, 10.0);
        assert!(!regions.skin.contains_skin(&p));
        assert!(regions.fill.contains_sparse(&p));
    }

    #[test]
    fn test_brim_ring_count() {
        let outlines = stack(5, 20.0);
        let params = JobParams {
            brim_enabled: true,
            brim_width: 8.0,
            ..Default::default()
        };
        let plan = plan_support(&outlines, &params);
        let mut warnings = Vec::new();
        let regions = build_regions(&outlines, &step(0), &params, &plan, &mut warnings);
        assert_eq!(regions.brim.len(), 20);
        // Outermost first.
        let first = regions.brim.first().unwrap().signed_area().abs();
        let last = regions.brim.last().unwrap().signed_area().abs();
        assert!(first > last);

        let later = build_regions(&outlines, &step(1), &params, &plan, &mut warnings);
        assert!(later.brim.is_empty());
    }

    #[test]
    fn test_spiral_layer_single_wall() {
        let outlines = stack(10, 20.0);
        let params = JobParams {
            spiralize: true,
            bottom_layers: 3,
            ..Default::default()
        };
        let plan = plan_support(&outlines, &params);
        let mut warnings = Vec::new();

        let base = build_regions(&outlines, &step(2), &params, &plan, &mut warnings);
        assert!(!base.spiral);
        assert_eq!(base.walls[0].levels.len(), 2);

        let spiral = build_regions(&outlines, &step(3), &params, &plan, &mut warnings);
        assert!(spiral.spiral);
        assert_eq!(spiral.walls.len(), 1);
        assert_eq!(spiral.walls[0].levels.len(), 1);
        assert_eq!(spiral.walls[0].levels[0].len(), 1);
        assert!(spiral.inner.is_empty());
    }
}
