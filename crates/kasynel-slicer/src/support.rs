//! Overhang analysis and support columns.
//!
//! An overhang exists at layer j wherever its outline sticks out past the
//! previous outline dilated by the maximum safe step
//! `layer_height / tan(threshold)`. Each such layer contributes a column
//! that extends down to the bed; at print time the column area is clipped
//! against the printing layer's outline so support never lands on the
//! part itself.

use kasynel_math::Point2;

use crate::params::JobParams;
use crate::path::{Polygon, PolygonSet};

/// One overhang column: the footprint needing support below layer
/// `from_layer`.
#[derive(Debug, Clone)]
pub struct SupportColumn {
    /// First layer that overhangs; support prints on layers below it.
    pub from_layer: usize,
    /// Outline of the overhanging layer.
    pub upper: PolygonSet,
    /// Previous outline dilated by the safe step; the covered part of
    /// `upper` needs no support.
    pub below_safe: PolygonSet,
}

impl SupportColumn {
    /// Is `p` inside this column's overhang footprint?
    pub fn contains(&self, p: &Point2) -> bool {
        self.upper.contains(p) && !self.below_safe.contains(p)
    }

    /// Rings bounding this column's footprint.
    pub fn edge_rings(&self) -> impl Iterator<Item = &Polygon> {
        self.upper.rings.iter().chain(self.below_safe.rings.iter())
    }
}

/// All support columns of a job.
#[derive(Debug, Clone, Default)]
pub struct SupportPlan {
    /// Columns in ascending `from_layer` order.
    pub columns: Vec<SupportColumn>,
}

impl SupportPlan {
    /// Indices of columns whose overhang sits above layer `i`.
    pub fn columns_over(&self, i: usize) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.from_layer > i)
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// Detect overhangs across the outline stack.
///
/// Returns an empty plan when support is disabled.
pub fn plan_support(outlines: &[PolygonSet], params: &JobParams) -> SupportPlan {
    if !params.support_enabled {
        return SupportPlan::default();
    }

    let safe_step = params.layer_height / params.support_threshold.to_radians().tan();
    let mut columns = Vec::new();

    for j in 1..outlines.len() {
        if outlines[j].is_empty() {
            continue;
        }
        let (below_safe, _) = outlines[j - 1].offset_all(-safe_step);
        if has_overhang(&outlines[j], &below_safe) {
            columns.push(SupportColumn {
                from_layer: j,
                upper: outlines[j].clone(),
                below_safe,
            });
        }
    }

    log::debug!("support plan: {} overhanging layers", columns.len());
    SupportPlan { columns }
}

/// Does any part of `upper` fall outside the dilated layer below it?
///
/// Ring vertices are a sufficient sample: an overhang wide enough to need
/// support always moves an outline vertex past the safe step.
fn has_overhang(upper: &PolygonSet, below_safe: &PolygonSet) -> bool {
    if below_safe.is_empty() {
        return true;
    }
    upper
        .rings
        .iter()
        .flat_map(|r| r.points.iter())
        .any(|v| !below_safe.contains(v))
}
