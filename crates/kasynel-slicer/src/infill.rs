//! Path synthesis: skin fill, sparse infill patterns, and support fill.
//!
//! All patterns reduce to clipping straight strokes against an area
//! membership: parallel scan lines for lines/grid/skin, hexagon cell
//! edges for honeycomb. Scan rows alternate direction (boustrophedon) so
//! consecutive strokes start near each other.

use kasynel_math::{Point2, Vec2};

use crate::clip::{clip_scanline, clip_segment, AreaExpr, ScanLine};
use crate::params::{InfillPattern, JobParams, SupportPattern};
use crate::path::{PathKind, Polygon, PolygonSet, Polyline, ToolPath};
use crate::support::SupportPlan;

/// Dense fill over the skin view of a layer's area expression.
///
/// Direction alternates 0/90 degrees with layer parity; spacing is one
/// line width.
pub fn skin_paths(expr: &AreaExpr, layer_index: usize, line_width: f64) -> Vec<ToolPath> {
    if expr.is_empty() {
        return Vec::new();
    }
    let angle = if layer_index.is_multiple_of(2) { 0.0 } else { 90.0 };
    let rings: Vec<&Polygon> = expr.edge_rings().collect();
    let lines = scan_fill(&rings, &|p| expr.contains_skin(p), line_width, angle, false);
    lines
        .into_iter()
        .map(|l| ToolPath::from_line(l, PathKind::Skin))
        .collect()
}

/// Sparse infill over the covered view of a layer's area expression.
pub fn sparse_paths(expr: &AreaExpr, params: &JobParams, layer_index: usize) -> Vec<ToolPath> {
    let density = params.infill_density / 100.0;
    if expr.is_empty() || density <= 0.0 {
        return Vec::new();
    }
    let lw = params.line_width();
    let rings: Vec<&Polygon> = expr.edge_rings().collect();
    let keep = |p: &Point2| expr.contains_sparse(p);
    let rot = if layer_index.is_multiple_of(2) { 0.0 } else { 90.0 };

    let lines = match params.infill_pattern {
        InfillPattern::Lines => scan_fill(&rings, &keep, lw / density, rot, false),
        InfillPattern::Grid => {
            let spacing = lw / density * 2.0;
            let mut all = scan_fill(&rings, &keep, spacing, rot, false);
            all.extend(scan_fill(&rings, &keep, spacing, rot + 90.0, false));
            all
        }
        InfillPattern::Honeycomb => honeycomb_fill(&rings, &keep, lw / density * 1.5),
    };

    lines
        .into_iter()
        .map(|l| ToolPath::from_line(l, PathKind::Fill))
        .collect()
}

/// Support fill under the overhang columns that apply at this layer.
///
/// The area is the union of the columns' footprints minus the layer's own
/// outline.
pub fn support_paths(
    plan: &SupportPlan,
    column_ids: &[usize],
    outline: &PolygonSet,
    params: &JobParams,
    layer_index: usize,
) -> Vec<ToolPath> {
    let density = params.support_density / 100.0;
    if column_ids.is_empty() || density <= 0.0 {
        return Vec::new();
    }

    let columns: Vec<_> = column_ids.iter().map(|&i| &plan.columns[i]).collect();
    let rings: Vec<&Polygon> = columns
        .iter()
        .flat_map(|c| c.edge_rings())
        .chain(outline.rings.iter())
        .collect();
    let keep = |p: &Point2| columns.iter().any(|c| c.contains(p)) && !outline.contains(p);

    let lw = params.line_width();
    let spacing = lw / density;
    let rot = if layer_index.is_multiple_of(2) { 0.0 } else { 90.0 };

    let lines = match params.support_pattern {
        SupportPattern::Lines => scan_fill(&rings, &keep, spacing, rot, false),
        SupportPattern::Grid => {
            let mut all = scan_fill(&rings, &keep, spacing * 2.0, rot, false);
            all.extend(scan_fill(&rings, &keep, spacing * 2.0, rot + 90.0, false));
            all
        }
        SupportPattern::Zigzag => scan_fill(&rings, &keep, spacing, rot, true),
    };

    lines
        .into_iter()
        .map(|l| ToolPath::from_line(l, PathKind::Support))
        .collect()
}

/// Clip parallel scan rows at `angle_deg` against a membership test.
///
/// Rows alternate direction. With `zigzag`, consecutive strokes are
/// joined into one polyline whenever the connector stays inside the area.
fn scan_fill(
    rings: &[&Polygon],
    keep: &dyn Fn(&Point2) -> bool,
    spacing: f64,
    angle_deg: f64,
    zigzag: bool,
) -> Vec<Polyline> {
    let Some((min, max)) = rings_bounds(rings) else {
        return Vec::new();
    };

    let angle = angle_deg.to_radians();
    let dir = Vec2::new(angle.cos(), angle.sin());
    let perp = Vec2::new(-angle.sin(), angle.cos());

    let corners = [
        Point2::new(min.x, min.y),
        Point2::new(max.x, min.y),
        Point2::new(max.x, max.y),
        Point2::new(min.x, max.y),
    ];
    let mut lo = f64::MAX;
    let mut hi = f64::MIN;
    for c in &corners {
        let proj = c.x * perp.x + c.y * perp.y;
        lo = lo.min(proj);
        hi = hi.max(proj);
    }

    let mut strokes: Vec<(Point2, Point2)> = Vec::new();
    let mut offset = lo + spacing / 2.0;
    let mut row = 0usize;
    while offset < hi {
        let line = ScanLine {
            origin: Point2::new(perp.x * offset, perp.y * offset),
            dir,
        };
        let mut spans = clip_scanline(&line, rings.iter().copied(), keep);
        if !row.is_multiple_of(2) {
            spans.reverse();
        }
        for &(t0, t1) in &spans {
            let (a, b) = (line.at(t0), line.at(t1));
            if row.is_multiple_of(2) {
                strokes.push((a, b));
            } else {
                strokes.push((b, a));
            }
        }
        offset += spacing;
        row += 1;
    }

    if !zigzag {
        return strokes
            .into_iter()
            .map(|(a, b)| Polyline::new(vec![a, b]))
            .collect();
    }

    // Chain strokes while the connector between them stays inside the
    // area and is short enough to be a deliberate zig. The probe point is
    // pulled a hair back along the previous stroke: connector endpoints
    // sit exactly on the boundary, where membership is undecided.
    let max_link = spacing * 2.5;
    let mut out: Vec<Polyline> = Vec::new();
    let mut chain: Vec<Point2> = Vec::new();
    let mut prev_dir = Vec2::zeros();
    for (a, b) in strokes {
        if let Some(&last) = chain.last() {
            let mid = Point2::new((last.x + a.x) / 2.0, (last.y + a.y) / 2.0);
            let probe = mid - prev_dir * 1e-3;
            if (a - last).norm() <= max_link && keep(&probe) {
                chain.push(a);
                chain.push(b);
                prev_dir = (b - a).try_normalize(1e-9).unwrap_or(prev_dir);
                continue;
            }
            out.push(Polyline::new(std::mem::take(&mut chain)));
        }
        prev_dir = (b - a).try_normalize(1e-9).unwrap_or(Vec2::zeros());
        chain.push(a);
        chain.push(b);
    }
    if chain.len() >= 2 {
        out.push(Polyline::new(chain));
    }
    out
}

/// Hexagon-cell fill: tile the bounds with flat-top hexagons of edge
/// `edge` and print the clipped cell perimeters.
fn honeycomb_fill(
    rings: &[&Polygon],
    keep: &dyn Fn(&Point2) -> bool,
    edge: f64,
) -> Vec<Polyline> {
    let Some((min, max)) = rings_bounds(rings) else {
        return Vec::new();
    };

    let col_pitch = 1.5 * edge;
    let row_pitch = 3.0_f64.sqrt() * edge;
    let cols = ((max.x - min.x) / col_pitch).ceil() as i64 + 2;
    let rows = ((max.y - min.y) / row_pitch).ceil() as i64 + 2;

    let mut out: Vec<Polyline> = Vec::new();
    for col in -1..cols {
        for row in -1..rows {
            let cx = min.x + col as f64 * col_pitch;
            let cy = min.y
                + row as f64 * row_pitch
                + if col.rem_euclid(2) == 1 { row_pitch / 2.0 } else { 0.0 };

            let mut corners = [Point2::origin(); 6];
            for (k, c) in corners.iter_mut().enumerate() {
                let a = (k as f64) * std::f64::consts::FRAC_PI_3;
                *c = Point2::new(cx + edge * a.cos(), cy + edge * a.sin());
            }

            // Clip each cell edge, merging runs that share endpoints.
            let mut run: Vec<Point2> = Vec::new();
            for k in 0..6 {
                let a = corners[k];
                let b = corners[(k + 1) % 6];
                for (p, q) in clip_segment(a, b, rings.iter().copied(), keep) {
                    if run
                        .last()
                        .is_some_and(|last| (p - *last).norm() < 1e-6)
                    {
                        run.push(q);
                    } else {
                        if run.len() >= 2 {
                            out.push(Polyline::new(std::mem::take(&mut run)));
                        } else {
                            run.clear();
                        }
                        run.push(p);
                        run.push(q);
                    }
                }
            }
            if run.len() >= 2 {
                out.push(Polyline::new(run));
            }
        }
    }
    out
}

/// Combined bounds of a ring slice.
fn rings_bounds(rings: &[&Polygon]) -> Option<(Point2, Point2)> {
    let mut it = rings.iter().filter_map(|r| r.bounds());
    let (mut min, mut max) = it.next()?;
    for (lo, hi) in it {
        min.x = min.x.min(lo.x);
        min.y = min.y.min(lo.y);
        max.x = max.x.max(hi.x);
        max.y = max.y.max(hi.y);
    }
    Some((min, max))
}
