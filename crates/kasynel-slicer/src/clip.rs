//! Scanline clipping of derived areas.
//!
//! Skin, sparse-infill, and support areas are differences and
//! intersections of per-layer outlines. Rather than materializing those
//! booleans, each area is kept as a clip expression: a base polygon set
//! plus the neighbor outlines that cover it. A scan line is cut at every
//! boundary crossing and each elementary interval is classified by a
//! midpoint membership test, which realizes the set algebra exactly on
//! the paths that get printed.

use kasynel_math::{cross2, lerp2, Point2, Vec2};

use crate::path::{Polygon, PolygonSet};

/// Minimum printable sub-segment length (mm); shorter intervals are noise
/// from near-tangent crossings.
const MIN_SEGMENT: f64 = 1e-2;

/// A window of neighbor outlines whose intersection covers an area.
#[derive(Debug, Clone, Default)]
pub struct CoverWindow {
    /// The outlines in the window.
    pub sets: Vec<PolygonSet>,
    /// False when the window ran past the top or bottom of the stack.
    pub complete: bool,
}

impl CoverWindow {
    /// A full window (possibly empty, which covers vacuously).
    pub fn complete(sets: Vec<PolygonSet>) -> Self {
        Self {
            sets,
            complete: true,
        }
    }

    /// A window truncated by the end of the layer stack.
    pub fn truncated() -> Self {
        Self {
            sets: Vec::new(),
            complete: false,
        }
    }

    fn covers(&self, p: &Point2) -> bool {
        self.complete && self.sets.iter().all(|s| s.contains(p))
    }
}

/// An area derived from a base set and two neighbor-cover windows.
///
/// Skin is the part of the base not covered both above and below; sparse
/// infill is the covered remainder. The two views share one expression.
#[derive(Debug, Clone, Default)]
pub struct AreaExpr {
    /// Candidate area (the inner region, expanded by any overlap).
    pub base: PolygonSet,
    /// Outlines of the next `top_layers` layers above.
    pub above: CoverWindow,
    /// Outlines of the previous `bottom_layers` layers below.
    pub below: CoverWindow,
}

impl AreaExpr {
    /// Expression with no skin anywhere (fully covered base).
    pub fn covered(base: PolygonSet) -> Self {
        Self {
            base,
            above: CoverWindow::complete(Vec::new()),
            below: CoverWindow::complete(Vec::new()),
        }
    }

    /// Is `p` inside the base and enclosed from both sides?
    pub fn is_covered(&self, p: &Point2) -> bool {
        self.base.contains(p) && self.above.covers(p) && self.below.covers(p)
    }

    /// Membership in the skin view (base minus full cover).
    pub fn contains_skin(&self, p: &Point2) -> bool {
        self.base.contains(p) && !(self.above.covers(p) && self.below.covers(p))
    }

    /// Membership in the sparse view (base with full cover).
    pub fn contains_sparse(&self, p: &Point2) -> bool {
        self.is_covered(p)
    }

    /// Every ring that can bound a membership change.
    pub fn edge_rings(&self) -> impl Iterator<Item = &Polygon> {
        self.base
            .rings
            .iter()
            .chain(self.above.sets.iter().flat_map(|s| s.rings.iter()))
            .chain(self.below.sets.iter().flat_map(|s| s.rings.iter()))
    }

    /// True when the base holds no area at all.
    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }
}

/// Parameters of an infinite scan line `origin + t * dir`.
#[derive(Debug, Clone, Copy)]
pub struct ScanLine {
    /// A point on the line.
    pub origin: Point2,
    /// Unit direction along the line.
    pub dir: Vec2,
}

impl ScanLine {
    /// Point at parameter `t`.
    pub fn at(&self, t: f64) -> Point2 {
        Point2::new(self.origin.x + t * self.dir.x, self.origin.y + t * self.dir.y)
    }
}

/// Collect crossing parameters of a scan line against ring edges.
fn crossings<'a>(line: &ScanLine, rings: impl Iterator<Item = &'a Polygon>, out: &mut Vec<f64>) {
    let eps = 1e-12;
    for ring in rings {
        let n = ring.points.len();
        for i in 0..n {
            let a = ring.points[i];
            let b = ring.points[(i + 1) % n];
            let seg: Vec2 = b - a;
            let denom = cross2(&line.dir, &seg);
            if denom.abs() < eps {
                continue;
            }
            let diff: Vec2 = a - line.origin;
            let t = cross2(&diff, &seg) / denom;
            let s = cross2(&diff, &line.dir) / denom;
            if (-1e-9..=1.0 + 1e-9).contains(&s) {
                out.push(t);
            }
        }
    }
}

/// Cut a scan line at every edge of `rings` and keep the elementary
/// intervals whose midpoint satisfies `keep`. Adjacent kept intervals are
/// merged; slivers below [`MIN_SEGMENT`] are dropped.
pub fn clip_scanline<'a>(
    line: &ScanLine,
    rings: impl Iterator<Item = &'a Polygon>,
    keep: &dyn Fn(&Point2) -> bool,
) -> Vec<(f64, f64)> {
    let mut ts = Vec::new();
    crossings(line, rings, &mut ts);
    if ts.len() < 2 {
        return Vec::new();
    }
    ts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut spans: Vec<(f64, f64)> = Vec::new();
    for w in ts.windows(2) {
        let (t0, t1) = (w[0], w[1]);
        if t1 - t0 < 1e-9 {
            continue;
        }
        let mid = line.at((t0 + t1) / 2.0);
        if !keep(&mid) {
            continue;
        }
        match spans.last_mut() {
            Some(last) if (t0 - last.1).abs() < 1e-9 => last.1 = t1,
            _ => spans.push((t0, t1)),
        }
    }
    spans.retain(|(t0, t1)| t1 - t0 >= MIN_SEGMENT);
    spans
}

/// Clip the segment `a -> b` against ring edges, keeping sub-segments
/// whose midpoint satisfies `keep`.
pub fn clip_segment<'a>(
    a: Point2,
    b: Point2,
    rings: impl Iterator<Item = &'a Polygon>,
    keep: &dyn Fn(&Point2) -> bool,
) -> Vec<(Point2, Point2)> {
    let dir: Vec2 = b - a;
    let len = dir.norm();
    if len < 1e-9 {
        return Vec::new();
    }
    let line = ScanLine {
        origin: a,
        dir: dir / len,
    };

    let mut ts = vec![0.0, len];
    crossings(&line, rings, &mut ts);
    ts.retain(|&t| (-1e-9..=len + 1e-9).contains(&t));
    ts.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));

    let mut out: Vec<(f64, f64)> = Vec::new();
    for w in ts.windows(2) {
        let (t0, t1) = (w[0], w[1]);
        if t1 - t0 < 1e-9 {
            continue;
        }
        let mid = line.at((t0 + t1) / 2.0);
        if !keep(&mid) {
            continue;
        }
        match out.last_mut() {
            Some(last) if (t0 - last.1).abs() < 1e-9 => last.1 = t1,
            _ => out.push((t0, t1)),
        }
    }

    out.iter()
        .filter(|(t0, t1)| t1 - t0 >= MIN_SEGMENT)
        .map(|&(t0, t1)| {
            (
                lerp2(&a, &b, t0 / len),
                lerp2(&a, &b, t1 / len),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square_set(size: f64) -> PolygonSet {
        PolygonSet::assemble(vec![Polygon::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(size, 0.0),
            Point2::new(size, size),
            Point2::new(0.0, size),
        ])])
    }

    #[test]
    fn test_scanline_through_square() {
        let set = square_set(10.0);
        let line = ScanLine {
            origin: Point2::new(-5.0, 5.0),
            dir: Vec2::new(1.0, 0.0),
        };
        let spans = clip_scanline(&line, set.rings.iter(), &|p| set.contains(p));
        assert_eq!(spans.len(), 1);
        assert_relative_eq!(spans[0].1 - spans[0].0, 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_scanline_skips_hole() {
        let outer = Polygon::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(20.0, 0.0),
            Point2::new(20.0, 20.0),
            Point2::new(0.0, 20.0),
        ]);
        let hole = Polygon::new(vec![
            Point2::new(8.0, 8.0),
            Point2::new(12.0, 8.0),
            Point2::new(12.0, 12.0),
            Point2::new(8.0, 12.0),
        ]);
        let set = PolygonSet::assemble(vec![outer, hole]);
        let line = ScanLine {
            origin: Point2::new(-1.0, 10.0),
            dir: Vec2::new(1.0, 0.0),
        };
        let spans = clip_scanline(&line, set.rings.iter(), &|p| set.contains(p));
        assert_eq!(spans.len(), 2);
        let total: f64 = spans.iter().map(|(a, b)| b - a).sum();
        assert_relative_eq!(total, 16.0, epsilon = 1e-6);
    }

    #[test]
    fn test_skin_where_uncovered() {
        let base = square_set(10.0);
        let above = square_set(6.0);
        let expr = AreaExpr {
            base: base.clone(),
            above: CoverWindow::complete(vec![above]),
            below: CoverWindow::complete(Vec::new()),
        };
        // Covered only where the smaller square sits.
        assert!(expr.contains_sparse(&Point2::new(3.0, 3.0)));
        assert!(expr.contains_skin(&Point2::new(8.0, 8.0)));
        assert!(!expr.contains_skin(&Point2::new(3.0, 3.0)));
        assert!(!expr.contains_skin(&Point2::new(11.0, 11.0)));
    }

    #[test]
    fn test_truncated_window_forces_skin() {
        let expr = AreaExpr {
            base: square_set(10.0),
            above: CoverWindow::complete(Vec::new()),
            below: CoverWindow::truncated(),
        };
        assert!(expr.contains_skin(&Point2::new(5.0, 5.0)));
        assert!(!expr.contains_sparse(&Point2::new(5.0, 5.0)));
    }

    #[test]
    fn test_clip_segment_inside_only() {
        let set = square_set(10.0);
        let parts = clip_segment(
            Point2::new(-5.0, 5.0),
            Point2::new(15.0, 5.0),
            set.rings.iter(),
            &|p| set.contains(p),
        );
        assert_eq!(parts.len(), 1);
        assert_relative_eq!(parts[0].0.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(parts[0].1.x, 10.0, epsilon = 1e-6);
    }
}
