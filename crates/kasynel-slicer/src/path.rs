//! Planar geometry: rings, polygon sets, and tagged toolpaths.
//!
//! Polygons with holes are kept as a flat ring list plus a parent index
//! per ring; no nested ownership. Exterior rings wind CCW, holes CW, and
//! the solid side of any correctly wound ring lies to the left of travel,
//! which lets one offset routine serve exteriors and holes alike.

use kasynel_math::{perp, Point2, Vec2};

/// A closed 2D ring.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Vertices in order; the closing edge back to the first is implicit.
    pub points: Vec<Point2>,
}

impl Polygon {
    /// Create a ring from points.
    pub fn new(points: Vec<Point2>) -> Self {
        Self { points }
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the ring has no vertices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Signed area: positive for counter-clockwise winding.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut area = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            area += self.points[i].x * self.points[j].y;
            area -= self.points[j].x * self.points[i].y;
        }
        area / 2.0
    }

    /// Is the ring counter-clockwise?
    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Reverse the winding order.
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Total edge length including the closing edge.
    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        let mut length = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            length += (self.points[j] - self.points[i]).norm();
        }
        length
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> Option<(Point2, Point2)> {
        let first = *self.points.first()?;
        let mut min = first;
        let mut max = first;
        for p in &self.points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some((min, max))
    }

    /// Even-odd point containment test.
    pub fn contains(&self, point: &Point2) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let pi = &self.points[i];
            let pj = &self.points[j];
            if ((pi.y > point.y) != (pj.y > point.y))
                && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Offset the ring toward the solid side by `distance` (negative moves
    /// away from the solid).
    ///
    /// With standard winding the solid lies left of travel for exteriors
    /// and holes alike, so a positive distance insets the part: exterior
    /// rings shrink and holes grow. Vertices move along the bisector of
    /// adjacent edge normals, with the miter clamped at sharp corners.
    /// Returns `None` when the ring collapses (winding flip or vanishing
    /// area).
    pub fn offset(&self, distance: f64) -> Option<Polygon> {
        // Drop consecutive duplicates so edge directions are well defined.
        let mut pts: Vec<Point2> = Vec::with_capacity(self.points.len());
        for &p in &self.points {
            if pts.last().is_none_or(|last| (p - *last).norm() > 1e-9) {
                pts.push(p);
            }
        }
        while pts.len() > 1 && (pts[0] - *pts.last().unwrap()).norm() <= 1e-9 {
            pts.pop();
        }
        let n = pts.len();
        if n < 3 {
            return None;
        }

        let was_ccw = self.is_ccw();
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let p0 = pts[(i + n - 1) % n];
            let p1 = pts[i];
            let p2 = pts[(i + 1) % n];

            let e1 = (p1 - p0).try_normalize(1e-12)?;
            let e2 = (p2 - p1).try_normalize(1e-12)?;
            let n1 = perp(&e1);
            let n2 = perp(&e2);

            let sum: Vec2 = n1 + n2;
            let bisector = sum.try_normalize(1e-9).unwrap_or(n2);

            // Scale along the bisector so each edge shifts by `distance`,
            // clamped to bound the miter at sharp corners.
            let dot = n1.dot(&bisector);
            let step = if dot.abs() > 1e-3 { distance / dot } else { distance };
            let limit = 2.0 * distance.abs().max(1e-9);
            let step = step.clamp(-limit, limit);

            out.push(p1 + bisector * step);
        }

        let result = Polygon::new(out);
        if result.signed_area().abs() < 1e-6 || result.is_ccw() != was_ccw {
            return None;
        }
        Some(result)
    }
}

/// A set of rings forming polygons with holes.
///
/// `parent[i]` is the index of the innermost ring enclosing ring `i`, or
/// `None` for top-level exteriors. Rings at even containment depth wind
/// CCW, odd depth CW.
#[derive(Debug, Clone, Default)]
pub struct PolygonSet {
    /// Flat ring list.
    pub rings: Vec<Polygon>,
    /// Innermost enclosing ring per ring.
    pub parent: Vec<Option<usize>>,
}

impl PolygonSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from rings, computing parents and normalizing winding
    /// by containment depth.
    pub fn assemble(mut rings: Vec<Polygon>) -> Self {
        rings.retain(|r| r.len() >= 3 && r.signed_area().abs() > 1e-9);
        let n = rings.len();
        let mut depth = vec![0usize; n];
        let mut parent = vec![None; n];

        for i in 0..n {
            let probe = rings[i].points[0];
            let mut best: Option<(usize, f64)> = None;
            let mut d = 0usize;
            for j in 0..n {
                if i == j {
                    continue;
                }
                if rings[j].contains(&probe) {
                    d += 1;
                    let area = rings[j].signed_area().abs();
                    // Innermost container has the smallest area.
                    if best.is_none_or(|(_, a)| area < a) {
                        best = Some((j, area));
                    }
                }
            }
            depth[i] = d;
            parent[i] = best.map(|(j, _)| j);
        }

        for i in 0..n {
            let want_ccw = depth[i] % 2 == 0;
            if rings[i].is_ccw() != want_ccw {
                rings[i].reverse();
            }
        }

        Self { rings, parent }
    }

    /// True when no rings remain.
    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// Even-odd containment over the whole set.
    pub fn contains(&self, point: &Point2) -> bool {
        let mut crossings = 0usize;
        for ring in &self.rings {
            if ring.contains(point) {
                crossings += 1;
            }
        }
        crossings % 2 == 1
    }

    /// Combined bounds of all rings.
    pub fn bounds(&self) -> Option<(Point2, Point2)> {
        let mut it = self.rings.iter().filter_map(|r| r.bounds());
        let (mut min, mut max) = it.next()?;
        for (lo, hi) in it {
            min.x = min.x.min(lo.x);
            min.y = min.y.min(lo.y);
            max.x = max.x.max(hi.x);
            max.y = max.y.max(hi.y);
        }
        Some((min, max))
    }

    /// Offset every ring toward the solid side, dropping collapsed rings.
    ///
    /// Returns the offset set and whether any ring collapsed.
    pub fn offset_all(&self, distance: f64) -> (PolygonSet, bool) {
        let mut rings = Vec::with_capacity(self.rings.len());
        let mut collapsed = false;
        for ring in &self.rings {
            match ring.offset(distance) {
                Some(r) => rings.push(r),
                None => collapsed = true,
            }
        }
        (PolygonSet::assemble(rings), collapsed)
    }

    /// Group rings into disjoint components: each top-level exterior with
    /// the holes directly inside it.
    pub fn components(&self) -> Vec<Component> {
        let mut out = Vec::new();
        for (i, ring) in self.rings.iter().enumerate() {
            if !ring.is_ccw() {
                continue;
            }
            // Exterior of a component: CCW ring whose parent (if any) is a hole.
            let is_top = match self.parent[i] {
                None => true,
                Some(p) => !self.rings[p].is_ccw(),
            };
            if !is_top {
                continue;
            }
            let holes = self
                .rings
                .iter()
                .enumerate()
                .filter(|(j, r)| self.parent[*j] == Some(i) && !r.is_ccw())
                .map(|(_, r)| r.clone())
                .collect();
            out.push(Component {
                exterior: ring.clone(),
                holes,
            });
        }
        out
    }
}

/// One disjoint solid region: an exterior ring plus its holes.
#[derive(Debug, Clone)]
pub struct Component {
    /// CCW exterior ring.
    pub exterior: Polygon,
    /// CW hole rings directly inside the exterior.
    pub holes: Vec<Polygon>,
}

/// An open polyline path.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    /// Points along the path.
    pub points: Vec<Point2>,
}

impl Polyline {
    /// Create a polyline.
    pub fn new(points: Vec<Point2>) -> Self {
        Self { points }
    }

    /// Total length.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
    }
}

/// What a toolpath deposits, mapped to the G-code `; TYPE:` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Outermost wall ring.
    WallOuter,
    /// Inner wall rings.
    WallInner,
    /// Dense top/bottom fill.
    Skin,
    /// Sparse interior fill.
    Fill,
    /// Support structure fill.
    Support,
    /// Bed-adhesion brim ring.
    Brim,
    /// Non-extruding move.
    Travel,
}

impl PathKind {
    /// Cura-compatible `; TYPE:` tag, `None` for travels.
    pub fn type_tag(&self) -> Option<&'static str> {
        match self {
            PathKind::WallOuter => Some("WALL-OUTER"),
            PathKind::WallInner => Some("WALL-INNER"),
            PathKind::Skin => Some("SKIN"),
            PathKind::Fill => Some("FILL"),
            PathKind::Support => Some("SUPPORT"),
            PathKind::Brim => Some("BRIM"),
            PathKind::Travel => None,
        }
    }
}

/// An ordered polyline with a deposit tag, ready for emission.
///
/// Closed paths return to their first point; the emitter computes
/// extrusion, never the synthesizer.
#[derive(Debug, Clone)]
pub struct ToolPath {
    /// Path vertices. For closed paths the first point is the seam.
    pub points: Vec<Point2>,
    /// Deposit tag.
    pub kind: PathKind,
    /// Whether the path closes back to its first point.
    pub closed: bool,
}

impl ToolPath {
    /// Closed path from a ring, rotated so `start` is first.
    pub fn from_ring(ring: &Polygon, start: usize, kind: PathKind) -> Self {
        let n = ring.points.len();
        let mut points = Vec::with_capacity(n);
        for k in 0..n {
            points.push(ring.points[(start + k) % n]);
        }
        Self {
            points,
            kind,
            closed: true,
        }
    }

    /// Open path from a polyline.
    pub fn from_line(line: Polyline, kind: PathKind) -> Self {
        Self {
            points: line.points,
            kind,
            closed: false,
        }
    }

    /// First point, if any.
    pub fn start(&self) -> Option<Point2> {
        self.points.first().copied()
    }

    /// Point the nozzle rests at after the path.
    pub fn end(&self) -> Option<Point2> {
        if self.closed {
            self.start()
        } else {
            self.points.last().copied()
        }
    }

    /// Deposited length (includes the closing edge for closed paths).
    pub fn length(&self) -> f64 {
        let open: f64 = self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
        if self.closed && self.points.len() >= 2 {
            open + (self.points[0] - *self.points.last().unwrap()).norm()
        } else {
            open
        }
    }
}

/// Greedy nearest-neighbor ordering of paths, starting from `from`.
///
/// Open paths may be reversed when their far end is closer. Returns the
/// position the nozzle ends at.
pub fn order_nearest(paths: &mut Vec<ToolPath>, from: Point2) -> Point2 {
    let mut cursor = from;
    let mut remaining: Vec<ToolPath> = std::mem::take(paths);
    while !remaining.is_empty() {
        let mut best = 0usize;
        let mut best_dist = f64::MAX;
        let mut best_flip = false;
        for (i, p) in remaining.iter().enumerate() {
            let Some(start) = p.start() else { continue };
            let d = (start - cursor).norm();
            if d < best_dist {
                best = i;
                best_dist = d;
                best_flip = false;
            }
            if !p.closed {
                if let Some(end) = p.points.last() {
                    let d = (end - cursor).norm();
                    if d < best_dist {
                        best = i;
                        best_dist = d;
                        best_flip = true;
                    }
                }
            }
        }
        let mut chosen = remaining.swap_remove(best);
        if best_flip {
            chosen.points.reverse();
        }
        if let Some(end) = chosen.end() {
            cursor = end;
        }
        paths.push(chosen);
    }
    cursor
}
