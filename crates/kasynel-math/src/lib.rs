#![warn(missing_docs)]

//! Math types for the Kasynel slicing core.
//!
//! Thin wrappers around nalgebra providing the 2D/3D types the pipeline
//! works in (millimetres throughout), plus the small set of planar
//! helpers and tolerance constants the geometry stages share.

use nalgebra::{Vector2, Vector3};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A point in the slicing plane.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in the slicing plane.
pub type Vec2 = Vector2<f64>;

/// Left-hand perpendicular of a 2D vector (rotate +90 degrees).
///
/// For a counter-clockwise ring this points toward the enclosed area.
pub fn perp(v: &Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// 2D cross product (z component of the 3D cross).
pub fn cross2(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Linear interpolation between two planar points.
pub fn lerp2(a: &Point2, b: &Point2, t: f64) -> Point2 {
    Point2::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

/// Squared distance between two planar points.
pub fn dist2_sq(a: &Point2, b: &Point2) -> f64 {
    let d = b - a;
    d.x * d.x + d.y * d.y
}

/// Tolerance constants for the slicing pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Epsilon used to nudge a slicing plane off mesh vertices (mm).
    pub plane_nudge: f64,
    /// Distance under which two segment endpoints fuse while stitching (mm).
    pub fuse: f64,
    /// Ring area below which a polygon is treated as collapsed (mm^2).
    pub min_ring_area: f64,
}

impl Tolerance {
    /// Default slicing tolerances.
    pub const DEFAULT: Self = Self {
        plane_nudge: 1e-6,
        fuse: 1e-5,
        min_ring_area: 1e-6,
    };

    /// Check if two planar points fuse within tolerance.
    pub fn points_fuse(&self, a: &Point2, b: &Point2) -> bool {
        dist2_sq(a, b) < self.fuse * self.fuse
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perp_is_left() {
        let v = Vec2::new(1.0, 0.0);
        let p = perp(&v);
        assert_relative_eq!(p.x, 0.0);
        assert_relative_eq!(p.y, 1.0);
    }

    #[test]
    fn test_cross2_sign() {
        let a = Vec2::new(1.0, 0.0);
        let b = Vec2::new(0.0, 1.0);
        assert!(cross2(&a, &b) > 0.0);
        assert!(cross2(&b, &a) < 0.0);
    }

    #[test]
    fn test_lerp2_midpoint() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(2.0, 4.0);
        let m = lerp2(&a, &b, 0.5);
        assert_relative_eq!(m.x, 1.0);
        assert_relative_eq!(m.y, 2.0);
    }

    #[test]
    fn test_points_fuse() {
        let tol = Tolerance::DEFAULT;
        let a = Point2::new(1.0, 1.0);
        let b = Point2::new(1.0 + 4e-6, 1.0);
        assert!(tol.points_fuse(&a, &b));
        let c = Point2::new(1.0 + 2e-5, 1.0);
        assert!(!tol.points_fuse(&a, &c));
    }
}
