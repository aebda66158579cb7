#![warn(missing_docs)]

//! Math types for the brushwork CSG core.
//!
//! Thin wrappers around nalgebra providing the handful of types the
//! brush hierarchy and intersection engine need: points, affine
//! transforms, half-space planes, axis-aligned bounds, and the shared
//! plane-distance tolerance.

mod aabb;
mod plane;

pub use aabb::Aabb3;
pub use plane::{Plane, Side};

use nalgebra::{Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// Distance below which a vertex counts as lying on a plane.
///
/// Shared by the bounds pre-test and the separating-plane classifier so
/// exactly touching brushes never flicker between touching and apart.
pub const PLANE_DISTANCE_EPSILON: f64 = 0.0006;

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        m[(2, 2)] = sz;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Compose: `self` then `other` (self * other).
    ///
    /// Applying the result to a point applies `other` first.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// True when every matrix entry is finite.
    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tolerance used for plane-side classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Signed plane distance treated as "on the plane".
    pub plane_distance: f64,
}

impl Tolerance {
    /// Default CSG tolerance ([`PLANE_DISTANCE_EPSILON`]).
    pub const DEFAULT: Self = Self {
        plane_distance: PLANE_DISTANCE_EPSILON,
    };

    /// Create a tolerance with a custom plane distance.
    pub const fn new(plane_distance: f64) -> Self {
        Self { plane_distance }
    }

    /// Classify a signed plane distance.
    pub fn side_of(&self, distance: f64) -> Side {
        if distance >= self.plane_distance {
            Side::Front
        } else if distance <= -self.plane_distance {
            Side::Back
        } else {
            Side::On
        }
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
    use std::f64::consts::PI;

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result - p).norm() < 1e-12);
    }

    #[test]
    fn test_translation() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let result = t.apply_point(&Point3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(result.x, 11.0);
        assert_relative_eq!(result.y, 22.0);
        assert_relative_eq!(result.z, 33.0);
    }

    #[test]
    fn test_rotation_z_90() {
        let t = Transform::rotation_z(PI / 2.0);
        let result = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(result.x.abs() < 1e-12);
        assert_relative_eq!(result.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_applies_right_operand_first() {
        let translate = Transform::translation(1.0, 0.0, 0.0);
        let scale = Transform::scale(2.0, 2.0, 2.0);
        // (scale * translate) * origin = scale(translate(origin)) = (2, 0, 0)
        let result = scale.then(&translate).apply_point(&Point3::origin());
        assert_relative_eq!(result.x, 2.0);
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = Transform::translation(1.0, 2.0, 3.0).then(&Transform::rotation_z(0.3));
        let inv = t.inverse().unwrap();
        let p = Point3::new(5.0, 6.0, 7.0);
        let result = t.then(&inv).apply_point(&p);
        assert!((result - p).norm() < 1e-12);
    }

    #[test]
    fn test_singular_transform_has_no_inverse() {
        assert!(Transform::scale(1.0, 0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn test_tolerance_sides() {
        let tol = Tolerance::DEFAULT;
        assert_eq!(tol.side_of(1.0), Side::Front);
        assert_eq!(tol.side_of(-1.0), Side::Back);
        assert_eq!(tol.side_of(PLANE_DISTANCE_EPSILON * 0.5), Side::On);
        assert_eq!(tol.side_of(-PLANE_DISTANCE_EPSILON * 0.5), Side::On);
    }
}
