//! Half-space planes stored as `(nx, ny, nz, d)`.

use nalgebra::{Matrix4, Vector4};

use crate::{Point3, Vec3};

/// Which side of a plane a point (or point set) lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Strictly in front of the plane (outside the half-space).
    Front,
    /// Strictly behind the plane (inside the half-space).
    Back,
    /// On the plane within tolerance, or straddling it.
    On,
}

/// A plane `n·p + d = 0`. Points with positive distance are outside.
///
/// The normal is not required to be unit length; after a non-uniform
/// transform the signed distance is scaled accordingly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane(pub Vector4<f64>);

impl Plane {
    /// Plane from its normal and offset.
    pub fn new(normal: Vec3, d: f64) -> Self {
        Self(Vector4::new(normal.x, normal.y, normal.z, d))
    }

    /// Plane through `point` facing `normal`.
    pub fn from_point_normal(point: &Point3, normal: Vec3) -> Self {
        Self::new(normal, -normal.dot(&point.coords))
    }

    /// The (possibly non-unit) normal.
    pub fn normal(&self) -> Vec3 {
        Vec3::new(self.0.x, self.0.y, self.0.z)
    }

    /// Signed distance of `p` (positive = outside).
    pub fn distance(&self, p: &Point3) -> f64 {
        self.0.dot(&Vector4::new(p.x, p.y, p.z, 1.0))
    }

    /// Re-express this plane in another space.
    ///
    /// `other_to_self` maps points of the target space into the space the
    /// plane is currently expressed in.
    pub fn transformed(&self, other_to_self: &Matrix4<f64>) -> Self {
        Self(other_to_self.transpose() * self.0)
    }

    /// True when all components are finite and the normal is non-zero.
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|v| v.is_finite()) && self.normal().norm_squared() > 0.0
    }
}
