//! Axis-aligned bounding boxes.
//!
//! Used as the broadphase for brush pairs: only brushes whose tree-space
//! bounds overlap (after epsilon expansion) get the separating-plane test.

use crate::{Point3, Transform};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Bounds of a point set, `None` when the set is empty.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3>,
    {
        let mut aabb = Self::empty();
        for p in points {
            aabb.include_point(p);
        }
        (!aabb.is_empty()).then_some(aabb)
    }

    /// Bounds of a point set after transforming every point.
    pub fn from_transformed_points<'a, I>(points: I, transform: &Transform) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3>,
    {
        let mut aabb = Self::empty();
        for p in points {
            aabb.include_point(&transform.apply_point(p));
        }
        (!aabb.is_empty()).then_some(aabb)
    }

    /// True while no point has been included.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Test if two AABBs overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb3) -> bool {
        self.overlaps_within(other, 0.0)
    }

    /// Test if two AABBs overlap once both are grown by `epsilon`.
    pub fn overlaps_within(&self, other: &Aabb3, epsilon: f64) -> bool {
        let slack = 2.0 * epsilon;
        self.min.x <= other.max.x + slack
            && self.max.x + slack >= other.min.x
            && self.min.y <= other.max.y + slack
            && self.max.y + slack >= other.min.y
            && self.min.z <= other.max.z + slack
            && self.max.z + slack >= other.min.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_overlap() {
        let a = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0));
        let b = Aabb3::new(Point3::new(5.0, 5.0, 5.0), Point3::new(15.0, 15.0, 15.0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));

        let c = Aabb3::new(Point3::new(20.0, 20.0, 20.0), Point3::new(30.0, 30.0, 30.0));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_aabb_touching() {
        let a = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0));
        let b = Aabb3::new(Point3::new(10.0, 0.0, 0.0), Point3::new(20.0, 10.0, 10.0));
        assert!(a.overlaps(&b));
    }

    #[test]
    fn test_overlap_within_epsilon_gap() {
        let a = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb3::new(Point3::new(1.001, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps_within(&b, 0.001));
        assert!(!a.overlaps_within(&b, 0.0001));
    }

    #[test]
    fn test_from_points_empty() {
        assert!(Aabb3::from_points(std::iter::empty()).is_none());
        let pts = [Point3::new(1.0, -2.0, 3.0), Point3::new(-1.0, 2.0, 0.0)];
        let aabb = Aabb3::from_points(&pts).unwrap();
        assert_eq!(aabb.min, Point3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_from_transformed_points() {
        let pts = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)];
        let aabb = Aabb3::from_transformed_points(&pts, &Transform::translation(2.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(aabb.min.x, 2.0);
        assert_eq!(aabb.max.x, 3.0);
    }
}
