//! Brush-local convex meshes and brush transforms.

use brushwork_math::{Aabb3, Plane, Point3, Transform, Vec3};
use nalgebra::Matrix4;

use crate::error::{IntersectError, Result};

/// A convex brush in brush-local space: its hull vertices and bounding planes.
///
/// Planes face outward; a point is inside when it is behind every plane.
#[derive(Clone, Debug, PartialEq)]
pub struct BrushMesh {
    vertices: Vec<Point3>,
    planes: Vec<Plane>,
}

impl BrushMesh {
    /// Build a mesh, rejecting non-finite vertices and invalid planes.
    pub fn new(vertices: Vec<Point3>, planes: Vec<Plane>) -> Result<Self> {
        if let Some(i) = vertices
            .iter()
            .position(|v| !(v.x.is_finite() && v.y.is_finite() && v.z.is_finite()))
        {
            return Err(IntersectError::NonFiniteVertex(i));
        }
        if let Some(i) = planes.iter().position(|p| !p.is_valid()) {
            return Err(IntersectError::InvalidPlane(i));
        }
        Ok(Self { vertices, planes })
    }

    /// Axis-aligned box between two corners.
    ///
    /// Swapped components are normalized; a box with zero extent on any axis
    /// returns `None`.
    pub fn from_box(a: Point3, b: Point3) -> Option<Self> {
        let min = Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z));
        let max = Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z));
        let extent = max - min;
        if !(extent.x > 0.0 && extent.y > 0.0 && extent.z > 0.0) || !extent.norm().is_finite() {
            return None;
        }

        let mut vertices = Vec::with_capacity(8);
        for &z in &[min.z, max.z] {
            for &y in &[min.y, max.y] {
                for &x in &[min.x, max.x] {
                    vertices.push(Point3::new(x, y, z));
                }
            }
        }
        let planes = vec![
            Plane::new(Vec3::x(), -max.x),
            Plane::new(-Vec3::x(), min.x),
            Plane::new(Vec3::y(), -max.y),
            Plane::new(-Vec3::y(), min.y),
            Plane::new(Vec3::z(), -max.z),
            Plane::new(-Vec3::z(), min.z),
        ];
        Some(Self { vertices, planes })
    }

    /// Hull vertices.
    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    /// Outward-facing planes.
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Bounds in brush-local space.
    pub fn local_bounds(&self) -> Option<Aabb3> {
        Aabb3::from_points(&self.vertices)
    }

    /// True when the mesh cannot take part in intersection tests.
    pub fn is_degenerate(&self) -> bool {
        self.planes.is_empty() || self.vertices.is_empty()
    }
}

/// A brush's local-to-tree matrix and its inverse.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeTransformations {
    /// Brush-local to tree space.
    pub node_to_tree: Matrix4<f64>,
    /// Tree space to brush-local.
    pub tree_to_node: Matrix4<f64>,
}

impl NodeTransformations {
    /// Identity in both directions.
    pub fn identity() -> Self {
        Self {
            node_to_tree: Matrix4::identity(),
            tree_to_node: Matrix4::identity(),
        }
    }

    /// From a local-to-tree transform. Fails when it cannot be inverted.
    pub fn from_transform(node_to_tree: &Transform) -> Result<Self> {
        if !node_to_tree.is_finite() {
            return Err(IntersectError::SingularTransform);
        }
        let tree_to_node = node_to_tree
            .inverse()
            .ok_or(IntersectError::SingularTransform)?;
        Ok(Self {
            node_to_tree: node_to_tree.matrix,
            tree_to_node: tree_to_node.matrix,
        })
    }

    /// Matrix mapping `other`'s local space into this brush's local space.
    pub fn other_to_local(&self, other: &NodeTransformations) -> Matrix4<f64> {
        self.tree_to_node * other.node_to_tree
    }
}

impl Default for NodeTransformations {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tree-space bounds of a mesh placed by `transformations`.
pub fn tree_space_bounds(mesh: &BrushMesh, transformations: &NodeTransformations) -> Option<Aabb3> {
    let transform = Transform {
        matrix: transformations.node_to_tree,
    };
    Aabb3::from_transformed_points(mesh.vertices(), &transform)
}
