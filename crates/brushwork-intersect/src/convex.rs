//! Separating-plane classification of two convex brushes.

use brushwork_hierarchy::NodeId;
use brushwork_math::{Plane, Point3, Side, Tolerance};

use crate::geometry::BrushGeometrySource;
use crate::mesh::{BrushMesh, NodeTransformations};
use crate::IntersectionType;

/// Side of `plane` a whole vertex set lies on.
///
/// `Front` or `Back` only when every vertex is beyond the tolerance on that
/// side; anything touching or straddling the plane is `On`.
pub fn which_side(plane: &Plane, vertices: &[Point3], tolerance: &Tolerance) -> Side {
    let mut sides = vertices.iter().map(|v| tolerance.side_of(plane.distance(v)));
    match sides.next() {
        None | Some(Side::On) => Side::On,
        Some(first) => {
            if sides.all(|side| side == first) {
                first
            } else {
                Side::On
            }
        }
    }
}

/// Classify brush `a` against brush `b`.
///
/// `a`'s planes are moved into `b`'s local space and tested against `b`'s
/// vertices, then the other way around. Any plane with the other hull
/// entirely in front of it separates the brushes.
pub fn convex_polytope_touching(
    mesh_a: &BrushMesh,
    transformations_a: &NodeTransformations,
    mesh_b: &BrushMesh,
    transformations_b: &NodeTransformations,
    tolerance: &Tolerance,
) -> IntersectionType {
    let b_to_a = transformations_a.other_to_local(transformations_b);
    let mut b_behind_all = true;
    for plane in mesh_a.planes() {
        match which_side(&plane.transformed(&b_to_a), mesh_b.vertices(), tolerance) {
            Side::Front => return IntersectionType::NoIntersection,
            Side::Back => {}
            Side::On => b_behind_all = false,
        }
    }
    if b_behind_all {
        return IntersectionType::BInsideA;
    }

    let a_to_b = transformations_b.other_to_local(transformations_a);
    let mut a_behind_all = true;
    for plane in mesh_b.planes() {
        match which_side(&plane.transformed(&a_to_b), mesh_a.vertices(), tolerance) {
            Side::Front => return IntersectionType::NoIntersection,
            Side::Back => {}
            Side::On => a_behind_all = false,
        }
    }
    if a_behind_all {
        IntersectionType::AInsideB
    } else {
        IntersectionType::Intersection
    }
}

/// Classify two brushes by handle, including the bounds pre-test.
///
/// Brushes without a usable mesh never intersect anything.
pub fn classify_brushes<G: BrushGeometrySource + ?Sized>(
    a: NodeId,
    b: NodeId,
    geometry: &G,
    tolerance: &Tolerance,
) -> IntersectionType {
    let (Some(mesh_a), Some(mesh_b)) = (geometry.mesh(a), geometry.mesh(b)) else {
        return IntersectionType::NoIntersection;
    };
    if mesh_a.is_degenerate() || mesh_b.is_degenerate() {
        return IntersectionType::NoIntersection;
    }
    if let (Some(bounds_a), Some(bounds_b)) = (geometry.tree_bounds(a), geometry.tree_bounds(b)) {
        if !bounds_a.overlaps_within(&bounds_b, tolerance.plane_distance) {
            return IntersectionType::NoIntersection;
        }
    }

    let identity = NodeTransformations::identity();
    let transformations_a = geometry.transformations(a).unwrap_or(&identity);
    let transformations_b = geometry.transformations(b).unwrap_or(&identity);
    convex_polytope_touching(mesh_a, transformations_a, mesh_b, transformations_b, tolerance)
}
