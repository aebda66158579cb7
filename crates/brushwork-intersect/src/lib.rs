#![warn(missing_docs)]

//! Brush intersection core for the brushwork CSG engine.
//!
//! Classifies every pair of convex brushes as disjoint, overlapping or
//! nested, incrementally when only some brushes changed, and packs each
//! brush's neighbors into a [`BrushesTouchedByBrush`] set keyed against a
//! [`CompactTree`](brushwork_hierarchy::CompactTree) snapshot.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use brushwork_hierarchy::{HierarchyId, IndexOrder, NodeId};
//! use brushwork_intersect::{
//!     solve, BrushGeometry, BrushGeometryTable, BrushMesh, IntersectionType, NodeTransformations,
//!     SolveOptions,
//! };
//! use brushwork_math::{Point3, Transform};
//!
//! let cube = Arc::new(BrushMesh::from_box(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0)).unwrap());
//! let a = IndexOrder::new(NodeId::new(HierarchyId(1), 1, 1), 0);
//! let b = IndexOrder::new(NodeId::new(HierarchyId(1), 2, 1), 1);
//!
//! let mut table = BrushGeometryTable::new();
//! table.insert(a.id, BrushGeometry::new(Some(cube.clone()), NodeTransformations::identity()));
//! let shifted = NodeTransformations::from_transform(&Transform::translation(0.5, 0.0, 0.0)).unwrap();
//! table.insert(b.id, BrushGeometry::new(Some(cube), shifted));
//!
//! let result = solve(&[a, b], &[a, b], &table, &SolveOptions::default());
//! assert_eq!(result.pairs_for(a.id)[0].kind, IntersectionType::Intersection);
//! ```

mod convex;
mod error;
mod geometry;
mod mesh;
mod pairs;
mod solver;
mod touching;
mod types;

pub use convex::{classify_brushes, convex_polytope_touching, which_side};
pub use error::{IntersectError, Result};
pub use geometry::{BrushGeometry, BrushGeometrySource, BrushGeometryTable};
pub use mesh::{tree_space_bounds, BrushMesh, NodeTransformations};
pub use pairs::find_unique_brush_pairs;
pub use solver::{solve, BrushIntersections, SolveOptions};
pub use touching::{encode, encode_all, BrushIntersection, BrushesTouchedByBrush, IntersectionBits};
pub use types::{BrushPair, IntersectionType};
