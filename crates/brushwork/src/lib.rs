#![warn(missing_docs)]

//! CSG brush tree context for the brushwork core.
//!
//! [`CsgTree`] owns one brush hierarchy, the brush meshes and transforms,
//! and the results of the latest intersection pass. Edits mark what
//! changed; [`CsgTree::update`] re-tests only what it has to and packs
//! each brush's neighbors for the downstream boolean stage.
//!
//! # Example
//!
//! ```
//! use brushwork::CsgTree;
//! use brushwork::hierarchy::MeshId;
//! use brushwork::intersect::{BrushMesh, IntersectionType};
//! use brushwork::math::{Point3, Transform};
//!
//! let mut tree = CsgTree::with_default_settings();
//! let cube = BrushMesh::from_box(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5)).unwrap();
//! tree.register_mesh(MeshId(0), cube).unwrap();
//!
//! let root = tree.root();
//! let a = tree.create_brush(Some(MeshId(0)), 1).unwrap();
//! let b = tree.create_brush(Some(MeshId(0)), 2).unwrap();
//! tree.add_child(root, a).unwrap();
//! tree.add_child(root, b).unwrap();
//! tree.set_transform(b, &Transform::translation(0.5, 0.0, 0.0)).unwrap();
//! tree.update().unwrap();
//!
//! assert_eq!(tree.touched_by(a).unwrap().get(b), IntersectionType::Intersection);
//! ```

pub use brushwork_hierarchy as hierarchy;
pub use brushwork_intersect as intersect;
pub use brushwork_math as math;

mod error;
mod settings;
mod tree;

pub use error::{CsgError, Result};
pub use settings::SolverSettings;
pub use tree::{CsgTree, PassOutput, SolvePass};
