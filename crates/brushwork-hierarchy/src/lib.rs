#![warn(missing_docs)]

//! Compact brush hierarchy for the brushwork CSG core.
//!
//! Stores a brush/operation tree as one contiguous slot array addressed by
//! generation-checked [`NodeId`] handles, with every node's children in a
//! contiguous slot range. [`CompactTree`] takes immutable breadth-first
//! snapshots of it for the intersection passes.
//!
//! # Example
//!
//! ```
//! use brushwork_hierarchy::{CompactHierarchy, CompactNode, HierarchyId, MeshId};
//!
//! let mut hierarchy = CompactHierarchy::new(HierarchyId(1));
//! let root = hierarchy.root();
//! let brush = hierarchy
//!     .create_node(CompactNode::brush(Some(MeshId(0)), 0), Some(root))
//!     .unwrap();
//! assert_eq!(hierarchy.child_at(root, 0).unwrap(), brush);
//! assert!(hierarchy.check_consistency().is_empty());
//! ```

mod compact_tree;
mod consistency;
mod error;
mod hierarchy;
mod id;
mod id_manager;
mod node;

pub use compact_tree::{CompactTree, CompactTreeNode};
pub use consistency::ConsistencyIssue;
pub use error::{HierarchyError, Result};
pub use hierarchy::CompactHierarchy;
pub use id::{HierarchyId, IndexOrder, NodeId};
pub use id_manager::{IdEntry, IdManager};
pub use node::{CompactNode, MeshId, NodeKind, NodeStatusFlags, OperationType};
