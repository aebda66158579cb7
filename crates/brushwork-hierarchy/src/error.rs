//! Error types for hierarchy edits.

use thiserror::Error;

use crate::NodeId;

/// Programming faults raised by hierarchy and identifier-manager operations.
///
/// Every operation validates its arguments before mutating anything, so a
/// returned error leaves the hierarchy exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    /// Handle is stale, was never issued, or was freed.
    #[error("invalid node handle {0}")]
    InvalidNode(NodeId),

    /// Handle belongs to a different hierarchy instance.
    #[error("node {0} belongs to another hierarchy")]
    ForeignHierarchy(NodeId),

    /// Sibling range falls outside the parent's children.
    #[error("sibling index {index} out of range for {count} children")]
    SiblingIndexOutOfRange {
        /// End of the requested sibling range.
        index: usize,
        /// Number of children the parent has.
        count: usize,
    },

    /// Insert position is past the end of the parent's children.
    #[error("insert index {index} out of range for {count} children")]
    InsertIndexOutOfRange {
        /// Requested insert position.
        index: usize,
        /// Number of children the parent has.
        count: usize,
    },

    /// Allocating a child range for a node that already has children.
    #[error("node {0} already has children")]
    ParentHasChildren(NodeId),

    /// The root cannot be attached, detached or deleted.
    #[error("node {0} is the root")]
    RootNode(NodeId),

    /// Brushes are leaves and cannot hold children.
    #[error("brush {0} cannot have children")]
    BrushCannotHaveChildren(NodeId),

    /// Attaching a node to itself.
    #[error("cannot attach a node to itself")]
    AttachToSelf,

    /// Attaching a node below one of its own descendants.
    #[error("attaching {node} under {parent} would create a cycle")]
    CyclicAttach {
        /// Node being attached.
        node: NodeId,
        /// Requested parent (a descendant of `node`).
        parent: NodeId,
    },

    /// Index range does not fit the identifier table.
    #[error("index range {offset}+{count} out of bounds for {len} indices")]
    InvalidIndexRange {
        /// First index of the range.
        offset: usize,
        /// Length of the range.
        count: usize,
        /// Number of indices in the table.
        len: usize,
    },

    /// Freeing or addressing an index that holds no identifier.
    #[error("index {0} is not allocated")]
    IndexNotAllocated(usize),
}

/// Result type for hierarchy operations.
pub type Result<T> = std::result::Result<T, HierarchyError>;
