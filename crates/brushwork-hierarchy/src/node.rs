//! Node payload: kind, boolean operation, mesh reference and status flags.

use serde::{Deserialize, Serialize};

/// What a node represents.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// The tree root. Exactly one per hierarchy.
    Root,
    /// Combines its children with its own operation.
    Operation,
    /// Organizational container.
    Group,
    /// A convex solid. Always a leaf.
    Brush,
}

/// Boolean operation a node applies against the siblings before it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    /// Union.
    #[default]
    Additive,
    /// Difference.
    Subtractive,
    /// Intersection.
    Intersecting,
    /// Copies geometry without combining.
    Copy,
}

impl OperationType {
    /// True for operations that can produce geometry on their own.
    pub fn produces_geometry(self) -> bool {
        matches!(self, OperationType::Additive | OperationType::Copy)
    }
}

/// Reference to a brush mesh owned outside the hierarchy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MeshId(pub u32);

bitflags::bitflags! {
    /// Per-node dirty/status bits.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NodeStatusFlags: u16 {
        /// Everything derived from this node must be regenerated.
        const NEEDS_FULL_UPDATE       = 1 << 0;
        /// Brush shape changed.
        const SHAPE_MODIFIED          = 1 << 1;
        /// Local-to-tree transform changed.
        const TRANSFORMATION_MODIFIED = 1 << 2;
        /// Children were attached, detached or deleted.
        const HIERARCHY_MODIFIED      = 1 << 3;
        /// Outline needs regenerating.
        const OUTLINE_MODIFIED        = 1 << 4;
        /// Output mesh must be rebuilt.
        const NEEDS_REBUILD           = 1 << 5;
        /// Tree topology or brush set changed below this root.
        const TREE_NEEDS_UPDATE       = 1 << 6;
    }
}

/// Node data stored in the hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub struct CompactNode {
    /// Node kind.
    pub kind: NodeKind,
    /// Boolean operation.
    pub operation: OperationType,
    /// Mesh used by a brush, if any.
    pub brush_mesh_id: Option<MeshId>,
    /// Caller-defined payload, opaque to the hierarchy.
    pub user_id: u64,
    /// Status flags.
    pub flags: NodeStatusFlags,
}

impl CompactNode {
    /// The root node payload.
    pub fn root() -> Self {
        Self {
            kind: NodeKind::Root,
            operation: OperationType::Additive,
            brush_mesh_id: None,
            user_id: 0,
            flags: NodeStatusFlags::empty(),
        }
    }

    /// An additive brush using `mesh`.
    pub fn brush(mesh: Option<MeshId>, user_id: u64) -> Self {
        Self {
            kind: NodeKind::Brush,
            operation: OperationType::Additive,
            brush_mesh_id: mesh,
            user_id,
            flags: NodeStatusFlags::NEEDS_FULL_UPDATE,
        }
    }

    /// An operation node.
    pub fn operation(operation: OperationType, user_id: u64) -> Self {
        Self {
            kind: NodeKind::Operation,
            operation,
            brush_mesh_id: None,
            user_id,
            flags: NodeStatusFlags::empty(),
        }
    }

    /// A group node.
    pub fn group(user_id: u64) -> Self {
        Self {
            kind: NodeKind::Group,
            operation: OperationType::Additive,
            brush_mesh_id: None,
            user_id,
            flags: NodeStatusFlags::empty(),
        }
    }

    /// Same payload with a different operation.
    pub fn with_operation(mut self, operation: OperationType) -> Self {
        self.operation = operation;
        self
    }

    /// True for nodes that may hold children.
    pub fn is_container(&self) -> bool {
        self.kind != NodeKind::Brush
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_produces_geometry() {
        assert!(OperationType::Additive.produces_geometry());
        assert!(OperationType::Copy.produces_geometry());
        assert!(!OperationType::Subtractive.produces_geometry());
        assert!(!OperationType::Intersecting.produces_geometry());
    }

    #[test]
    fn test_new_brush_needs_update() {
        let brush = CompactNode::brush(Some(MeshId(3)), 9);
        assert!(brush.flags.contains(NodeStatusFlags::NEEDS_FULL_UPDATE));
        assert!(!brush.is_container());
        assert!(CompactNode::group(0).is_container());
    }
}
