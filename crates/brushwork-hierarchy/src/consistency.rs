//! Exhaustive structural verification of a [`CompactHierarchy`].
//!
//! Only meant for tests and validation builds; it walks every slot.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;
use tracing::error;

use crate::{CompactHierarchy, MeshId, NodeId, NodeKind};

/// One violated invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyIssue {
    /// Index holds an id whose slot points elsewhere.
    #[error("index {index} holds id {value} which points elsewhere")]
    IndexIdMismatch {
        /// Storage index.
        index: usize,
        /// Id value found there.
        value: u32,
    },

    /// Id points at an index that does not hold it.
    #[error("id {value} points at index {index} which does not hold it")]
    IdIndexMismatch {
        /// Id value.
        value: u32,
        /// Index it points at.
        index: usize,
    },

    /// Free-index bookkeeping disagrees with the table.
    #[error("free index list disagrees at index {0}")]
    FreeIndexListMismatch(usize),

    /// A recycled id value is still mapped to an index.
    #[error("free id {0} is still in use")]
    FreeIdInUse(u32),

    /// A live slot's handle does not resolve back to it.
    #[error("node {id} does not resolve to its slot {index}")]
    HandleRoundTrip {
        /// Node handle.
        id: NodeId,
        /// Slot it lives in.
        index: usize,
    },

    /// A slot the id table considers allocated holds no node, or vice versa.
    #[error("slot {0} disagrees with the id table")]
    SlotAllocationMismatch(usize),

    /// Child range reaches past the node array or into empty slots.
    #[error("node {id} has child range {offset}+{count} covering empty slots")]
    ChildRangeOutOfBounds {
        /// Parent handle.
        id: NodeId,
        /// Range start.
        offset: usize,
        /// Range length.
        count: usize,
    },

    /// A node's child range contains the node itself.
    #[error("node {0} lies inside its own child range")]
    SelfInChildRange(NodeId),

    /// A slot is claimed by two child ranges.
    #[error("slot {index} is claimed by both {first} and {second}")]
    OverlappingChildRanges {
        /// Slot index.
        index: usize,
        /// First claiming parent.
        first: NodeId,
        /// Second claiming parent.
        second: NodeId,
    },

    /// Child's parent field does not name the node whose range holds it.
    #[error("node {child} lies in the range of {parent} but names {recorded:?} as parent")]
    ParentMismatch {
        /// Child handle.
        child: NodeId,
        /// Parent whose range holds it.
        parent: NodeId,
        /// Parent recorded on the child.
        recorded: Option<NodeId>,
    },

    /// Node names a parent whose range does not hold it.
    #[error("node {child} names {parent} as parent but is not in its child range")]
    NotInParentRange {
        /// Child handle.
        child: NodeId,
        /// Recorded parent.
        parent: NodeId,
    },

    /// Brush nodes must be leaves.
    #[error("brush {0} has children")]
    BrushWithChildren(NodeId),

    /// The root has a parent or is missing.
    #[error("root {0} is missing or attached")]
    InvalidRoot(NodeId),

    /// Mesh reference bookkeeping disagrees with the nodes.
    #[error("mesh {mesh:?} reference for node {id} is out of sync")]
    MeshReferenceMismatch {
        /// Mesh.
        mesh: MeshId,
        /// Node.
        id: NodeId,
    },
}

impl CompactHierarchy {
    /// Verify every structural invariant, logging and returning each violation.
    pub fn check_consistency(&self) -> Vec<ConsistencyIssue> {
        let mut issues = self.id_manager.check_consistency();
        let mut owners: HashMap<usize, NodeId> = HashMap::new();

        for (index, slot) in self.nodes.iter().enumerate() {
            let allocated = !self.id_manager.is_index_free(index);
            let Some(slot) = slot else {
                if allocated {
                    issues.push(ConsistencyIssue::SlotAllocationMismatch(index));
                }
                continue;
            };
            if !allocated {
                issues.push(ConsistencyIssue::SlotAllocationMismatch(index));
            }
            if self.id_manager.get_index(slot.id.value, slot.id.generation) != Some(index)
                || slot.id.hierarchy != self.id
            {
                issues.push(ConsistencyIssue::HandleRoundTrip { id: slot.id, index });
            }
            if slot.child_count == 0 {
                continue;
            }
            if slot.node.kind == NodeKind::Brush {
                issues.push(ConsistencyIssue::BrushWithChildren(slot.id));
            }
            let range = slot.child_offset..slot.child_offset + slot.child_count;
            if range.contains(&index) {
                issues.push(ConsistencyIssue::SelfInChildRange(slot.id));
            }
            for child_index in range {
                if let Some(first) = owners.insert(child_index, slot.id) {
                    issues.push(ConsistencyIssue::OverlappingChildRanges {
                        index: child_index,
                        first,
                        second: slot.id,
                    });
                }
                match self.nodes.get(child_index).and_then(Option::as_ref) {
                    Some(child) if child.parent != Some(slot.id) => {
                        issues.push(ConsistencyIssue::ParentMismatch {
                            child: child.id,
                            parent: slot.id,
                            recorded: child.parent,
                        });
                    }
                    Some(_) => {}
                    None => {
                        issues.push(ConsistencyIssue::ChildRangeOutOfBounds {
                            id: slot.id,
                            offset: slot.child_offset,
                            count: slot.child_count,
                        });
                    }
                }
            }
        }

        for (index, slot) in self.nodes.iter().enumerate() {
            let Some(slot) = slot else { continue };
            if let Some(parent) = slot.parent {
                if owners.get(&index) != Some(&parent) {
                    issues.push(ConsistencyIssue::NotInParentRange {
                        child: slot.id,
                        parent,
                    });
                }
            }
        }

        match self.slot(self.root) {
            Ok(root) if root.parent.is_none() && root.node.kind == NodeKind::Root => {}
            _ => issues.push(ConsistencyIssue::InvalidRoot(self.root)),
        }

        let mut expected: HashMap<MeshId, BTreeSet<NodeId>> = HashMap::new();
        for slot in self.nodes.iter().flatten() {
            if let Some(mesh) = slot.node.brush_mesh_id {
                expected.entry(mesh).or_default().insert(slot.id);
            }
        }
        for (mesh, ids) in &expected {
            let recorded = self.brush_mesh_to_brush.get(mesh);
            for id in ids {
                if !recorded.is_some_and(|set| set.contains(id)) {
                    issues.push(ConsistencyIssue::MeshReferenceMismatch { mesh: *mesh, id: *id });
                }
            }
        }
        for (mesh, ids) in &self.brush_mesh_to_brush {
            for id in ids {
                if !expected.get(mesh).is_some_and(|set| set.contains(id)) {
                    issues.push(ConsistencyIssue::MeshReferenceMismatch { mesh: *mesh, id: *id });
                }
            }
        }

        for issue in &issues {
            error!(hierarchy = self.id.0, %issue, "hierarchy consistency violation");
        }
        issues
    }
}
