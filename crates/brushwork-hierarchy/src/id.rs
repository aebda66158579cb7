//! Node handles.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Identifies one hierarchy instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HierarchyId(pub u32);

static NEXT_HIERARCHY_ID: AtomicU32 = AtomicU32::new(1);

impl HierarchyId {
    /// A process-unique hierarchy id.
    pub fn next_unique() -> Self {
        Self(NEXT_HIERARCHY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a node in a [`CompactHierarchy`](crate::CompactHierarchy).
///
/// A handle is a small, copyable `(hierarchy, value, generation)` triple. The
/// storage slot a node lives in may move while it is attached, detached or
/// reordered; its handle never does.
///
/// ## Semantics
///
/// - A freshly created id value starts at generation `1`.
/// - Deleting a node frees its id value and bumps the generation, so any
///   existing handle to it resolves to nothing from then on.
/// - A recycled id value is handed out again with the bumped generation,
///   producing a new, distinct handle. Stale handles never alias live nodes.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId {
    /// Owning hierarchy.
    pub hierarchy: HierarchyId,
    /// Id value, dense and recycled.
    pub value: u32,
    /// Generation of `value` when this handle was issued.
    pub generation: u32,
}

impl NodeId {
    /// Build a handle from its parts.
    pub const fn new(hierarchy: HierarchyId, value: u32, generation: u32) -> Self {
        Self {
            hierarchy,
            value,
            generation,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{}:{}@{}",
            self.hierarchy.0, self.value, self.generation
        )
    }
}

/// A brush handle paired with its dense order within one pass.
///
/// Equality and hashing consider only the handle: the same brush compares
/// equal regardless of the order it was assigned.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct IndexOrder {
    /// Brush handle.
    pub id: NodeId,
    /// Position in the brush list of the current pass.
    pub order: usize,
}

impl IndexOrder {
    /// Pair a handle with its order.
    pub const fn new(id: NodeId, order: usize) -> Self {
        Self { id, order }
    }
}

impl PartialEq for IndexOrder {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for IndexOrder {}

impl Hash for IndexOrder {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_index_order_equality_ignores_order() {
        let id = NodeId::new(HierarchyId(1), 4, 1);
        let a = IndexOrder::new(id, 0);
        let b = IndexOrder::new(id, 7);
        assert_eq!(a, b);

        let set: HashSet<IndexOrder> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_index_order_distinguishes_generation() {
        let a = IndexOrder::new(NodeId::new(HierarchyId(1), 4, 1), 0);
        let b = IndexOrder::new(NodeId::new(HierarchyId(1), 4, 2), 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_unique_hierarchy_ids() {
        assert_ne!(HierarchyId::next_unique(), HierarchyId::next_unique());
    }
}
