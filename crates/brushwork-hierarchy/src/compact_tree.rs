//! Immutable, read-optimized snapshot of a hierarchy.
//!
//! Built once per topology change and shared read-only by every solve and
//! encode task of that generation. It is rebuilt wholesale, never patched.

use std::ops::{Range, RangeInclusive};

use tracing::{debug, instrument};

use crate::error::Result;
use crate::{CompactHierarchy, IndexOrder, NodeId, NodeKind, OperationType};

/// One node of the flattened tree.
#[derive(Clone, Debug, PartialEq)]
pub struct CompactTreeNode {
    /// Node kind.
    pub kind: NodeKind,
    /// Boolean operation.
    pub operation: OperationType,
    /// Handle in the source hierarchy.
    pub node_id: NodeId,
    /// First child in [`CompactTree::nodes`], `None` for leaves.
    pub child_offset: Option<usize>,
    /// Number of children kept in the snapshot.
    pub child_count: usize,
}

/// Flattened breadth-first copy of a hierarchy plus per-brush ancestor lists.
#[derive(Clone, Debug)]
pub struct CompactTree {
    root: NodeId,
    nodes: Vec<CompactTreeNode>,
    brush_ancestors: Vec<NodeId>,
    brush_ancestor_legend: Vec<Range<usize>>,
    brush_id_to_ancestor_legend: Vec<Option<usize>>,
    brush_id_to_order: Vec<Option<usize>>,
    min_brush_id: u32,
    min_node_id: u32,
    max_node_id: u32,
}

impl CompactTree {
    /// Snapshot `hierarchy` below `root` for the given brush list.
    ///
    /// Returns `Ok(None)` when the brush list is empty. Leading children of
    /// any node whose operation cannot produce geometry are left out of the
    /// flattened node array; brush ancestor lists are always complete.
    #[instrument(skip_all, fields(brushes = brushes.len()))]
    pub fn build(
        hierarchy: &CompactHierarchy,
        root: NodeId,
        brushes: &[IndexOrder],
    ) -> Result<Option<CompactTree>> {
        if brushes.is_empty() {
            return Ok(None);
        }

        let tree_nodes = hierarchy.tree_nodes();
        let min_node_id = tree_nodes.iter().map(|id| id.value).min().unwrap_or(0);
        let max_node_id = tree_nodes.iter().map(|id| id.value).max().unwrap_or(0);

        for brush in brushes {
            hierarchy.slot(brush.id)?;
        }
        let min_brush_id = brushes.iter().map(|b| b.id.value).min().unwrap_or(0);
        let max_brush_id = brushes.iter().map(|b| b.id.value).max().unwrap_or(0);
        let span = (max_brush_id - min_brush_id) as usize + 1;

        // bottom-up: every ancestor of each brush, excluding the root
        let mut brush_ancestors = Vec::new();
        let mut brush_ancestor_legend = Vec::with_capacity(brushes.len());
        let mut brush_id_to_ancestor_legend = vec![None; span];
        let mut brush_id_to_order = vec![None; span];
        for brush in brushes {
            let start = brush_ancestors.len();
            brush_ancestors.extend(
                hierarchy
                    .ancestors(brush.id)?
                    .into_iter()
                    .take_while(|&ancestor| ancestor != root),
            );
            let slot = (brush.id.value - min_brush_id) as usize;
            brush_id_to_ancestor_legend[slot] = Some(brush_ancestor_legend.len());
            brush_id_to_order[slot] = Some(brush.order);
            brush_ancestor_legend.push(start..brush_ancestors.len());
        }

        // top-down
        let mut nodes = vec![CompactTreeNode {
            kind: NodeKind::Root,
            operation: OperationType::Additive,
            node_id: root,
            child_offset: None,
            child_count: 0,
        }];
        let mut queue = std::collections::VecDeque::from([(root, 0usize)]);
        while let Some((parent, flat_index)) = queue.pop_front() {
            let children: Vec<NodeId> = hierarchy.children(parent)?.collect();
            let first = children
                .iter()
                .position(|&child| {
                    hierarchy
                        .operation(child)
                        .is_ok_and(OperationType::produces_geometry)
                })
                .unwrap_or(children.len());

            let child_offset = nodes.len();
            for &child in &children[first..] {
                let node = hierarchy.node(child)?;
                if node.kind != NodeKind::Brush {
                    queue.push_back((child, nodes.len()));
                }
                nodes.push(CompactTreeNode {
                    kind: node.kind,
                    operation: node.operation,
                    node_id: child,
                    child_offset: None,
                    child_count: 0,
                });
            }
            let child_count = nodes.len() - child_offset;
            if child_count > 0 {
                nodes[flat_index].child_offset = Some(child_offset);
                nodes[flat_index].child_count = child_count;
            }
        }

        debug!(
            nodes = nodes.len(),
            ancestors = brush_ancestors.len(),
            min_node_id,
            max_node_id,
            "built compact tree"
        );
        Ok(Some(CompactTree {
            root,
            nodes,
            brush_ancestors,
            brush_ancestor_legend,
            brush_id_to_ancestor_legend,
            brush_id_to_order,
            min_brush_id,
            min_node_id,
            max_node_id,
        }))
    }

    /// Root the snapshot was taken from.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Flattened nodes, breadth-first. Index `0` is the root.
    pub fn nodes(&self) -> &[CompactTreeNode] {
        &self.nodes
    }

    /// Children of a flattened node.
    pub fn children_of(&self, flat_index: usize) -> &[CompactTreeNode] {
        match self.nodes.get(flat_index) {
            Some(CompactTreeNode {
                child_offset: Some(offset),
                child_count,
                ..
            }) => &self.nodes[*offset..*offset + *child_count],
            _ => &[],
        }
    }

    /// Id values spanned by the tree the snapshot was taken from.
    pub fn node_id_range(&self) -> RangeInclusive<u32> {
        self.min_node_id..=self.max_node_id
    }

    /// True when `brush` was part of the brush list.
    pub fn contains_brush(&self, brush: NodeId) -> bool {
        self.legend_index(brush).is_some()
    }

    /// Order of `brush` in the brush list.
    pub fn brush_order(&self, brush: NodeId) -> Option<usize> {
        let slot = brush.value.checked_sub(self.min_brush_id)? as usize;
        *self.brush_id_to_order.get(slot)?
    }

    /// Range of `brush`'s ancestors inside [`CompactTree::brush_ancestors`].
    pub fn ancestor_range(&self, brush: NodeId) -> Option<Range<usize>> {
        let legend = self.legend_index(brush)?;
        self.brush_ancestor_legend.get(legend).cloned()
    }

    /// Ancestors of `brush`, nearest first, root excluded.
    pub fn ancestors_of(&self, brush: NodeId) -> &[NodeId] {
        match self.ancestor_range(brush) {
            Some(range) => &self.brush_ancestors[range],
            None => &[],
        }
    }

    /// The shared ancestor array all ranges index into.
    pub fn brush_ancestors(&self) -> &[NodeId] {
        &self.brush_ancestors
    }

    fn legend_index(&self, brush: NodeId) -> Option<usize> {
        let slot = brush.value.checked_sub(self.min_brush_id)? as usize;
        *self.brush_id_to_ancestor_legend.get(slot)?
    }
}
