//! The compact hierarchy: every node of one tree in a single slot array.
//!
//! The children of a node always occupy the contiguous slot range
//! `child_offset..child_offset + child_count`, so "child `i`" is one index
//! computation. Attaching, detaching and deleting keep that invariant by
//! moving slots through the [`IdManager`] range operations; handles are
//! never affected by those moves.

use std::collections::{BTreeSet, HashMap};

use tracing::trace;

use crate::error::{HierarchyError, Result};
use crate::id_manager::IdManager;
use crate::{CompactNode, HierarchyId, MeshId, NodeId, NodeKind, NodeStatusFlags, OperationType};

#[derive(Clone, Debug)]
pub(crate) struct CompactChildNode {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) child_offset: usize,
    pub(crate) child_count: usize,
    pub(crate) node: CompactNode,
}

/// A brush/operation tree stored as one contiguous, index-addressed array.
///
/// The hierarchy owns its node array, its identifier table and the
/// mesh-to-brush reference map. Edits are single-threaded; readers borrow
/// it immutably.
#[derive(Clone, Debug)]
pub struct CompactHierarchy {
    pub(crate) id: HierarchyId,
    pub(crate) root: NodeId,
    pub(crate) id_manager: IdManager,
    pub(crate) nodes: Vec<Option<CompactChildNode>>,
    pub(crate) brush_mesh_to_brush: HashMap<MeshId, BTreeSet<NodeId>>,
}

impl Default for CompactHierarchy {
    fn default() -> Self {
        Self::new(HierarchyId::next_unique())
    }
}

impl CompactHierarchy {
    /// Create a hierarchy holding only its root.
    pub fn new(id: HierarchyId) -> Self {
        let mut id_manager = IdManager::new();
        let (entry, index) = id_manager.allocate();
        let root = NodeId::new(id, entry.value, entry.generation);
        let mut nodes = Vec::new();
        nodes.resize_with(id_manager.index_count(), || None);
        nodes[index] = Some(CompactChildNode {
            id: root,
            parent: None,
            child_offset: 0,
            child_count: 0,
            node: CompactNode::root(),
        });
        Self {
            id,
            root,
            id_manager,
            nodes,
            brush_mesh_to_brush: HashMap::new(),
        }
    }

    /// Id of this hierarchy.
    pub fn hierarchy_id(&self) -> HierarchyId {
        self.id
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// True when `id` refers to a live node of this hierarchy.
    pub fn is_valid_node(&self, id: NodeId) -> bool {
        self.index_of(id).is_ok()
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    /// Payload of a node.
    pub fn node(&self, id: NodeId) -> Result<&CompactNode> {
        Ok(&self.slot(id)?.node)
    }

    /// Kind of a node.
    pub fn node_kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.slot(id)?.node.kind)
    }

    /// Boolean operation of a node.
    pub fn operation(&self, id: NodeId) -> Result<OperationType> {
        Ok(self.slot(id)?.node.operation)
    }

    /// Caller payload of a node.
    pub fn user_id(&self, id: NodeId) -> Result<u64> {
        Ok(self.slot(id)?.node.user_id)
    }

    /// Mesh used by a brush.
    pub fn brush_mesh_id(&self, id: NodeId) -> Result<Option<MeshId>> {
        Ok(self.slot(id)?.node.brush_mesh_id)
    }

    /// Change the boolean operation of a node.
    pub fn set_operation(&mut self, id: NodeId, operation: OperationType) -> Result<()> {
        let slot = self.slot_mut(id)?;
        if slot.node.operation == operation {
            return Ok(());
        }
        slot.node.operation = operation;
        slot.node.flags |= NodeStatusFlags::NEEDS_FULL_UPDATE;
        self.mark_tree_dirty();
        Ok(())
    }

    /// Parent of a node, `None` when unattached.
    pub fn parent_of(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.slot(id)?.parent)
    }

    /// Number of children of a node.
    pub fn child_count(&self, id: NodeId) -> Result<usize> {
        Ok(self.slot(id)?.child_count)
    }

    /// The `index`-th child of `parent`.
    pub fn child_at(&self, parent: NodeId, index: usize) -> Result<NodeId> {
        let slot = self.slot(parent)?;
        if index >= slot.child_count {
            return Err(HierarchyError::SiblingIndexOutOfRange {
                index,
                count: slot.child_count,
            });
        }
        self.id_at(slot.child_offset + index)
    }

    /// Position of a node among its siblings, `None` when unattached.
    pub fn sibling_index_of(&self, id: NodeId) -> Result<Option<usize>> {
        let index = self.index_of(id)?;
        match self.slot(id)?.parent {
            Some(parent) => Ok(Some(index - self.slot(parent)?.child_offset)),
            None => Ok(None),
        }
    }

    /// Children of `parent`, in order.
    pub fn children(&self, parent: NodeId) -> Result<impl Iterator<Item = NodeId> + '_> {
        let slot = self.slot(parent)?;
        let range = slot.child_offset..slot.child_offset + slot.child_count;
        Ok(self.nodes[range].iter().flatten().map(|child| child.id))
    }

    /// Ancestors of a node, nearest first, root included.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut current = self.slot(id)?.parent;
        while let Some(parent) = current {
            out.push(parent);
            current = self.slot(parent)?.parent;
        }
        Ok(out)
    }

    /// Every live node in slot order.
    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.nodes.iter().flatten().map(|slot| slot.id).collect()
    }

    /// Nodes reachable from the root, depth-first pre-order in child order.
    pub fn tree_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Ok(children) = self.children(id) {
                let children: Vec<NodeId> = children.collect();
                stack.extend(children.into_iter().rev());
            }
        }
        out
    }

    /// Brushes reachable from the root, in tree order.
    ///
    /// The position of a brush in this list is its order for a solve pass.
    pub fn brushes_in_order(&self) -> Vec<NodeId> {
        self.tree_nodes()
            .into_iter()
            .filter(|&id| matches!(self.node_kind(id), Ok(NodeKind::Brush)))
            .collect()
    }

    /// Create a node, optionally attaching it as the last child of `parent`.
    pub fn create_node(&mut self, node: CompactNode, parent: Option<NodeId>) -> Result<NodeId> {
        if node.kind == NodeKind::Root {
            return Err(HierarchyError::RootNode(self.root));
        }
        if let Some(parent) = parent {
            self.check_container(parent)?;
        }

        let (entry, index) = self.id_manager.allocate();
        let id = NodeId::new(self.id, entry.value, entry.generation);
        self.sync_storage_len();
        if let Some(mesh) = node.brush_mesh_id {
            self.brush_mesh_to_brush.entry(mesh).or_default().insert(id);
        }
        self.nodes[index] = Some(CompactChildNode {
            id,
            parent: None,
            child_offset: 0,
            child_count: 0,
            node,
        });
        trace!(%id, index, "created node");

        if let Some(parent) = parent {
            let count = self.slot(parent)?.child_count;
            self.attach_unchecked(parent, count, id)?;
            self.mark_hierarchy_modified(parent);
        }
        Ok(id)
    }

    /// Create a contiguous run of children under a childless `parent`.
    pub fn create_children(&mut self, parent: NodeId, nodes: Vec<CompactNode>) -> Result<Vec<NodeId>> {
        self.check_container(parent)?;
        if self.slot(parent)?.child_count > 0 {
            return Err(HierarchyError::ParentHasChildren(parent));
        }
        if nodes.iter().any(|node| node.kind == NodeKind::Root) {
            return Err(HierarchyError::RootNode(self.root));
        }
        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        let count = nodes.len();
        let offset = self.id_manager.allocate_index_range(count);
        self.sync_storage_len();
        let mut ids = Vec::with_capacity(count);
        for (k, node) in nodes.into_iter().enumerate() {
            let index = offset + k;
            let entry = self
                .id_manager
                .get_id(index)
                .ok_or(HierarchyError::IndexNotAllocated(index))?;
            let id = NodeId::new(self.id, entry.value, entry.generation);
            if let Some(mesh) = node.brush_mesh_id {
                self.brush_mesh_to_brush.entry(mesh).or_default().insert(id);
            }
            self.nodes[index] = Some(CompactChildNode {
                id,
                parent: Some(parent),
                child_offset: 0,
                child_count: 0,
                node,
            });
            ids.push(id);
        }
        let slot = self.slot_mut(parent)?;
        slot.child_offset = offset;
        slot.child_count = count;
        self.mark_hierarchy_modified(parent);
        trace!(%parent, offset, count, "created children");
        Ok(ids)
    }

    /// Append `node` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, node: NodeId) -> Result<()> {
        let count = self.slot(parent)?.child_count;
        self.attach(parent, count, node)
    }

    /// Move `node` into `parent`'s children at position `insert_index`.
    ///
    /// The node is detached from its current parent first. When it already
    /// is a child of `parent`, `insert_index` refers to the child list as it
    /// is before the move.
    pub fn attach(&mut self, parent: NodeId, insert_index: usize, node: NodeId) -> Result<()> {
        self.check_container(parent)?;
        let parent_count = self.slot(parent)?.child_count;
        let current_parent = self.slot(node)?.parent;
        if node == self.root {
            return Err(HierarchyError::RootNode(node));
        }
        if node == parent {
            return Err(HierarchyError::AttachToSelf);
        }
        if self.ancestors(parent)?.contains(&node) {
            return Err(HierarchyError::CyclicAttach { node, parent });
        }
        if insert_index > parent_count {
            return Err(HierarchyError::InsertIndexOutOfRange {
                index: insert_index,
                count: parent_count,
            });
        }

        let mut insert_index = insert_index;
        if let Some(current) = current_parent {
            let sibling = self.index_of(node)? - self.slot(current)?.child_offset;
            if current == parent {
                if insert_index == sibling || insert_index == sibling + 1 {
                    return Ok(());
                }
                if insert_index > sibling {
                    insert_index -= 1;
                }
            }
            self.detach_range_unchecked(current, sibling, 1)?;
            self.mark_hierarchy_modified(current);
        }
        self.attach_unchecked(parent, insert_index, node)?;
        self.mark_hierarchy_modified(parent);
        trace!(%parent, %node, insert_index, "attached node");
        Ok(())
    }

    /// Detach a node from its parent. Returns `false` when it was unattached.
    pub fn detach(&mut self, node: NodeId) -> Result<bool> {
        if node == self.root {
            return Err(HierarchyError::RootNode(node));
        }
        let Some(parent) = self.slot(node)?.parent else {
            return Ok(false);
        };
        let sibling = self.index_of(node)? - self.slot(parent)?.child_offset;
        self.detach_range_unchecked(parent, sibling, 1)?;
        self.mark_hierarchy_modified(parent);
        trace!(%parent, %node, "detached node");
        Ok(true)
    }

    /// Detach `count` children of `parent` starting at `sibling_start`.
    ///
    /// The detached nodes keep their own subtrees.
    pub fn detach_range(&mut self, parent: NodeId, sibling_start: usize, count: usize) -> Result<()> {
        self.check_sibling_range(parent, sibling_start, count)?;
        if count == 0 {
            return Ok(());
        }
        self.detach_range_unchecked(parent, sibling_start, count)?;
        self.mark_hierarchy_modified(parent);
        trace!(%parent, sibling_start, count, "detached range");
        Ok(())
    }

    /// Detach every child of `parent`.
    pub fn detach_all(&mut self, parent: NodeId) -> Result<()> {
        let count = self.slot(parent)?.child_count;
        self.detach_range(parent, 0, count)
    }

    /// Delete a node.
    ///
    /// A recursive delete frees the whole subtree. Otherwise the node's
    /// children are detached first and survive as unattached nodes.
    pub fn delete(&mut self, node: NodeId, recursive: bool) -> Result<()> {
        if node == self.root {
            return Err(HierarchyError::RootNode(node));
        }
        match self.slot(node)?.parent {
            Some(parent) => {
                let sibling = self.index_of(node)? - self.slot(parent)?.child_offset;
                self.delete_range(parent, sibling, 1, recursive)
            }
            None => {
                self.release_subtrees(&[node], recursive)?;
                let index = self.index_of(node)?;
                self.unregister_mesh(node);
                self.id_manager.free_index(index)?;
                self.nodes[index] = None;
                self.sync_storage_len();
                self.mark_tree_dirty();
                trace!(%node, recursive, "deleted unattached node");
                Ok(())
            }
        }
    }

    /// Delete `count` children of `parent` starting at `sibling_start`.
    pub fn delete_range(
        &mut self,
        parent: NodeId,
        sibling_start: usize,
        count: usize,
        recursive: bool,
    ) -> Result<()> {
        self.check_sibling_range(parent, sibling_start, count)?;
        if count == 0 {
            return Ok(());
        }
        let (offset, child_count) = {
            let slot = self.slot(parent)?;
            (slot.child_offset, slot.child_count)
        };
        let doomed = self.ids_in(offset + sibling_start, count)?;
        self.release_subtrees(&doomed, recursive)?;
        for &id in &doomed {
            self.unregister_mesh(id);
        }

        let start = offset + sibling_start;
        if sibling_start == 0 || sibling_start + count == child_count {
            self.id_manager.free_index_range(start, count)?;
            for index in start..start + count {
                self.nodes[index] = None;
            }
            self.sync_storage_len();
            let slot = self.slot_mut(parent)?;
            if sibling_start == 0 {
                slot.child_offset += count;
            }
            slot.child_count -= count;
        } else {
            let moved = self.ids_in(start, child_count - sibling_start)?;
            self.relocate(&moved, |ids| {
                ids.remove_index_range(offset, child_count, start, count)
            })?;
            self.slot_mut(parent)?.child_count -= count;
        }
        self.reset_empty_range(parent)?;
        self.mark_hierarchy_modified(parent);
        trace!(%parent, sibling_start, count, recursive, "deleted range");
        Ok(())
    }

    /// Point a node at a different mesh, keeping the reference map in sync.
    pub fn set_brush_mesh_id(&mut self, id: NodeId, mesh: Option<MeshId>) -> Result<()> {
        let previous = self.slot(id)?.node.brush_mesh_id;
        if previous == mesh {
            return Ok(());
        }
        self.unregister_mesh(id);
        if let Some(mesh) = mesh {
            self.brush_mesh_to_brush.entry(mesh).or_default().insert(id);
        }
        let slot = self.slot_mut(id)?;
        slot.node.brush_mesh_id = mesh;
        slot.node.flags |= NodeStatusFlags::NEEDS_FULL_UPDATE | NodeStatusFlags::SHAPE_MODIFIED;
        self.mark_tree_dirty();
        Ok(())
    }

    /// Nodes currently using `mesh`.
    pub fn brushes_using_mesh(&self, mesh: MeshId) -> Vec<NodeId> {
        self.brush_mesh_to_brush
            .get(&mesh)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Flag every brush using one of `meshes` for a full update.
    ///
    /// Returns the affected brushes. Stale references are dropped.
    pub fn notify_brush_mesh_modified(
        &mut self,
        meshes: impl IntoIterator<Item = MeshId>,
    ) -> Vec<NodeId> {
        let mut affected = Vec::new();
        for mesh in meshes {
            let Some(ids) = self.brush_mesh_to_brush.get(&mesh) else {
                continue;
            };
            let ids: Vec<NodeId> = ids.iter().copied().collect();
            for id in ids {
                let uses_mesh = self
                    .slot(id)
                    .is_ok_and(|slot| slot.node.brush_mesh_id == Some(mesh));
                if !uses_mesh {
                    self.drop_mesh_reference(mesh, id);
                    continue;
                }
                if let Ok(slot) = self.slot_mut(id) {
                    slot.node.flags |= NodeStatusFlags::NEEDS_FULL_UPDATE;
                }
                affected.push(id);
            }
        }
        if !affected.is_empty() {
            self.mark_tree_dirty();
        }
        affected
    }

    /// Clear every reference to a removed mesh. Returns the affected brushes.
    pub fn notify_brush_mesh_removed(&mut self, mesh: MeshId) -> Vec<NodeId> {
        let ids: Vec<NodeId> = self
            .brush_mesh_to_brush
            .remove(&mesh)
            .map(|ids| ids.into_iter().collect())
            .unwrap_or_default();
        let mut affected = Vec::new();
        for id in ids {
            if let Ok(slot) = self.slot_mut(id) {
                if slot.node.brush_mesh_id == Some(mesh) {
                    slot.node.brush_mesh_id = None;
                    slot.node.flags |= NodeStatusFlags::NEEDS_FULL_UPDATE;
                    affected.push(id);
                }
            }
        }
        if !affected.is_empty() {
            self.mark_tree_dirty();
        }
        affected
    }

    /// Status flags of a node.
    pub fn status_flags(&self, id: NodeId) -> Result<NodeStatusFlags> {
        Ok(self.slot(id)?.node.flags)
    }

    /// True when any status flag is set on a node.
    pub fn is_any_status_flag_set(&self, id: NodeId) -> Result<bool> {
        Ok(!self.slot(id)?.node.flags.is_empty())
    }

    /// True when every bit of `flag` is set on a node.
    pub fn is_status_flag_set(&self, id: NodeId, flag: NodeStatusFlags) -> Result<bool> {
        Ok(self.slot(id)?.node.flags.contains(flag))
    }

    /// Set `flag` on a node.
    pub fn set_status_flag(&mut self, id: NodeId, flag: NodeStatusFlags) -> Result<()> {
        self.slot_mut(id)?.node.flags |= flag;
        Ok(())
    }

    /// Clear `flag` on a node.
    pub fn clear_status_flag(&mut self, id: NodeId, flag: NodeStatusFlags) -> Result<()> {
        self.slot_mut(id)?.node.flags.remove(flag);
        Ok(())
    }

    /// Clear every status flag on a node.
    pub fn clear_all_status_flags(&mut self, id: NodeId) -> Result<()> {
        self.slot_mut(id)?.node.flags = NodeStatusFlags::empty();
        Ok(())
    }

    /// Clear every status flag on every node.
    pub fn reset_status_flags(&mut self) {
        for slot in self.nodes.iter_mut().flatten() {
            slot.node.flags = NodeStatusFlags::empty();
        }
    }

    pub(crate) fn index_of(&self, id: NodeId) -> Result<usize> {
        if id.hierarchy != self.id {
            return Err(HierarchyError::ForeignHierarchy(id));
        }
        let index = self
            .id_manager
            .get_index(id.value, id.generation)
            .ok_or(HierarchyError::InvalidNode(id))?;
        match self.nodes.get(index) {
            Some(Some(_)) => Ok(index),
            _ => Err(HierarchyError::InvalidNode(id)),
        }
    }

    pub(crate) fn slot(&self, id: NodeId) -> Result<&CompactChildNode> {
        let index = self.index_of(id)?;
        self.nodes[index]
            .as_ref()
            .ok_or(HierarchyError::InvalidNode(id))
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut CompactChildNode> {
        let index = self.index_of(id)?;
        self.nodes[index]
            .as_mut()
            .ok_or(HierarchyError::InvalidNode(id))
    }

    fn id_at(&self, index: usize) -> Result<NodeId> {
        self.nodes
            .get(index)
            .and_then(Option::as_ref)
            .map(|slot| slot.id)
            .ok_or(HierarchyError::IndexNotAllocated(index))
    }

    fn ids_in(&self, offset: usize, count: usize) -> Result<Vec<NodeId>> {
        (offset..offset + count).map(|index| self.id_at(index)).collect()
    }

    fn check_container(&self, id: NodeId) -> Result<()> {
        if self.slot(id)?.node.is_container() {
            Ok(())
        } else {
            Err(HierarchyError::BrushCannotHaveChildren(id))
        }
    }

    fn check_sibling_range(&self, parent: NodeId, start: usize, count: usize) -> Result<()> {
        let child_count = self.slot(parent)?.child_count;
        if start + count > child_count {
            return Err(HierarchyError::SiblingIndexOutOfRange {
                index: start + count,
                count: child_count,
            });
        }
        Ok(())
    }

    fn attach_unchecked(&mut self, parent: NodeId, insert_index: usize, node: NodeId) -> Result<()> {
        let node_index = self.index_of(node)?;
        let (offset, count) = {
            let slot = self.slot(parent)?;
            (slot.child_offset, slot.child_count)
        };

        let new_offset = if count == 0 {
            // the node's own slot becomes the child range
            node_index
        } else if insert_index == count && node_index == offset + count {
            offset
        } else if insert_index == 0 && node_index + 1 == offset {
            node_index
        } else {
            let mut moved = self.ids_in(offset, count)?;
            moved.push(node);
            self.relocate(&moved, |ids| {
                ids.insert_into_index_range(offset, count, insert_index, node_index)
            })?
        };

        let slot = self.slot_mut(parent)?;
        slot.child_offset = new_offset;
        slot.child_count = count + 1;
        self.slot_mut(node)?.parent = Some(parent);
        Ok(())
    }

    fn detach_range_unchecked(&mut self, parent: NodeId, start: usize, count: usize) -> Result<Vec<NodeId>> {
        let (offset, child_count) = {
            let slot = self.slot(parent)?;
            (slot.child_offset, slot.child_count)
        };
        let detached = self.ids_in(offset + start, count)?;

        if start == 0 {
            self.slot_mut(parent)?.child_offset = offset + count;
        } else if start + count != child_count {
            let moved = self.ids_in(offset + start, child_count - start)?;
            self.relocate(&moved, |ids| {
                ids.swap_index_range_to_back(offset, child_count, offset + start, count)
            })?;
        }
        self.slot_mut(parent)?.child_count -= count;
        self.reset_empty_range(parent)?;

        for &id in &detached {
            self.slot_mut(id)?.parent = None;
        }
        Ok(detached)
    }

    /// Detach or free the children of nodes that are about to be deleted.
    fn release_subtrees(&mut self, doomed: &[NodeId], recursive: bool) -> Result<()> {
        for &id in doomed {
            let count = self.slot(id)?.child_count;
            if count == 0 {
                continue;
            }
            if !recursive {
                self.detach_range_unchecked(id, 0, count)?;
                continue;
            }
            let mut descendants = Vec::new();
            let mut stack: Vec<NodeId> = self.children(id)?.collect();
            while let Some(child) = stack.pop() {
                stack.extend(self.children(child)?);
                descendants.push(child);
            }
            for child in descendants {
                let index = self.index_of(child)?;
                self.unregister_mesh(child);
                self.id_manager.free_index(index)?;
                self.nodes[index] = None;
            }
            let slot = self.slot_mut(id)?;
            slot.child_offset = 0;
            slot.child_count = 0;
        }
        self.sync_storage_len();
        Ok(())
    }

    /// Run an id-manager range operation and move the affected slots to
    /// wherever their ids ended up. Nodes whose ids were freed are dropped.
    fn relocate<R>(
        &mut self,
        ids: &[NodeId],
        op: impl FnOnce(&mut IdManager) -> Result<R>,
    ) -> Result<R> {
        let indices = ids
            .iter()
            .map(|&id| self.index_of(id))
            .collect::<Result<Vec<usize>>>()?;
        let taken: Vec<CompactChildNode> = indices
            .into_iter()
            .filter_map(|index| self.nodes[index].take())
            .collect();

        let result = op(&mut self.id_manager);
        self.sync_storage_len();
        for slot in taken {
            if let Some(index) = self.id_manager.get_index(slot.id.value, slot.id.generation) {
                self.nodes[index] = Some(slot);
            }
        }
        result
    }

    fn sync_storage_len(&mut self) {
        let len = self.id_manager.index_count();
        self.nodes.resize_with(len, || None);
    }

    fn reset_empty_range(&mut self, parent: NodeId) -> Result<()> {
        let slot = self.slot_mut(parent)?;
        if slot.child_count == 0 {
            slot.child_offset = 0;
        }
        Ok(())
    }

    fn unregister_mesh(&mut self, id: NodeId) {
        if let Some(mesh) = self.slot(id).ok().and_then(|slot| slot.node.brush_mesh_id) {
            self.drop_mesh_reference(mesh, id);
        }
    }

    fn drop_mesh_reference(&mut self, mesh: MeshId, id: NodeId) {
        if let Some(ids) = self.brush_mesh_to_brush.get_mut(&mesh) {
            ids.remove(&id);
            if ids.is_empty() {
                self.brush_mesh_to_brush.remove(&mesh);
            }
        }
    }

    fn mark_hierarchy_modified(&mut self, parent: NodeId) {
        if let Ok(slot) = self.slot_mut(parent) {
            slot.node.flags |= NodeStatusFlags::HIERARCHY_MODIFIED;
        }
        self.mark_tree_dirty();
    }

    fn mark_tree_dirty(&mut self) {
        let root = self.root;
        if let Ok(slot) = self.slot_mut(root) {
            slot.node.flags |= NodeStatusFlags::TREE_NEEDS_UPDATE;
        }
    }
}
