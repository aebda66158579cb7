//! The brush tree context: edits, passes and their output.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use brushwork_hierarchy::{
    CompactHierarchy, CompactNode, CompactTree, HierarchyId, IndexOrder, MeshId, NodeId, NodeKind,
    OperationType,
};
use brushwork_intersect::{
    encode_all, find_unique_brush_pairs, solve, BrushGeometry, BrushGeometryTable, BrushMesh,
    BrushPair, BrushesTouchedByBrush, NodeTransformations, SolveOptions,
};
use brushwork_math::Transform;
use tracing::{debug, instrument, warn};

use crate::error::{CsgError, Result};
use crate::settings::SolverSettings;

type Adjacency = HashMap<NodeId, Vec<BrushPair>>;
type TouchedSets = HashMap<NodeId, Arc<BrushesTouchedByBrush>>;

/// One CSG brush tree with its geometry and the latest intersection results.
///
/// Edits go through this type so it can track what changed. Results are
/// produced by [`CsgTree::update`], or by splitting a pass into
/// [`CsgTree::begin_pass`], [`SolvePass::run`] and [`CsgTree::commit`] to
/// run the expensive part elsewhere.
#[derive(Debug)]
pub struct CsgTree {
    settings: SolverSettings,
    hierarchy: CompactHierarchy,
    meshes: HashMap<MeshId, Arc<BrushMesh>>,
    transforms: HashMap<NodeId, NodeTransformations>,
    dirty: HashSet<NodeId>,
    generation: u64,
    snapshot_stale: bool,
    needs_full: bool,
    snapshot: Option<Arc<CompactTree>>,
    brushes: Arc<Vec<IndexOrder>>,
    adjacency: Arc<Adjacency>,
    touched: Arc<TouchedSets>,
    pairs: Vec<BrushPair>,
    last_updated: Vec<IndexOrder>,
}

impl CsgTree {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Empty tree with validated settings.
    pub fn new(settings: SolverSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self::from_settings(settings))
    }

    /// Empty tree with [`SolverSettings::default`].
    pub fn with_default_settings() -> Self {
        Self::from_settings(SolverSettings::default())
    }

    fn from_settings(settings: SolverSettings) -> Self {
        Self {
            settings,
            hierarchy: CompactHierarchy::new(HierarchyId::next_unique()),
            meshes: HashMap::new(),
            transforms: HashMap::new(),
            dirty: HashSet::new(),
            generation: 0,
            snapshot_stale: true,
            needs_full: true,
            snapshot: None,
            brushes: Arc::new(Vec::new()),
            adjacency: Arc::new(HashMap::new()),
            touched: Arc::new(HashMap::new()),
            pairs: Vec::new(),
            last_updated: Vec::new(),
        }
    }

    /// Settings in use.
    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Read-only view of the hierarchy.
    pub fn hierarchy(&self) -> &CompactHierarchy {
        &self.hierarchy
    }

    /// Root node.
    pub fn root(&self) -> NodeId {
        self.hierarchy.root()
    }

    /// Edit generation, bumped by every successful edit.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Create an unattached brush.
    pub fn create_brush(&mut self, mesh: Option<MeshId>, user_id: u64) -> Result<NodeId> {
        let id = self.hierarchy.create_node(CompactNode::brush(mesh, user_id), None)?;
        self.edited(false)?;
        Ok(id)
    }

    /// Create an unattached operation node.
    pub fn create_operation(&mut self, operation: OperationType, user_id: u64) -> Result<NodeId> {
        let id = self
            .hierarchy
            .create_node(CompactNode::operation(operation, user_id), None)?;
        self.edited(false)?;
        Ok(id)
    }

    /// Create an unattached group node.
    pub fn create_group(&mut self, user_id: u64) -> Result<NodeId> {
        let id = self.hierarchy.create_node(CompactNode::group(user_id), None)?;
        self.edited(false)?;
        Ok(id)
    }

    /// Append `child` to `parent`'s children.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.hierarchy.add_child(parent, child)?;
        self.edited(true)?;
        Ok(())
    }

    /// Insert `child` among `parent`'s children at `index`.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.hierarchy.attach(parent, index, child)?;
        self.edited(true)?;
        Ok(())
    }

    /// Detach a node from its parent. Returns `false` when it was unattached.
    pub fn detach(&mut self, node: NodeId) -> Result<bool> {
        let detached = self.hierarchy.detach(node)?;
        if detached {
            self.edited(true)?;
        }
        Ok(detached)
    }

    /// Delete a node, and its subtree when `recursive`.
    pub fn delete(&mut self, node: NodeId, recursive: bool) -> Result<()> {
        self.hierarchy.delete(node, recursive)?;
        let hierarchy = &self.hierarchy;
        self.transforms.retain(|id, _| hierarchy.is_valid_node(*id));
        self.dirty.retain(|id| hierarchy.is_valid_node(*id));
        self.edited(true)?;
        Ok(())
    }

    /// Change a node's boolean operation.
    pub fn set_operation(&mut self, node: NodeId, operation: OperationType) -> Result<()> {
        self.hierarchy.set_operation(node, operation)?;
        self.edited(true)?;
        Ok(())
    }

    /// Store the mesh for `mesh_id`, replacing any previous one.
    ///
    /// Returns the brushes that use it; they are marked dirty.
    pub fn register_mesh(&mut self, mesh_id: MeshId, mesh: BrushMesh) -> Result<Vec<NodeId>> {
        self.meshes.insert(mesh_id, Arc::new(mesh));
        let affected = self.hierarchy.notify_brush_mesh_modified([mesh_id]);
        self.dirty.extend(affected.iter().copied());
        self.edited(false)?;
        Ok(affected)
    }

    /// Drop a mesh. Brushes using it lose their mesh reference and are
    /// marked dirty; they are returned.
    pub fn remove_mesh(&mut self, mesh_id: MeshId) -> Result<Vec<NodeId>> {
        self.meshes.remove(&mesh_id);
        let affected = self.hierarchy.notify_brush_mesh_removed(mesh_id);
        self.dirty.extend(affected.iter().copied());
        self.edited(false)?;
        Ok(affected)
    }

    /// Mesh stored for `mesh_id`.
    pub fn mesh(&self, mesh_id: MeshId) -> Option<&BrushMesh> {
        self.meshes.get(&mesh_id).map(Arc::as_ref)
    }

    /// Point a brush at a different mesh.
    pub fn set_brush_mesh(&mut self, brush: NodeId, mesh: Option<MeshId>) -> Result<()> {
        self.require_brush(brush)?;
        self.hierarchy.set_brush_mesh_id(brush, mesh)?;
        self.dirty.insert(brush);
        self.edited(false)?;
        Ok(())
    }

    /// Place a brush in tree space.
    pub fn set_transform(&mut self, brush: NodeId, node_to_tree: &Transform) -> Result<()> {
        self.require_brush(brush)?;
        let transformations = NodeTransformations::from_transform(node_to_tree)?;
        self.transforms.insert(brush, transformations);
        self.dirty.insert(brush);
        self.edited(false)?;
        Ok(())
    }

    /// Force a brush to be re-tested on the next pass.
    pub fn mark_dirty(&mut self, brush: NodeId) -> Result<()> {
        self.require_brush(brush)?;
        self.dirty.insert(brush);
        self.edited(false)?;
        Ok(())
    }

    /// Brushes waiting for the next pass.
    pub fn dirty_brushes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.dirty.iter().copied()
    }

    fn require_brush(&self, node: NodeId) -> Result<()> {
        match self.hierarchy.node_kind(node)? {
            NodeKind::Brush => Ok(()),
            _ => Err(CsgError::NotABrush(node)),
        }
    }

    /// Record a successful edit. With `verify_consistency` set, a hierarchy
    /// that fails its consistency check is reported as
    /// [`CsgError::Inconsistent`]; the edit itself has already been applied.
    fn edited(&mut self, topology: bool) -> Result<()> {
        self.generation += 1;
        if topology {
            self.snapshot_stale = true;
            self.needs_full = true;
        }
        if self.settings.verify_consistency {
            let issues = self.hierarchy.check_consistency();
            if !issues.is_empty() {
                return Err(CsgError::Inconsistent(issues));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Passes
    // =========================================================================

    /// Capture everything a pass needs.
    ///
    /// Rebuilds the compact tree snapshot when the topology changed since
    /// the last one was taken.
    pub fn begin_pass(&mut self) -> Result<SolvePass> {
        if self.snapshot_stale {
            let brushes: Vec<IndexOrder> = self
                .hierarchy
                .brushes_in_order()
                .into_iter()
                .enumerate()
                .map(|(order, id)| IndexOrder::new(id, order))
                .collect();
            self.snapshot = CompactTree::build(&self.hierarchy, self.root(), &brushes)?.map(Arc::new);
            self.brushes = Arc::new(brushes);
            self.snapshot_stale = false;
        }

        let mut geometry = BrushGeometryTable::new();
        for brush in self.brushes.iter() {
            let mesh = self
                .hierarchy
                .brush_mesh_id(brush.id)?
                .and_then(|mesh| self.meshes.get(&mesh).cloned());
            let transformations = self.transforms.get(&brush.id).cloned().unwrap_or_default();
            geometry.insert(brush.id, BrushGeometry::new(mesh, transformations));
        }

        let dirty: Vec<IndexOrder> = if self.needs_full {
            self.brushes.to_vec()
        } else {
            self.brushes
                .iter()
                .filter(|brush| self.dirty.contains(&brush.id))
                .copied()
                .collect()
        };

        Ok(SolvePass {
            generation: self.generation,
            full: self.needs_full,
            tree: self.snapshot.clone(),
            brushes: Arc::clone(&self.brushes),
            dirty,
            geometry,
            options: self.settings.solve_options(),
            parallel_encode: self.settings.use_parallel(self.brushes.len()),
            previous_adjacency: Arc::clone(&self.adjacency),
            previous_touched: Arc::clone(&self.touched),
        })
    }

    /// Install the output of a pass.
    ///
    /// Fails with [`CsgError::StalePass`] when the tree was edited after the
    /// pass began; the output is dropped and nothing changes.
    pub fn commit(&mut self, output: PassOutput) -> Result<()> {
        if output.generation != self.generation {
            warn!(
                pass = output.generation,
                current = self.generation,
                "discarding stale pass"
            );
            return Err(CsgError::StalePass {
                pass: output.generation,
                current: self.generation,
            });
        }
        debug!(
            generation = output.generation,
            full = output.full,
            updated = output.updated.len(),
            pairs = output.pairs.len(),
            "committed pass"
        );
        self.adjacency = output.adjacency;
        self.touched = output.touched;
        self.pairs = output.pairs;
        self.last_updated = output.updated;
        self.dirty.clear();
        self.needs_full = false;
        self.hierarchy.reset_status_flags();
        Ok(())
    }

    /// Run a whole pass on the calling thread and install it.
    #[instrument(skip_all, fields(generation = self.generation, dirty = self.dirty.len()))]
    pub fn update(&mut self) -> Result<()> {
        let pass = self.begin_pass()?;
        let output = pass.run();
        self.commit(output)
    }

    // =========================================================================
    // Results
    // =========================================================================

    /// Touching set of a brush from the last committed pass.
    pub fn touched_by(&self, brush: NodeId) -> Option<&BrushesTouchedByBrush> {
        self.touched.get(&brush).map(Arc::as_ref)
    }

    /// Pairs with `brush` as `a`, in neighbor order.
    pub fn intersections_of(&self, brush: NodeId) -> &[BrushPair] {
        self.adjacency.get(&brush).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Unique canonical brush pairs from the last committed pass.
    pub fn brush_pairs(&self) -> &[BrushPair] {
        &self.pairs
    }

    /// Brushes the last pass re-tested: the dirty ones plus those they touch.
    ///
    /// Changes only ripple one hop per pass. Mark these dirty and update
    /// again to push them further.
    pub fn last_updated(&self) -> &[IndexOrder] {
        &self.last_updated
    }

    /// Snapshot used by the last pass.
    pub fn snapshot(&self) -> Option<&CompactTree> {
        self.snapshot.as_deref()
    }

    /// Brush list of the current snapshot, in order.
    pub fn brushes(&self) -> &[IndexOrder] {
        &self.brushes
    }
}

impl Default for CsgTree {
    fn default() -> Self {
        Self::with_default_settings()
    }
}

/// Everything one pass reads, detached from the [`CsgTree`].
#[derive(Debug, Clone)]
pub struct SolvePass {
    generation: u64,
    full: bool,
    tree: Option<Arc<CompactTree>>,
    brushes: Arc<Vec<IndexOrder>>,
    dirty: Vec<IndexOrder>,
    geometry: BrushGeometryTable,
    options: SolveOptions,
    parallel_encode: bool,
    previous_adjacency: Arc<Adjacency>,
    previous_touched: Arc<TouchedSets>,
}

impl SolvePass {
    /// Edit generation the pass was taken at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether every brush will be re-tested.
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Brushes to re-test.
    pub fn dirty(&self) -> &[IndexOrder] {
        &self.dirty
    }

    /// Solve and encode. Reads nothing but the captured state.
    #[instrument(skip_all, fields(generation = self.generation, full = self.full))]
    pub fn run(self) -> PassOutput {
        let Some(tree) = self.tree.as_deref() else {
            return PassOutput::empty(self.generation, self.full);
        };
        if !self.full && self.dirty.is_empty() {
            return PassOutput {
                generation: self.generation,
                full: false,
                pairs: find_unique_brush_pairs(&self.brushes, &self.previous_touched),
                adjacency: self.previous_adjacency,
                touched: self.previous_touched,
                updated: Vec::new(),
            };
        }

        let solved = solve(&self.brushes, &self.dirty, &self.geometry, &self.options);
        let adjacency = solved.merge_into(&self.brushes, &self.previous_adjacency);
        let touched = if solved.full {
            encode_all(&self.brushes, tree, &adjacency, self.parallel_encode)
        } else {
            self.re_encode(tree, &adjacency, &solved.updated)
        };
        let pairs = find_unique_brush_pairs(&self.brushes, &touched);
        debug!(
            updated = solved.updated.len(),
            pairs = pairs.len(),
            "pass finished"
        );
        PassOutput {
            generation: self.generation,
            full: solved.full,
            adjacency: Arc::new(adjacency),
            touched: Arc::new(touched),
            pairs,
            updated: solved.updated,
        }
    }

    /// Re-encode only the brushes whose neighbor lists changed, reusing
    /// the previous touching sets for the rest.
    fn re_encode(
        &self,
        tree: &CompactTree,
        adjacency: &Adjacency,
        updated: &[IndexOrder],
    ) -> TouchedSets {
        let updated_ids: HashSet<NodeId> = updated.iter().map(|brush| brush.id).collect();
        let changed: Vec<IndexOrder> = self
            .brushes
            .iter()
            .filter(|brush| {
                !self.previous_touched.contains_key(&brush.id)
                    || updated_ids.contains(&brush.id)
                    || adjacency.get(&brush.id) != self.previous_adjacency.get(&brush.id)
            })
            .copied()
            .collect();

        let current: HashSet<NodeId> = self.brushes.iter().map(|brush| brush.id).collect();
        let mut touched: TouchedSets = self
            .previous_touched
            .iter()
            .filter(|(id, _)| current.contains(id))
            .map(|(id, set)| (*id, Arc::clone(set)))
            .collect();
        touched.extend(encode_all(&changed, tree, adjacency, self.parallel_encode));
        debug!(re_encoded = changed.len(), "merged incremental pass");
        touched
    }
}

/// Result of [`SolvePass::run`], waiting for [`CsgTree::commit`].
#[derive(Debug, Clone)]
pub struct PassOutput {
    generation: u64,
    full: bool,
    adjacency: Arc<Adjacency>,
    touched: Arc<TouchedSets>,
    pairs: Vec<BrushPair>,
    updated: Vec<IndexOrder>,
}

impl PassOutput {
    fn empty(generation: u64, full: bool) -> Self {
        Self {
            generation,
            full,
            adjacency: Arc::new(HashMap::new()),
            touched: Arc::new(HashMap::new()),
            pairs: Vec::new(),
            updated: Vec::new(),
        }
    }

    /// Edit generation the pass was taken at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether every brush was re-tested.
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Brushes re-tested by the pass.
    pub fn updated(&self) -> &[IndexOrder] {
        &self.updated
    }

    /// Unique canonical pairs.
    pub fn pairs(&self) -> &[BrushPair] {
        &self.pairs
    }
}
