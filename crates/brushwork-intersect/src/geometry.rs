//! Lookup seam for per-brush geometry.

use std::collections::HashMap;
use std::sync::Arc;

use brushwork_hierarchy::NodeId;
use brushwork_math::Aabb3;

use crate::mesh::{tree_space_bounds, BrushMesh, NodeTransformations};

/// Read-only access to the geometry of every brush in a pass.
///
/// Shared across solver threads, hence `Sync`.
pub trait BrushGeometrySource: Sync {
    /// Brush-local mesh, `None` when not built yet.
    fn mesh(&self, brush: NodeId) -> Option<&BrushMesh>;

    /// Local/tree transforms. Missing entries are treated as identity.
    fn transformations(&self, brush: NodeId) -> Option<&NodeTransformations>;

    /// Tree-space bounds, `None` when the brush has no mesh.
    fn tree_bounds(&self, brush: NodeId) -> Option<Aabb3>;
}

/// Geometry of one brush.
#[derive(Clone, Debug, Default)]
pub struct BrushGeometry {
    /// Mesh shared with the owner's mesh table.
    pub mesh: Option<Arc<BrushMesh>>,
    /// Placement of the brush.
    pub transformations: NodeTransformations,
    /// Cached tree-space bounds.
    pub tree_bounds: Option<Aabb3>,
}

impl BrushGeometry {
    /// Geometry with bounds computed from the mesh and transforms.
    pub fn new(mesh: Option<Arc<BrushMesh>>, transformations: NodeTransformations) -> Self {
        let tree_bounds = mesh
            .as_deref()
            .and_then(|mesh| tree_space_bounds(mesh, &transformations));
        Self {
            mesh,
            transformations,
            tree_bounds,
        }
    }
}

/// Hash-map backed [`BrushGeometrySource`].
#[derive(Clone, Debug, Default)]
pub struct BrushGeometryTable {
    brushes: HashMap<NodeId, BrushGeometry>,
}

impl BrushGeometryTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a brush's geometry.
    pub fn insert(&mut self, brush: NodeId, geometry: BrushGeometry) {
        self.brushes.insert(brush, geometry);
    }

    /// Remove a brush's geometry.
    pub fn remove(&mut self, brush: NodeId) -> Option<BrushGeometry> {
        self.brushes.remove(&brush)
    }

    /// Geometry of a brush.
    pub fn get(&self, brush: NodeId) -> Option<&BrushGeometry> {
        self.brushes.get(&brush)
    }

    /// Number of brushes with geometry.
    pub fn len(&self) -> usize {
        self.brushes.len()
    }

    /// True when no brush has geometry.
    pub fn is_empty(&self) -> bool {
        self.brushes.is_empty()
    }
}

impl BrushGeometrySource for BrushGeometryTable {
    fn mesh(&self, brush: NodeId) -> Option<&BrushMesh> {
        self.brushes.get(&brush)?.mesh.as_deref()
    }

    fn transformations(&self, brush: NodeId) -> Option<&NodeTransformations> {
        self.brushes.get(&brush).map(|g| &g.transformations)
    }

    fn tree_bounds(&self, brush: NodeId) -> Option<Aabb3> {
        self.brushes.get(&brush)?.tree_bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brushwork_hierarchy::HierarchyId;
    use brushwork_math::{Point3, Transform};

    #[test]
    fn test_table_caches_bounds() {
        let id = NodeId::new(HierarchyId(1), 1, 1);
        let mesh = Arc::new(
            BrushMesh::from_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap(),
        );
        let transformations =
            NodeTransformations::from_transform(&Transform::translation(2.0, 0.0, 0.0)).unwrap();

        let mut table = BrushGeometryTable::new();
        table.insert(id, BrushGeometry::new(Some(mesh), transformations));
        let bounds = table.tree_bounds(id).unwrap();
        assert_eq!(bounds.min.x, 2.0);
        assert!(table.mesh(id).is_some());

        table.insert(id, BrushGeometry::new(None, NodeTransformations::identity()));
        assert!(table.tree_bounds(id).is_none());
        assert!(table.mesh(id).is_none());
        assert_eq!(table.len(), 1);
    }
}
