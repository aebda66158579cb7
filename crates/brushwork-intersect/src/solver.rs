//! Brush intersection solver: full and incremental pairwise passes.

use std::collections::{HashMap, HashSet};

use brushwork_hierarchy::{IndexOrder, NodeId};
use brushwork_math::Tolerance;
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use crate::convex::classify_brushes;
use crate::geometry::BrushGeometrySource;
use crate::{BrushPair, IntersectionType};

/// Knobs for one solve pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveOptions {
    /// Plane-distance tolerance for bounds and plane tests.
    pub tolerance: Tolerance,
    /// Spread pair tests over the rayon pool.
    pub parallel: bool,
    /// Stay on the calling thread below this many brushes.
    pub min_parallel_brushes: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::DEFAULT,
            parallel: true,
            min_parallel_brushes: 64,
        }
    }
}

impl SolveOptions {
    fn use_parallel(&self, brushes: usize) -> bool {
        self.parallel && brushes >= self.min_parallel_brushes
    }
}

/// Output of one solve pass.
///
/// `pairs` holds, for every brush with at least one touching neighbor found
/// in this pass, the pairs with that brush as `a`, sorted by `b`'s order.
/// Every pair is present in both directions.
#[derive(Clone, Debug, Default)]
pub struct BrushIntersections {
    /// Touching pairs keyed by their `a` brush.
    pub pairs: HashMap<NodeId, Vec<BrushPair>>,
    /// Brushes whose neighbor lists are complete in `pairs`, in brush order.
    ///
    /// After a full pass this is every brush. After an incremental pass it
    /// is the dirty brushes plus the brushes they touch.
    pub updated: Vec<IndexOrder>,
    /// Whether every brush was re-tested.
    pub full: bool,
}

impl BrushIntersections {
    /// Pairs with `brush` as `a`.
    pub fn pairs_for(&self, brush: NodeId) -> &[BrushPair] {
        self.pairs.get(&brush).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of directed pairs.
    pub fn pair_count(&self) -> usize {
        self.pairs.values().map(Vec::len).sum()
    }

    /// Fold this pass into `previous`, the adjacency of an earlier pass,
    /// giving the complete adjacency of `all`.
    ///
    /// Pairs between two brushes outside `updated` are carried over with
    /// their orders taken from `all`; every other pair comes from this pass.
    /// Brushes missing from `all` are dropped. After a full pass `previous`
    /// is ignored.
    pub fn merge_into(
        &self,
        all: &[IndexOrder],
        previous: &HashMap<NodeId, Vec<BrushPair>>,
    ) -> HashMap<NodeId, Vec<BrushPair>> {
        if self.full {
            return self.pairs.clone();
        }
        let current: HashMap<NodeId, IndexOrder> = all.iter().map(|b| (b.id, *b)).collect();
        let updated: HashSet<NodeId> = self.updated.iter().map(|b| b.id).collect();

        let mut merged = HashMap::new();
        for brush in all {
            let fresh = self.pairs_for(brush.id);
            let mut list: Vec<BrushPair> = if updated.contains(&brush.id) {
                fresh.to_vec()
            } else {
                let kept = previous.get(&brush.id).into_iter().flatten().filter_map(|pair| {
                    let other = current.get(&pair.b.id)?;
                    (!updated.contains(&other.id))
                        .then_some(BrushPair::new(*brush, *other, pair.kind))
                });
                kept.chain(fresh.iter().copied()).collect()
            };
            list.sort_by_key(|pair| pair.b.order);
            if !list.is_empty() {
                merged.insert(brush.id, list);
            }
        }
        merged
    }

    fn store(&mut self, pairs: Vec<BrushPair>) {
        for pair in pairs {
            self.pairs.entry(pair.b.id).or_default().push(pair.flip());
            self.pairs.entry(pair.a.id).or_default().push(pair);
        }
    }

    fn sort(&mut self) {
        for list in self.pairs.values_mut() {
            list.sort_by_key(|pair| pair.b.order);
            list.dedup_by_key(|pair| pair.b.id);
        }
    }
}

/// Compute pairwise intersections for `all` brushes given the `dirty` ones.
///
/// When `dirty` covers every brush each unordered pair is tested once.
/// Otherwise every brush is tested against the dirty set, and then against
/// the non-dirty brushes found touching a dirty one ("indirectly affected").
/// Only that one extra hop is taken: callers that need changes to ripple
/// further mark the reported brushes dirty and solve again.
#[instrument(skip_all, fields(brushes = all.len(), dirty = dirty.len()))]
pub fn solve<G: BrushGeometrySource + ?Sized>(
    all: &[IndexOrder],
    dirty: &[IndexOrder],
    geometry: &G,
    options: &SolveOptions,
) -> BrushIntersections {
    let mut result = BrushIntersections::default();
    if all.is_empty() || dirty.is_empty() {
        return result;
    }

    for brush in all {
        if geometry.mesh(brush.id).is_some_and(|mesh| mesh.is_degenerate()) {
            warn!(brush = %brush.id, "degenerate brush mesh, treated as non-intersecting");
        }
    }

    let dirty_ids: HashSet<NodeId> = dirty.iter().map(|b| b.id).collect();
    let parallel = options.use_parallel(all.len());
    let tolerance = options.tolerance;
    let test = |a: IndexOrder, b: IndexOrder| -> Option<BrushPair> {
        let pair = BrushPair::new(a, b, IntersectionType::NoIntersection).canonical();
        let kind = classify_brushes(pair.a.id, pair.b.id, geometry, &tolerance);
        kind.touches().then_some(BrushPair { kind, ..pair })
    };

    if all.iter().all(|b| dirty_ids.contains(&b.id)) {
        let pairs = collect_rows(all.len(), parallel, |i| {
            all[i + 1..]
                .iter()
                .filter_map(|&other| test(all[i], other))
                .collect()
        });
        debug!(pairs = pairs.len(), "full intersection pass");
        result.store(pairs);
        result.updated = sorted(all.to_vec());
        result.full = true;
        result.sort();
        return result;
    }

    // direct: every brush against the dirty set, each unordered pair once
    let direct = collect_rows(all.len(), parallel, |i| {
        let brush = all[i];
        let brush_dirty = dirty_ids.contains(&brush.id);
        dirty
            .iter()
            .filter(|d| d.id != brush.id && !(brush_dirty && brush.order >= d.order))
            .filter_map(|&d| test(brush, d))
            .collect()
    });

    let mut indirect: Vec<IndexOrder> = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::new();
    for pair in &direct {
        for brush in [pair.a, pair.b] {
            if !dirty_ids.contains(&brush.id) && seen.insert(brush.id) {
                indirect.push(brush);
            }
        }
    }
    let indirect = sorted(indirect);

    // indirect: every brush against the indirectly affected set
    let second = collect_rows(all.len(), parallel, |i| {
        let brush = all[i];
        if dirty_ids.contains(&brush.id) {
            return Vec::new();
        }
        let brush_indirect = seen.contains(&brush.id);
        indirect
            .iter()
            .filter(|o| o.id != brush.id && !(brush_indirect && brush.order >= o.order))
            .filter_map(|&o| test(brush, o))
            .collect()
    });

    debug!(
        direct = direct.len(),
        indirect_brushes = indirect.len(),
        indirect = second.len(),
        "incremental intersection pass"
    );
    result.store(direct);
    result.store(second);
    let mut updated: Vec<IndexOrder> = dirty.to_vec();
    updated.extend(indirect);
    result.updated = sorted(updated);
    result.sort();
    result
}

fn collect_rows<F>(rows: usize, parallel: bool, row: F) -> Vec<BrushPair>
where
    F: Fn(usize) -> Vec<BrushPair> + Sync + Send,
{
    if parallel {
        (0..rows).into_par_iter().flat_map_iter(row).collect()
    } else {
        (0..rows).flat_map(row).collect()
    }
}

fn sorted(mut brushes: Vec<IndexOrder>) -> Vec<IndexOrder> {
    brushes.sort_by_key(|b| b.order);
    brushes.dedup_by_key(|b| b.id);
    brushes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BrushGeometry, BrushGeometryTable};
    use crate::mesh::{BrushMesh, NodeTransformations};
    use brushwork_hierarchy::HierarchyId;
    use brushwork_math::{Point3, Transform};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn unit_cube() -> Arc<BrushMesh> {
        Arc::new(BrushMesh::from_box(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5)).unwrap())
    }

    fn scene(offsets: &[f64]) -> (Vec<IndexOrder>, BrushGeometryTable) {
        let mut table = BrushGeometryTable::new();
        let brushes: Vec<IndexOrder> = offsets
            .iter()
            .enumerate()
            .map(|(order, &x)| {
                let id = NodeId::new(HierarchyId(1), order as u32 + 1, 1);
                place(&mut table, id, x);
                IndexOrder::new(id, order)
            })
            .collect();
        (brushes, table)
    }

    fn place(table: &mut BrushGeometryTable, id: NodeId, x: f64) {
        let transformations =
            NodeTransformations::from_transform(&Transform::translation(x, 0.0, 0.0)).unwrap();
        table.insert(id, BrushGeometry::new(Some(unit_cube()), transformations));
    }

    fn sequential() -> SolveOptions {
        SolveOptions {
            parallel: false,
            ..SolveOptions::default()
        }
    }

    fn kinds(result: &BrushIntersections, brush: IndexOrder) -> Vec<(usize, IntersectionType)> {
        result
            .pairs_for(brush.id)
            .iter()
            .map(|p| (p.b.order, p.kind))
            .collect()
    }

    #[test]
    fn test_full_pass_reports_both_directions() {
        let (brushes, table) = scene(&[0.0, 0.5, 3.0]);
        let result = solve(&brushes, &brushes, &table, &sequential());
        assert!(result.full);
        assert_eq!(kinds(&result, brushes[0]), vec![(1, IntersectionType::Intersection)]);
        assert_eq!(kinds(&result, brushes[1]), vec![(0, IntersectionType::Intersection)]);
        assert!(result.pairs_for(brushes[2].id).is_empty());
        assert_eq!(result.pair_count(), 2);
        assert_eq!(result.updated.len(), 3);
    }

    #[test]
    fn test_shifted_cube_stops_touching() {
        let (brushes, table) = scene(&[0.0, 2.0]);
        let result = solve(&brushes, &brushes, &table, &sequential());
        assert_eq!(result.pair_count(), 0);
    }

    #[test]
    fn test_containment_is_directional() {
        let mut table = BrushGeometryTable::new();
        let big = IndexOrder::new(NodeId::new(HierarchyId(1), 1, 1), 0);
        let small = IndexOrder::new(NodeId::new(HierarchyId(1), 2, 1), 1);
        let big_mesh = BrushMesh::from_box(Point3::new(-2.0, -2.0, -2.0), Point3::new(2.0, 2.0, 2.0)).unwrap();
        table.insert(big.id, BrushGeometry::new(Some(Arc::new(big_mesh)), NodeTransformations::identity()));
        table.insert(small.id, BrushGeometry::new(Some(unit_cube()), NodeTransformations::identity()));

        let result = solve(&[big, small], &[big, small], &table, &sequential());
        assert_eq!(kinds(&result, big), vec![(1, IntersectionType::BInsideA)]);
        assert_eq!(kinds(&result, small), vec![(0, IntersectionType::AInsideB)]);
    }

    #[test]
    fn test_missing_mesh_never_intersects() {
        let (brushes, mut table) = scene(&[0.0, 0.25]);
        table.insert(brushes[1].id, BrushGeometry::new(None, NodeTransformations::identity()));
        let result = solve(&brushes, &brushes, &table, &sequential());
        assert_eq!(result.pair_count(), 0);

        let degenerate = Arc::new(BrushMesh::new(vec![], vec![]).unwrap());
        table.insert(brushes[1].id, BrushGeometry::new(Some(degenerate), NodeTransformations::identity()));
        let result = solve(&brushes, &brushes, &table, &sequential());
        assert_eq!(result.pair_count(), 0);
    }

    #[test]
    fn test_empty_inputs() {
        let (brushes, table) = scene(&[0.0]);
        assert_eq!(solve(&[], &[], &table, &sequential()).pair_count(), 0);
        assert!(solve(&brushes, &[], &table, &sequential()).updated.is_empty());
    }

    #[test]
    fn test_incremental_collects_indirect_brushes() {
        // 0 touches 1, 1 touches 2; move 0 so it only touches 1
        let (brushes, mut table) = scene(&[0.0, 0.9, 1.8, 10.0]);
        place(&mut table, brushes[0].id, 0.1);
        let result = solve(&brushes, &brushes[..1], &table, &sequential());
        assert!(!result.full);
        let updated: Vec<usize> = result.updated.iter().map(|b| b.order).collect();
        assert_eq!(updated, vec![0, 1]);
        assert_eq!(kinds(&result, brushes[0]), vec![(1, IntersectionType::Intersection)]);
        // brush 1's list is complete: it also sees brush 2
        assert_eq!(
            kinds(&result, brushes[1]),
            vec![(0, IntersectionType::Intersection), (2, IntersectionType::Intersection)]
        );
        assert!(result.pairs_for(brushes[3].id).is_empty());
    }

    #[test]
    fn test_merge_keeps_pairs_between_untouched_brushes() {
        // 2 and 3 overlap and never move; 0 leaves 1 behind
        let (brushes, mut table) = scene(&[0.0, 0.9, 5.0, 5.5]);
        let before = solve(&brushes, &brushes, &table, &sequential());
        place(&mut table, brushes[0].id, -3.0);
        let incremental = solve(&brushes, &brushes[..1], &table, &sequential());
        assert!(incremental.pairs_for(brushes[2].id).is_empty());

        let merged = incremental.merge_into(&brushes, &before.pairs);
        assert!(!merged.contains_key(&brushes[0].id));
        assert!(!merged.contains_key(&brushes[1].id));
        let kept: Vec<usize> = merged[&brushes[2].id].iter().map(|p| p.b.order).collect();
        assert_eq!(kept, vec![3]);
        assert_eq!(merged[&brushes[3].id][0].kind, IntersectionType::Intersection);

        // a full pass ignores what came before
        let full = solve(&brushes, &brushes, &table, &sequential());
        assert_eq!(full.merge_into(&brushes, &before.pairs), full.pairs);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let offsets: Vec<f64> = (0..80).map(|i| i as f64 * 0.7).collect();
        let (brushes, table) = scene(&offsets);
        let parallel = SolveOptions {
            parallel: true,
            min_parallel_brushes: 1,
            ..SolveOptions::default()
        };
        let a = solve(&brushes, &brushes, &table, &parallel);
        let b = solve(&brushes, &brushes, &table, &sequential());
        for brush in &brushes {
            assert_eq!(a.pairs_for(brush.id), b.pairs_for(brush.id));
        }
    }

    proptest! {
        #[test]
        fn prop_incremental_matches_full(
            offsets in prop::collection::vec(-8i32..8, 2..10),
            moved in any::<prop::sample::Index>(),
            target in -8i32..8,
        ) {
            let offsets: Vec<f64> = offsets.into_iter().map(|x| x as f64 * 0.5).collect();
            let (brushes, mut table) = scene(&offsets);
            let moved = brushes[moved.index(brushes.len())];
            place(&mut table, moved.id, target as f64 * 0.5);

            let full = solve(&brushes, &brushes, &table, &sequential());
            let incremental = solve(&brushes, &[moved], &table, &sequential());
            for brush in &incremental.updated {
                prop_assert_eq!(incremental.pairs_for(brush.id), full.pairs_for(brush.id));
            }
            // pairs involving the moved brush agree everywhere
            for brush in &brushes {
                let from_full: Vec<BrushPair> = full
                    .pairs_for(brush.id)
                    .iter()
                    .copied()
                    .filter(|p| p.b.id == moved.id)
                    .collect();
                let from_incremental: Vec<BrushPair> = incremental
                    .pairs_for(brush.id)
                    .iter()
                    .copied()
                    .filter(|p| p.b.id == moved.id)
                    .collect();
                prop_assert_eq!(from_full, from_incremental);
            }
        }

        #[test]
        fn prop_merged_incremental_matches_full_everywhere(
            offsets in prop::collection::vec(-8i32..8, 2..10),
            moved in any::<prop::sample::Index>(),
            target in -8i32..8,
        ) {
            let offsets: Vec<f64> = offsets.into_iter().map(|x| x as f64 * 0.5).collect();
            let (brushes, mut table) = scene(&offsets);
            let before = solve(&brushes, &brushes, &table, &sequential());

            let moved = brushes[moved.index(brushes.len())];
            place(&mut table, moved.id, target as f64 * 0.5);
            let incremental = solve(&brushes, &[moved], &table, &sequential());
            let merged = incremental.merge_into(&brushes, &before.pairs);
            let after = solve(&brushes, &brushes, &table, &sequential());

            for brush in &brushes {
                let from_merge = merged.get(&brush.id).map(Vec::as_slice).unwrap_or(&[]);
                prop_assert_eq!(from_merge, after.pairs_for(brush.id));
            }
        }
    }
}
