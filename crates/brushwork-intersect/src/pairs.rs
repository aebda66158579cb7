//! Deduplicated brush pairs across a set of touching sets.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use brushwork_hierarchy::{IndexOrder, NodeId};

use crate::touching::BrushesTouchedByBrush;
use crate::BrushPair;

/// Every unordered touching pair among `brushes`, once each.
///
/// Pairs come out canonical (`a.order <= b.order`, relation mirrored to
/// match) in the order they are first met walking `brushes` and then each
/// brush's neighbors. Brushes without a touching set are skipped.
pub fn find_unique_brush_pairs(
    brushes: &[IndexOrder],
    touched: &HashMap<NodeId, Arc<BrushesTouchedByBrush>>,
) -> Vec<BrushPair> {
    let mut seen: HashSet<(NodeId, NodeId)> = HashSet::new();
    let mut pairs = Vec::new();
    for brush in brushes {
        let Some(set) = touched.get(&brush.id) else {
            continue;
        };
        for intersection in set.intersections() {
            let pair = BrushPair::new(set.brush(), intersection.other, intersection.kind).canonical();
            if seen.insert((pair.a.id, pair.b.id)) {
                pairs.push(pair);
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::touching::encode;
    use crate::IntersectionType;
    use brushwork_hierarchy::{CompactHierarchy, CompactNode, CompactTree, HierarchyId};

    #[test]
    fn test_pairs_are_canonical_and_unique() {
        let mut h = CompactHierarchy::new(HierarchyId(1));
        let root = h.root();
        for user in 0..3 {
            h.create_node(CompactNode::brush(None, user), Some(root)).unwrap();
        }
        let brushes: Vec<IndexOrder> = h
            .brushes_in_order()
            .into_iter()
            .enumerate()
            .map(|(order, id)| IndexOrder::new(id, order))
            .collect();
        let tree = CompactTree::build(&h, root, &brushes).unwrap().unwrap();
        let [a, b, c] = [brushes[0], brushes[1], brushes[2]];

        let ab = BrushPair::new(a, b, IntersectionType::BInsideA);
        let cb = BrushPair::new(c, b, IntersectionType::Intersection);
        let lists = [
            (a, vec![ab]),
            (b, vec![ab.flip(), cb.flip()]),
            (c, vec![cb]),
        ];
        let touched: HashMap<NodeId, Arc<BrushesTouchedByBrush>> = lists
            .iter()
            .map(|(brush, list)| (brush.id, Arc::new(encode(*brush, &tree, list).unwrap())))
            .collect();

        // walk in reverse to exercise canonicalization
        let pairs = find_unique_brush_pairs(&[c, b, a], &touched);
        assert_eq!(pairs.len(), 2);
        assert_eq!((pairs[0].a.order, pairs[0].b.order), (1, 2));
        assert_eq!(pairs[0].kind, IntersectionType::Intersection);
        assert_eq!((pairs[1].a.order, pairs[1].b.order), (0, 1));
        assert_eq!(pairs[1].kind, IntersectionType::BInsideA);
        assert!(pairs.iter().all(BrushPair::is_canonical));

        assert!(find_unique_brush_pairs(&[a], &HashMap::new()).is_empty());
    }
}
