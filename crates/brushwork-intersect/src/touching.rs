//! Per-brush touching sets.
//!
//! For every brush the encoder records which other brushes it touches and
//! packs a two-bit [`IntersectionType`] per node id of the tree into a dense
//! bitset, so later stages can ask "does this brush touch node X" without a
//! hash lookup. Ancestors of the brush and of every neighbor are marked as
//! `Intersection`, as is the tree root.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use brushwork_hierarchy::{CompactTree, IndexOrder, NodeId};
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::{BrushPair, IntersectionType};

const BITS_PER_ENTRY: u32 = 2;
const ENTRIES_PER_WORD: u32 = u32::BITS / BITS_PER_ENTRY;
const ENTRY_MASK: u32 = 0b11;

/// Two bits per node id over `offset..offset + count`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntersectionBits {
    words: Vec<u32>,
    offset: u32,
    count: u32,
}

impl IntersectionBits {
    /// All-zero bitset covering `count` id values from `offset`.
    pub fn new(offset: u32, count: u32) -> Self {
        Self {
            words: vec![0; count.div_ceil(ENTRIES_PER_WORD) as usize],
            offset,
            count,
        }
    }

    /// First id value covered.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Number of id values covered.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Backing words.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Stored relation for `value`, `InvalidValue` outside the range.
    pub fn get(&self, value: u32) -> IntersectionType {
        match self.locate(value) {
            Some((word, shift)) => IntersectionType::from_bits(self.words[word] >> shift),
            None => IntersectionType::InvalidValue,
        }
    }

    /// Store `kind` for `value`. Returns false and stores nothing when
    /// `value` is outside the range or `kind` is `InvalidValue`.
    pub fn set(&mut self, value: u32, kind: IntersectionType) -> bool {
        if kind == IntersectionType::InvalidValue {
            return false;
        }
        let Some((word, shift)) = self.locate(value) else {
            return false;
        };
        let word = &mut self.words[word];
        *word = (*word & !(ENTRY_MASK << shift)) | ((kind as u32) << shift);
        true
    }

    /// Reset every entry to `NoIntersection`.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    fn locate(&self, value: u32) -> Option<(usize, u32)> {
        let slot = value.checked_sub(self.offset)?;
        if slot >= self.count {
            return None;
        }
        Some((
            (slot / ENTRIES_PER_WORD) as usize,
            (slot % ENTRIES_PER_WORD) * BITS_PER_ENTRY,
        ))
    }
}

/// One neighbor of an encoded brush.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrushIntersection {
    /// The other brush.
    pub other: IndexOrder,
    /// Relation of the encoded brush to `other`.
    pub kind: IntersectionType,
    /// `other`'s ancestors inside [`CompactTree::brush_ancestors`].
    pub ancestor_range: Range<usize>,
}

/// Everything one brush touches, as a list and as a bitset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrushesTouchedByBrush {
    brush: IndexOrder,
    intersections: Vec<BrushIntersection>,
    bits: IntersectionBits,
}

impl BrushesTouchedByBrush {
    /// The encoded brush.
    pub fn brush(&self) -> IndexOrder {
        self.brush
    }

    /// Neighbors in brush order.
    pub fn intersections(&self) -> &[BrushIntersection] {
        &self.intersections
    }

    /// The packed relation table.
    pub fn bits(&self) -> &IntersectionBits {
        &self.bits
    }

    /// Relation to `node`, `InvalidValue` for nodes outside the tree's id
    /// range or from another hierarchy.
    pub fn get(&self, node: NodeId) -> IntersectionType {
        if node.hierarchy != self.brush.id.hierarchy {
            return IntersectionType::InvalidValue;
        }
        self.bits.get(node.value)
    }
}

/// Encode the touching set of `brush` from its pair list.
///
/// `pairs` are the pairs with `brush` as `a`; other entries are ignored, as
/// are `NoIntersection` pairs and neighbors missing from the snapshot. Returns `None` when `brush`
/// itself is not part of the snapshot.
pub fn encode(
    brush: IndexOrder,
    tree: &CompactTree,
    pairs: &[BrushPair],
) -> Option<BrushesTouchedByBrush> {
    if !tree.contains_brush(brush.id) {
        return None;
    }
    let range = tree.node_id_range();
    let mut bits = IntersectionBits::new(*range.start(), range.end() - range.start() + 1);

    bits.set(brush.id.value, IntersectionType::Intersection);
    bits.set(tree.root().value, IntersectionType::Intersection);
    for ancestor in tree.ancestors_of(brush.id) {
        bits.set(ancestor.value, IntersectionType::Intersection);
    }

    let mut intersections = Vec::with_capacity(pairs.len());
    for pair in pairs
        .iter()
        .filter(|p| p.a.id == brush.id && p.b.id != brush.id && p.kind.touches())
    {
        let Some(ancestor_range) = tree.ancestor_range(pair.b.id) else {
            continue;
        };
        bits.set(pair.b.id.value, pair.kind);
        for ancestor in &tree.brush_ancestors()[ancestor_range.clone()] {
            bits.set(ancestor.value, IntersectionType::Intersection);
        }
        intersections.push(BrushIntersection {
            other: pair.b,
            kind: pair.kind,
            ancestor_range,
        });
    }
    intersections.sort_by_key(|i| i.other.order);

    Some(BrushesTouchedByBrush {
        brush,
        intersections,
        bits,
    })
}

/// Encode every brush in `brushes`, keyed by node id.
///
/// Brushes missing from the snapshot are skipped.
#[instrument(skip_all, fields(brushes = brushes.len()))]
pub fn encode_all(
    brushes: &[IndexOrder],
    tree: &CompactTree,
    pairs: &HashMap<NodeId, Vec<BrushPair>>,
    parallel: bool,
) -> HashMap<NodeId, Arc<BrushesTouchedByBrush>> {
    let encode_one = |brush: &IndexOrder| {
        let list = pairs.get(&brush.id).map(Vec::as_slice).unwrap_or(&[]);
        encode(*brush, tree, list).map(|touched| (brush.id, Arc::new(touched)))
    };
    let encoded: HashMap<NodeId, Arc<BrushesTouchedByBrush>> = if parallel {
        brushes.par_iter().filter_map(encode_one).collect()
    } else {
        brushes.iter().filter_map(encode_one).collect()
    };
    debug!(encoded = encoded.len(), "encoded touching sets");
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use brushwork_hierarchy::{CompactHierarchy, CompactNode, HierarchyId, OperationType};

    #[test]
    fn test_bits_get_set_and_range() {
        let mut bits = IntersectionBits::new(10, 20);
        assert_eq!(bits.words().len(), 2);
        assert_eq!(bits.get(10), IntersectionType::NoIntersection);
        assert!(bits.set(10, IntersectionType::AInsideB));
        assert!(bits.set(29, IntersectionType::BInsideA));
        assert!(bits.set(25, IntersectionType::Intersection));
        assert_eq!(bits.get(10), IntersectionType::AInsideB);
        assert_eq!(bits.get(29), IntersectionType::BInsideA);
        assert_eq!(bits.get(25), IntersectionType::Intersection);
        assert_eq!(bits.get(11), IntersectionType::NoIntersection);

        // overwrite clears the old bits
        assert!(bits.set(10, IntersectionType::Intersection));
        assert_eq!(bits.get(10), IntersectionType::Intersection);

        assert_eq!(bits.get(9), IntersectionType::InvalidValue);
        assert_eq!(bits.get(30), IntersectionType::InvalidValue);
        assert!(!bits.set(30, IntersectionType::Intersection));
        assert!(!bits.set(11, IntersectionType::InvalidValue));

        bits.clear();
        assert_eq!(bits.get(29), IntersectionType::NoIntersection);
    }

    #[test]
    fn test_empty_bits() {
        let bits = IntersectionBits::new(0, 0);
        assert!(bits.words().is_empty());
        assert_eq!(bits.get(0), IntersectionType::InvalidValue);
    }

    struct Scene {
        tree: CompactTree,
        brushes: Vec<IndexOrder>,
        op: NodeId,
        group: NodeId,
        root: NodeId,
    }

    // root -> [op -> [a, b], group -> [c], d]
    fn scene() -> Scene {
        let mut h = CompactHierarchy::new(HierarchyId(1));
        let root = h.root();
        let op = h
            .create_node(CompactNode::operation(OperationType::Additive, 0), Some(root))
            .unwrap();
        let group = h.create_node(CompactNode::group(0), Some(root)).unwrap();
        h.create_node(CompactNode::brush(None, 1), Some(op)).unwrap();
        h.create_node(CompactNode::brush(None, 2), Some(op)).unwrap();
        h.create_node(CompactNode::brush(None, 3), Some(group)).unwrap();
        h.create_node(CompactNode::brush(None, 4), Some(root)).unwrap();
        let brushes: Vec<IndexOrder> = h
            .brushes_in_order()
            .into_iter()
            .enumerate()
            .map(|(order, id)| IndexOrder::new(id, order))
            .collect();
        let tree = CompactTree::build(&h, root, &brushes).unwrap().unwrap();
        Scene {
            tree,
            brushes,
            op,
            group,
            root,
        }
    }

    #[test]
    fn test_encode_marks_brush_root_and_ancestors() {
        let s = scene();
        let [a, b, c, d] = [s.brushes[0], s.brushes[1], s.brushes[2], s.brushes[3]];
        let pairs = vec![
            BrushPair::new(a, d, IntersectionType::AInsideB),
            BrushPair::new(a, c, IntersectionType::Intersection),
        ];
        let touched = encode(a, &s.tree, &pairs).unwrap();

        assert_eq!(touched.get(a.id), IntersectionType::Intersection);
        assert_eq!(touched.get(s.root), IntersectionType::Intersection);
        assert_eq!(touched.get(s.op), IntersectionType::Intersection);
        assert_eq!(touched.get(c.id), IntersectionType::Intersection);
        assert_eq!(touched.get(s.group), IntersectionType::Intersection);
        assert_eq!(touched.get(d.id), IntersectionType::AInsideB);
        assert_eq!(touched.get(b.id), IntersectionType::NoIntersection);

        let others: Vec<usize> = touched.intersections().iter().map(|i| i.other.order).collect();
        assert_eq!(others, vec![2, 3]);
        assert_eq!(
            &s.tree.brush_ancestors()[touched.intersections()[0].ancestor_range.clone()],
            &[s.group]
        );
    }

    #[test]
    fn test_encode_skips_unknown_brushes() {
        let s = scene();
        let stranger = IndexOrder::new(NodeId::new(HierarchyId(1), 500, 1), 9);
        assert!(encode(stranger, &s.tree, &[]).is_none());

        let a = s.brushes[0];
        let pairs = vec![BrushPair::new(a, stranger, IntersectionType::Intersection)];
        let touched = encode(a, &s.tree, &pairs).unwrap();
        assert!(touched.intersections().is_empty());
        assert_eq!(touched.get(stranger.id), IntersectionType::InvalidValue);
        assert_eq!(
            touched.get(NodeId::new(HierarchyId(2), a.id.value, 1)),
            IntersectionType::InvalidValue
        );
    }

    #[test]
    fn test_encode_ignores_disjoint_pairs() {
        let s = scene();
        let [a, _, c, d] = [s.brushes[0], s.brushes[1], s.brushes[2], s.brushes[3]];
        let pairs = vec![
            BrushPair::new(a, c, IntersectionType::NoIntersection),
            BrushPair::new(a, d, IntersectionType::BInsideA),
        ];
        let touched = encode(a, &s.tree, &pairs).unwrap();

        assert_eq!(touched.get(c.id), IntersectionType::NoIntersection);
        assert_eq!(touched.get(s.group), IntersectionType::NoIntersection);
        assert_eq!(touched.get(d.id), IntersectionType::BInsideA);
        let others: Vec<NodeId> = touched.intersections().iter().map(|i| i.other.id).collect();
        assert_eq!(others, vec![d.id]);
    }

    #[test]
    fn test_encode_all_matches_single_encodes() {
        let s = scene();
        let [a, b, ..] = [s.brushes[0], s.brushes[1], s.brushes[2], s.brushes[3]];
        let pair = BrushPair::new(a, b, IntersectionType::Intersection);
        let pairs = HashMap::from([(a.id, vec![pair]), (b.id, vec![pair.flip()])]);

        for parallel in [false, true] {
            let all = encode_all(&s.brushes, &s.tree, &pairs, parallel);
            assert_eq!(all.len(), 4);
            for brush in &s.brushes {
                let list = pairs.get(&brush.id).cloned().unwrap_or_default();
                assert_eq!(*all[&brush.id], encode(*brush, &s.tree, &list).unwrap());
            }
        }
    }
}
