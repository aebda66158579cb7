//! Pairwise intersection classification results.

use brushwork_hierarchy::IndexOrder;
use serde::{Deserialize, Serialize};

/// How two brushes relate.
///
/// Values `0..=3` fit the two-bit slots of
/// [`IntersectionBits`](crate::IntersectionBits); `InvalidValue` is only
/// ever returned by queries, never stored.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum IntersectionType {
    /// Disjoint (or one of them has no usable mesh).
    #[default]
    NoIntersection = 0,
    /// Overlapping or touching.
    Intersection = 1,
    /// The first brush lies inside the second.
    AInsideB = 2,
    /// The second brush lies inside the first.
    BInsideA = 3,
    /// Query outside the encoded range.
    InvalidValue = 4,
}

impl IntersectionType {
    /// The relation seen from the other brush.
    pub fn flip(self) -> Self {
        match self {
            IntersectionType::AInsideB => IntersectionType::BInsideA,
            IntersectionType::BInsideA => IntersectionType::AInsideB,
            other => other,
        }
    }

    /// True for every relation where the brushes share volume or a face.
    pub fn touches(self) -> bool {
        matches!(
            self,
            IntersectionType::Intersection | IntersectionType::AInsideB | IntersectionType::BInsideA
        )
    }

    pub(crate) fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => IntersectionType::NoIntersection,
            1 => IntersectionType::Intersection,
            2 => IntersectionType::AInsideB,
            _ => IntersectionType::BInsideA,
        }
    }
}

/// Classification of brush `a` against brush `b`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrushPair {
    /// First brush.
    pub a: IndexOrder,
    /// Second brush.
    pub b: IndexOrder,
    /// Relation of `a` to `b`.
    pub kind: IntersectionType,
}

impl BrushPair {
    /// Build a pair.
    pub fn new(a: IndexOrder, b: IndexOrder, kind: IntersectionType) -> Self {
        Self { a, b, kind }
    }

    /// Swap the operands and mirror the relation.
    pub fn flip(self) -> Self {
        Self {
            a: self.b,
            b: self.a,
            kind: self.kind.flip(),
        }
    }

    /// True when `a.order <= b.order`.
    pub fn is_canonical(&self) -> bool {
        self.a.order <= self.b.order
    }

    /// The same pair in canonical form.
    pub fn canonical(self) -> Self {
        if self.is_canonical() {
            self
        } else {
            self.flip()
        }
    }
}
