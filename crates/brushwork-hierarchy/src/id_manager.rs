//! Identifier manager: generation-checked id values mapped onto storage indices.
//!
//! Id values are what handles carry; indices are where the hierarchy keeps
//! node data. Ids never move, indices do: the range operations below move
//! ids between indices so a parent's children can stay contiguous.

use std::collections::BTreeSet;

use tracing::trace;

use crate::consistency::ConsistencyIssue;
use crate::error::{HierarchyError, Result};

/// An id value and its current generation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdEntry {
    /// Id value.
    pub value: u32,
    /// Generation of the value.
    pub generation: u32,
}

#[derive(Clone, Debug)]
struct IdSlot {
    index: Option<usize>,
    generation: u32,
}

/// Allocates id values and contiguous index ranges.
///
/// Every allocated index holds exactly one id and every live id points at
/// exactly one index. Freeing an index bumps the generation of the id that
/// lived there, so `(value, generation)` pairs issued before the free no
/// longer resolve. A value whose generation would wrap is retired for good
/// instead of being recycled.
#[derive(Clone, Debug, Default)]
pub struct IdManager {
    ids: Vec<IdSlot>,
    index_to_id: Vec<Option<u32>>,
    free_ids: Vec<u32>,
    free_indices: BTreeSet<usize>,
}

impl IdManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the index space (allocated and free).
    pub fn index_count(&self) -> usize {
        self.index_to_id.len()
    }

    /// Number of allocated indices.
    pub fn live_count(&self) -> usize {
        self.index_to_id.len() - self.free_indices.len()
    }

    /// Resolve an id to its index, `None` if the generation is stale.
    pub fn get_index(&self, value: u32, generation: u32) -> Option<usize> {
        let slot = self.ids.get(value as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.index
    }

    /// The id living at `index`.
    pub fn get_id(&self, index: usize) -> Option<IdEntry> {
        let value = (*self.index_to_id.get(index)?)?;
        Some(IdEntry {
            value,
            generation: self.ids[value as usize].generation,
        })
    }

    /// True when `index` holds no id.
    pub fn is_index_free(&self, index: usize) -> bool {
        !matches!(self.index_to_id.get(index), Some(Some(_)))
    }

    /// Allocate one index with a fresh id.
    pub fn allocate(&mut self) -> (IdEntry, usize) {
        let index = self.reserve_run(1, None);
        (self.assign_new_id(index), index)
    }

    /// Reserve `count` contiguous indices, each with a fresh id.
    ///
    /// Reuses the first free run that fits, otherwise grows the index space.
    pub fn allocate_index_range(&mut self, count: usize) -> usize {
        if count == 0 {
            return self.index_count();
        }
        let offset = self.reserve_run(count, None);
        for index in offset..offset + count {
            self.assign_new_id(index);
        }
        offset
    }

    /// Free one index and invalidate its id.
    pub fn free_index(&mut self, index: usize) -> Result<()> {
        self.check_allocated(index, 1)?;
        self.release_index(index);
        self.trim_tail();
        Ok(())
    }

    /// Free `count` indices starting at `offset`.
    pub fn free_index_range(&mut self, offset: usize, count: usize) -> Result<()> {
        self.check_allocated(offset, count)?;
        for index in offset..offset + count {
            self.release_index(index);
        }
        self.trim_tail();
        Ok(())
    }

    /// Remove `[remove_offset, remove_offset + remove_count)` from the range
    /// `[range_offset, range_offset + range_count)`.
    ///
    /// Ids in the removed window are freed, later ids in the range shift down
    /// to close the gap, and the vacated tail of the range becomes free.
    pub fn remove_index_range(
        &mut self,
        range_offset: usize,
        range_count: usize,
        remove_offset: usize,
        remove_count: usize,
    ) -> Result<()> {
        self.check_allocated(range_offset, range_count)?;
        let range_end = range_offset + range_count;
        check_window(range_offset, range_end, remove_offset, remove_count)?;
        if remove_count == 0 {
            return Ok(());
        }

        for index in remove_offset..remove_offset + remove_count {
            if let Some(value) = self.index_to_id[index].take() {
                self.release_id(value);
            }
        }
        for index in remove_offset + remove_count..range_end {
            let value = self.index_to_id[index].take();
            self.place(index - remove_count, value);
        }
        for index in range_end - remove_count..range_end {
            self.index_to_id[index] = None;
            self.free_indices.insert(index);
        }
        self.trim_tail();
        Ok(())
    }

    /// Move `[swap_offset, swap_offset + swap_count)` to the back of the range
    /// `[range_offset, range_offset + range_count)`, keeping the relative
    /// order of both the moved ids and the ids they jump over.
    pub fn swap_index_range_to_back(
        &mut self,
        range_offset: usize,
        range_count: usize,
        swap_offset: usize,
        swap_count: usize,
    ) -> Result<()> {
        self.check_allocated(range_offset, range_count)?;
        let range_end = range_offset + range_count;
        check_window(range_offset, range_end, swap_offset, swap_count)?;

        self.index_to_id[swap_offset..range_end].rotate_left(swap_count);
        for index in swap_offset..range_end {
            if let Some(value) = self.index_to_id[index] {
                self.ids[value as usize].index = Some(index);
            }
        }
        Ok(())
    }

    /// Insert the id at `src_index` into the range
    /// `[range_offset, range_offset + range_count)` at position `insert_at`.
    ///
    /// The grown range is re-laid out contiguously, in place when the slots
    /// allow it, otherwise in the first free run or at the end of the index
    /// space. Returns the new offset of the range.
    pub fn insert_into_index_range(
        &mut self,
        range_offset: usize,
        range_count: usize,
        insert_at: usize,
        src_index: usize,
    ) -> Result<usize> {
        self.check_allocated(range_offset, range_count)?;
        self.check_allocated(src_index, 1)?;
        let range_end = range_offset + range_count;
        if insert_at > range_count || (range_count > 0 && (range_offset..range_end).contains(&src_index)) {
            return Err(HierarchyError::InvalidIndexRange {
                offset: range_offset,
                count: range_count,
                len: self.index_count(),
            });
        }

        let mut values: Vec<u32> = self.index_to_id[range_offset..range_end]
            .iter()
            .flatten()
            .copied()
            .collect();
        let src_value = self.index_to_id[src_index].take();
        values.insert(insert_at, src_value.unwrap_or_default());
        self.free_indices.insert(src_index);
        for index in range_offset..range_end {
            self.index_to_id[index] = None;
            self.free_indices.insert(index);
        }

        let preferred = if range_count == 0 { src_index } else { range_offset };
        let offset = self.reserve_run(values.len(), Some(preferred));
        for (k, value) in values.into_iter().enumerate() {
            self.place(offset + k, Some(value));
        }
        self.trim_tail();
        Ok(offset)
    }

    /// Verify that ids and indices map onto each other one to one.
    pub fn check_consistency(&self) -> Vec<ConsistencyIssue> {
        let mut issues = Vec::new();
        for (index, value) in self.index_to_id.iter().enumerate() {
            match value {
                Some(value) => {
                    let back = self.ids.get(*value as usize).and_then(|slot| slot.index);
                    if back != Some(index) {
                        issues.push(ConsistencyIssue::IndexIdMismatch {
                            index,
                            value: *value,
                        });
                    }
                    if self.free_indices.contains(&index) {
                        issues.push(ConsistencyIssue::FreeIndexListMismatch(index));
                    }
                }
                None => {
                    if !self.free_indices.contains(&index) {
                        issues.push(ConsistencyIssue::FreeIndexListMismatch(index));
                    }
                }
            }
        }
        for &index in &self.free_indices {
            if index >= self.index_to_id.len() {
                issues.push(ConsistencyIssue::FreeIndexListMismatch(index));
            }
        }
        for (value, slot) in self.ids.iter().enumerate() {
            if let Some(index) = slot.index {
                if self.index_to_id.get(index).copied().flatten() != Some(value as u32) {
                    issues.push(ConsistencyIssue::IdIndexMismatch {
                        value: value as u32,
                        index,
                    });
                }
            }
        }
        for &value in &self.free_ids {
            if self.ids[value as usize].index.is_some() {
                issues.push(ConsistencyIssue::FreeIdInUse(value));
            }
        }
        issues
    }

    fn check_allocated(&self, offset: usize, count: usize) -> Result<()> {
        let len = self.index_count();
        if offset + count > len {
            return Err(HierarchyError::InvalidIndexRange { offset, count, len });
        }
        match (offset..offset + count).find(|&index| self.index_to_id[index].is_none()) {
            Some(index) => Err(HierarchyError::IndexNotAllocated(index)),
            None => Ok(()),
        }
    }

    fn assign_new_id(&mut self, index: usize) -> IdEntry {
        let value = match self.free_ids.pop() {
            Some(value) => value,
            None => {
                self.ids.push(IdSlot {
                    index: None,
                    generation: 1,
                });
                (self.ids.len() - 1) as u32
            }
        };
        self.place(index, Some(value));
        IdEntry {
            value,
            generation: self.ids[value as usize].generation,
        }
    }

    fn place(&mut self, index: usize, value: Option<u32>) {
        self.index_to_id[index] = value;
        match value {
            Some(value) => {
                self.ids[value as usize].index = Some(index);
                self.free_indices.remove(&index);
            }
            None => {
                self.free_indices.insert(index);
            }
        }
    }

    fn release_index(&mut self, index: usize) {
        if let Some(value) = self.index_to_id[index].take() {
            self.release_id(value);
        }
        self.free_indices.insert(index);
    }

    fn release_id(&mut self, value: u32) {
        let slot = &mut self.ids[value as usize];
        slot.index = None;
        match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                self.free_ids.push(value);
            }
            None => trace!(value, "id generation exhausted, retiring value"),
        }
    }

    /// Mark a contiguous run of `count` indices as taken (still without ids).
    fn reserve_run(&mut self, count: usize, preferred: Option<usize>) -> usize {
        let offset = preferred
            .filter(|&offset| self.is_run_free(offset, count))
            .or_else(|| self.find_free_run(count))
            .unwrap_or_else(|| self.tail_start());
        while self.index_to_id.len() < offset + count {
            let index = self.index_to_id.len();
            self.index_to_id.push(None);
            if index < offset {
                self.free_indices.insert(index);
            }
        }
        for index in offset..offset + count {
            self.free_indices.remove(&index);
        }
        offset
    }

    fn is_run_free(&self, offset: usize, count: usize) -> bool {
        offset <= self.index_count()
            && (offset..offset + count).all(|index| {
                index >= self.index_to_id.len() || self.free_indices.contains(&index)
            })
    }

    fn find_free_run(&self, count: usize) -> Option<usize> {
        let mut run_start = 0;
        let mut run_len = 0;
        let mut prev: Option<usize> = None;
        for &index in &self.free_indices {
            if prev.is_some_and(|p| p + 1 == index) {
                run_len += 1;
            } else {
                run_start = index;
                run_len = 1;
            }
            prev = Some(index);
            if run_len == count {
                return Some(run_start);
            }
        }
        None
    }

    fn tail_start(&self) -> usize {
        let mut start = self.index_to_id.len();
        while start > 0 && self.free_indices.contains(&(start - 1)) {
            start -= 1;
        }
        start
    }

    fn trim_tail(&mut self) {
        while let Some(None) = self.index_to_id.last() {
            self.index_to_id.pop();
            self.free_indices.remove(&self.index_to_id.len());
        }
    }
}

fn check_window(range_offset: usize, range_end: usize, offset: usize, count: usize) -> Result<()> {
    if offset < range_offset || offset + count > range_end {
        return Err(HierarchyError::InvalidIndexRange {
            offset,
            count,
            len: range_end,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids_in(manager: &IdManager, offset: usize, count: usize) -> Vec<u32> {
        (offset..offset + count)
            .map(|index| manager.get_id(index).unwrap().value)
            .collect()
    }

    #[test]
    fn test_allocate_starts_at_generation_one() {
        let mut manager = IdManager::new();
        let (entry, index) = manager.allocate();
        assert_eq!(entry.generation, 1);
        assert_eq!(manager.get_index(entry.value, entry.generation), Some(index));
        assert!(manager.check_consistency().is_empty());
    }

    #[test]
    fn test_free_invalidates_and_recycles_with_new_generation() {
        let mut manager = IdManager::new();
        let (first, index) = manager.allocate();
        let (_keep, _) = manager.allocate();
        manager.free_index(index).unwrap();
        assert_eq!(manager.get_index(first.value, first.generation), None);

        let (recycled, _) = manager.allocate();
        assert_eq!(recycled.value, first.value);
        assert_ne!(recycled.generation, first.generation);
        assert_eq!(manager.get_index(first.value, first.generation), None);
        assert!(manager.get_index(recycled.value, recycled.generation).is_some());
    }

    #[test]
    fn test_exhausted_generation_retires_value() {
        let mut manager = IdManager::new();
        let (first, index) = manager.allocate();
        manager.ids[first.value as usize].generation = u32::MAX;
        manager.free_index(index).unwrap();
        assert_eq!(manager.get_index(first.value, u32::MAX), None);
        assert_eq!(manager.get_index(first.value, 1), None);

        let (next, _) = manager.allocate();
        assert_ne!(next.value, first.value);
        assert_eq!(next.generation, 1);
        assert_eq!(manager.get_index(first.value, u32::MAX), None);
        assert!(manager.check_consistency().is_empty());
    }

    #[test]
    fn test_double_free_is_a_fault() {
        let mut manager = IdManager::new();
        let (_, a) = manager.allocate();
        let (_, _b) = manager.allocate();
        manager.free_index(a).unwrap();
        assert_eq!(manager.free_index(a), Err(HierarchyError::IndexNotAllocated(a)));
    }

    #[test]
    fn test_range_allocation_reuses_free_run() {
        let mut manager = IdManager::new();
        let offset = manager.allocate_index_range(5);
        assert_eq!(offset, 0);
        manager.free_index_range(1, 2).unwrap();
        assert_eq!(manager.allocate_index_range(3), 5);
        assert_eq!(manager.allocate_index_range(2), 1);
        assert_eq!(manager.live_count(), 8);
        assert!(manager.check_consistency().is_empty());
    }

    #[test]
    fn test_free_tail_shrinks_index_space() {
        let mut manager = IdManager::new();
        manager.allocate_index_range(4);
        manager.free_index_range(2, 2).unwrap();
        assert_eq!(manager.index_count(), 2);
        manager.free_index(0).unwrap();
        assert_eq!(manager.index_count(), 2);
        assert!(manager.is_index_free(0));
    }

    #[test]
    fn test_remove_index_range_shifts_survivors() {
        let mut manager = IdManager::new();
        manager.allocate_index_range(5);
        let before = ids_in(&manager, 0, 5);
        let removed = manager.get_id(1).unwrap();

        manager.remove_index_range(0, 5, 1, 2).unwrap();
        assert_eq!(ids_in(&manager, 0, 3), vec![before[0], before[3], before[4]]);
        assert_eq!(manager.get_index(removed.value, removed.generation), None);
        assert_eq!(manager.index_count(), 3);
        assert!(manager.check_consistency().is_empty());
    }

    #[test]
    fn test_swap_index_range_to_back_preserves_order() {
        let mut manager = IdManager::new();
        manager.allocate_index_range(6);
        let before = ids_in(&manager, 0, 6);

        manager.swap_index_range_to_back(0, 6, 1, 2).unwrap();
        let after = ids_in(&manager, 0, 6);
        assert_eq!(
            after,
            vec![before[0], before[3], before[4], before[5], before[1], before[2]]
        );
        assert!(manager.check_consistency().is_empty());
    }

    #[test]
    fn test_insert_into_index_range_relocates() {
        let mut manager = IdManager::new();
        let range = manager.allocate_index_range(3);
        let (blocker, _) = manager.allocate();
        let (moving, src) = manager.allocate();
        let before = ids_in(&manager, range, 3);

        let offset = manager.insert_into_index_range(range, 3, 1, src).unwrap();
        let after = ids_in(&manager, offset, 4);
        assert_eq!(after, vec![before[0], moving.value, before[1], before[2]]);
        // the blocker keeps its slot and its handle
        assert_eq!(manager.get_index(blocker.value, blocker.generation), Some(3));
        assert_eq!(
            manager.get_index(moving.value, moving.generation),
            Some(offset + 1)
        );
        assert!(manager.check_consistency().is_empty());
    }

    #[test]
    fn test_insert_rejects_source_inside_range() {
        let mut manager = IdManager::new();
        manager.allocate_index_range(3);
        assert!(manager.insert_into_index_range(0, 3, 0, 1).is_err());
        assert!(manager.insert_into_index_range(0, 3, 4, 1).is_err());
        assert!(manager.check_consistency().is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Allocate(usize),
        Free(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1usize..4).prop_map(Op::Allocate),
            (0usize..32).prop_map(Op::Free),
        ]
    }

    proptest! {
        #[test]
        fn prop_freed_handles_never_resolve(ops in prop::collection::vec(op_strategy(), 1..64)) {
            let mut manager = IdManager::new();
            let mut dead: Vec<IdEntry> = Vec::new();
            for op in ops {
                match op {
                    Op::Allocate(count) => {
                        manager.allocate_index_range(count);
                    }
                    Op::Free(index) => {
                        if let Some(entry) = manager.get_id(index) {
                            manager.free_index(index).unwrap();
                            dead.push(entry);
                        }
                    }
                }
                prop_assert!(manager.check_consistency().is_empty());
                for entry in &dead {
                    prop_assert_eq!(manager.get_index(entry.value, entry.generation), None);
                }
            }
        }
    }
}
