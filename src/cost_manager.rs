//! Interval bookkeeping for the distance-only dynamic program.
//!
//! A copy edge starting at pixel `index` contributes, to every target pixel
//! `index + k`, a candidate cost of `distance_cost + cost_cache[k]`. Since
//! `cost_cache` (the per-length costs) takes few distinct values, each edge
//! collapses into a handful of flat segments, and the best known candidates
//! over all edges form a sorted list of non-overlapping [`CostInterval`]s.
//! Pushing a new edge splits, trims, or removes whatever it beats; settling
//! a pixel folds the covering interval into `costs`.
//!
//! Interval nodes live in an arena and are linked by index; nodes that fall
//! off the list return to a free stack, so steady state does no allocation.

use alloc::vec;
use alloc::vec::Vec;

use crate::cost_model::CostModel;
use crate::types::MAX_LENGTH;

/// Hard cap on live intervals. Beyond it, contributions are written straight
/// into `costs` instead of being tracked.
const MAX_ACTIVE_INTERVALS: usize = 500;

/// Edges shorter than this are always written straight into `costs`; the
/// interval machinery's fixed cost dominates for short runs.
const SKIP_DISTANCE: usize = 10;

/// Arena index marking "no node".
const NIL: u32 = u32::MAX;

/// A maximal run of lengths over which `cost_cache` is constant.
#[derive(Debug, Clone, Copy)]
struct CostCacheInterval {
    cost: i64,
    start: usize,
    end: usize, // exclusive
}

/// "For pixels in [start, end), the best candidate ending there via a copy
/// from `index` costs exactly `cost`." Doubly linked through the arena,
/// ordered by `start`, pairwise disjoint.
#[derive(Debug, Clone)]
struct CostInterval {
    cost: i64,
    start: usize,
    end: usize, // exclusive
    index: usize,
    prev: u32,
    next: u32,
}

/// Owner of the DP state: per-pixel best costs, predecessor hop lengths, the
/// length-cost cache, and the active interval list.
pub(crate) struct CostManager {
    arena: Vec<CostInterval>,
    free: Vec<u32>,
    head: u32,
    count: usize,
    cache_intervals: Vec<CostCacheInterval>,
    cost_cache: Vec<i64>,
    /// Best known total cost of encoding pixels `[0..=i]`.
    pub(crate) costs: Vec<i64>,
    /// Pixels consumed by the last hop realizing `costs[i]`.
    pub(crate) dist_array: Vec<u16>,
}

impl CostManager {
    pub(crate) fn new(pix_count: usize, model: &CostModel) -> Self {
        let cache_size = pix_count.min(MAX_LENGTH);
        let mut cost_cache = Vec::with_capacity(cache_size);
        for k in 0..cache_size {
            cost_cache.push(model.length_cost(k as u32));
        }

        // Collapse equal-cost neighbors into maximal runs partitioning
        // [0, cache_size).
        let mut cache_intervals: Vec<CostCacheInterval> = Vec::with_capacity(32);
        for (k, &cost) in cost_cache.iter().enumerate() {
            match cache_intervals.last_mut() {
                Some(run) if run.cost == cost => run.end = k + 1,
                _ => cache_intervals.push(CostCacheInterval {
                    cost,
                    start: k,
                    end: k + 1,
                }),
            }
        }

        Self {
            arena: Vec::with_capacity(64),
            free: Vec::new(),
            head: NIL,
            count: 0,
            cache_intervals,
            cost_cache,
            costs: vec![i64::MAX; pix_count],
            dist_array: vec![0; pix_count],
        }
    }

    /// Relax `costs[i]` with the candidate from a copy edge at `position`.
    #[inline]
    fn update_cost(&mut self, i: usize, position: usize, cost: i64) {
        let k = i - position;
        debug_assert!(k < MAX_LENGTH);
        if self.costs[i] > cost {
            self.costs[i] = cost;
            self.dist_array[i] = (k + 1) as u16;
        }
    }

    /// Relax every pixel of `[start, end)` directly, bypassing the list.
    fn update_cost_span(&mut self, start: usize, end: usize, position: usize, cost: i64) {
        for i in start..end {
            self.update_cost(i, position, cost);
        }
    }

    /// Link `prev -> next`, either side possibly NIL.
    fn connect(&mut self, prev: u32, next: u32) {
        if prev != NIL {
            self.arena[prev as usize].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.arena[next as usize].prev = prev;
        }
    }

    /// Unlink `slot` and return its node to the free stack.
    fn pop(&mut self, slot: u32) {
        let prev = self.arena[slot as usize].prev;
        let next = self.arena[slot as usize].next;
        self.connect(prev, next);
        self.free.push(slot);
        self.count -= 1;
    }

    fn alloc(&mut self, cost: i64, index: usize, start: usize, end: usize) -> u32 {
        let node = CostInterval {
            cost,
            start,
            end,
            index,
            prev: NIL,
            next: NIL,
        };
        match self.free.pop() {
            Some(slot) => {
                self.arena[slot as usize] = node;
                slot
            }
            None => {
                self.arena.push(node);
                (self.arena.len() - 1) as u32
            }
        }
    }

    /// Splice a detached node into the sorted list, searching from `hint`.
    /// Amortized O(1) when consecutive insertions are near each other.
    fn place(&mut self, slot: u32, hint: u32) {
        let start = self.arena[slot as usize].start;
        let mut prev = if hint != NIL { hint } else { self.head };
        while prev != NIL && start < self.arena[prev as usize].start {
            prev = self.arena[prev as usize].prev;
        }
        loop {
            let next = if prev != NIL {
                self.arena[prev as usize].next
            } else {
                break;
            };
            if next == NIL || self.arena[next as usize].start >= start {
                break;
            }
            prev = next;
        }
        if prev != NIL {
            let after = self.arena[prev as usize].next;
            self.connect(slot, after);
            self.connect(prev, slot);
        } else {
            let first = self.head;
            self.connect(slot, first);
            self.connect(NIL, slot);
        }
    }

    /// Track `[start, end)` as a new interval, or serialize it into `costs`
    /// when the list is at capacity.
    fn insert(&mut self, hint: u32, cost: i64, position: usize, start: usize, end: usize) {
        if start >= end {
            return;
        }
        if self.count >= MAX_ACTIVE_INTERVALS {
            self.update_cost_span(start, end, position, cost);
            return;
        }
        let slot = self.alloc(cost, position, start, end);
        self.place(slot, hint);
        self.count += 1;
    }

    /// Fold the copy edge `(distance_cost, position, len)` into the state:
    /// relax every target in `[position, position + len)` against the list
    /// and `costs`.
    pub(crate) fn push_interval(&mut self, distance_cost: i64, position: usize, len: usize) {
        if len < SKIP_DISTANCE {
            for i in position..position + len {
                let k = i - position;
                let candidate = distance_cost + self.cost_cache[k];
                if self.costs[i] > candidate {
                    self.costs[i] = candidate;
                    self.dist_array[i] = (k + 1) as u16;
                }
            }
            return;
        }

        let mut cursor = self.head;
        for ci in 0..self.cache_intervals.len() {
            let seg = self.cache_intervals[ci];
            if seg.start >= len {
                break;
            }
            // The new contribution over this run of lengths is one flat
            // segment [start, end) at `cost`.
            let mut start = position + seg.start;
            let end = position + seg.end.min(len);
            let cost = distance_cost + seg.cost;

            while cursor != NIL {
                let cur = self.arena[cursor as usize].clone();
                if cur.start >= end {
                    break;
                }
                if start >= cur.end {
                    // Not yet overlapping; move right.
                    cursor = cur.next;
                    continue;
                }

                if cost >= cur.cost {
                    // The existing interval wins its span. Land whatever of
                    // the segment precedes it, then resume past it.
                    let resume = cur.end;
                    self.insert(cursor, cost, position, start, cur.start);
                    start = resume;
                    if start >= end {
                        break;
                    }
                    cursor = cur.next;
                    continue;
                }

                if start <= cur.start {
                    if cur.end <= end {
                        // Fully shadowed by the new segment.
                        self.pop(cursor);
                        cursor = cur.next;
                    } else {
                        // Only its left part is shadowed; trim and stop, the
                        // segment is exhausted on the right.
                        self.arena[cursor as usize].start = end;
                        break;
                    }
                } else if end < cur.end {
                    // Strictly inside: keep both remnants of the old
                    // interval around the new segment.
                    self.arena[cursor as usize].end = start;
                    self.insert(cursor, cur.cost, cur.index, end, cur.end);
                    cursor = self.arena[cursor as usize].next;
                    break;
                } else {
                    // Only its right part is shadowed.
                    self.arena[cursor as usize].end = start;
                    cursor = cur.next;
                }
            }
            self.insert(cursor, cost, position, start, end);
        }
    }

    /// Settle pixel `i`: relax it against every interval covering it. With
    /// `clean`, intervals ending at or before `i` are retired; settlement
    /// calls that revisit earlier pixels must leave them in place.
    pub(crate) fn update_cost_at_index(&mut self, i: usize, clean: bool) {
        let mut cursor = self.head;
        while cursor != NIL {
            let cur = self.arena[cursor as usize].clone();
            if cur.start > i {
                break;
            }
            if cur.end <= i {
                if clean {
                    self.pop(cursor);
                }
            } else {
                self.update_cost(i, cur.index, cur.cost);
            }
            cursor = cur.next;
        }
    }

    #[cfg(test)]
    fn active(&self) -> Vec<(usize, usize, i64)> {
        let mut out = Vec::new();
        let mut cursor = self.head;
        while cursor != NIL {
            let cur = &self.arena[cursor as usize];
            out.push((cur.start, cur.end, cur.cost));
            cursor = cur.next;
        }
        out
    }

    #[cfg(test)]
    fn assert_list_valid(&self) {
        let list = self.active();
        assert_eq!(list.len(), self.count);
        assert!(self.count <= MAX_ACTIVE_INTERVALS);
        for w in list.windows(2) {
            assert!(w[0].1 <= w[1].0, "overlap or disorder: {w:?}");
        }
        for &(start, end, _) in &list {
            assert!(start < end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BackwardRefs, PixOrCopy};

    /// A model whose length costs vary, so the cache intervals are plural.
    fn varied_model(pix_count: usize) -> CostModel {
        let mut refs = BackwardRefs::new();
        let mut covered = 0usize;
        let mut flip = 0u32;
        // Distinct copy lengths at distinct multiplicities give every length
        // prefix code its own cost.
        for (reps, len) in [(1u32, 2u16), (2, 3), (4, 5), (8, 9), (16, 17), (32, 33)] {
            for _ in 0..reps {
                refs.push(PixOrCopy::copy(len, 1));
                covered += len as usize;
            }
        }
        while covered < pix_count {
            refs.push(PixOrCopy::literal(0xFF000000 | flip));
            flip = (flip + 1) % 7;
            covered += 1;
        }
        CostModel::build(64, 0, &refs)
    }

    #[test]
    fn test_cache_intervals_partition() {
        let model = varied_model(4000);
        let manager = CostManager::new(4000, &model);
        assert_eq!(manager.cost_cache.len(), 4000.min(MAX_LENGTH));
        let mut expected_start = 0;
        for run in &manager.cache_intervals {
            assert_eq!(run.start, expected_start);
            assert!(run.end > run.start);
            for k in run.start..run.end {
                assert_eq!(manager.cost_cache[k], run.cost);
            }
            expected_start = run.end;
        }
        assert_eq!(expected_start, manager.cost_cache.len());
        assert!(manager.cache_intervals.len() > 1);
    }

    #[test]
    fn test_short_push_serializes() {
        let model = varied_model(200);
        let mut manager = CostManager::new(200, &model);
        manager.push_interval(0, 10, 5);
        assert_eq!(manager.head, NIL);
        for i in 10..15 {
            assert!(manager.costs[i] < i64::MAX);
            assert_eq!(manager.dist_array[i], (i - 10 + 1) as u16);
        }
        assert_eq!(manager.costs[9], i64::MAX);
        assert_eq!(manager.costs[15], i64::MAX);
    }

    #[test]
    fn test_long_push_tracks_intervals() {
        let model = varied_model(200);
        let mut manager = CostManager::new(200, &model);
        manager.push_interval(0, 10, 50);
        assert!(manager.count > 0);
        manager.assert_list_valid();
        // Settling a covered pixel pulls its cost out of the list.
        manager.update_cost_at_index(30, true);
        assert!(manager.costs[30] < i64::MAX);
        assert_eq!(manager.dist_array[30], 21);
    }

    #[test]
    fn test_cheaper_push_replaces_cover() {
        let model = varied_model(400);
        let mut manager = CostManager::new(400, &model);
        manager.push_interval(1 << 40, 10, 60);
        manager.assert_list_valid();
        // A strictly cheaper edge from the same position shadows everything.
        manager.push_interval(0, 10, 60);
        manager.assert_list_valid();
        for (_, _, cost) in manager.active() {
            assert!(cost < 1 << 40);
        }
    }

    #[test]
    fn test_worse_push_leaves_list_unchanged() {
        let model = varied_model(400);
        let mut manager = CostManager::new(400, &model);
        manager.push_interval(0, 10, 60);
        let before = manager.active();
        manager.push_interval(1 << 40, 10, 60);
        manager.assert_list_valid();
        assert_eq!(manager.active(), before);
    }

    #[test]
    fn test_interleaved_pushes_stay_sorted() {
        let model = varied_model(4000);
        let mut manager = CostManager::new(4000, &model);
        let mut seed = 0x2545F491u64;
        for _ in 0..300 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            let position = (seed >> 33) as usize % 3000;
            let len = 10 + (seed >> 20) as usize % 200;
            let cost = ((seed >> 8) & 0xFFFF) as i64;
            manager.push_interval(cost, position, len.min(4000 - position));
            manager.assert_list_valid();
        }
    }

    #[test]
    fn test_overflow_degrades_to_serialization() {
        let model = varied_model(30000);
        let mut manager = CostManager::new(30000, &model);
        // Non-overlapping pushes that are never cleaned keep their intervals
        // live until the cap, after which relaxation must still happen.
        let mut position = 0;
        while position + 20 <= 30000 {
            manager.push_interval(0, position, 20);
            assert!(manager.count <= MAX_ACTIVE_INTERVALS);
            position += 30;
        }
        manager.assert_list_valid();
        // The last pushed range was serialized, not tracked, yet relaxed.
        let last = position - 30;
        for i in last..last + 20 {
            assert!(manager.costs[i] < i64::MAX);
        }
    }

    #[test]
    fn test_clean_retires_expired_intervals() {
        let model = varied_model(400);
        let mut manager = CostManager::new(400, &model);
        manager.push_interval(0, 10, 40);
        let live_before = manager.count;
        // Settling far past the end with cleaning retires everything.
        manager.update_cost_at_index(399, true);
        assert!(manager.count < live_before || live_before == 0);
        // Free nodes are reused by the next push.
        let free_before = manager.free.len();
        manager.push_interval(0, 50, 40);
        assert!(manager.free.len() <= free_before);
        manager.assert_list_valid();
    }
}
