//! `NormalCache`: the CLOCK-evicted, lock-free-hit-path block cache.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::trace;

use blockgraph_core::{BlockId, Result};
use blockgraph_io::Serializer;

use crate::guard::{fill_slot, CacheBlockRef};
use crate::slot::{Slot, SlotStatus, EVICTING, NO_BLOCK};

/// Concurrent, fixed-capacity cache of edge blocks with CLOCK eviction and
/// a CAS-only hit path.
pub struct NormalCache {
    slots: Vec<Slot>,
    index: DashMap<BlockId, usize>,
    clock_hand: Mutex<usize>,
    serializer: Arc<Serializer>,
}

impl NormalCache {
    pub fn new(capacity: usize, block_size: usize, serializer: Arc<Serializer>) -> Self {
        assert!(capacity > 0, "cache capacity must be at least 1 slot");
        let slots = (0..capacity).map(|_| Slot::new(block_size)).collect();
        Self {
            slots,
            index: DashMap::new(),
            clock_hand: Mutex::new(0),
            serializer,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Pin the slot holding (or about to hold) `block_id`. Never blocks on
    /// I/O; the miss cost is paid lazily in `get_cache_block`.
    pub fn request_block(&self, block_id: BlockId) -> usize {
        if let Some(slot_idx) = self.try_hit(block_id) {
            return slot_idx;
        }
        self.miss(block_id)
    }

    fn try_hit(&self, block_id: BlockId) -> Option<usize> {
        let slot_idx = *self.index.get(&block_id)?;
        let slot = &self.slots[slot_idx];
        loop {
            let pin = slot.pin_count.load(Ordering::Acquire);
            if pin == EVICTING {
                return None;
            }
            if slot.block_id.load(Ordering::Acquire) != block_id as i32 {
                return None;
            }
            match slot.pin_count.compare_exchange_weak(
                pin,
                pin + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // Re-read after a successful CAS: an eviction could have
                    // claimed and refilled this slot with a different block
                    // between the index lookup and the CAS winning.
                    if slot.block_id.load(Ordering::Acquire) != block_id as i32 {
                        slot.pin_count.fetch_sub(1, Ordering::AcqRel);
                        return None;
                    }
                    slot.ref_count.fetch_add(1, Ordering::AcqRel);
                    return Some(slot_idx);
                }
                Err(_) => continue,
            }
        }
    }

    fn miss(&self, block_id: BlockId) -> usize {
        let mut hand = self.clock_hand.lock();

        // Another thread may have installed this block while we waited for
        // the clock-hand lock.
        if let Some(slot_idx) = self.index.get(&block_id).map(|e| *e) {
            let slot = &self.slots[slot_idx];
            slot.pin_count.fetch_add(1, Ordering::AcqRel);
            slot.ref_count.fetch_add(1, Ordering::AcqRel);
            return slot_idx;
        }

        let n = self.slots.len();
        for i in 0..n {
            let idx = (*hand + i) % n;
            if self.slots[idx].status() == SlotStatus::Empty {
                self.slots[idx].install(block_id, 1);
                self.index.insert(block_id, idx);
                *hand = (idx + 1) % n;
                trace!(block_id, slot = idx, "cache miss, empty slot claimed");
                return idx;
            }
        }

        loop {
            for i in 0..n {
                let idx = (*hand + i) % n;
                let slot = &self.slots[idx];
                if slot.pin_count.load(Ordering::Acquire) != 0 {
                    continue;
                }
                // CLOCK second chance: decrement before attempting to claim.
                // A losing CAS here keeps the decrement (documented
                // degradation, kept rather than made strictly fair).
                let prev_ref = slot.ref_count.fetch_sub(1, Ordering::AcqRel);
                if prev_ref > 1 {
                    continue;
                }
                if slot
                    .pin_count
                    .compare_exchange(0, EVICTING, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    let old_id = slot.block_id.load(Ordering::Acquire);
                    if old_id != NO_BLOCK {
                        self.index.remove(&(old_id as u32));
                    }
                    slot.install(block_id, 1);
                    self.index.insert(block_id, idx);
                    *hand = (idx + 1) % n;
                    trace!(block_id, slot = idx, evicted = old_id, "cache miss, slot evicted");
                    return idx;
                }
            }
            // Every slot is pinned or lost its eviction race this pass.
            // Spin under the clock-hand lock; release_cache_block needs no
            // lock, so a pin held elsewhere still drains.
            std::hint::spin_loop();
        }
    }

    pub fn get_cache_block(&self, slot_idx: usize, block_id: BlockId) -> Result<CacheBlockRef<'_>> {
        fill_slot(&self.slots[slot_idx], block_id, &self.serializer)
    }

    pub fn release_cache_block(&self, slot_idx: usize) {
        let prev = self.slots[slot_idx].pin_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "released a slot with no outstanding pin");
    }

    /// Drop all residency, reset the CLOCK hand, and free the index.
    pub fn clear(&self) {
        let mut hand = self.clock_hand.lock();
        *hand = 0;
        self.index.clear();
        for slot in &self.slots {
            slot.pin_count.store(0, Ordering::Release);
            slot.ref_count.store(0, Ordering::Release);
            slot.block_id.store(NO_BLOCK, Ordering::Release);
            slot.set_status(SlotStatus::Empty);
            *slot.poison.lock() = None;
        }
    }

    /// Sum of outstanding pin counts across all slots; used by property
    /// tests to check request/release balance.
    pub fn pin_count_sum(&self) -> i64 {
        self.slots
            .iter()
            .map(|s| s.pin_count.load(Ordering::Acquire).max(0) as i64)
            .sum()
    }

    /// Number of slots whose status is not `Empty`; used by property tests
    /// that assert `clear()` fully resets residency.
    pub fn resident_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.status() != SlotStatus::Empty)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockgraph_core::IoMode;
    use blockgraph_io::block::{encode_edge_block, MetaBlock};
    use blockgraph_io::Serializer;

    fn build_fixture(block_size: usize, num_blocks: usize) -> (Arc<Serializer>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.bin");
        {
            let mut w = Serializer::open(&path, IoMode::Write, block_size, 8).unwrap();
            w.write_meta(MetaBlock {
                num_nodes: 0,
                num_blocks: num_blocks as u32,
                num_vertex_blocks: 0,
                num_edge_blocks: num_blocks as u32,
            })
            .unwrap();
            for i in 0..num_blocks {
                let edges: Vec<u32> = vec![i as u32];
                w.write_block(i as u32, encode_edge_block(&edges, block_size))
                    .unwrap();
            }
            w.finish_write().unwrap();
        }
        let sz = Serializer::open(&path, IoMode::SyncRead, block_size, 8).unwrap();
        (Arc::new(sz), dir)
    }

    #[test]
    fn hit_after_fill_returns_same_slot() {
        let (sz, _dir) = build_fixture(4096, 4);
        let cache = NormalCache::new(4, 4096, sz);
        let s0 = cache.request_block(0);
        let _blk = cache.get_cache_block(s0, 0).unwrap();
        drop(_blk);
        cache.release_cache_block(s0);

        let s1 = cache.request_block(0);
        assert_eq!(s0, s1);
        cache.release_cache_block(s1);
    }

    #[test]
    fn single_slot_thrashes_as_expected() {
        // 1 slot, 4 blocks, request 0,1,2,3,0 ->
        // 5 misses, final residency holds block 0.
        let (sz, _dir) = build_fixture(4096, 4);
        let cache = NormalCache::new(1, 4096, sz);
        for b in [0u32, 1, 2, 3, 0] {
            let s = cache.request_block(b);
            cache.get_cache_block(s, b).unwrap();
            cache.release_cache_block(s);
        }
        assert_eq!(cache.resident_count(), 1);
        let s = cache.request_block(0);
        // If 0 were still resident this would have been served without a
        // fresh install; verifying content is the strongest check available
        // from outside.
        let blk = cache.get_cache_block(s, 0).unwrap();
        assert_eq!(u32::from_le_bytes(blk[0..4].try_into().unwrap()), 0);
        drop(blk);
        cache.release_cache_block(s);
    }

    #[test]
    fn pin_blocks_eviction_of_held_slot() {
        let (sz, _dir) = build_fixture(4096, 2);
        let cache = NormalCache::new(1, 4096, sz);
        let s7 = cache.request_block(0);
        let s7b = cache.request_block(0);
        assert_eq!(s7, s7b);
        assert_eq!(cache.slots[s7].pin_count.load(Ordering::Acquire), 2);

        // Releasing once should not make it evictable yet.
        cache.release_cache_block(s7);
        assert_eq!(cache.slots[s7].pin_count.load(Ordering::Acquire), 1);

        cache.release_cache_block(s7b);
        assert_eq!(cache.slots[s7].pin_count.load(Ordering::Acquire), 0);

        let s_other = cache.request_block(1);
        assert_eq!(s_other, s7); // only slot, now evictable
        cache.release_cache_block(s_other);
    }

    #[test]
    fn concurrent_requests_balance_pin_counts() {
        let (sz, _dir) = build_fixture(4096, 8);
        let cache = Arc::new(NormalCache::new(4, 4096, sz));
        std::thread::scope(|scope| {
            for t in 0..16 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    for i in 0..200u32 {
                        let b = (t * 7 + i) % 8;
                        let s = cache.request_block(b);
                        let _ = cache.get_cache_block(s, b).unwrap();
                        cache.release_cache_block(s);
                    }
                });
            }
        });
        assert_eq!(cache.pin_count_sum(), 0);
    }

    #[test]
    fn clear_resets_all_slots() {
        let (sz, _dir) = build_fixture(4096, 2);
        let cache = NormalCache::new(2, 4096, sz);
        let s = cache.request_block(0);
        cache.get_cache_block(s, 0).unwrap();
        cache.release_cache_block(s);
        cache.clear();
        assert_eq!(cache.resident_count(), 0);
    }
}
