//! `SimpleCache`: reservation-counted variant for block-grouped iteration.
//! The caller declares, at request time, how many readers will touch the
//! slot this round; that declared count becomes the CLOCK counter
//! directly, so no per-hit `ref_count` bookkeeping is needed.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::trace;

use blockgraph_core::{BlockId, Result};
use blockgraph_io::Serializer;

use crate::guard::{fill_slot, CacheBlockRef};
use crate::slot::{Slot, SlotStatus, EVICTING, NO_BLOCK};

pub struct SimpleCache {
    slots: Vec<Slot>,
    index: DashMap<BlockId, usize>,
    clock_hand: Mutex<usize>,
    serializer: Arc<Serializer>,
}

impl SimpleCache {
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

    /// Pin the slot for `block_id`, declaring `reservation` outstanding
    /// readers for this round. `reservation` becomes the slot's CLOCK
    /// counter directly (it is not accumulated across calls).
    pub fn request_block(&self, block_id: BlockId, reservation: i32) -> usize {
        debug_assert!(reservation >= 1, "reservation must cover at least one reader");
        if let Some(slot_idx) = self.try_hit(block_id, reservation) {
            return slot_idx;
        }
        self.miss(block_id, reservation)
    }

    fn try_hit(&self, block_id: BlockId, reservation: i32) -> Option<usize> {
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
                    if slot.block_id.load(Ordering::Acquire) != block_id as i32 {
                        slot.pin_count.fetch_sub(1, Ordering::AcqRel);
                        return None;
                    }
                    slot.ref_count.store(reservation, Ordering::Release);
                    return Some(slot_idx);
                }
                Err(_) => continue,
            }
        }
    }

    fn miss(&self, block_id: BlockId, reservation: i32) -> usize {
        let mut hand = self.clock_hand.lock();

        if let Some(slot_idx) = self.index.get(&block_id).map(|e| *e) {
            let slot = &self.slots[slot_idx];
            slot.pin_count.fetch_add(1, Ordering::AcqRel);
            slot.ref_count.store(reservation, Ordering::Release);
            return slot_idx;
        }

        let n = self.slots.len();
        for i in 0..n {
            let idx = (*hand + i) % n;
            if self.slots[idx].status() == SlotStatus::Empty {
                self.slots[idx].install(block_id, reservation);
                self.index.insert(block_id, idx);
                *hand = (idx + 1) % n;
                trace!(block_id, slot = idx, "simple cache miss, empty slot claimed");
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
                    slot.install(block_id, reservation);
                    self.index.insert(block_id, idx);
                    *hand = (idx + 1) % n;
                    return idx;
                }
            }
            std::hint::spin_loop();
        }
    }

    pub fn get_cache_block(&self, slot_idx: usize, block_id: BlockId) -> Result<CacheBlockRef<'_>> {
        fill_slot(&self.slots[slot_idx], block_id, &self.serializer)
    }

    /// Decrements the slot's pin count by one. A single
    /// `release_cache_block` call covers the whole declared reservation's
    /// pin (callers release once per group, not once per group member).
    pub fn release_cache_block(&self, slot_idx: usize) {
        let prev = self.slots[slot_idx].pin_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "released a slot with no outstanding pin");
    }

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

    pub fn resident_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.status() != SlotStatus::Empty)
            .count()
    }
}
