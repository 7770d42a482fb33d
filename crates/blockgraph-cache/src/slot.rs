//! A single cache slot's state machine: `Empty -> Allocated -> Ready`, with
//! a side exit to `Poisoned` on a failed fill, and eviction returning a
//! slot to `Empty` in spirit (immediately re-`Allocated` for the new block
//! id, since the cache never leaves a slot idle once claimed).

use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};

use parking_lot::{Mutex, RwLock};

/// Sentinel `pin_count` value meaning "claimed for eviction; do not hand
/// this slot out, and do not CAS it back to non-negative".
pub const EVICTING: i32 = -1;

/// Sentinel `block_id` meaning "slot has never held a block".
pub const NO_BLOCK: i32 = -1;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Empty = 0,
    Allocated = 1,
    Ready = 2,
    /// The Serializer failed while filling this slot. Every pinner's
    /// `get_cache_block` observes the same stored error rather than
    /// retrying with no back-off.
    Poisoned = 3,
}

impl SlotStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SlotStatus::Empty,
            1 => SlotStatus::Allocated,
            2 => SlotStatus::Ready,
            3 => SlotStatus::Poisoned,
            _ => unreachable!("invalid slot status byte"),
        }
    }
}

/// One arena cell of cache storage. Shared between many concurrent
/// pinners and at most one evictor; never moved or reallocated after the
/// cache is constructed, so indices into the slot array are stable for the
/// cache's whole lifetime.
pub struct Slot {
    pub block_id: AtomicI32,
    pub pin_count: AtomicI32,
    pub ref_count: AtomicI32,
    status: AtomicU8,
    /// Guards the Allocated -> Ready transition so exactly one concurrent
    /// reader performs the physical read.
    pub fill_lock: Mutex<()>,
    pub contents: RwLock<Vec<u8>>,
    pub poison: Mutex<Option<String>>,
}

impl Slot {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_id: AtomicI32::new(NO_BLOCK),
            pin_count: AtomicI32::new(0),
            ref_count: AtomicI32::new(0),
            status: AtomicU8::new(SlotStatus::Empty as u8),
            fill_lock: Mutex::new(()),
            contents: RwLock::new(vec![0u8; block_size]),
            poison: Mutex::new(None),
        }
    }

    pub fn status(&self) -> SlotStatus {
        SlotStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: SlotStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Reset this slot for a freshly claimed block id. Only the thread
    /// holding the clock-hand lock (miss path) calls this.
    pub fn install(&self, block_id: u32, ref_count: i32) {
        *self.poison.lock() = None;
        self.block_id.store(block_id as i32, Ordering::Release);
        self.pin_count.store(1, Ordering::Release);
        self.ref_count.store(ref_count, Ordering::Release);
        self.set_status(SlotStatus::Allocated);
    }
}
