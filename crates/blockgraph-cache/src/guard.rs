//! Shared lazy-fill logic and the read guard returned by `get_cache_block`.

use blockgraph_core::{BlockId, GraphError, Result};
use blockgraph_io::Serializer;
use parking_lot::RwLockReadGuard;

use crate::slot::{Slot, SlotStatus};

/// Borrowed view of a cache slot's contents. Derefs to `&[u8]`; dropping it
/// releases the internal read lock on the slot's contents (not the pin —
/// that is a separate call, or [`CachePin`](crate::CachePin)'s `Drop`).
pub struct CacheBlockRef<'a> {
    guard: RwLockReadGuard<'a, Vec<u8>>,
}

impl<'a> std::ops::Deref for CacheBlockRef<'a> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.guard
    }
}

/// Ensure `slot`'s contents reflect `block_id` on storage, performing the
/// read under the slot's fill lock exactly once, then return a view of the
/// contents. Shared by `NormalCache` and `SimpleCache`, whose hit/miss
/// paths differ but whose lazy-fill contract does not.
pub fn fill_slot<'a>(
    slot: &'a Slot,
    block_id: BlockId,
    serializer: &Serializer,
) -> Result<CacheBlockRef<'a>> {
    loop {
        match slot.status() {
            SlotStatus::Ready => {
                return Ok(CacheBlockRef {
                    guard: slot.contents.read(),
                });
            }
            SlotStatus::Poisoned => {
                let msg = slot
                    .poison
                    .lock()
                    .clone()
                    .unwrap_or_else(|| "cache slot poisoned by an earlier fill failure".into());
                return Err(GraphError::Corruption(msg));
            }
            SlotStatus::Empty => {
                return Err(GraphError::InvalidState(
                    "get_cache_block called on a slot that was never installed".into(),
                ));
            }
            SlotStatus::Allocated => {
                let _fill_guard = slot.fill_lock.lock();
                // Re-check: another thread may have completed (or
                // poisoned) the fill while we waited for the lock.
                if slot.status() != SlotStatus::Allocated {
                    continue;
                }
                let mut contents = slot.contents.write();
                match serializer.read_block(block_id, &mut contents) {
                    Ok(()) => {
                        drop(contents);
                        slot.set_status(SlotStatus::Ready);
                    }
                    Err(e) => {
                        *slot.poison.lock() = Some(e.to_string());
                        drop(contents);
                        slot.set_status(SlotStatus::Poisoned);
                        return Err(e);
                    }
                }
            }
        }
    }
}
