//! RAII pin guard over either cache variant ("ownership graphs with
//! shared slots": the slot is an arena cell, not a shared-ownership
//! pointer, so a pin is expressed as a token the caller must return). The
//! raw index-based `request_block` / `release_cache_block` pair remains
//! available directly on `NormalCache`/`SimpleCache` for call sites —
//! like block-grouped iteration — that manage pin lifetime explicitly
//! across a group of vertices; `CachePin` is a convenience for call sites
//! that want scope-based release instead.

use blockgraph_core::{BlockId, Result};

use crate::guard::CacheBlockRef;
use crate::normal::NormalCache;
use crate::simple::SimpleCache;

/// A pinned cache slot whose pin is released when the guard drops.
pub enum CachePin<'a> {
    Normal { cache: &'a NormalCache, slot: usize },
    Simple { cache: &'a SimpleCache, slot: usize },
}

impl<'a> CachePin<'a> {
    pub fn normal(cache: &'a NormalCache, block_id: BlockId) -> Self {
        let slot = cache.request_block(block_id);
        Self::Normal { cache, slot }
    }

    pub fn simple(cache: &'a SimpleCache, block_id: BlockId, reservation: i32) -> Self {
        let slot = cache.request_block(block_id, reservation);
        Self::Simple { cache, slot }
    }

    pub fn slot(&self) -> usize {
        match self {
            Self::Normal { slot, .. } | Self::Simple { slot, .. } => *slot,
        }
    }

    pub fn block(&self, block_id: BlockId) -> Result<CacheBlockRef<'_>> {
        match self {
            Self::Normal { cache, slot } => cache.get_cache_block(*slot, block_id),
            Self::Simple { cache, slot } => cache.get_cache_block(*slot, block_id),
        }
    }
}

impl<'a> Drop for CachePin<'a> {
    fn drop(&mut self) {
        match self {
            Self::Normal { cache, slot } => cache.release_cache_block(*slot),
            Self::Simple { cache, slot } => cache.release_cache_block(*slot),
        }
    }
}
