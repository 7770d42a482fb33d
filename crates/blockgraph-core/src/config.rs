use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{DEFAULT_BLOCK_SIZE, MIN_CACHE_SLOTS, QUEUE_DEPTH};
use crate::types::IoMode;

/// Configuration for the block serializer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializerConfig {
    pub block_size: usize,
    pub mode: IoMode,
    /// Outstanding async writes before the submitter blocks.
    pub queue_depth: usize,
    /// Try `O_DIRECT` on Unix; fall back to a buffered descriptor (and warn
    /// once) if the filesystem rejects it.
    pub direct_io: bool,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            mode: IoMode::SyncRead,
            queue_depth: QUEUE_DEPTH,
            direct_io: true,
        }
    }
}

/// How a cache's slot count is derived.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum CacheSize {
    /// Absolute slot count.
    Slots(usize),
    /// Megabytes of edge-block storage; divided by the block size.
    Megabytes(usize),
    /// Fraction of `num_edge_blocks`, in `(0.0, 1.0]`.
    Ratio(f64),
}

/// Configuration for a [`CacheMode::Normal`](crate::types::CacheMode::Normal)
/// or [`CacheMode::Simple`](crate::types::CacheMode::Simple) block cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub size: CacheSize,
    pub block_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size: CacheSize::Slots(MIN_CACHE_SLOTS),
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl CacheConfig {
    /// Resolve this configuration against the number of edge blocks on
    /// storage, clamping below at [`MIN_CACHE_SLOTS`] and above at
    /// `num_edge_blocks`. Configuration errors (a requested size below the
    /// floor) are not fatal: they are logged and clamped.
    pub fn resolve_slots(&self, num_edge_blocks: usize) -> usize {
        let requested = match self.size {
            CacheSize::Slots(n) => n,
            CacheSize::Megabytes(mb) => (mb * 1024 * 1024) / self.block_size.max(1),
            CacheSize::Ratio(r) => ((num_edge_blocks as f64) * r).ceil() as usize,
        };

        let clamped_low = requested.max(MIN_CACHE_SLOTS);
        if clamped_low != requested {
            warn!(
                requested,
                floor = MIN_CACHE_SLOTS,
                "cache size below minimum, clamping up"
            );
        }
        if num_edge_blocks == 0 {
            return clamped_low;
        }
        clamped_low.min(num_edge_blocks)
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// `None` defers to the number of logical cores.
    pub num_threads: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { num_threads: None }
    }
}
