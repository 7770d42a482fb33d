//! Runtime-selected cache strategy ("dynamic polymorphism
//! over cache strategies"): a tagged enum holding the active cache's owned
//! state, rather than a generic type parameter threaded through `Graph` —
//! the choice is a runtime configuration decision (`set_cache_mode`), not a
//! compile-time one, so a generic would force every call site to be
//! generic over cache strategy for no benefit.

use std::sync::Arc;

use blockgraph_cache::{NormalCache, SimpleCache};
use blockgraph_core::CacheMode;
use blockgraph_io::Serializer;

pub enum CacheImpl {
    Normal(NormalCache),
    Simple(SimpleCache),
    None,
}

impl CacheImpl {
    pub fn build(
        mode: CacheMode,
        slots: usize,
        block_size: usize,
        serializer: &Arc<Serializer>,
    ) -> Self {
        match mode {
            CacheMode::None => CacheImpl::None,
            CacheMode::Normal => {
                CacheImpl::Normal(NormalCache::new(slots, block_size, Arc::clone(serializer)))
            }
            CacheMode::Simple => {
                CacheImpl::Simple(SimpleCache::new(slots, block_size, Arc::clone(serializer)))
            }
        }
    }

    pub fn clear(&self) {
        match self {
            CacheImpl::Normal(c) => c.clear(),
            CacheImpl::Simple(c) => c.clear(),
            CacheImpl::None => {}
        }
    }

    pub fn mode(&self) -> CacheMode {
        match self {
            CacheImpl::Normal(_) => CacheMode::Normal,
            CacheImpl::Simple(_) => CacheMode::Simple,
            CacheImpl::None => CacheMode::None,
        }
    }
}
