//! Parallel, vertex-centric iteration over block-cached, out-of-core
//! graph storage.
//!
//! [`engine::Graph`] owns the open file, the in-memory vertex-block
//! vector, and the active [`cache_mode::CacheImpl`]; its `get_edges`
//! forms the read path every schedule in [`schedule`] and [`dfs`] builds
//! on. [`dump`] is the write side: pack an [`dump::EdgeList`] into block
//! storage once, offline, before any of this is queried.

pub mod cache_mode;
pub mod dfs;
pub mod dump;
pub mod engine;
pub mod pool;
pub mod schedule;

pub use dfs::DfsStackSplitter;
pub use dump::{dump_graph, dump_graph_to_path, EdgeList};
pub use engine::Graph;
pub use pool::WorkerPool;
