/// Dense vertex identifier, `0..num_nodes`.
pub type VertexId = u32;

/// Identifier of an edge block on storage.
pub type BlockId = u32;

/// I/O mode a graph file is opened in: synchronous positioned reads,
/// asynchronous positioned reads behind a bounded queue, append-only
/// writes, or a read-only memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum IoMode {
    SyncRead,
    AsyncRead,
    Write,
    InMemory,
}

/// Which cache strategy the iteration engine uses for edge-block lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CacheMode {
    /// CLOCK-evicted cache with a lock-free CAS hit path.
    Normal,
    /// Reservation-counted cache for block-grouped iteration.
    Simple,
    /// Every lookup reads straight through to storage.
    None,
}
