/// Default on-disk block size in bytes. Meta, vertex, and edge blocks all
/// share this alignment.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Vertex records per vertex block at the default block size
/// (`DEFAULT_BLOCK_SIZE / size_of::<RawVertex>()`).
pub const VB_CAPACITY: usize = DEFAULT_BLOCK_SIZE / 8;

/// Edge ids per edge block at the default block size.
pub const EB_CAPACITY: usize = DEFAULT_BLOCK_SIZE / 4;

/// Outstanding asynchronous writes permitted before the submitter blocks.
pub const QUEUE_DEPTH: usize = 256;

/// Floor on the number of slots a `BlockCache` will run with, regardless of
/// how small a size/ratio the caller asks for.
pub const MIN_CACHE_SLOTS: usize = 16;
