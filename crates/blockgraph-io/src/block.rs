//! On-disk block layouts.
//!
//! Every block — meta, vertex, edge — is the same fixed size on disk and is
//! encoded little-endian by hand rather than through a generic framework,
//! since these are small, stable, fixed-width record shapes with no need
//! for schema evolution.

use blockgraph_core::constants::{DEFAULT_BLOCK_SIZE, EB_CAPACITY, VB_CAPACITY};

/// File header: written last during a dump so its presence is a commit
/// barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetaBlock {
    pub num_nodes: u32,
    pub num_blocks: u32,
    pub num_vertex_blocks: u32,
    pub num_edge_blocks: u32,
}

impl MetaBlock {
    pub fn to_bytes(self, block_size: usize) -> Vec<u8> {
        let mut buf = vec![0u8; block_size];
        buf[0..4].copy_from_slice(&self.num_nodes.to_le_bytes());
        buf[4..8].copy_from_slice(&self.num_blocks.to_le_bytes());
        buf[8..12].copy_from_slice(&self.num_vertex_blocks.to_le_bytes());
        buf[12..16].copy_from_slice(&self.num_edge_blocks.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            num_nodes: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            num_blocks: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            num_vertex_blocks: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            num_edge_blocks: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
        }
    }
}

/// One vertex's storage record: its degree and a packed
/// `(edge_block_id, offset_within_block)` pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawVertex {
    pub degree: u32,
    pub edge_block_idx_off: u32,
}

impl RawVertex {
    pub fn pack(block_size: usize, edge_block_id: u32, offset: u32) -> u32 {
        let bits = block_offset_bits(block_size);
        debug_assert!((offset as usize) < edge_capacity(block_size));
        (edge_block_id << bits) | offset
    }

    pub fn edge_block_id(&self, block_size: usize) -> u32 {
        self.edge_block_idx_off >> block_offset_bits(block_size)
    }

    pub fn offset(&self, block_size: usize) -> u32 {
        self.edge_block_idx_off & ((1 << block_offset_bits(block_size)) - 1)
    }
}

/// Records per vertex block, derived from the configured block size.
pub fn vertex_capacity(block_size: usize) -> usize {
    block_size / 8
}

/// Edge ids per edge block, derived from the configured block size.
pub fn edge_capacity(block_size: usize) -> usize {
    block_size / 4
}

/// `log2(edge_capacity(block_size))`; the width of the offset field packed
/// into `edge_block_idx_off` for this block size.
pub fn block_offset_bits(block_size: usize) -> u32 {
    edge_capacity(block_size).trailing_zeros()
}

pub fn encode_vertex_block(records: &[RawVertex], block_size: usize) -> Vec<u8> {
    let cap = vertex_capacity(block_size);
    debug_assert!(records.len() <= cap);
    let mut buf = vec![0u8; block_size];
    for (i, rec) in records.iter().enumerate() {
        let off = i * 8;
        buf[off..off + 4].copy_from_slice(&rec.degree.to_le_bytes());
        buf[off + 4..off + 8].copy_from_slice(&rec.edge_block_idx_off.to_le_bytes());
    }
    buf
}

pub fn decode_vertex_block(buf: &[u8], block_size: usize) -> Vec<RawVertex> {
    let cap = vertex_capacity(block_size);
    let mut out = Vec::with_capacity(cap);
    for i in 0..cap {
        let off = i * 8;
        out.push(RawVertex {
            degree: u32::from_le_bytes(buf[off..off + 4].try_into().unwrap()),
            edge_block_idx_off: u32::from_le_bytes(buf[off + 4..off + 8].try_into().unwrap()),
        });
    }
    out
}

pub fn encode_edge_block(edges: &[u32], block_size: usize) -> Vec<u8> {
    let cap = edge_capacity(block_size);
    debug_assert!(edges.len() <= cap);
    let mut buf = vec![0u8; block_size];
    for (i, e) in edges.iter().enumerate() {
        let off = i * 4;
        buf[off..off + 4].copy_from_slice(&e.to_le_bytes());
    }
    buf
}

pub fn decode_edge_block(buf: &[u8], block_size: usize) -> Vec<u32> {
    let cap = edge_capacity(block_size);
    let mut out = Vec::with_capacity(cap);
    for i in 0..cap {
        let off = i * 4;
        out.push(u32::from_le_bytes(buf[off..off + 4].try_into().unwrap()));
    }
    out
}
