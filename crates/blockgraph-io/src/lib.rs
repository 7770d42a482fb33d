//! Block-aligned direct-I/O serialization for the out-of-core graph file
//! format: a meta block, a run of vertex blocks, and a run of edge blocks.

pub mod block;
pub mod serializer;

pub use block::{
    decode_edge_block, decode_vertex_block, edge_capacity, encode_edge_block,
    encode_vertex_block, vertex_capacity, MetaBlock, RawVertex,
};
pub use serializer::Serializer;
