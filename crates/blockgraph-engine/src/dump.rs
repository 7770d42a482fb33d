//! Graph construction: an in-memory edge list, first-fit packed into
//! fixed-size edge blocks via [`blockgraph_segtree::SegmentTree`], and
//! written out through the [`Serializer`].

use blockgraph_core::{GraphError, Result, VertexId};
use blockgraph_io::block::{
    edge_capacity, encode_edge_block, encode_vertex_block, vertex_capacity, MetaBlock, RawVertex,
};
use blockgraph_io::Serializer;
use blockgraph_segtree::SegmentTree;
use tracing::{debug, instrument};

/// Blocks per `write_blocks` call during dump.
const WRITE_BATCH: usize = 1024;

/// In-memory adjacency list consumed by [`dump_graph`]. Out-of-scope text
/// parsers build one of these and hand it to the core; this type owns no
/// parsing logic itself.
pub struct EdgeList {
    adjacency: Vec<Vec<VertexId>>,
    finalized: bool,
}

impl EdgeList {
    pub fn new() -> Self {
        Self {
            adjacency: Vec::new(),
            finalized: false,
        }
    }

    /// Reserve `n` vertices, `0..n`. Replaces any previously reserved set.
    pub fn init_nodes(&mut self, n: usize) {
        self.adjacency = vec![Vec::new(); n];
        self.finalized = false;
    }

    pub fn add_edge(&mut self, src: VertexId, dst: VertexId) -> Result<()> {
        if self.finalized {
            return Err(GraphError::InvalidState(
                "add_edge called after finalize_edgelist".into(),
            ));
        }
        let slot = self
            .adjacency
            .get_mut(src as usize)
            .ok_or_else(|| GraphError::OutOfRange(format!("src vertex {src} >= {}", self.adjacency.len())))?;
        if dst as usize >= self.adjacency.len() {
            return Err(GraphError::OutOfRange(format!(
                "dst vertex {dst} >= {}",
                self.adjacency.len()
            )));
        }
        slot.push(dst);
        Ok(())
    }

    /// No mutation is required today (insertion order is the dump order),
    /// but callers call this once to mark the edge list immutable before
    /// `dump_graph`, matching the external dump API other collaborators use.
    pub fn finalize_edgelist(&mut self) {
        self.finalized = true;
    }

    pub fn num_nodes(&self) -> usize {
        self.adjacency.len()
    }

    pub fn degree(&self, v: VertexId) -> usize {
        self.adjacency[v as usize].len()
    }

    pub fn num_edges(&self) -> usize {
        self.adjacency.iter().map(|n| n.len()).sum()
    }

    pub fn neighbors(&self, v: VertexId) -> &[VertexId] {
        &self.adjacency[v as usize]
    }
}

impl Default for EdgeList {
    fn default() -> Self {
        Self::new()
    }
}

/// Running state of the bin-packer while a vertex's edges are being
/// assigned to edge-block storage.
struct Packer {
    blocks: Vec<Vec<u32>>,
    tree: SegmentTree,
    eb_cap: usize,
}

impl Packer {
    fn new(eb_cap: usize, leaf_budget: usize) -> Self {
        Self {
            blocks: Vec::new(),
            tree: SegmentTree::new(leaf_budget.max(1), eb_cap),
            eb_cap,
        }
    }

    fn new_block(&mut self) -> u32 {
        self.blocks.push(Vec::with_capacity(self.eb_cap));
        (self.blocks.len() - 1) as u32
    }

    /// Assign a single-block vertex's edges, returning `(block_id, offset)`.
    fn place_single(&mut self, edges: &[VertexId]) -> (u32, u32) {
        let degree = edges.len();
        if degree == 0 {
            return (0, 0);
        }
        match self.tree.query_first_larger(degree) {
            Some((leaf, block_id)) => {
                let offset = self.blocks[block_id as usize].len() as u32;
                self.blocks[block_id as usize].extend_from_slice(edges);
                let remaining = self.eb_cap - self.blocks[block_id as usize].len();
                self.tree.update(leaf, remaining, block_id);
                (block_id, offset)
            }
            None => {
                let block_id = self.new_block();
                self.blocks[block_id as usize].extend_from_slice(edges);
                let remaining = self.eb_cap - degree;
                if remaining > 0 {
                    self.tree.register(block_id, remaining);
                }
                (block_id, 0)
            }
        }
    }

    /// Assign a multi-block vertex (`degree > eb_cap`): fresh full blocks
    /// for everything but the tail, which keeps any leftover capacity
    /// registered with the segment tree for later single-block vertices.
    fn place_multi(&mut self, edges: &[VertexId]) -> u32 {
        let first_block = self.blocks.len() as u32;
        for chunk in edges.chunks(self.eb_cap) {
            let block_id = self.new_block();
            self.blocks[block_id as usize].extend_from_slice(chunk);
            let remaining = self.eb_cap - chunk.len();
            if remaining > 0 {
                self.tree.register(block_id, remaining);
            }
        }
        first_block
    }
}

/// Pack `edges` into fixed-size edge blocks and write the vertex/edge
/// blocks plus meta header through `serializer` (which must be opened in
/// `IoMode::Write`).
#[instrument(skip(edges, serializer))]
pub fn dump_graph(edges: &EdgeList, serializer: &Serializer, block_size: usize) -> Result<()> {
    let num_nodes = edges.num_nodes();
    let vb_cap = vertex_capacity(block_size);
    let eb_cap = edge_capacity(block_size);
    let num_vertex_blocks = num_nodes.div_ceil(vb_cap.max(1));

    let total_edges = edges.num_edges();
    // Generous upper bound on distinct edge blocks the packer could ever
    // need: one per full multi-block chunk plus headroom for partially
    // filled single-block leaves (twice the worst-case block count).
    let leaf_budget = 2 * (total_edges.div_ceil(eb_cap.max(1)) + num_nodes + 1);
    let mut packer = Packer::new(eb_cap, leaf_budget);

    let mut records = Vec::with_capacity(num_nodes);
    for v in 0..num_nodes as VertexId {
        let neighbors = edges.neighbors(v);
        let degree = neighbors.len();
        let edge_block_idx_off = if degree == 0 {
            0
        } else if degree > eb_cap {
            let first_block = packer.place_multi(neighbors);
            RawVertex::pack(block_size, first_block, 0)
        } else {
            let (block_id, offset) = packer.place_single(neighbors);
            RawVertex::pack(block_size, block_id, offset)
        };
        records.push(RawVertex {
            degree: degree as u32,
            edge_block_idx_off,
        });
    }

    debug!(
        num_nodes,
        num_vertex_blocks,
        num_edge_blocks = packer.blocks.len(),
        "packed edge list into block layout"
    );

    write_vertex_blocks(serializer, &records, num_vertex_blocks, vb_cap, block_size)?;
    write_edge_blocks(serializer, &packer.blocks, num_vertex_blocks, block_size)?;

    serializer.write_meta(MetaBlock {
        num_nodes: num_nodes as u32,
        num_blocks: (num_vertex_blocks + packer.blocks.len()) as u32,
        num_vertex_blocks: num_vertex_blocks as u32,
        num_edge_blocks: packer.blocks.len() as u32,
    })?;

    Ok(())
}

/// Open `path` in `Write` mode, dump `edges` through it, and call
/// `finish_write`. A convenience for callers (the out-of-scope text
/// parser) that do not otherwise need a `Serializer` handle.
pub fn dump_graph_to_path<P: AsRef<std::path::Path>>(
    path: P,
    edges: &EdgeList,
    block_size: usize,
    queue_depth: usize,
) -> Result<()> {
    let mut serializer = Serializer::open(path, blockgraph_core::IoMode::Write, block_size, queue_depth)?;
    dump_graph(edges, &serializer, block_size)?;
    serializer.finish_write()
}

fn write_vertex_blocks(
    serializer: &Serializer,
    records: &[RawVertex],
    num_vertex_blocks: usize,
    vb_cap: usize,
    block_size: usize,
) -> Result<()> {
    let mut first_block = 0u32;
    for chunk_start in (0..num_vertex_blocks).step_by(WRITE_BATCH) {
        let chunk_end = (chunk_start + WRITE_BATCH).min(num_vertex_blocks);
        let mut buf = Vec::with_capacity((chunk_end - chunk_start) * block_size);
        for vb in chunk_start..chunk_end {
            let lo = vb * vb_cap;
            let hi = (lo + vb_cap).min(records.len());
            let slice = if lo < records.len() { &records[lo..hi] } else { &[] };
            buf.extend_from_slice(&encode_vertex_block(slice, block_size));
        }
        let count = chunk_end - chunk_start;
        serializer.write_blocks(first_block, buf, count)?;
        first_block += count as u32;
    }
    Ok(())
}

fn write_edge_blocks(
    serializer: &Serializer,
    blocks: &[Vec<u32>],
    num_vertex_blocks: usize,
    block_size: usize,
) -> Result<()> {
    for chunk_start in (0..blocks.len()).step_by(WRITE_BATCH) {
        let chunk_end = (chunk_start + WRITE_BATCH).min(blocks.len());
        let mut buf = Vec::with_capacity((chunk_end - chunk_start) * block_size);
        for eb in &blocks[chunk_start..chunk_end] {
            buf.extend_from_slice(&encode_edge_block(eb, block_size));
        }
        let count = chunk_end - chunk_start;
        let first_block = (num_vertex_blocks + chunk_start) as u32;
        serializer.write_blocks(first_block, buf, count)?;
    }
    Ok(())
}
