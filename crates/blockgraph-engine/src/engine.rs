//! `Graph`: the open-file, vertex-lookup, and `get_edges` half of the
//! iteration engine. Scheduling (`process_queue`,
//! `process_queue_in_blocks`) lives in [`crate::schedule`]; construction
//! (`dump_graph`) lives in [`crate::dump`].

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use blockgraph_cache::CachePin;
use blockgraph_core::constants::MIN_CACHE_SLOTS;
use blockgraph_core::{CacheConfig, CacheMode, CacheSize, GraphError, IoMode, PoolConfig, Result, VertexId};
use blockgraph_io::block::{decode_vertex_block, edge_capacity, vertex_capacity, RawVertex};
use blockgraph_io::Serializer;

use crate::cache_mode::CacheImpl;
use crate::pool::WorkerPool;

/// Decode `degree` little-endian `u32` ids starting at byte offset
/// `offset * 4` within `buf`.
fn decode_slice(buf: &[u8], offset: usize, degree: usize) -> Vec<u32> {
    let start = offset * 4;
    let mut out = Vec::with_capacity(degree);
    for i in 0..degree {
        let at = start + i * 4;
        out.push(u32::from_le_bytes(buf[at..at + 4].try_into().unwrap()));
    }
    out
}

/// Where a vertex's edges live: one block at an offset, or a run of
/// consecutive full blocks starting at offset 0.
enum Location {
    Single { block: u32, offset: usize, degree: usize },
    Multi { first_block: u32, last_block: u32, degree: usize },
}

pub struct Graph {
    serializer: Arc<Serializer>,
    block_size: usize,
    num_nodes: u32,
    num_edge_blocks: u32,
    vertices: Vec<RawVertex>,
    cache_mode: CacheMode,
    cache_config: CacheConfig,
    cache: CacheImpl,
    pool: WorkerPool,
}

impl Graph {
    /// `init_serializer` + `init_metadata` + `init_vertex_data`, run
    /// together since nothing meaningful happens between them.
    #[instrument(skip(path))]
    pub fn open<P: AsRef<Path>>(path: P, mode: IoMode, block_size: usize, queue_depth: usize) -> Result<Self> {
        let serializer = Arc::new(Serializer::open(path, mode, block_size, queue_depth)?);
        let meta = serializer.read_meta()?;
        debug!(
            num_nodes = meta.num_nodes,
            num_vertex_blocks = meta.num_vertex_blocks,
            num_edge_blocks = meta.num_edge_blocks,
            "opened graph file"
        );
        let vertices = Self::load_vertex_blocks(&serializer, meta.num_vertex_blocks, meta.num_nodes, block_size)?;

        let cache_mode = CacheMode::Normal;
        let cache_config = CacheConfig {
            size: CacheSize::Slots(MIN_CACHE_SLOTS),
            block_size,
        };
        let cache = CacheImpl::build(
            cache_mode,
            cache_config.resolve_slots(meta.num_edge_blocks as usize),
            block_size,
            &serializer,
        );

        Ok(Self {
            serializer,
            block_size,
            num_nodes: meta.num_nodes,
            num_edge_blocks: meta.num_edge_blocks,
            vertices,
            cache_mode,
            cache_config,
            cache,
            pool: WorkerPool::from_config(&PoolConfig::default()),
        })
    }

    fn load_vertex_blocks(
        serializer: &Serializer,
        num_vertex_blocks: u32,
        num_nodes: u32,
        block_size: usize,
    ) -> Result<Vec<RawVertex>> {
        let vb_cap = vertex_capacity(block_size);
        let mut out = Vec::with_capacity(num_vertex_blocks as usize * vb_cap);
        let mut buf = vec![0u8; block_size];
        for vb in 0..num_vertex_blocks {
            serializer.read_block(vb, &mut buf)?;
            out.extend(decode_vertex_block(&buf, block_size));
        }
        out.truncate(num_nodes as usize);
        Ok(out)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn get_num_nodes(&self) -> u32 {
        self.num_nodes
    }

    pub fn get_degree(&self, v: VertexId) -> Result<u32> {
        Ok(self.vertex_record(v)?.degree)
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn serializer(&self) -> &Arc<Serializer> {
        &self.serializer
    }

    pub fn cache_mode(&self) -> CacheMode {
        self.cache.mode()
    }

    fn vertex_record(&self, v: VertexId) -> Result<RawVertex> {
        self.vertices
            .get(v as usize)
            .copied()
            .ok_or_else(|| GraphError::OutOfRange(format!("vertex {v} >= {}", self.num_nodes)))
    }

    fn locate(&self, v: VertexId) -> Result<Location> {
        let record = self.vertex_record(v)?;
        let degree = record.degree as usize;
        let eb_cap = edge_capacity(self.block_size);
        let first_block = record.edge_block_id(self.block_size);
        let offset = record.offset(self.block_size) as usize;

        if degree == 0 {
            return Ok(Location::Single {
                block: first_block,
                offset,
                degree: 0,
            });
        }
        if degree <= eb_cap.saturating_sub(offset) {
            Ok(Location::Single {
                block: first_block,
                offset,
                degree,
            })
        } else {
            debug_assert_eq!(offset, 0, "multi-block vertex must start at offset 0");
            let count = degree.div_ceil(eb_cap);
            Ok(Location::Multi {
                first_block,
                last_block: first_block + (count - 1) as u32,
                degree,
            })
        }
    }

    /// The edge block this vertex's cache request lands on under the
    /// single/multi-block rule: the whole block for single-block vertices,
    /// the trailing block for multi-block ones. Used by
    /// `process_queue_in_blocks` to group vertices sharing a fetch.
    pub(crate) fn owning_block(&self, v: VertexId) -> Result<u32> {
        match self.locate(v)? {
            Location::Single { block, .. } => Ok(block),
            Location::Multi { last_block, .. } => Ok(last_block),
        }
    }

    /// `get_edges(v)`: locate the vertex record, fetch its owning edge
    /// block(s), and return the neighbor ids in storage order.
    pub fn get_edges(&self, v: VertexId) -> Result<Vec<u32>> {
        match self.locate(v)? {
            Location::Single { degree: 0, .. } => Ok(Vec::new()),
            Location::Single { block, offset, degree } => self.read_single(block, offset, degree),
            Location::Multi {
                first_block,
                last_block,
                degree,
            } => self.read_multi(first_block, last_block, degree),
        }
    }

    fn read_single(&self, block: u32, offset: usize, degree: usize) -> Result<Vec<u32>> {
        match &self.cache {
            CacheImpl::Normal(c) => {
                let pin = CachePin::normal(c, block);
                pin.block(block).map(|b| decode_slice(&b, offset, degree))
            }
            CacheImpl::Simple(c) => {
                let pin = CachePin::simple(c, block, 1);
                pin.block(block).map(|b| decode_slice(&b, offset, degree))
            }
            CacheImpl::None => {
                let mut buf = vec![0u8; self.block_size];
                self.serializer.read_block(block, &mut buf)?;
                Ok(decode_slice(&buf, offset, degree))
            }
        }
    }

    /// Head blocks (all but the last) are read directly from the
    /// Serializer: each is a full-block stream used exactly once by this
    /// vertex this call, so caching them would only add CLOCK churn for
    /// no reuse. Kept as a deliberate choice rather than caching every
    /// block touched.
    fn read_multi(&self, first_block: u32, last_block: u32, degree: usize) -> Result<Vec<u32>> {
        let eb_cap = edge_capacity(self.block_size);
        let mut out = Vec::with_capacity(degree);
        let mut block = first_block;
        while block < last_block {
            let mut buf = vec![0u8; self.block_size];
            self.serializer.read_block(block, &mut buf)?;
            out.extend(decode_slice(&buf, 0, eb_cap));
            block += 1;
        }
        let tail_len = degree - out.len();
        let tail = self.read_single(last_block, 0, tail_len)?;
        out.extend(tail);
        Ok(out)
    }

    /// Fetch the owning block for a whole group of vertices once, then
    /// derive each member's neighbor list from the shared bytes (head
    /// blocks of multi-block members are still streamed individually).
    /// Used by `process_queue_in_blocks`.
    pub(crate) fn get_edges_grouped(&self, owning_block: u32, members: &[VertexId]) -> Result<Vec<Vec<u32>>> {
        match &self.cache {
            CacheImpl::Simple(c) => {
                let reservation = (members.len() as i32).max(1);
                let pin = CachePin::simple(c, owning_block, reservation);
                let blk = pin.block(owning_block)?;
                members
                    .iter()
                    .map(|&v| self.edges_from_shared_block(v, owning_block, &blk))
                    .collect()
            }
            CacheImpl::Normal(c) => {
                let pin = CachePin::normal(c, owning_block);
                let blk = pin.block(owning_block)?;
                members
                    .iter()
                    .map(|&v| self.edges_from_shared_block(v, owning_block, &blk))
                    .collect()
            }
            CacheImpl::None => {
                let mut buf = vec![0u8; self.block_size];
                self.serializer.read_block(owning_block, &mut buf)?;
                members
                    .iter()
                    .map(|&v| self.edges_from_shared_block(v, owning_block, &buf))
                    .collect()
            }
        }
    }

    fn edges_from_shared_block(&self, v: VertexId, owning_block: u32, shared: &[u8]) -> Result<Vec<u32>> {
        match self.locate(v)? {
            Location::Single { degree: 0, .. } => Ok(Vec::new()),
            Location::Single { block, offset, degree } => {
                debug_assert_eq!(block, owning_block);
                Ok(decode_slice(shared, offset, degree))
            }
            Location::Multi {
                first_block,
                last_block,
                degree,
            } => {
                debug_assert_eq!(last_block, owning_block);
                let eb_cap = edge_capacity(self.block_size);
                let mut out = Vec::with_capacity(degree);
                let mut block = first_block;
                while block < last_block {
                    let mut buf = vec![0u8; self.block_size];
                    self.serializer.read_block(block, &mut buf)?;
                    out.extend(decode_slice(&buf, 0, eb_cap));
                    block += 1;
                }
                let tail_len = degree - out.len();
                out.extend(decode_slice(shared, 0, tail_len));
                Ok(out)
            }
        }
    }

    pub fn set_cache_size(&mut self, size: CacheSize) {
        self.cache_config.size = size;
        self.rebuild_cache();
    }

    pub fn set_cache_mode(&mut self, mode: CacheMode) {
        self.cache_mode = mode;
        self.rebuild_cache();
    }

    pub fn disable_cache(&mut self) {
        self.cache_mode = CacheMode::None;
        self.cache = CacheImpl::None;
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn rebuild_cache(&mut self) {
        let slots = self.cache_config.resolve_slots(self.num_edge_blocks as usize);
        self.cache = CacheImpl::build(self.cache_mode, slots, self.block_size, &self.serializer);
    }

    pub fn set_thread_pool_size(&mut self, n: usize) {
        self.pool = WorkerPool::new(Some(n));
    }
}
