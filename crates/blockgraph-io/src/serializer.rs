//! Block-granular I/O against a single graph file.
//!
//! Four modes, matching the four ways a caller opens the file: synchronous
//! positioned reads, asynchronous positioned reads (reserved for a future
//! `io_uring`/IOCP backend — today served the same way as `SyncRead`),
//! append-only writes behind a bounded pipeline, and a read-only memory map.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

#[cfg(unix)]
use std::os::unix::fs::{FileExt, OpenOptionsExt};

use blockgraph_core::{GraphError, IoMode, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use memmap2::Mmap;
use tracing::{debug, instrument, warn};

use crate::block::MetaBlock;

#[cfg(unix)]
const O_DIRECT: i32 = 0x4000;

enum WriteJob {
    Blocks { offset: u64, data: Vec<u8> },
    Stop,
}

struct WritePipeline {
    tx: Sender<WriteJob>,
    handle: Option<JoinHandle<std::io::Result<()>>>,
}

impl WritePipeline {
    fn spawn(file: File, queue_depth: usize) -> Self {
        let (tx, rx): (Sender<WriteJob>, Receiver<WriteJob>) = bounded(queue_depth);
        let handle = std::thread::spawn(move || -> std::io::Result<()> {
            let mut file = file;
            loop {
                match rx.recv() {
                    Ok(WriteJob::Blocks { offset, data }) => {
                        #[cfg(unix)]
                        {
                            file.write_all_at(&data, offset)?;
                        }
                        #[cfg(not(unix))]
                        {
                            use std::io::{Seek, SeekFrom};
                            file.seek(SeekFrom::Start(offset))?;
                            file.write_all(&data)?;
                        }
                    }
                    Ok(WriteJob::Stop) | Err(_) => break,
                }
            }
            file.flush()?;
            Ok(())
        });
        Self {
            tx,
            handle: Some(handle),
        }
    }

    fn submit(&self, offset: u64, data: Vec<u8>) -> Result<()> {
        self.tx
            .send(WriteJob::Blocks { offset, data })
            .map_err(|_| GraphError::InvalidState("write pipeline closed".into()))
    }

    fn finish(&mut self) -> Result<()> {
        let _ = self.tx.send(WriteJob::Stop);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| GraphError::InvalidState("write thread panicked".into()))??;
        }
        Ok(())
    }
}

/// Block-aligned reader/writer for one graph file.
pub struct Serializer {
    path: PathBuf,
    mode: IoMode,
    block_size: usize,
    file: Option<File>,
    mmap: Option<Arc<Mmap>>,
    writer: Option<WritePipeline>,
}

impl Serializer {
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn mode(&self) -> IoMode {
        self.mode
    }

    #[instrument(skip(path))]
    pub fn open<P: AsRef<Path>>(path: P, mode: IoMode, block_size: usize, queue_depth: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        match mode {
            IoMode::Write => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&path)?;
                let writer = WritePipeline::spawn(file.try_clone()?, queue_depth);
                Ok(Self {
                    path,
                    mode,
                    block_size,
                    file: Some(file),
                    mmap: None,
                    writer: Some(writer),
                })
            }
            IoMode::SyncRead | IoMode::AsyncRead => {
                let file = Self::open_read_file(&path)?;
                Ok(Self {
                    path,
                    mode,
                    block_size,
                    file: Some(file),
                    mmap: None,
                    writer: None,
                })
            }
            IoMode::InMemory => {
                let file = File::open(&path)?;
                let mmap = unsafe { Mmap::map(&file)? };
                debug!(bytes = mmap.len(), "mapped graph file");
                Ok(Self {
                    path,
                    mode,
                    block_size,
                    file: Some(file),
                    mmap: Some(Arc::new(mmap)),
                    writer: None,
                })
            }
        }
    }

    #[cfg(unix)]
    fn open_read_file(path: &Path) -> Result<File> {
        match OpenOptions::new().read(true).custom_flags(O_DIRECT).open(path) {
            Ok(f) => Ok(f),
            Err(_) => {
                warn!(path = %path.display(), "O_DIRECT rejected by filesystem, falling back to buffered reads");
                Ok(OpenOptions::new().read(true).open(path)?)
            }
        }
    }

    #[cfg(not(unix))]
    fn open_read_file(path: &Path) -> Result<File> {
        Ok(OpenOptions::new().read(true).open(path)?)
    }

    fn require_write_mode(&self) -> Result<()> {
        if self.mode != IoMode::Write {
            return Err(GraphError::InvalidState(
                "write requested on a serializer not opened in Write mode".into(),
            ));
        }
        Ok(())
    }

    pub fn write_meta(&self, meta: MetaBlock) -> Result<()> {
        self.require_write_mode()?;
        let bytes = meta.to_bytes(self.block_size);
        self.writer.as_ref().unwrap().submit(0, bytes)
    }

    /// `first_block_id` is relative to the start of the region following
    /// the meta block (callers add the vertex-block count for edge-block
    /// offsets).
    pub fn write_block(&self, first_block_id: u32, data: Vec<u8>) -> Result<()> {
        self.write_blocks(first_block_id, data, 1)
    }

    pub fn write_blocks(&self, first_block_id: u32, data: Vec<u8>, count: usize) -> Result<()> {
        self.require_write_mode()?;
        debug_assert_eq!(data.len(), count * self.block_size);
        let offset = self.block_size as u64 + (first_block_id as u64) * (self.block_size as u64);
        self.writer.as_ref().unwrap().submit(offset, data)
    }

    pub fn finish_write(&mut self) -> Result<()> {
        if let Some(w) = self.writer.as_mut() {
            w.finish()?;
        }
        Ok(())
    }

    pub fn read_meta(&self) -> Result<MetaBlock> {
        let mut buf = vec![0u8; self.block_size];
        self.read_raw(0, &mut buf)?;
        Ok(MetaBlock::from_bytes(&buf))
    }

    /// Reads one block at `block_id`, relative to the region following the
    /// meta block.
    pub fn read_block(&self, block_id: u32, buf: &mut [u8]) -> Result<()> {
        let offset = self.block_size as u64 + (block_id as u64) * (self.block_size as u64);
        self.read_raw(offset, buf)
    }

    pub fn read_blocks(&self, first_block_id: u32, count: usize, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), count * self.block_size);
        let offset = self.block_size as u64 + (first_block_id as u64) * (self.block_size as u64);
        self.read_raw(offset, buf)
    }

    fn read_raw(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if let Some(mmap) = &self.mmap {
            let end = offset as usize + buf.len();
            if end > mmap.len() {
                return Err(GraphError::Corruption(format!(
                    "read past end of mapped file: {}..{} > {}",
                    offset,
                    end,
                    mmap.len()
                )));
            }
            buf.copy_from_slice(&mmap[offset as usize..end]);
            return Ok(());
        }

        let file = self
            .file
            .as_ref()
            .ok_or_else(|| GraphError::InvalidState("serializer has no open file".into()))?;

        #[cfg(unix)]
        {
            file.read_exact_at(buf, offset).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    GraphError::Corruption(format!("short read at offset {offset}"))
                } else {
                    GraphError::Io(e)
                }
            })
        }
        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = file.try_clone()?;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(buf).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    GraphError::Corruption(format!("short read at offset {offset}"))
                } else {
                    GraphError::Io(e)
                }
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Serializer {
    fn drop(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{encode_edge_block, decode_edge_block};

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.bin");
        let block_size = 4096;

        {
            let mut sz = Serializer::open(&path, IoMode::Write, block_size, 8).unwrap();
            sz.write_meta(MetaBlock {
                num_nodes: 3,
                num_blocks: 2,
                num_vertex_blocks: 1,
                num_edge_blocks: 1,
            })
            .unwrap();
            let edges = encode_edge_block(&[1, 2, 3], block_size);
            sz.write_block(0, edges).unwrap();
            sz.finish_write().unwrap();
        }

        let sz = Serializer::open(&path, IoMode::SyncRead, block_size, 8).unwrap();
        let meta = sz.read_meta().unwrap();
        assert_eq!(meta.num_nodes, 3);

        let mut buf = vec![0u8; block_size];
        sz.read_block(0, &mut buf).unwrap();
        let decoded = decode_edge_block(&buf, block_size);
        assert_eq!(&decoded[0..3], &[1, 2, 3]);
    }

    #[test]
    fn in_memory_mode_reads_mapped_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.bin");
        let block_size = 4096;
        {
            let mut sz = Serializer::open(&path, IoMode::Write, block_size, 8).unwrap();
            sz.write_meta(MetaBlock {
                num_nodes: 1,
                num_blocks: 1,
                num_vertex_blocks: 0,
                num_edge_blocks: 1,
            })
            .unwrap();
            sz.write_block(0, encode_edge_block(&[42], block_size)).unwrap();
            sz.finish_write().unwrap();
        }

        let sz = Serializer::open(&path, IoMode::InMemory, block_size, 8).unwrap();
        let mut buf = vec![0u8; block_size];
        sz.read_block(0, &mut buf).unwrap();
        assert_eq!(u32::from_le_bytes(buf[0..4].try_into().unwrap()), 42);
    }

    #[test]
    fn short_read_past_end_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.bin");
        let block_size = 4096;
        {
            let mut sz = Serializer::open(&path, IoMode::Write, block_size, 8).unwrap();
            sz.write_meta(MetaBlock::default()).unwrap();
            sz.finish_write().unwrap();
        }
        let sz = Serializer::open(&path, IoMode::SyncRead, block_size, 8).unwrap();
        let mut buf = vec![0u8; block_size];
        let err = sz.read_block(5, &mut buf).unwrap_err();
        assert!(matches!(err, GraphError::Corruption(_)));
    }
}
