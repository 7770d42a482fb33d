use std::sync::Arc;

use blockgraph_cache::NormalCache;
use blockgraph_core::IoMode;
use blockgraph_io::block::{encode_edge_block, MetaBlock};
use blockgraph_io::Serializer;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

fn build_fixture(block_size: usize, num_blocks: usize) -> (Arc<Serializer>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.bin");
    {
        let mut w = Serializer::open(&path, IoMode::Write, block_size, 64).unwrap();
        w.write_meta(MetaBlock {
            num_nodes: 0,
            num_blocks: num_blocks as u32,
            num_vertex_blocks: 0,
            num_edge_blocks: num_blocks as u32,
        })
        .unwrap();
        for i in 0..num_blocks {
            w.write_block(i as u32, encode_edge_block(&[i as u32], block_size))
                .unwrap();
        }
        w.finish_write().unwrap();
    }
    let sz = Serializer::open(&path, IoMode::SyncRead, block_size, 64).unwrap();
    (Arc::new(sz), dir)
}

fn bench_hit_path(c: &mut Criterion) {
    let (sz, _dir) = build_fixture(4096, 64);
    let cache = NormalCache::new(64, 4096, sz);
    // Warm every slot once so the benchmark measures the lock-free hit
    // path, not the miss/fill path.
    for b in 0..64u32 {
        let s = cache.request_block(b);
        cache.get_cache_block(s, b).unwrap();
        cache.release_cache_block(s);
    }

    c.bench_function("normal_cache_hit_path", |bencher| {
        bencher.iter_batched(
            || 0u32,
            |b| {
                let s = cache.request_block(b);
                let _ = cache.get_cache_block(s, b).unwrap();
                cache.release_cache_block(s);
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_miss_path(c: &mut Criterion) {
    let (sz, _dir) = build_fixture(4096, 4096);
    let cache = NormalCache::new(16, 4096, sz);

    c.bench_function("normal_cache_miss_path", |bencher| {
        let mut next = 0u32;
        bencher.iter(|| {
            let b = next % 4096;
            next += 1;
            let s = cache.request_block(b);
            let _ = cache.get_cache_block(s, b).unwrap();
            cache.release_cache_block(s);
        })
    });
}

criterion_group!(benches, bench_hit_path, bench_miss_path);
criterion_main!(benches);
