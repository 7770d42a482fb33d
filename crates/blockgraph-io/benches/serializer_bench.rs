use blockgraph_core::IoMode;
use blockgraph_io::block::{encode_edge_block, MetaBlock};
use blockgraph_io::Serializer;
use criterion::{criterion_group, criterion_main, Criterion};

fn build_fixture(block_size: usize, num_blocks: usize) -> (Serializer, tempfile::TempDir) {
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
    (sz, dir)
}

fn bench_sequential_read(c: &mut Criterion) {
    let (sz, _dir) = build_fixture(4096, 4096);
    let mut buf = vec![0u8; 4096];

    c.bench_function("serializer_sequential_read_block", |b| {
        let mut next = 0u32;
        b.iter(|| {
            sz.read_block(next % 4096, &mut buf).unwrap();
            next += 1;
            criterion::black_box(&buf);
        })
    });
}

fn bench_mmap_read(c: &mut Criterion) {
    let (sz, dir) = build_fixture(4096, 4096);
    drop(sz);
    let path = dir.path().join("graph.bin");
    let mapped = Serializer::open(&path, IoMode::InMemory, 4096, 64).unwrap();
    let mut buf = vec![0u8; 4096];

    c.bench_function("serializer_mmap_read_block", |b| {
        let mut next = 0u32;
        b.iter(|| {
            mapped.read_block(next % 4096, &mut buf).unwrap();
            next += 1;
            criterion::black_box(&buf);
        })
    });
}

criterion_group!(benches, bench_sequential_read, bench_mmap_read);
criterion_main!(benches);
