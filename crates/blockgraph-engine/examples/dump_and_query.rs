//! Builds a small edge list, dumps it to a temp file, reopens it, and
//! walks every vertex's neighbors — a smoke-test harness for the on-disk
//! format, run manually with `RUST_LOG=debug` to see the open/dump spans.

use blockgraph_core::IoMode;
use blockgraph_engine::{dump_graph_to_path, EdgeList, Graph};
use tracing::info;

fn main() -> blockgraph_core::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let mut edges = EdgeList::new();
    edges.init_nodes(6);
    for (s, d) in [(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0)] {
        edges.add_edge(s, d)?;
    }
    edges.finalize_edgelist();

    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("graph.bin");
    dump_graph_to_path(&path, &edges, 4096, 8)?;

    let graph = Graph::open(&path, IoMode::SyncRead, 4096, 8)?;
    for v in 0..graph.get_num_nodes() {
        let neighbors = graph.get_edges(v)?;
        info!(vertex = v, ?neighbors, "visited vertex");
    }
    Ok(())
}
