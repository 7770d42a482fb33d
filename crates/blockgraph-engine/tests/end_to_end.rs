//! End-to-end scenarios. These drive the engine with
//! small inline BFS/WCC loops built on `process_queue` — full algorithm
//! drivers are out of scope for this crate, but the engine's contract is
//! only testable by actually running something over it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use blockgraph_core::{CacheMode, CacheSize, IoMode};
use blockgraph_engine::{dump_graph_to_path, EdgeList, Graph};

const BLOCK_SIZE: usize = 4096;

fn open_graph(dir: &std::path::Path, edges: &EdgeList) -> Graph {
    let path = dir.join("graph.bin");
    dump_graph_to_path(&path, edges, BLOCK_SIZE, 8).unwrap();
    Graph::open(path, IoMode::SyncRead, BLOCK_SIZE, 8).unwrap()
}

fn bfs(graph: &Graph, start: u32) -> HashSet<u32> {
    let mut visited: HashSet<u32> = [start].into_iter().collect();
    let mut frontier = vec![start];
    while !frontier.is_empty() {
        let discovered = graph
            .process_queue(&frontier, |_v, w, next_private| next_private.push(w))
            .unwrap();
        frontier = discovered.into_iter().filter(|w| visited.insert(*w)).collect();
    }
    visited
}

/// Weakly connected components via repeated label propagation to the
/// minimum neighbor label, run to a fixed point. Single-threaded in the
/// sense that there's one frontier per round, though each round itself
/// parallelizes across the worker pool.
fn wcc_component_count(graph: &Graph) -> usize {
    let n = graph.get_num_nodes();
    let labels: Vec<AtomicU32> = (0..n).map(|i| AtomicU32::new(i)).collect();
    let mut frontier: Vec<u32> = (0..n).collect();

    loop {
        let changed = graph
            .process_queue_staged::<_, _, Option<u32>, _, _>(
                &frontier,
                |_v| true,
                |_v, w, acc| {
                    let w_label = labels[w as usize].load(Ordering::Acquire);
                    *acc = Some(acc.map_or(w_label, |a| a.min(w_label)));
                },
                |v, acc| {
                    let my_label = labels[v as usize].load(Ordering::Acquire);
                    let candidate = acc.map_or(my_label, |a| a.min(my_label));
                    if candidate < my_label {
                        labels[v as usize].store(candidate, Ordering::Release);
                        Some(candidate as f64)
                    } else {
                        None
                    }
                },
                |v, _value, next_private| next_private.push(v),
            )
            .unwrap();

        if changed.is_empty() {
            break;
        }
        // Re-activate neighbors of anything that changed, not just the
        // changed vertices themselves, so a label can keep propagating.
        let mut next_frontier = HashSet::new();
        for v in &changed {
            next_frontier.insert(*v);
            for w in graph.get_edges(*v).unwrap() {
                next_frontier.insert(w);
            }
        }
        frontier = next_frontier.into_iter().collect();
    }

    let mut distinct: HashSet<u32> = HashSet::new();
    for i in 0..n {
        distinct.insert(labels[i as usize].load(Ordering::Acquire));
    }
    distinct.len()
}

#[test]
fn triangle_neighbors_and_single_component() {
    let mut edges = EdgeList::new();
    edges.init_nodes(3);
    for (s, d) in [(0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1)] {
        edges.add_edge(s, d).unwrap();
    }
    edges.finalize_edgelist();

    let dir = tempfile::tempdir().unwrap();
    let graph = open_graph(dir.path(), &edges);

    let mut neighbors_of_0 = graph.get_edges(0).unwrap();
    neighbors_of_0.sort_unstable();
    assert_eq!(neighbors_of_0, vec![1, 2]);

    assert_eq!(wcc_component_count(&graph), 1);
}

#[test]
fn two_disjoint_edges_two_components_and_bfs_reach() {
    let mut edges = EdgeList::new();
    edges.init_nodes(4);
    for (s, d) in [(0, 1), (1, 0), (2, 3), (3, 2)] {
        edges.add_edge(s, d).unwrap();
    }
    edges.finalize_edgelist();

    let dir = tempfile::tempdir().unwrap();
    let graph = open_graph(dir.path(), &edges);

    assert_eq!(wcc_component_count(&graph), 2);

    let mut reached: Vec<u32> = bfs(&graph, 0).into_iter().collect();
    reached.sort_unstable();
    assert_eq!(reached, vec![0, 1]);
}

#[test]
fn degree_zero_vertex_has_no_edges() {
    let mut edges = EdgeList::new();
    edges.init_nodes(2);
    edges.add_edge(0, 1).unwrap();
    edges.finalize_edgelist();

    let dir = tempfile::tempdir().unwrap();
    let graph = open_graph(dir.path(), &edges);

    assert_eq!(graph.get_degree(1).unwrap(), 0);
    assert!(graph.get_edges(1).unwrap().is_empty());
}

#[test]
fn concurrent_bfs_is_deterministic_across_runs() {
    let mut edges = EdgeList::new();
    let n = 2000usize;
    edges.init_nodes(n);
    for v in 0..n as u32 {
        edges.add_edge(v, (v + 1) % n as u32).unwrap();
        edges.add_edge(v, (v + 7) % n as u32).unwrap();
    }
    edges.finalize_edgelist();

    let dir = tempfile::tempdir().unwrap();
    let mut graph = open_graph(dir.path(), &edges);
    graph.set_thread_pool_size(64);
    graph.set_cache_size(CacheSize::Slots(8));
    graph.set_cache_mode(CacheMode::Normal);

    let first = bfs(&graph, 0).len();
    graph.clear_cache();
    let second = bfs(&graph, 0).len();
    assert_eq!(first, second);
    assert_eq!(first, n);
}
