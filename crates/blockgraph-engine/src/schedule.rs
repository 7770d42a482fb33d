//! Frontier-processing schedules: vertex-parallel (`process_queue`) and
//! edge-block-parallel (`process_queue_in_blocks`), both driven by
//! [`crate::pool::WorkerPool`].

use std::collections::HashMap;
use parking_lot::Mutex;

use blockgraph_core::{GraphError, Result, VertexId};

use crate::engine::Graph;

/// First error observed by any worker in a scheduling pass, if any. The
/// engine does not cancel sibling tasks on error (cancellation and early
/// exit is an algorithm-level concern via `is_found`); a scheduling pass
/// instead drains fully and then surfaces the first failure it saw.
struct FirstError(Mutex<Option<GraphError>>);

impl FirstError {
    fn new() -> Self {
        Self(Mutex::new(None))
    }

    fn record(&self, err: GraphError) {
        let mut slot = self.0.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn into_result(self) -> Result<()> {
        match self.0.into_inner() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Graph {
    /// Vertex-parallel schedule: partition `frontier` across the worker
    /// pool; each worker calls `get_edges(v)` for its assigned vertices and
    /// invokes `update(v, w, &mut next_private)` for every neighbor `w`.
    /// Per-worker `next_private` buffers are appended to the returned
    /// frontier under a single mutex once the worker's chunk is done.
    pub fn process_queue<F>(&self, frontier: &[VertexId], update: F) -> Result<Vec<VertexId>>
    where
        F: Fn(VertexId, VertexId, &mut Vec<VertexId>) + Sync,
    {
        let next = Mutex::new(Vec::new());
        let errors = FirstError::new();

        self.pool().parallel_for(frontier.len(), |lo, hi| {
            let mut private = Vec::new();
            for v in &frontier[lo..hi] {
                match self.get_edges(*v) {
                    Ok(edges) => {
                        for w in edges {
                            update(*v, w, &mut private);
                        }
                    }
                    Err(e) => errors.record(e),
                }
            }
            next.lock().extend(private);
        });

        errors.into_result()?;
        Ok(next.into_inner())
    }

    /// Overload for algorithms that need a pre-pass over a vertex's
    /// neighbors before deciding whether it activates for the next
    /// frontier (e.g. PageRank: sum neighbor contributions, then compare
    /// against a threshold). `ready(v)` filters which frontier members run
    /// at all; `compute(v, w, &mut acc)` folds each neighbor into an
    /// accumulator; `finish(v, acc)` turns the accumulator into this
    /// vertex's new value and decides whether it activates; `update(v,
    /// value, &mut next_private)` records the activation.
    #[allow(clippy::too_many_arguments)]
    pub fn process_queue_staged<R, C, Acc, Fin, U>(
        &self,
        frontier: &[VertexId],
        ready: R,
        compute: C,
        finish: Fin,
        update: U,
    ) -> Result<Vec<VertexId>>
    where
        R: Fn(VertexId) -> bool + Sync,
        Acc: Default,
        C: Fn(VertexId, VertexId, &mut Acc) + Sync,
        Fin: Fn(VertexId, Acc) -> Option<f64> + Sync,
        U: Fn(VertexId, f64, &mut Vec<VertexId>) + Sync,
    {
        let next = Mutex::new(Vec::new());
        let errors = FirstError::new();

        self.pool().parallel_for(frontier.len(), |lo, hi| {
            let mut private = Vec::new();
            for v in &frontier[lo..hi] {
                if !ready(*v) {
                    continue;
                }
                let mut acc = Acc::default();
                match self.get_edges(*v) {
                    Ok(edges) => {
                        for w in edges {
                            compute(*v, w, &mut acc);
                        }
                        if let Some(value) = finish(*v, acc) {
                            update(*v, value, &mut private);
                        }
                    }
                    Err(e) => errors.record(e),
                }
            }
            next.lock().extend(private);
        });

        errors.into_result()?;
        Ok(next.into_inner())
    }

    /// Edge-block-parallel schedule: group `frontier` by the edge block
    /// each vertex's fetch would land on, then process
    /// each group together on one worker with a single `SimpleCache`
    /// reservation sized to the group, so every active edge block is read
    /// at most once this iteration.
    pub fn process_queue_in_blocks<F>(&self, frontier: &[VertexId], update: F) -> Result<Vec<VertexId>>
    where
        F: Fn(VertexId, &[u32], &mut Vec<VertexId>) + Sync,
    {
        let mut groups: HashMap<u32, Vec<VertexId>> = HashMap::new();
        for &v in frontier {
            let block = self.owning_block(v)?;
            groups.entry(block).or_default().push(v);
        }

        let next = Mutex::new(Vec::new());
        let errors = FirstError::new();
        let entries: Vec<(u32, Vec<VertexId>)> = groups.into_iter().collect();

        let tasks: Vec<_> = entries
            .into_iter()
            .map(|(block, members)| {
                let next = &next;
                let errors = &errors;
                let update = &update;
                move || {
                    let mut private = Vec::new();
                    match self.get_edges_grouped(block, &members) {
                        Ok(per_vertex) => {
                            for (v, neighbors) in members.iter().zip(per_vertex.iter()) {
                                update(*v, neighbors, &mut private);
                            }
                        }
                        Err(e) => errors.record(e),
                    }
                    next.lock().extend(private);
                }
            })
            .collect();

        self.pool().spawn_and_wait(tasks);
        errors.into_result()?;
        Ok(next.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::{dump_graph_to_path, EdgeList};
    use blockgraph_core::IoMode;

    fn small_graph(dir: &std::path::Path) -> Graph {
        let block_size = 4096;
        let mut edges = EdgeList::new();
        edges.init_nodes(4);
        for (s, d) in [(0u32, 1u32), (1, 0), (2, 3), (3, 2)] {
            edges.add_edge(s, d).unwrap();
        }
        edges.finalize_edgelist();
        dump_graph_to_path(dir.join("graph.bin"), &edges, block_size, 8).unwrap();
        Graph::open(dir.join("graph.bin"), IoMode::SyncRead, block_size, 8).unwrap()
    }

    #[test]
    fn process_queue_discovers_bfs_frontier() {
        let dir = tempfile::tempdir().unwrap();
        let graph = small_graph(dir.path());
        let frontier = vec![0u32];
        let next = graph
            .process_queue(&frontier, |_v, w, next_private| next_private.push(w))
            .unwrap();
        assert_eq!(next, vec![1]);
    }

    #[test]
    fn process_queue_in_blocks_matches_process_queue() {
        let dir = tempfile::tempdir().unwrap();
        let graph = small_graph(dir.path());
        let frontier = vec![0u32, 2u32];

        let a = graph
            .process_queue(&frontier, |_v, w, next_private| next_private.push(w))
            .unwrap();
        let mut a_sorted = a.clone();
        a_sorted.sort_unstable();

        let mut b = graph
            .process_queue_in_blocks(&frontier, |_v, neighbors, next_private| {
                next_private.extend_from_slice(neighbors)
            })
            .unwrap();
        b.sort_unstable();

        assert_eq!(a_sorted, b);
    }
}
