//! Parallel DFS via task-splitting stacks. DFS is not
//! level-synchronous, so it gets its own primitive rather than reusing
//! [`crate::schedule`]'s frontier schedules: a worker owns a local stack,
//! and splits it in half into a fresh task only when the stack grows past
//! a threshold *and* a global token budget allows another concurrent task.

use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use parking_lot::Mutex;

use blockgraph_core::{GraphError, Result, VertexId};

use crate::engine::Graph;
use crate::pool::WorkerPool;

/// Bounded-parallelism DFS runner. Construct once per search; `run` blocks
/// until every spawned task has drained or `is_found`/an error short-circuits
/// the walk.
pub struct DfsStackSplitter<'g> {
    graph: &'g Graph,
    visited: Vec<AtomicBool>,
    is_found: AtomicBool,
    free_tokens: AtomicIsize,
    max_stack_size: usize,
    error: Mutex<Option<GraphError>>,
}

impl<'g> DfsStackSplitter<'g> {
    /// `max_stack_size` is the per-worker stack depth past which a task
    /// tries to shed work; `max_tasks` bounds how many concurrent DFS
    /// tasks may exist at once (the root task consumes one token).
    pub fn new(graph: &'g Graph, max_stack_size: usize, max_tasks: usize) -> Self {
        let num_nodes = graph.get_num_nodes() as usize;
        Self {
            graph,
            visited: (0..num_nodes).map(|_| AtomicBool::new(false)).collect(),
            is_found: AtomicBool::new(false),
            free_tokens: AtomicIsize::new(max_tasks.max(1) as isize),
            max_stack_size: max_stack_size.max(1),
            error: Mutex::new(None),
        }
    }

    /// Walk the graph depth-first from `start`, calling `visit(v)` exactly
    /// once per first-discovered vertex. `visit` returns `true` to signal
    /// the search is done (e.g. target found); every task polls the shared
    /// flag and exits quickly once set, following the engine's
    /// cancellation model (no per-task cancellation, just a shared atomic
    /// other tasks observe on their own schedule).
    pub fn run<F>(&self, pool: &WorkerPool, start: VertexId, visit: F) -> Result<bool>
    where
        F: Fn(VertexId) -> bool + Sync,
    {
        self.try_claim_token();
        pool.scope(|scope| {
            self.spawn_task(scope, vec![start], &visit);
        });

        if let Some(e) = self.error.lock().take() {
            return Err(e);
        }
        Ok(self.is_found.load(Ordering::Acquire))
    }

    fn try_claim_token(&self) -> bool {
        loop {
            let cur = self.free_tokens.load(Ordering::Acquire);
            if cur <= 0 {
                return false;
            }
            if self
                .free_tokens
                .compare_exchange_weak(cur, cur - 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn spawn_task<'s, F>(&'s self, scope: &rayon::Scope<'s>, stack: Vec<VertexId>, visit: &'s F)
    where
        F: Fn(VertexId) -> bool + Sync + 's,
    {
        scope.spawn(move |scope| {
            self.run_local(scope, stack, visit);
        });
    }

    fn run_local<'s, F>(&'s self, scope: &rayon::Scope<'s>, mut stack: Vec<VertexId>, visit: &'s F)
    where
        F: Fn(VertexId) -> bool + Sync + 's,
    {
        while let Some(v) = stack.pop() {
            if self.is_found.load(Ordering::Acquire) {
                return;
            }
            if self.visited[v as usize].swap(true, Ordering::AcqRel) {
                continue;
            }
            if visit(v) {
                self.is_found.store(true, Ordering::Release);
                return;
            }
            match self.graph.get_edges(v) {
                Ok(edges) => stack.extend(edges),
                Err(e) => {
                    let mut slot = self.error.lock();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    self.is_found.store(true, Ordering::Release);
                    return;
                }
            }

            if stack.len() > self.max_stack_size && self.try_claim_token() {
                let mid = stack.len() / 2;
                let upper = stack.split_off(mid);
                self.spawn_task(scope, upper, visit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::{dump_graph_to_path, EdgeList};
    use blockgraph_core::IoMode;
    use std::sync::atomic::AtomicUsize;

    fn chain_graph(dir: &std::path::Path, n: usize) -> Graph {
        let block_size = 4096;
        let mut edges = EdgeList::new();
        edges.init_nodes(n);
        for v in 0..(n - 1) as VertexId {
            edges.add_edge(v, v + 1).unwrap();
        }
        edges.finalize_edgelist();
        dump_graph_to_path(dir.join("graph.bin"), &edges, block_size, 8).unwrap();
        Graph::open(dir.join("graph.bin"), IoMode::SyncRead, block_size, 8).unwrap()
    }

    #[test]
    fn visits_every_reachable_vertex_once() {
        let dir = tempfile::tempdir().unwrap();
        let graph = chain_graph(dir.path(), 50);
        let pool = WorkerPool::new(Some(4));
        let splitter = DfsStackSplitter::new(&graph, 4, 8);
        let visited = AtomicUsize::new(0);

        let found = splitter
            .run(&pool, 0, |_v| {
                visited.fetch_add(1, Ordering::SeqCst);
                false
            })
            .unwrap();

        assert!(!found);
        assert_eq!(visited.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn stops_early_once_target_found() {
        let dir = tempfile::tempdir().unwrap();
        let graph = chain_graph(dir.path(), 50);
        let pool = WorkerPool::new(Some(4));
        let splitter = DfsStackSplitter::new(&graph, 4, 8);

        let found = splitter.run(&pool, 0, |v| v == 10).unwrap();
        assert!(found);
    }
}
