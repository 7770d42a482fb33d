//! Thin facade over a `rayon` thread pool: parallel-for plus task spawn
//! and join. Engine code depends only on the two operations named here —
//! `parallel_for` and `spawn`+`wait` — not on `rayon` directly, so the
//! scheduling primitives in this crate have one place to change if the
//! underlying pool implementation ever does.

use rayon::{ThreadPool, ThreadPoolBuilder};

use blockgraph_core::PoolConfig;

/// A fixed-size worker pool servicing both range-chunked parallel-for
/// calls and individual task spawns.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// `num_threads = None` sizes the pool to the number of logical cores,
    /// the same default `PoolConfig` resolves to.
    pub fn new(num_threads: Option<usize>) -> Self {
        let n = num_threads.unwrap_or_else(num_cpus::get).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|i| format!("blockgraph-worker-{i}"))
            .build()
            .expect("failed to build worker thread pool");
        Self { pool }
    }

    /// Build from a [`PoolConfig`], the form callers load from
    /// configuration rather than passing a thread count directly.
    pub fn from_config(cfg: &PoolConfig) -> Self {
        Self::new(cfg.num_threads)
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Partition `[0, n)` into chunks (one per worker, at most) and run
    /// `f(lo, hi)` on each chunk concurrently; blocks until every chunk
    /// completes.
    pub fn parallel_for<F>(&self, n: usize, f: F)
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        if n == 0 {
            return;
        }
        let workers = self.pool.current_num_threads().max(1);
        let chunk = n.div_ceil(workers).max(1);
        self.pool.scope(|scope| {
            let mut lo = 0;
            while lo < n {
                let hi = (lo + chunk).min(n);
                let f = &f;
                scope.spawn(move |_| f(lo, hi));
                lo = hi;
            }
        });
    }

    /// Run a batch of independent closures to completion, each as its own
    /// task. Used by the DFS task-splitting primitive, where the set of
    /// tasks grows while the pool is running.
    pub fn spawn_and_wait<F>(&self, tasks: Vec<F>)
    where
        F: FnOnce() + Send,
    {
        self.pool.scope(|scope| {
            for task in tasks {
                scope.spawn(move |_| task());
            }
        });
    }

    /// Expose a scoped-spawn session on this specific pool. Used by the DFS
    /// task-splitter (`crate::dfs`), which needs to spawn further tasks
    /// from within an already-running task — `spawn_and_wait`'s flat `Vec`
    /// of tasks can't express that recursion.
    pub fn scope<'s, F, R>(&'s self, f: F) -> R
    where
        F: FnOnce(&rayon::Scope<'s>) -> R + Send,
        R: Send,
    {
        self.pool.scope(f)
    }

    /// Run `f` on the pool and return its result, useful for a single
    /// top-level task that itself spawns more work via `scope`.
    pub fn install<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(f)
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn parallel_for_covers_every_index_once() {
        let pool = WorkerPool::new(Some(4));
        let n = 1000;
        let seen = (0..n).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>();
        pool.parallel_for(n, |lo, hi| {
            for i in lo..hi {
                seen[i].fetch_add(1, Ordering::SeqCst);
            }
        });
        assert!(seen.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn parallel_for_on_empty_range_is_a_no_op() {
        let pool = WorkerPool::new(Some(2));
        pool.parallel_for(0, |_, _| panic!("should not run"));
    }
}
