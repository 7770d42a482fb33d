//! First-fit bin-packer over edge-block remaining capacity.
//!
//! Used once, offline, while [`dump_graph`](blockgraph-engine) assigns
//! vertices to edge blocks: a max segment tree over `(remaining_capacity,
//! block_id)` leaves answers "leftmost block with room for k more edges" in
//! `O(log n)`. A max-heap would answer "some block with room" just as well,
//! but the leaf positions (block ids) are fixed ahead of time, which is
//! exactly what a segment tree over a static index space is for.

use blockgraph_core::BlockId;

const NONE: i64 = -1;

/// Leaf payload: how many edges still fit, and which block id owns the
/// leaf. A leaf with `capacity == 0` is still a valid (exhausted) leaf; a
/// leaf whose `block_id` is [`NONE`](self) has never been assigned one.
#[derive(Debug, Clone, Copy)]
struct Leaf {
    capacity: i64,
    block_id: i64,
}

/// Segment tree over edge-block remaining capacity, answering "leftmost
/// block id with at least `k` free entries" in `O(log num_leaves)`.
///
/// Internal nodes store the max capacity over their subtree; `query_first_larger`
/// descends left-first, so ties break toward the leftmost fitting leaf.
pub struct SegmentTree {
    num_leaves: usize,
    /// 1-indexed binary heap layout; `tree[1]` is the root, `tree[2*i]` and
    /// `tree[2*i+1]` are `i`'s children. Leaves occupy
    /// `[first_leaf, first_leaf + num_leaves)`.
    tree: Vec<i64>,
    leaves: Vec<Leaf>,
    first_leaf: usize,
    /// Index of the next leaf `register` will claim. Leaves are only ever
    /// claimed in increasing order, so this is a monotonic counter rather
    /// than a scan for an unassigned slot.
    next_free: usize,
}

impl SegmentTree {
    /// Build a tree with `num_leaves` leaves, each starting at
    /// `initial_capacity` and with no block assigned.
    pub fn new(num_leaves: usize, initial_capacity: usize) -> Self {
        let num_leaves = num_leaves.max(1);
        let mut size = 1usize;
        while size < num_leaves {
            size *= 2;
        }
        let first_leaf = size;
        let mut tree = vec![0i64; 2 * size];
        let leaves = vec![
            Leaf {
                capacity: initial_capacity as i64,
                block_id: NONE,
            };
            num_leaves
        ];

        for i in 0..num_leaves {
            tree[first_leaf + i] = initial_capacity as i64;
        }
        // Leaves beyond num_leaves (padding to a power of two) stay at 0,
        // i.e. never selected by query_first_larger(k) for k >= 1.
        for i in (1..first_leaf).rev() {
            tree[i] = tree[2 * i].max(tree[2 * i + 1]);
        }

        Self {
            num_leaves,
            tree,
            leaves,
            first_leaf,
            next_free: 0,
        }
    }

    /// Leftmost leaf index whose remaining capacity is `>= k`, or `None`
    /// if every leaf has less than `k` free entries.
    pub fn query_first_larger(&self, k: usize) -> Option<(usize, BlockId)> {
        if k == 0 {
            // Every leaf has capacity >= 0; leftmost leaf wins trivially.
            return self.leaf_at(self.first_leaf_index());
        }
        let k = k as i64;
        if self.tree[1] < k {
            return None;
        }
        let mut node = 1usize;
        while node < self.first_leaf {
            let left = 2 * node;
            if self.tree[left] >= k {
                node = left;
            } else {
                node = left + 1;
            }
        }
        let leaf_idx = node - self.first_leaf;
        self.leaf_at(leaf_idx)
    }

    fn first_leaf_index(&self) -> usize {
        0
    }

    fn leaf_at(&self, leaf_idx: usize) -> Option<(usize, BlockId)> {
        if leaf_idx >= self.num_leaves {
            return None;
        }
        let leaf = self.leaves[leaf_idx];
        if leaf.block_id == NONE {
            return None;
        }
        Some((leaf_idx, leaf.block_id as BlockId))
    }

    /// Assign (or re-assign) a leaf's remaining capacity and owning block
    /// id, then re-maintain ancestor maxes up to the root.
    pub fn update(&mut self, leaf_idx: usize, new_capacity: usize, block_id: BlockId) {
        debug_assert!(leaf_idx < self.num_leaves);
        self.leaves[leaf_idx] = Leaf {
            capacity: new_capacity as i64,
            block_id: block_id as i64,
        };
        let mut node = self.first_leaf + leaf_idx;
        self.tree[node] = new_capacity as i64;
        while node > 1 {
            node /= 2;
            self.tree[node] = self.tree[2 * node].max(self.tree[2 * node + 1]);
        }
    }

    /// Register a fresh leaf (a newly allocated edge block) with `capacity`
    /// remaining entries, without requiring the caller to have pre-sized
    /// `new` for it. Panics if the tree has no unassigned leaf slots left;
    /// callers must size `num_leaves` generously enough to admit the
    /// worst-case number of edge blocks a dump can produce.
    pub fn register(&mut self, block_id: BlockId, capacity: usize) -> usize {
        let leaf_idx = self.next_free;
        assert!(leaf_idx < self.num_leaves, "segment tree sized below worst-case leaf count");
        self.next_free += 1;
        tracing::trace!(block_id, capacity, leaf_idx, "registered new edge block leaf");
        self.update(leaf_idx, capacity, block_id);
        leaf_idx
    }
}
