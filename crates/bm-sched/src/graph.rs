use std::fmt;

use bm_tensor::{BlockCoord, BlockIndexer};

/// One block multiply: `C(i,j) += A(i,k) x B(k,j)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Task {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl Task {
    pub fn new(i: usize, j: usize, k: usize) -> Self {
        Task { i, j, k }
    }

    /// Block of A read by this task.
    pub fn a_block(&self) -> BlockCoord {
        BlockCoord::new(self.i, self.k)
    }

    /// Block of B read by this task.
    pub fn b_block(&self) -> BlockCoord {
        BlockCoord::new(self.k, self.j)
    }

    /// Block of C this task accumulates into; the dependency token.
    pub fn c_block(&self) -> BlockCoord {
        BlockCoord::new(self.i, self.j)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.i, self.j, self.k)
    }
}

/// Every block multiply of one `C += A x B`.
///
/// The graph is implicit: tasks are derived from the block geometry on
/// demand, so a small block size never means a large task list in memory.
/// Writers of the same output block depend on each other only through
/// accumulation order, which does not matter beyond rounding; they must
/// just never run at the same time.
#[derive(Debug, Clone, Copy)]
pub struct TaskGraph {
    indexer: BlockIndexer,
}

impl TaskGraph {
    pub fn build(indexer: BlockIndexer) -> Self {
        tracing::debug!(
            size = indexer.size(),
            block_size = indexer.block_size(),
            tasks = indexer.blocks_per_side().pow(3),
            "built block task graph"
        );
        TaskGraph { indexer }
    }

    /// The geometry this graph was built for.
    pub fn indexer(&self) -> &BlockIndexer {
        &self.indexer
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.indexer.blocks_per_side().pow(3)
    }

    /// Returns true if the graph holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct output blocks (dependency tokens).
    pub fn output_blocks(&self) -> usize {
        self.indexer.block_count()
    }

    /// k-contributions accumulated into each output block.
    pub fn depth(&self) -> usize {
        self.indexer.blocks_per_side()
    }

    /// The `k`-th writer of the output block at storage index `block`.
    pub fn task(&self, block: usize, k: usize) -> Task {
        let coord = self.indexer.coord(block);
        Task::new(coord.row, coord.col, k)
    }

    /// All tasks, `i` outermost and `k` innermost.
    pub fn tasks(&self) -> impl Iterator<Item = Task> + '_ {
        (0..self.output_blocks()).flat_map(move |block| self.writers(block))
    }

    /// The k-contributions to the output block at storage index `block`,
    /// in `k` order.
    pub fn writers(&self, block: usize) -> impl Iterator<Item = Task> + '_ {
        (0..self.depth()).map(move |k| self.task(block, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn graph(size: usize, block: usize) -> TaskGraph {
        TaskGraph::build(BlockIndexer::new(size, block).unwrap())
    }

    #[test]
    fn test_task_blocks() {
        let t = Task::new(1, 2, 3);
        assert_eq!(t.a_block(), BlockCoord::new(1, 3));
        assert_eq!(t.b_block(), BlockCoord::new(3, 2));
        assert_eq!(t.c_block(), BlockCoord::new(1, 2));
        assert_eq!(t.to_string(), "(1, 2, 3)");
    }

    #[test]
    fn test_enumerates_every_triple_once() {
        let g = graph(12, 4);
        assert_eq!(g.len(), 27);
        assert_eq!(g.output_blocks(), 9);
        let unique: HashSet<_> = g.tasks().collect();
        assert_eq!(unique.len(), 27);
    }

    #[test]
    fn test_tasks_in_ijk_order() {
        let g = graph(8, 4);
        let tasks: Vec<_> = g.tasks().collect();
        assert_eq!(tasks[0], Task::new(0, 0, 0));
        assert_eq!(tasks[1], Task::new(0, 0, 1));
        assert_eq!(tasks[2], Task::new(0, 1, 0));
        assert_eq!(tasks[7], Task::new(1, 1, 1));
    }

    #[test]
    fn test_writers_share_output_block() {
        let g = graph(12, 4);
        let coord = BlockCoord::new(2, 1);
        let block = g.indexer().block_index(coord);
        let writers: Vec<_> = g.writers(block).collect();
        assert_eq!(writers.len(), 3);
        for (k, t) in writers.iter().enumerate() {
            assert_eq!(t.c_block(), coord);
            assert_eq!(t.k, k);
        }
    }

    #[test]
    fn test_large_graph_is_not_materialised() {
        // 2048 / 8: 256 blocks per side, about 16.7M tasks.
        let g = graph(2048, 8);
        assert_eq!(g.len(), 256 * 256 * 256);
        assert_eq!(g.task(256 * 256 - 1, 255), Task::new(255, 255, 255));
    }

    #[test]
    fn test_single_block() {
        let g = graph(4, 4);
        assert_eq!(g.tasks().collect::<Vec<_>>(), vec![Task::new(0, 0, 0)]);
    }
}
