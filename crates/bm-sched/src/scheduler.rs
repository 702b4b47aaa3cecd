use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bm_tensor::{Affinity, BlockBackend, Element, Matrix, TensorError};
use rayon::prelude::*;

use crate::error::{Result, SchedError};
use crate::gauge::InFlight;
use crate::graph::{Task, TaskGraph};

/// How the scheduler groups task submissions between joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionMode {
    /// Join after every output block-row before starting the next one.
    RowSync,
    /// Submit the whole graph and join once at the end.
    #[default]
    Async,
}

impl ExecutionMode {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionMode::RowSync => "row-sync",
            ExecutionMode::Async => "async",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "row-sync" | "rowsync" | "sync" => Ok(ExecutionMode::RowSync),
            "async" => Ok(ExecutionMode::Async),
            other => Err(format!(
                "unknown execution mode '{}', expected row-sync or async",
                other
            )),
        }
    }
}

/// Counters from one or more `execute` calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Block tasks run.
    pub tasks: usize,
    /// Join points passed (one per wave).
    pub joins: usize,
    /// Highest number of outstanding tasks at any instant.
    pub peak_in_flight: usize,
}

impl SchedulerStats {
    /// Fold the counters of a later run into `self`.
    pub fn merge(&mut self, other: SchedulerStats) {
        self.tasks += other.tasks;
        self.joins += other.joins;
        self.peak_in_flight = self.peak_in_flight.max(other.peak_in_flight);
    }
}

/// One join scope: everything in a wave finishes before the next starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wave {
    /// The full k-chain of every output block at the storage indices in
    /// `blocks`. Chains run in parallel; each chain runs in `k` order.
    Chains { blocks: Range<usize> },
    /// Single tasks, each writing a different output block and submitted to
    /// a different slot.
    Batch(Vec<Task>),
}

impl Wave {
    /// Block tasks in this wave for a graph of the given depth.
    pub fn task_count(&self, depth: usize) -> usize {
        match self {
            Wave::Chains { blocks } => blocks.len() * depth,
            Wave::Batch(tasks) => tasks.len(),
        }
    }
}

type TaskFailure = (Task, TensorError);

/// Drives a [`TaskGraph`] over a [`BlockBackend`].
///
/// Work is submitted in [`Wave`]s, each joined before the next one starts.
/// A mode picks the join scopes: the whole graph (`Async`) or one output
/// block-row at a time (`RowSync`). Every output block has a lock, its
/// dependency token, so accumulations into one block never interleave.
///
/// Backends without a slot limit get one chain per output block, spread
/// over the rayon pool. A backend with `N` slots gets batches of at most
/// `N` tasks taken one k-layer at a time, so every task of a batch writes a
/// different output block; a remainder shorter than a batch is drained one
/// output block-row of the last layer at a time.
pub struct Scheduler<'b, T: Element> {
    backend: &'b dyn BlockBackend<T>,
    mode: ExecutionMode,
}

impl<'b, T: Element> Scheduler<'b, T> {
    pub fn new(backend: &'b dyn BlockBackend<T>, mode: ExecutionMode) -> Self {
        Scheduler { backend, mode }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn backend(&self) -> &'b dyn BlockBackend<T> {
        self.backend
    }

    /// The waves `execute` will submit for `graph`, in order. Generated
    /// lazily.
    pub fn plan(&self, graph: &TaskGraph) -> Box<dyn Iterator<Item = Wave>> {
        let graph = *graph;
        let n = graph.depth();
        let scopes: Box<dyn Iterator<Item = Range<usize>>> = match self.mode {
            ExecutionMode::RowSync => Box::new((0..n).map(move |i| i * n..(i + 1) * n)),
            ExecutionMode::Async => Box::new(std::iter::once(0..n * n)),
        };
        match self.backend.slots() {
            None => Box::new(scopes.map(|blocks| Wave::Chains { blocks })),
            Some(slots) => {
                Box::new(scopes.flat_map(move |blocks| bounded_waves(graph, blocks, slots)))
            }
        }
    }

    /// Run every task of `graph`, accumulating `a x b` into `c`.
    ///
    /// # Errors
    /// Fails if a matrix does not match the graph layout, or with the first
    /// backend failure. A failure stops the run: tasks not yet started are
    /// skipped and `c` is left partially updated.
    pub fn execute(
        &self,
        graph: &TaskGraph,
        a: &Matrix<T>,
        b: &Matrix<T>,
        c: &mut Matrix<T>,
    ) -> Result<SchedulerStats> {
        check_layout("A", graph, a)?;
        check_layout("B", graph, b)?;
        check_layout("C", graph, c)?;

        let backend = self.backend;
        tracing::debug!(
            backend = backend.name(),
            mode = %self.mode,
            slots = ?backend.slots(),
            tasks = graph.len(),
            "executing block task graph"
        );

        // One lock per output block; block n of C is cells[n].
        let cells: Vec<Mutex<&mut [T]>> = c.blocks_mut().map(Mutex::new).collect();
        let gauge = InFlight::new();
        let mut stats = SchedulerStats::default();

        for wave in self.plan(graph) {
            let outcome = match &wave {
                Wave::Chains { blocks } => {
                    self.run_chains(graph, blocks.clone(), &cells, a, b, &gauge)
                }
                Wave::Batch(tasks) => self.run_batch(graph, tasks, &cells, a, b, &gauge),
            };
            stats.joins += 1;

            if let Err((task, source)) = outcome {
                tracing::error!(
                    %task,
                    backend = backend.name(),
                    error = %source,
                    "block task failed"
                );
                return Err(SchedError::TaskFailed {
                    task,
                    backend: backend.name().to_string(),
                    source,
                });
            }
            stats.tasks += wave.task_count(graph.depth());
        }

        stats.peak_in_flight = gauge.peak();
        Ok(stats)
    }

    fn run_chains(
        &self,
        graph: &TaskGraph,
        blocks: Range<usize>,
        cells: &[Mutex<&mut [T]>],
        a: &Matrix<T>,
        b: &Matrix<T>,
        gauge: &InFlight,
    ) -> std::result::Result<(), TaskFailure> {
        let backend = self.backend;
        let block_size = graph.indexer().block_size();
        cells[blocks.clone()]
            .par_iter()
            .zip(blocks)
            .try_for_each(|(cell, block)| {
                let mut out = lock(cell);
                for task in graph.writers(block) {
                    let _guard = gauge.enter();
                    backend
                        .multiply_accumulate(
                            block_size,
                            a.block(task.a_block()),
                            b.block(task.b_block()),
                            &mut **out,
                            Affinity(block),
                        )
                        .map_err(|e| (task, e))?;
                }
                Ok(())
            })
    }

    fn run_batch(
        &self,
        graph: &TaskGraph,
        tasks: &[Task],
        cells: &[Mutex<&mut [T]>],
        a: &Matrix<T>,
        b: &Matrix<T>,
        gauge: &InFlight,
    ) -> std::result::Result<(), TaskFailure> {
        let backend = self.backend;
        let indexer = *graph.indexer();
        let block_size = indexer.block_size();
        let failure: Mutex<Option<TaskFailure>> = Mutex::new(None);
        let aborted = AtomicBool::new(false);

        rayon::scope(|s| {
            for (slot, &task) in tasks.iter().enumerate() {
                let guard = gauge.enter();
                let failure = &failure;
                let aborted = &aborted;
                s.spawn(move |_| {
                    let _guard = guard;
                    if aborted.load(Ordering::Acquire) {
                        return;
                    }
                    let mut out = lock(&cells[indexer.block_index(task.c_block())]);
                    let result = backend.multiply_accumulate(
                        block_size,
                        a.block(task.a_block()),
                        b.block(task.b_block()),
                        &mut **out,
                        Affinity(slot),
                    );
                    if let Err(e) = result {
                        aborted.store(true, Ordering::Release);
                        lock(failure).get_or_insert((task, e));
                    }
                });
            }
        });

        match failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(f) => Err(f),
            None => Ok(()),
        }
    }
}

/// Bounded batches over the output blocks `blocks`.
///
/// Tasks are taken k-layer by k-layer: position `p` is writer `p / width`
/// of block `blocks.start + p % width`. Any `slots` consecutive positions
/// with `slots <= width` name distinct output blocks. Full batches of
/// `slots` come first, then the remainder one output block-row at a time.
fn bounded_waves(
    graph: TaskGraph,
    blocks: Range<usize>,
    slots: usize,
) -> impl Iterator<Item = Wave> {
    let start = blocks.start;
    let width = blocks.len();
    let total = width * graph.depth();
    let slots = slots.clamp(1, width.max(1));
    let full = total - total % slots;
    let task_at = move |p: usize| graph.task(start + p % width, p / width);

    let batches = (0..full)
        .step_by(slots)
        .map(move |p| Wave::Batch((p..p + slots).map(task_at).collect()));

    let mut p = full;
    let tail = std::iter::from_fn(move || {
        if p >= total {
            return None;
        }
        let first = task_at(p);
        let row: Vec<Task> = (p..total)
            .map(task_at)
            .take_while(|t| t.k == first.k && t.i == first.i)
            .collect();
        p += row.len();
        Some(Wave::Batch(row))
    });

    batches.chain(tail)
}

fn check_layout<T: Element>(name: &'static str, graph: &TaskGraph, m: &Matrix<T>) -> Result<()> {
    let expected = graph.indexer();
    if m.indexer() != expected {
        return Err(SchedError::LayoutMismatch {
            name,
            size: m.size(),
            block_size: m.block_size(),
            expected_size: expected.size(),
            expected_block_size: expected.block_size(),
        });
    }
    Ok(())
}

fn lock<V>(m: &Mutex<V>) -> MutexGuard<'_, V> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
