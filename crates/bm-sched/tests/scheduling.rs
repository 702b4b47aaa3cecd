use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use bm_sched::{ExecutionMode, SchedError, Scheduler, TaskGraph};
use bm_tensor::{
    create_backend, Affinity, BackendKind, BlockBackend, BlockIndexer, Element, FillPattern,
    Matrix, TensorError,
};

/// Naive triple loop over global indices, computed in f64.
fn naive_product<T: Element>(a: &Matrix<T>, b: &Matrix<T>, c0: &Matrix<T>) -> Vec<f64> {
    let n = a.size();
    let mut out = vec![0.0; n * n];
    for r in 0..n {
        for c in 0..n {
            let mut sum = c0.get(r, c).to_f64();
            for p in 0..n {
                sum += a.get(r, p).to_f64() * b.get(p, c).to_f64();
            }
            out[r * n + c] = sum;
        }
    }
    out
}

fn run_case<T: Element>(kind: BackendKind, mode: ExecutionMode, size: usize, block: usize) {
    let a = Matrix::<T>::filled(size, block, &FillPattern::Random { seed: 1 }).unwrap();
    let b = Matrix::<T>::filled(size, block, &FillPattern::Random { seed: 2 }).unwrap();
    let c0 = Matrix::<T>::filled(size, block, &FillPattern::Random { seed: 3 }).unwrap();
    let mut c = c0.clone();

    let backend = create_backend::<T>(kind, block, 3).unwrap();
    let graph = TaskGraph::build(*a.indexer());
    Scheduler::new(backend.as_ref(), mode)
        .execute(&graph, &a, &b, &mut c)
        .unwrap();

    let expected = naive_product(&a, &b, &c0);
    for r in 0..size {
        for col in 0..size {
            assert_relative_eq!(
                c.get(r, col).to_f64(),
                expected[r * size + col],
                max_relative = 1e-4
            );
        }
    }
}

#[test]
fn test_every_backend_matches_naive_product_f64() {
    for kind in BackendKind::ALL {
        for mode in [ExecutionMode::Async, ExecutionMode::RowSync] {
            for size in [4, 8, 12, 20] {
                run_case::<f64>(kind, mode, size, 4);
            }
        }
    }
}

#[test]
fn test_every_backend_matches_naive_product_f32() {
    for kind in BackendKind::ALL {
        for mode in [ExecutionMode::Async, ExecutionMode::RowSync] {
            run_case::<f32>(kind, mode, 24, 8);
        }
    }
}

/// Backend that records how many calls overlap, and whether two overlapping
/// calls ever write the same output block.
#[derive(Debug)]
struct TrackingBackend {
    slots: Option<usize>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
    writing: Mutex<HashSet<usize>>,
    overlaps: AtomicUsize,
}

impl TrackingBackend {
    fn new(slots: Option<usize>) -> Self {
        TrackingBackend {
            slots,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            writing: Mutex::new(HashSet::new()),
            overlaps: AtomicUsize::new(0),
        }
    }
}

impl BlockBackend<f64> for TrackingBackend {
    fn name(&self) -> &str {
        "tracking"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Systolic
    }

    fn slots(&self) -> Option<usize> {
        self.slots
    }

    fn multiply_accumulate(
        &self,
        block_size: usize,
        a: &[f64],
        b: &[f64],
        c: &mut [f64],
        _affinity: Affinity,
    ) -> bm_tensor::Result<()> {
        let out = c.as_ptr() as usize;
        if !self.writing.lock().unwrap().insert(out) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        thread::sleep(Duration::from_millis(5));
        bm_tensor::CpuBackend.multiply_accumulate(block_size, a, b, c, Affinity(0))?;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.writing.lock().unwrap().remove(&out);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Run 16x16 in 4x4 blocks (16 output blocks, 64 tasks) on a four-thread
/// pool and return the backend for inspection.
fn run_tracked(slots: Option<usize>, mode: ExecutionMode) -> TrackingBackend {
    let indexer = BlockIndexer::new(16, 4).unwrap();
    assert_eq!(indexer.block_count(), 16);
    let a = Matrix::<f64>::filled(16, 4, &FillPattern::Constant(1.0)).unwrap();
    let b = Matrix::<f64>::filled(16, 4, &FillPattern::Constant(2.0)).unwrap();
    let mut c = Matrix::<f64>::zeros(16, 4).unwrap();
    let backend = TrackingBackend::new(slots);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .unwrap();
    let stats = pool
        .install(|| {
            Scheduler::<f64>::new(&backend, mode).execute(
                &TaskGraph::build(indexer),
                &a,
                &b,
                &mut c,
            )
        })
        .unwrap();

    assert_eq!(stats.tasks, 64);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 64);
    assert!(c.as_slice().iter().all(|&v| v == 2.0 * 16.0));
    if let Some(n) = slots {
        assert!(stats.peak_in_flight <= n);
    }
    backend
}

#[test]
fn test_bounded_slots_run_distinct_blocks_concurrently() {
    for mode in [ExecutionMode::Async, ExecutionMode::RowSync] {
        let backend = run_tracked(Some(4), mode);
        let max_active = backend.max_active.load(Ordering::SeqCst);
        assert_eq!(backend.overlaps.load(Ordering::SeqCst), 0, "{}", mode);
        assert!(max_active <= 4, "{}: {} in flight", mode, max_active);
        assert!(max_active > 1, "{}: batches ran serially", mode);
    }
}

#[test]
fn test_unbounded_async_runs_distinct_blocks_concurrently() {
    let backend = run_tracked(None, ExecutionMode::Async);
    assert_eq!(backend.overlaps.load(Ordering::SeqCst), 0);
    assert!(backend.max_active.load(Ordering::SeqCst) > 1);
}

#[test]
fn test_systolic_backend_peak_in_flight() {
    let a = Matrix::<f64>::filled(16, 4, &FillPattern::Constant(1.0)).unwrap();
    let b = Matrix::<f64>::filled(16, 4, &FillPattern::Constant(1.0)).unwrap();
    let mut c = Matrix::<f64>::zeros(16, 4).unwrap();
    let hw = create_backend::<f64>(BackendKind::Systolic, 4, 4).unwrap();
    let stats = Scheduler::new(hw.as_ref(), ExecutionMode::Async)
        .execute(&TaskGraph::build(*a.indexer()), &a, &b, &mut c)
        .unwrap();
    assert!(stats.peak_in_flight <= 4);
    assert_eq!(stats.joins, 16);
}

/// Backend that fails on its n-th call.
#[derive(Debug)]
struct FailingBackend {
    fail_at: usize,
    calls: AtomicUsize,
}

impl BlockBackend<f32> for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Reference
    }

    fn multiply_accumulate(
        &self,
        _block_size: usize,
        _a: &[f32],
        _b: &[f32],
        _c: &mut [f32],
        _affinity: Affinity,
    ) -> bm_tensor::Result<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_at {
            return Err(TensorError::Backend {
                backend: "failing".to_string(),
                message: "device unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[test]
fn test_backend_failure_is_fatal() {
    let a = Matrix::<f32>::zeros(8, 2).unwrap();
    let b = Matrix::<f32>::zeros(8, 2).unwrap();
    let mut c = Matrix::<f32>::zeros(8, 2).unwrap();
    let backend = FailingBackend {
        fail_at: 5,
        calls: AtomicUsize::new(0),
    };

    let err = Scheduler::<f32>::new(&backend, ExecutionMode::RowSync)
        .execute(&TaskGraph::build(*a.indexer()), &a, &b, &mut c)
        .unwrap_err();

    match err {
        SchedError::TaskFailed { backend, source, .. } => {
            assert_eq!(backend, "failing");
            assert!(source.to_string().contains("device unavailable"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // Row-sync stops at the end of the first row: 16 tasks, not 64.
    assert!(backend.calls.load(Ordering::SeqCst) <= 16);
}
