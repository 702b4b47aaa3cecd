use bm_check::{block_expectations, host_product, CheckReport, ReferenceKey, Verifier};
use bm_sched::{Scheduler, SchedulerStats, TaskGraph};
use bm_tensor::{
    create_backend, Affinity, BackendKind, BlockBackend, DType, Element, Matrix, UnitStats,
};

use crate::config::{BenchConfig, CheckMode};
use crate::error::{BenchError, Result};
use crate::report::{ExitStatus, Report};
use crate::timing::{Phase, Timings};

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome<T> {
    /// Final contents of C.
    pub result: Matrix<T>,
    pub backend: String,
    pub timings: Timings,
    pub stats: SchedulerStats,
    /// Per-instance counters, for backends that model device instances.
    pub units: Option<Vec<UnitStats>>,
    /// `None` when checking was disabled.
    pub check: Option<CheckReport>,
}

impl<T> RunOutcome<T> {
    /// True unless a check ran and found a violation.
    pub fn passed(&self) -> bool {
        self.check.as_ref().map_or(true, |r| r.passed)
    }

    pub fn status(&self) -> ExitStatus {
        if self.passed() {
            ExitStatus::Ok
        } else {
            ExitStatus::CheckFailed
        }
    }
}

/// Multiply two `matrix_size` f64 matrices in `block_size` blocks on
/// `backend` and verify the result with `check`.
///
/// Inputs use the default ramp fill. Returns C and whether it passed.
///
/// # Errors
/// Any precondition, allocation or backend failure. A tolerance violation
/// is not an error; it shows up as `false`.
pub fn run(
    matrix_size: usize,
    block_size: usize,
    backend: BackendKind,
    check: CheckMode,
) -> Result<(Matrix<f64>, bool)> {
    let config = BenchConfig {
        backend,
        check,
        ..BenchConfig::new(matrix_size, block_size)
    };
    let outcome = run_config::<f64>(&config)?;
    let passed = outcome.passed();
    Ok((outcome.result, passed))
}

/// Run `config` with the element type it names and summarize the outcome.
pub fn run_report(config: &BenchConfig) -> Result<Report> {
    match config.dtype {
        DType::F32 => run_config::<f32>(config).map(|o| Report::new(config, &o)),
        DType::F64 => run_config::<f64>(config).map(|o| Report::new(config, &o)),
    }
}

/// Run one benchmark: init, warm-up, execution, flush and check.
///
/// Every precondition, including the presence of a reference record, is
/// checked before the first block task is submitted.
pub fn run_config<T: Element>(config: &BenchConfig) -> Result<RunOutcome<T>> {
    if T::DTYPE != config.dtype {
        return Err(BenchError::InvalidConfig(format!(
            "config asks for {} but the run was started with {}",
            config.dtype,
            T::DTYPE
        )));
    }
    let indexer = config.validate()?;
    let (size, bs) = (indexer.size(), indexer.block_size());
    let key = ReferenceKey::new(T::DTYPE, size, bs, config.repetitions);
    if let CheckMode::Reference(store) = &config.check {
        store.require(&key)?;
    }

    let backend = create_backend::<T>(config.backend, bs, config.instances)?;
    tracing::info!(
        backend = backend.name(),
        mode = %config.mode,
        dtype = %T::DTYPE,
        matrix_size = size,
        block_size = bs,
        repetitions = config.repetitions,
        "starting run"
    );

    let mut timings = Timings::default();
    let (a, b, mut c, graph) = timings.time(Phase::Init, || -> Result<_> {
        let a = Matrix::<T>::filled(size, bs, &config.inputs.a)?;
        let b = Matrix::<T>::filled(size, bs, &config.inputs.b)?;
        let c = Matrix::<T>::filled(size, bs, &config.inputs.c)?;
        Ok((a, b, c, TaskGraph::build(indexer)))
    })?;

    if config.warmup {
        timings.time(Phase::WarmUp, || warm_up(backend.as_ref(), bs))?;
    }

    let scheduler = Scheduler::new(backend.as_ref(), config.mode);
    let stats = timings.time(Phase::Execution, || -> Result<_> {
        let mut stats = SchedulerStats::default();
        for _ in 0..config.repetitions {
            stats.merge(scheduler.execute(&graph, &a, &b, &mut c)?);
        }
        Ok(stats)
    })?;

    timings.time(Phase::Flush, || backend.flush())?;
    let units = backend.unit_stats();

    let check = timings.time(Phase::Check, || check_result(config, &key, &a, &b, &c))?;
    if let Some(report) = &check {
        if report.passed {
            tracing::info!(blocks = report.blocks_checked, "result check passed");
        } else {
            tracing::error!(
                failing_blocks = report.mismatches.len(),
                "result check failed"
            );
        }
    }

    Ok(RunOutcome {
        result: c,
        backend: backend.name().to_string(),
        timings,
        stats,
        units,
        check,
    })
}

/// One block multiply on scratch operands, outside the timed execution.
fn warm_up<T: Element>(backend: &dyn BlockBackend<T>, block_size: usize) -> Result<()> {
    let len = block_size * block_size;
    let a = vec![T::one(); len];
    let b = vec![T::one(); len];
    let mut c = vec![T::zero(); len];
    backend.multiply_accumulate(block_size, &a, &b, &mut c, Affinity(0))?;
    Ok(())
}

fn check_result<T: Element>(
    config: &BenchConfig,
    key: &ReferenceKey,
    a: &Matrix<T>,
    b: &Matrix<T>,
    c: &Matrix<T>,
) -> Result<Option<CheckReport>> {
    let verifier = Verifier::new(config.tolerance);
    let report = match &config.check {
        CheckMode::Disabled => {
            tracing::warn!("result checking disabled");
            return Ok(None);
        }
        CheckMode::Analytic => {
            let inputs = &config.inputs;
            match block_expectations(c.indexer(), &inputs.a, &inputs.b, &inputs.c, config.repetitions) {
                Some(values) => verifier.check_block_values(c, &values)?,
                None => {
                    let c0 = Matrix::<T>::filled(c.size(), c.block_size(), &inputs.c)?;
                    let expected = host_product(a, b, &c0, config.repetitions)?;
                    verifier.check_matrix(c, &expected)?
                }
            }
        }
        CheckMode::Reference(store) => verifier.check_reference(c, store, key)?,
        CheckMode::Generate(store) => {
            let path = store.save(key, c)?;
            CheckReport::generated(path, c.indexer().block_count())
        }
    };
    Ok(Some(report))
}
