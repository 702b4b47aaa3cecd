//! `blockmm` - run one blocked matrix multiply benchmark.
//!
//! ```bash
//! # 2048x2048 in 128x128 blocks on the reference loop, analytic check
//! blockmm
//!
//! # Systolic backend with 4 instances, record a reference, then verify it
//! blockmm --backend systolic --check generate --reference-dir refs
//! blockmm --backend systolic --check reference --reference-dir refs
//! ```
//!
//! Exit status: 0 when the result verified (or checking is disabled),
//! 1 when it was out of tolerance, 2 when the run could not complete.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use bm_bench::{BenchConfig, CheckMode, ExitStatus, Inputs};
use bm_check::Tolerance;
use bm_sched::ExecutionMode;
use bm_tensor::{BackendKind, DType};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CheckArg {
    None,
    Analytic,
    Reference,
    Generate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FillArg {
    /// A block l = 587 + l, B block l = 437 - l, C = 0
    Ramp,
    /// A = 587, B = 437, C = 0
    Constant,
    /// Seeded uniform values in [0, 1)
    Random,
}

/// Blocked dense matrix multiply benchmark
#[derive(Parser, Debug)]
#[command(name = "blockmm")]
#[command(version)]
struct Args {
    /// Matrix dimension in elements
    #[arg(short = 'm', long, default_value_t = 2048)]
    matrix_size: usize,

    /// Block dimension in elements; must divide the matrix size
    #[arg(short = 'b', long, default_value_t = 128)]
    block_size: usize,

    /// Element type (f32 or f64)
    #[arg(long, default_value = "f64")]
    dtype: DType,

    /// Block backend (reference, library, systolic)
    #[arg(long, default_value = "reference")]
    backend: BackendKind,

    /// Execution mode (row-sync or async)
    #[arg(long, default_value = "async")]
    mode: ExecutionMode,

    /// Device instances for the systolic backend
    #[arg(long, default_value_t = 4)]
    instances: usize,

    /// How to verify the result
    #[arg(long, value_enum, default_value_t = CheckArg::Analytic)]
    check: CheckArg,

    /// Directory holding reference records
    #[arg(long, default_value = "references")]
    reference_dir: PathBuf,

    /// Relative tolerance for the check
    #[arg(long, default_value_t = bm_check::DEFAULT_TOLERANCE)]
    tolerance: f64,

    /// Times the graph is executed, accumulating into C
    #[arg(short = 'r', long, default_value_t = 1)]
    repetitions: usize,

    /// Skip the warm-up block multiply
    #[arg(long)]
    no_warmup: bool,

    /// Operand initialization
    #[arg(long, value_enum, default_value_t = FillArg::Ramp)]
    fill: FillArg,

    /// Seed for random fill
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl Args {
    fn into_config(self) -> Result<BenchConfig> {
        let check = match self.check {
            CheckArg::None => CheckMode::Disabled,
            CheckArg::Analytic => CheckMode::Analytic,
            CheckArg::Reference => CheckMode::reference(self.reference_dir),
            CheckArg::Generate => CheckMode::generate(self.reference_dir),
        };
        let inputs = match self.fill {
            FillArg::Ramp => Inputs::ramp(),
            FillArg::Constant => Inputs::constant(587.0, 437.0, 0.0),
            FillArg::Random => Inputs::random(self.seed),
        };
        Ok(BenchConfig {
            matrix_size: self.matrix_size,
            block_size: self.block_size,
            dtype: self.dtype,
            backend: self.backend,
            mode: self.mode,
            instances: self.instances,
            check,
            tolerance: Tolerance::new(self.tolerance).context("invalid --tolerance")?,
            repetitions: self.repetitions,
            warmup: !self.no_warmup,
            inputs,
        })
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(status) => ExitCode::from(status.code()),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(ExitStatus::Fatal.code())
        }
    }
}

fn run(args: Args) -> Result<ExitStatus> {
    let config = args.into_config()?;
    let report = bm_bench::run_report(&config).context("benchmark run failed")?;
    println!("{}", report);
    Ok(report.status())
}
