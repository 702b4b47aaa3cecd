//! `bm-bench` - Blocked matrix multiply benchmark driver.
//!
//! Ties the workspace together: builds the operands, runs the block task
//! graph on the selected backend, times each phase and verifies the result.

mod config;
mod engine;
mod error;
mod report;
mod timing;

pub use config::{BenchConfig, CheckMode, Inputs};
pub use engine::{run, run_config, run_report, RunOutcome};
pub use error::{BenchError, Result};
pub use report::{ExitStatus, Report, Verdict};
pub use timing::{gflops, Phase, Timings};
