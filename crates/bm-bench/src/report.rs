use std::fmt;
use std::path::PathBuf;

use bm_sched::{ExecutionMode, SchedulerStats};
use bm_tensor::{DType, UnitStats};

use crate::config::BenchConfig;
use crate::engine::RunOutcome;
use crate::timing::{gflops, Phase, Timings};

/// Process exit status of the `blockmm` binary.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Result verified, generated, or checking disabled.
    Ok = 0,
    /// The run completed but the result was outside tolerance.
    CheckFailed = 1,
    /// The run could not complete.
    Fatal = 2,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// What the check phase concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Disabled,
    Passed,
    Failed { failing_blocks: usize },
    Generated(PathBuf),
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Disabled => write!(f, "not checked"),
            Verdict::Passed => write!(f, "passed"),
            Verdict::Failed { failing_blocks } => {
                write!(f, "FAILED ({} blocks out of tolerance)", failing_blocks)
            }
            Verdict::Generated(path) => write!(f, "reference written to {}", path.display()),
        }
    }
}

/// Summary of one run, printed by the binary.
#[derive(Debug, Clone)]
pub struct Report {
    pub name: &'static str,
    pub backend: String,
    pub mode: ExecutionMode,
    pub dtype: DType,
    pub matrix_size: usize,
    pub block_size: usize,
    pub repetitions: usize,
    pub timings: Timings,
    pub stats: SchedulerStats,
    pub units: Option<Vec<UnitStats>>,
    pub verdict: Verdict,
}

impl Report {
    pub fn new<T>(config: &BenchConfig, outcome: &RunOutcome<T>) -> Self {
        let verdict = match &outcome.check {
            None => Verdict::Disabled,
            Some(r) => match &r.generated {
                Some(path) => Verdict::Generated(path.clone()),
                None if r.passed => Verdict::Passed,
                None => Verdict::Failed {
                    failing_blocks: r.mismatches.len(),
                },
            },
        };
        Report {
            name: "matmul",
            backend: outcome.backend.clone(),
            mode: config.mode,
            dtype: config.dtype,
            matrix_size: config.matrix_size,
            block_size: config.block_size,
            repetitions: config.repetitions,
            timings: outcome.timings,
            stats: outcome.stats,
            units: outcome.units.clone(),
            verdict,
        }
    }

    /// Execution-phase throughput in GFLOP/s.
    pub fn gflops(&self) -> Option<f64> {
        gflops(
            self.matrix_size,
            self.repetitions,
            self.timings.get(Phase::Execution),
        )
    }

    pub fn status(&self) -> ExitStatus {
        match self.verdict {
            Verdict::Failed { .. } => ExitStatus::CheckFailed,
            _ => ExitStatus::Ok,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "benchmark:   {}", self.name)?;
        writeln!(f, "backend:     {} ({})", self.backend, self.mode)?;
        writeln!(f, "dtype:       {}", self.dtype)?;
        writeln!(
            f,
            "size:        {}x{} in {}x{} blocks, {} repetition(s)",
            self.matrix_size, self.matrix_size, self.block_size, self.block_size, self.repetitions
        )?;
        for (phase, elapsed) in self.timings.iter() {
            writeln!(f, "{:<12} {:.6} s", format!("{}:", phase), elapsed.as_secs_f64())?;
        }
        match self.gflops() {
            Some(g) => writeln!(f, "throughput:  {:.3} GFLOP/s", g)?,
            None => writeln!(f, "throughput:  n/a")?,
        }
        writeln!(
            f,
            "tasks:       {} in {} joins, peak {} in flight",
            self.stats.tasks, self.stats.joins, self.stats.peak_in_flight
        )?;
        for (n, unit) in self.units.iter().flatten().enumerate() {
            writeln!(
                f,
                "{:<12} {} blocks, {} cycles",
                format!("unit {}:", n),
                unit.blocks,
                unit.cycles
            )?;
        }
        write!(f, "check:       {}", self.verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn report(verdict: Verdict) -> Report {
        let mut timings = Timings::default();
        timings.record(Phase::Execution, Duration::from_millis(500));
        Report {
            name: "matmul",
            backend: "reference".to_string(),
            mode: ExecutionMode::Async,
            dtype: DType::F64,
            matrix_size: 1000,
            block_size: 100,
            repetitions: 1,
            timings,
            stats: SchedulerStats::default(),
            units: None,
            verdict,
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Ok.code(), 0);
        assert_eq!(ExitStatus::CheckFailed.code(), 1);
        assert_eq!(ExitStatus::Fatal.code(), 2);
    }

    #[test]
    fn test_status_from_verdict() {
        assert_eq!(report(Verdict::Passed).status(), ExitStatus::Ok);
        assert_eq!(report(Verdict::Disabled).status(), ExitStatus::Ok);
        assert_eq!(
            report(Verdict::Generated(PathBuf::from("x.ref"))).status(),
            ExitStatus::Ok
        );
        assert_eq!(
            report(Verdict::Failed { failing_blocks: 3 }).status(),
            ExitStatus::CheckFailed
        );
    }

    #[test]
    fn test_display() {
        let text = report(Verdict::Passed).to_string();
        assert!(text.contains("backend:     reference (async)"));
        assert!(text.contains("throughput:  4.000 GFLOP/s"));
        assert!(text.ends_with("check:       passed"));
        assert!(!text.contains("unit 0:"));
    }

    #[test]
    fn test_display_unit_stats() {
        let mut r = report(Verdict::Passed);
        r.units = Some(vec![
            UnitStats { blocks: 5, cycles: 60 },
            UnitStats { blocks: 3, cycles: 36 },
        ]);
        let text = r.to_string();
        assert!(text.contains("unit 0:      5 blocks, 60 cycles"));
        assert!(text.contains("unit 1:      3 blocks, 36 cycles"));
    }
}
