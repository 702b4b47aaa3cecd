use std::fmt;
use std::time::{Duration, Instant};

/// Timed stages of a run, in the order they happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Init,
    WarmUp,
    Execution,
    Flush,
    Check,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Init,
        Phase::WarmUp,
        Phase::Execution,
        Phase::Flush,
        Phase::Check,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::WarmUp => "warm-up",
            Phase::Execution => "execution",
            Phase::Flush => "flush",
            Phase::Check => "check",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Wall-clock duration of each [`Phase`]. Phases that did not run stay zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timings {
    durations: [Duration; 5],
}

impl Timings {
    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        self.durations[phase.index()] += elapsed;
    }

    pub fn get(&self, phase: Phase) -> Duration {
        self.durations[phase.index()]
    }

    /// Run `f`, charging its wall-clock time to `phase`.
    pub fn time<R>(&mut self, phase: Phase, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let out = f();
        self.record(phase, start.elapsed());
        tracing::info!(phase = phase.name(), secs = self.get(phase).as_secs_f64(), "phase done");
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (Phase, Duration)> + '_ {
        Phase::ALL.iter().map(move |&p| (p, self.get(p)))
    }
}

/// Throughput of `repetitions` products of two `matrix_size` square
/// matrices, counting one multiply and one add per inner-product term.
///
/// Returns `None` when `elapsed` is zero.
pub fn gflops(matrix_size: usize, repetitions: usize, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    let n = matrix_size as f64;
    Some(2.0 * n * n * n * repetitions as f64 / secs / 1e9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_record_accumulates() {
        let mut t = Timings::default();
        t.record(Phase::Execution, Duration::from_millis(5));
        t.record(Phase::Execution, Duration::from_millis(7));
        assert_eq!(t.get(Phase::Execution), Duration::from_millis(12));
        assert_eq!(t.get(Phase::Flush), Duration::ZERO);
        assert_eq!(t.iter().count(), 5);
    }

    #[test]
    fn test_time_returns_value() {
        let mut t = Timings::default();
        assert_eq!(t.time(Phase::Check, || 42), 42);
    }

    #[test]
    fn test_gflops() {
        // 2 * 1000^3 flops in one second.
        let g = gflops(1000, 1, Duration::from_secs(1)).unwrap();
        assert_relative_eq!(g, 2.0, max_relative = 1e-12);
        let g = gflops(1000, 3, Duration::from_secs(2)).unwrap();
        assert_relative_eq!(g, 3.0, max_relative = 1e-12);
        assert!(gflops(1000, 1, Duration::ZERO).is_none());
    }
}
