//! `bm-sched` - Block task graph and scheduler for blockmm.
//!
//! Enumerates the `(i, j, k)` block multiplies of `C += A x B`, serializes
//! the writers of each output block, and submits the rest in parallel in
//! joinable waves sized to the backend's execution slots.

pub mod error;
pub mod gauge;
pub mod graph;
pub mod scheduler;

pub use error::{Result, SchedError};
pub use gauge::InFlight;
pub use graph::{Task, TaskGraph};
pub use scheduler::{ExecutionMode, Scheduler, SchedulerStats, Wave};
