//! Service layer: orchestration on top of the repositories.
//!
//! Services hold no UI concerns; the CLI drives them and prints results.

pub mod scheduler;

pub use scheduler::{plan_probe, ProbePlan, Scheduler, SchedulerConfig, SchedulerError, TickOutcome};
