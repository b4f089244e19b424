//! Critical-Path-Method scheduling over task dependency graphs.
//!
//! The scheduler is pure: it takes a snapshot of nodes and edges and returns
//! a freshly computed [`ScheduleResult`]. Nothing is cached between calls.

pub mod cpm;
pub mod duration;
pub mod relation;

pub use cpm::{Activity, CpmScheduler, NodeSchedule, ScheduleResult};
pub use duration::{DurationRules, TaskTiming};
pub use relation::{Anchor, Pass, Window};

/// Largest effort estimate, in hours, the store accepts for one task.
pub const MAX_EFFORT_HOURS: f64 = 100_000.0;

/// Largest absolute lead or lag, in days, the store accepts on one edge.
pub const MAX_LAG_DAYS: i64 = 36_500;

/// Upper bound on a single activity's scheduled duration.
pub const MAX_DURATION_DAYS: i64 = 36_500;
