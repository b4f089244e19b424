//! Duration and effective-date resolution for scheduled tasks.

use crate::config::SchedulingConfig;
use crate::types::{ms_to_date, NodeId, Task};
use super::MAX_DURATION_DAYS;
use chrono::{NaiveDate, TimeDelta};

/// The date and effort facts the scheduler reads off a task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskTiming {
    pub id: NodeId,
    pub is_milestone: bool,
    pub estimated_hours: Option<f64>,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub actual_start: Option<NaiveDate>,
    pub completed: Option<NaiveDate>,
    pub created: Option<NaiveDate>,
}

impl From<&Task> for TaskTiming {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            is_milestone: task.is_milestone,
            estimated_hours: task.estimated_hours,
            planned_start: task.planned_start,
            planned_end: task.planned_end,
            due_date: task.due_date,
            actual_start: task.started_at.and_then(ms_to_date),
            completed: task.completed_at.and_then(ms_to_date),
            created: ms_to_date(task.created_at),
        }
    }
}

/// Duration rules derived from [`SchedulingConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct DurationRules {
    pub hours_per_day: f64,
    pub default_days: i64,
}

impl Default for DurationRules {
    fn default() -> Self {
        Self::from(&SchedulingConfig::default())
    }
}

impl From<&SchedulingConfig> for DurationRules {
    fn from(config: &SchedulingConfig) -> Self {
        Self {
            hours_per_day: config.hours_per_day,
            default_days: config.default_duration_days,
        }
    }
}

impl DurationRules {
    /// Whole days covered by an effort estimate, between one and
    /// [`MAX_DURATION_DAYS`].
    pub fn effort_days(&self, timing: &TaskTiming) -> Option<i64> {
        let hours = timing.estimated_hours?;
        if !hours.is_finite() || hours < 0.0 || self.hours_per_day <= 0.0 {
            return None;
        }
        let days = (hours / self.hours_per_day).ceil().min(MAX_DURATION_DAYS as f64);
        Some((days as i64).max(1))
    }

    /// planned start, else actual start, else creation date when an end bound exists.
    pub fn effective_start(&self, timing: &TaskTiming) -> Option<NaiveDate> {
        timing.planned_start.or(timing.actual_start).or_else(|| {
            if end_bound(timing).is_some() {
                timing.created
            } else {
                None
            }
        })
    }

    /// planned end, else due date, else completion, else start + effort days.
    pub fn effective_end(&self, timing: &TaskTiming) -> Option<NaiveDate> {
        end_bound(timing).or_else(|| {
            let start = self.effective_start(timing)?;
            let days = self.effort_days(timing)?;
            start.checked_add_signed(TimeDelta::try_days(days)?)
        })
    }

    /// Scheduled duration in days.
    pub fn duration_days(&self, timing: &TaskTiming) -> i64 {
        if timing.is_milestone {
            return 0;
        }
        if let Some(days) = self.effort_days(timing) {
            return days;
        }
        if let (Some(start), Some(end)) = (self.effective_start(timing), self.effective_end(timing)) {
            return (end - start).num_days().max(1);
        }
        self.default_days
    }
}

fn end_bound(timing: &TaskTiming) -> Option<NaiveDate> {
    timing
        .planned_end
        .or(timing.due_date)
        .or(timing.completed)
}
