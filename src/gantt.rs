//! Gantt chart assembly: a CPM schedule merged with task, edge and baseline
//! data and anchored to calendar dates.

use crate::scheduler::{CpmScheduler, DurationRules, NodeSchedule, TaskTiming};
use crate::types::{Baseline, DependencyEdge, NodeId, Task};
use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One task bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GanttRow {
    pub task: Task,
    pub duration_days: i64,
    pub schedule: NodeSchedule,
    pub start_date: NaiveDate,
    pub finish_date: NaiveDate,
    /// Most recent baseline, if any.
    pub baseline: Option<Baseline>,
    /// Scheduled finish minus the baseline's planned end; positive means late.
    pub variance_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GanttChart {
    pub project_id: NodeId,
    pub project_start: NaiveDate,
    pub project_finish: NaiveDate,
    pub project_duration: i64,
    /// Rows in tree pre-order.
    pub rows: Vec<GanttRow>,
    pub edges: Vec<DependencyEdge>,
    pub critical_path: Vec<NodeId>,
}

impl GanttChart {
    pub fn row(&self, task_id: NodeId) -> Option<&GanttRow> {
        self.rows.iter().find(|r| r.task.id == task_id)
    }
}

/// `start` shifted by `offset` days, pinned to chrono's date range.
fn offset_date(start: NaiveDate, offset: i64) -> NaiveDate {
    TimeDelta::try_days(offset)
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or_else(|| {
            warn!(%start, offset, "Day offset leaves the calendar range; date clamped");
            if offset < 0 { NaiveDate::MIN } else { NaiveDate::MAX }
        })
}

/// Schedule `tasks` and lay the result out on the calendar.
///
/// Day 0 is the earliest effective start among the tasks, or `today` when
/// no task carries a date.
pub fn build_chart(
    project_id: NodeId,
    tasks: Vec<Task>,
    edges: Vec<DependencyEdge>,
    mut baselines: HashMap<NodeId, Baseline>,
    rules: &DurationRules,
    today: NaiveDate,
) -> GanttChart {
    let timings: Vec<TaskTiming> = tasks.iter().map(TaskTiming::from).collect();
    let schedule = CpmScheduler::new(rules.clone()).schedule(&timings, &edges);

    let project_start = timings
        .iter()
        .filter_map(|t| rules.effective_start(t))
        .min()
        .unwrap_or(today);
    let at = |offset: i64| offset_date(project_start, offset);

    let ids: HashSet<NodeId> = tasks.iter().map(|t| t.id).collect();
    let edges: Vec<DependencyEdge> = edges
        .into_iter()
        .filter(|e| ids.contains(&e.predecessor_id) && ids.contains(&e.successor_id))
        .collect();

    let rows: Vec<GanttRow> = tasks
        .into_iter()
        .zip(schedule.nodes.iter())
        .map(|(task, node)| {
            let finish_date = at(node.earliest_finish);
            let baseline = baselines.remove(&task.id);
            let variance_days = baseline
                .as_ref()
                .and_then(|b| b.planned_end)
                .map(|end| (finish_date - end).num_days());
            GanttRow {
                duration_days: node.duration,
                schedule: *node,
                start_date: at(node.earliest_start),
                finish_date,
                baseline,
                variance_days,
                task,
            }
        })
        .collect();

    debug!(
        project_id,
        rows = rows.len(),
        project_duration = schedule.project_duration,
        %project_start,
        "Built gantt chart"
    );

    GanttChart {
        project_id,
        project_start,
        project_finish: at(schedule.project_duration),
        project_duration: schedule.project_duration,
        rows,
        edges,
        critical_path: schedule.critical_path,
    }
}
