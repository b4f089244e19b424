//! Per-project scheduling: reads a consistent snapshot of tasks, edges and
//! baselines and hands it to the CPM scheduler.

use super::baselines::latest_baselines;
use super::deps::edges_touching;
use super::projects::require_project;
use super::tasks::project_tasks;
use super::Database;
use crate::config::SchedulingConfig;
use crate::error::PlanResult;
use crate::gantt::{build_chart, GanttChart};
use crate::scheduler::{CpmScheduler, DurationRules, ScheduleResult, TaskTiming};
use crate::types::{NodeId, Task};
use chrono::{NaiveDate, Utc};
use tracing::info;

impl Database {
    /// Live tasks of a project in tree pre-order.
    pub fn get_nodes_for_project(&self, project_id: NodeId) -> PlanResult<Vec<Task>> {
        Ok(self.with_read_tx(|tx| {
            require_project(tx, project_id)?;
            project_tasks(tx, project_id)
        })?)
    }

    /// CPM schedule of a project's live tasks, in day offsets.
    pub fn project_schedule(&self, project_id: NodeId, config: &SchedulingConfig) -> PlanResult<ScheduleResult> {
        let (tasks, edges) = self.with_read_tx(|tx| {
            require_project(tx, project_id)?;
            let tasks = project_tasks(tx, project_id)?;
            let ids: Vec<NodeId> = tasks.iter().map(|t| t.id).collect();
            let edges = edges_touching(tx, &ids)?;
            Ok((tasks, edges))
        })?;

        let timings: Vec<TaskTiming> = tasks.iter().map(TaskTiming::from).collect();
        let schedule = CpmScheduler::new(DurationRules::from(config)).schedule(&timings, &edges);
        info!(
            project_id,
            tasks = timings.len(),
            project_duration = schedule.project_duration,
            critical = schedule.critical_path.len(),
            "Computed project schedule"
        );
        Ok(schedule)
    }

    /// Gantt chart of a project anchored to today's date when no task has one.
    pub fn project_gantt(&self, project_id: NodeId, config: &SchedulingConfig) -> PlanResult<GanttChart> {
        self.project_gantt_at(project_id, config, Utc::now().date_naive())
    }

    /// Gantt chart with an explicit fallback anchor date.
    pub fn project_gantt_at(
        &self,
        project_id: NodeId,
        config: &SchedulingConfig,
        today: NaiveDate,
    ) -> PlanResult<GanttChart> {
        let (tasks, edges, baselines) = self.with_read_tx(|tx| {
            require_project(tx, project_id)?;
            let tasks = project_tasks(tx, project_id)?;
            let ids: Vec<NodeId> = tasks.iter().map(|t| t.id).collect();
            let edges = edges_touching(tx, &ids)?;
            let baselines = latest_baselines(tx, project_id)?;
            Ok((tasks, edges, baselines))
        })?;

        let chart = build_chart(project_id, tasks, edges, baselines, &DurationRules::from(config), today);
        info!(
            project_id,
            rows = chart.rows.len(),
            project_duration = chart.project_duration,
            "Computed gantt chart"
        );
        Ok(chart)
    }
}
