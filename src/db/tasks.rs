//! Task CRUD and tree operations.

use super::hierarchy::{parse_tree_fields, Hierarchy, NodeKind};
use super::projects::require_project;
use super::{now_ms, Database};
use crate::error::{PlanError, PlanResult};
use crate::scheduler::MAX_EFFORT_HOURS;
use crate::types::{HierarchyViolation, NewTask, NodeId, Task, TaskScheduleUpdate, TaskTree};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use tracing::info;

/// Tasks form one forest per project.
pub struct TaskKind;

impl NodeKind for TaskKind {
    type Node = Task;

    const TABLE: &'static str = "tasks";
    const LABEL: &'static str = "task";
    const SCOPE_COLUMN: Option<&'static str> = Some("project_id");

    fn parse_row(row: &Row) -> rusqlite::Result<Task> {
        parse_task_row(row)
    }
}

type Tasks = Hierarchy<TaskKind>;

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        tree: parse_tree_fields(row)?,
        title: row.get("title")?,
        is_milestone: row.get("is_milestone")?,
        estimated_hours: row.get("estimated_hours")?,
        planned_start: row.get("planned_start")?,
        planned_end: row.get("planned_end")?,
        due_date: row.get("due_date")?,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

fn validate_effort(hours: Option<f64>) -> Result<()> {
    match hours {
        Some(hours) if !hours.is_finite() || hours < 0.0 => Err(PlanError::invalid_value(
            "estimated_hours",
            "estimated hours must be a non-negative number",
        )
        .into()),
        Some(hours) if hours > MAX_EFFORT_HOURS => Err(PlanError::invalid_value(
            "estimated_hours",
            &format!("estimated hours must not exceed {}", MAX_EFFORT_HOURS),
        )
        .into()),
        _ => Ok(()),
    }
}

fn validate_plan(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(PlanError::invalid_value(
            "planned_end",
            &format!("planned end {} is before planned start {}", end, start),
        )
        .into()),
        _ => Ok(()),
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(PlanError::invalid_value("title", "title must not be empty").into());
    }
    Ok(())
}

/// Nest a flat, pre-ordered list of tasks under `root_ids`.
fn assemble_trees(root_ids: &[NodeId], tasks: Vec<Task>) -> Vec<TaskTree> {
    let mut by_id: HashMap<NodeId, Task> = HashMap::new();
    let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for task in tasks {
        if let Some(parent_id) = task.tree.parent_id {
            children.entry(parent_id).or_default().push(task.id);
        }
        by_id.insert(task.id, task);
    }
    for ids in children.values_mut() {
        ids.sort_by_key(|id| by_id.get(id).map(|t| (t.tree.position, t.id)));
    }

    fn build(
        id: NodeId,
        by_id: &mut HashMap<NodeId, Task>,
        children: &HashMap<NodeId, Vec<NodeId>>,
    ) -> Option<TaskTree> {
        let task = by_id.remove(&id)?;
        let kids = children
            .get(&id)
            .map(|ids| ids.iter().filter_map(|c| build(*c, by_id, children)).collect())
            .unwrap_or_default();
        Some(TaskTree {
            task,
            children: kids,
        })
    }

    root_ids
        .iter()
        .filter_map(|id| build(*id, &mut by_id, &children))
        .collect()
}

/// Live tasks of a project in pre-order.
pub(crate) fn project_tasks(conn: &Connection, project_id: NodeId) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM tasks WHERE project_id = ?1 AND deleted_at IS NULL",
    )?;
    let mut tasks = stmt
        .query_map(params![project_id], parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    tasks.sort_by(|a, b| a.tree.path.cmp(&b.tree.path));
    Ok(tasks)
}

impl Database {
    /// Create a new task.
    ///
    /// Root tasks need a `project_id`; a child inherits its parent's project.
    pub fn create_task(&self, input: NewTask) -> PlanResult<Task> {
        validate_title(&input.title)?;
        validate_effort(input.estimated_hours)?;
        validate_plan(input.planned_start, input.planned_end)?;

        let now = now_ms();
        let task = self.with_write_tx(|tx| {
            let parent = match input.parent_id {
                Some(parent_id) => Some(Tasks::require(tx, parent_id)?),
                None => None,
            };

            let project_id = match (&parent, input.project_id) {
                (Some(parent), Some(project_id)) if parent.scope != Some(project_id) => {
                    return Err(PlanError::invalid_value(
                        "project_id",
                        &format!(
                            "parent task {} belongs to a different project",
                            parent.id
                        ),
                    )
                    .into());
                }
                (Some(parent), _) => parent
                    .scope
                    .ok_or_else(|| PlanError::internal(format!("task {} has no project", parent.id)))?,
                (None, Some(project_id)) => {
                    require_project(tx, project_id)?;
                    project_id
                }
                (None, None) => {
                    return Err(PlanError::invalid_value(
                        "project_id",
                        "root tasks need a project",
                    )
                    .into());
                }
            };

            tx.execute(
                "INSERT INTO tasks (
                    project_id, parent_id, path, depth, position, title, is_milestone,
                    estimated_hours, planned_start, planned_end, due_date, created_at, updated_at
                ) VALUES (?1, ?2, '', 0, 0, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    project_id,
                    input.parent_id,
                    input.title.trim(),
                    input.is_milestone,
                    input.estimated_hours,
                    input.planned_start,
                    input.planned_end,
                    input.due_date,
                    now,
                    now,
                ],
            )?;
            let id = tx.last_insert_rowid();

            Tasks::attach(tx, id, parent.as_ref(), Some(project_id))?;
            if let Some(position) = input.position {
                Tasks::reorder(tx, id, position)?;
            }

            Tasks::fetch_live(tx, id)
        })?;

        info!(task_id = task.id, path = %task.tree.path, "Created task");
        Ok(task)
    }

    /// Get a task by ID, soft-deleted tasks included.
    pub fn get_task(&self, task_id: NodeId) -> PlanResult<Option<Task>> {
        let task = self.with_conn(|conn| Tasks::fetch(conn, task_id))?;
        Ok(task)
    }

    /// Apply a partial update to a task's scheduling fields.
    pub fn update_task_schedule(&self, task_id: NodeId, update: TaskScheduleUpdate) -> PlanResult<Task> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        if let Some(hours) = update.estimated_hours {
            validate_effort(hours)?;
        }

        let task = self.with_write_tx(|tx| {
            let mut task = Tasks::fetch_live(tx, task_id)?;

            if let Some(title) = update.title {
                task.title = title.trim().to_string();
            }
            if let Some(is_milestone) = update.is_milestone {
                task.is_milestone = is_milestone;
            }
            if let Some(hours) = update.estimated_hours {
                task.estimated_hours = hours;
            }
            if let Some(start) = update.planned_start {
                task.planned_start = start;
            }
            if let Some(end) = update.planned_end {
                task.planned_end = end;
            }
            if let Some(due) = update.due_date {
                task.due_date = due;
            }
            if let Some(started_at) = update.started_at {
                task.started_at = started_at;
            }
            if let Some(completed_at) = update.completed_at {
                task.completed_at = completed_at;
            }
            validate_plan(task.planned_start, task.planned_end)?;

            task.updated_at = now_ms();
            tx.execute(
                "UPDATE tasks SET title = ?1, is_milestone = ?2, estimated_hours = ?3,
                    planned_start = ?4, planned_end = ?5, due_date = ?6,
                    started_at = ?7, completed_at = ?8, updated_at = ?9
                 WHERE id = ?10",
                params![
                    &task.title,
                    task.is_milestone,
                    task.estimated_hours,
                    task.planned_start,
                    task.planned_end,
                    task.due_date,
                    task.started_at,
                    task.completed_at,
                    task.updated_at,
                    task.id,
                ],
            )?;
            Ok(task)
        })?;

        info!(task_id, "Updated task schedule");
        Ok(task)
    }

    /// Re-parent a task (or make it a root) together with its subtree.
    pub fn move_task(&self, task_id: NodeId, new_parent_id: Option<NodeId>) -> PlanResult<Task> {
        let task = self.with_write_tx(|tx| {
            Tasks::relocate(tx, task_id, new_parent_id)?;
            Tasks::fetch_live(tx, task_id)
        })?;
        Ok(task)
    }

    /// Move a task among its siblings.
    pub fn reorder_task(&self, task_id: NodeId, position: i64) -> PlanResult<Task> {
        let task = self.with_write_tx(|tx| {
            Tasks::reorder(tx, task_id, position)?;
            Tasks::fetch_live(tx, task_id)
        })?;
        Ok(task)
    }

    pub fn task_children(&self, task_id: NodeId) -> PlanResult<Vec<Task>> {
        Ok(self.with_conn(|conn| Tasks::children(conn, task_id))?)
    }

    pub fn task_descendants(&self, task_id: NodeId) -> PlanResult<Vec<Task>> {
        Ok(self.with_conn(|conn| Tasks::descendants(conn, task_id))?)
    }

    pub fn task_ancestors(&self, task_id: NodeId) -> PlanResult<Vec<Task>> {
        Ok(self.with_conn(|conn| Tasks::ancestors(conn, task_id))?)
    }

    /// Root tasks of a project ordered by position.
    pub fn project_root_tasks(&self, project_id: NodeId) -> PlanResult<Vec<Task>> {
        Ok(self.with_conn(|conn| {
            require_project(conn, project_id)?;
            Tasks::roots(conn, Some(project_id))
        })?)
    }

    /// A task with all its live descendants nested.
    pub fn task_tree(&self, task_id: NodeId) -> PlanResult<TaskTree> {
        let tree = self.with_read_tx(|tx| {
            let root = Tasks::fetch_live(tx, task_id)?;
            let mut tasks = Tasks::descendants(tx, task_id)?;
            tasks.insert(0, root);
            assemble_trees(&[task_id], tasks)
                .pop()
                .ok_or_else(|| PlanError::not_found("task", task_id).into())
        })?;
        Ok(tree)
    }

    /// Every live task of a project, nested under its roots.
    pub fn project_task_tree(&self, project_id: NodeId) -> PlanResult<Vec<TaskTree>> {
        let trees = self.with_read_tx(|tx| {
            require_project(tx, project_id)?;
            let root_ids: Vec<NodeId> = Tasks::roots(tx, Some(project_id))?
                .iter()
                .map(|t| t.id)
                .collect();
            let tasks = project_tasks(tx, project_id)?;
            Ok(assemble_trees(&root_ids, tasks))
        })?;
        Ok(trees)
    }

    /// Delete a task and its subtree. Dependencies, baselines and checklist
    /// items of the removed tasks go with them.
    pub fn delete_task(&self, task_id: NodeId) -> PlanResult<usize> {
        Ok(self.with_write_tx(|tx| Tasks::delete_subtree(tx, task_id))?)
    }

    /// Mark a task and its subtree deleted. Marked tasks drop out of tree
    /// queries and scheduling but keep their rows.
    pub fn soft_delete_task(&self, task_id: NodeId) -> PlanResult<usize> {
        Ok(self.with_write_tx(|tx| Tasks::soft_delete_subtree(tx, task_id))?)
    }

    pub fn verify_task_hierarchy(&self) -> PlanResult<Vec<HierarchyViolation>> {
        Ok(self.with_conn(Tasks::verify)?)
    }
}
