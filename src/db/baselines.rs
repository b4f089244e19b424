//! Immutable plan snapshots per task.

use super::hierarchy::Hierarchy;
use super::tasks::TaskKind;
use super::{now_ms, Database};
use crate::error::{PlanError, PlanResult};
use crate::types::{Baseline, NodeId};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use tracing::info;

type Tasks = Hierarchy<TaskKind>;

fn parse_baseline_row(row: &Row) -> rusqlite::Result<Baseline> {
    Ok(Baseline {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        baseline_number: row.get("baseline_number")?,
        name: row.get("name")?,
        planned_start: row.get("planned_start")?,
        planned_end: row.get("planned_end")?,
        estimated_hours: row.get("estimated_hours")?,
        created_at: row.get("created_at")?,
    })
}

/// Reserve the next baseline number for a task.
///
/// Numbers come from a per-task high-water mark that outlives deleted
/// baselines, so a number is never handed out twice.
fn next_baseline_number(conn: &Connection, task_id: NodeId) -> Result<i64> {
    let issued: i64 = conn
        .query_row(
            "SELECT last_number FROM baseline_sequences WHERE task_id = ?1",
            params![task_id],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    let stored: i64 = conn.query_row(
        "SELECT COALESCE(MAX(baseline_number), 0) FROM task_baselines WHERE task_id = ?1",
        params![task_id],
        |row| row.get(0),
    )?;
    let next = issued.max(stored) + 1;

    conn.execute(
        "INSERT INTO baseline_sequences (task_id, last_number) VALUES (?1, ?2)
         ON CONFLICT(task_id) DO UPDATE SET last_number = excluded.last_number",
        params![task_id, next],
    )?;
    Ok(next)
}

/// Most recent baseline of every live task in a project.
pub(crate) fn latest_baselines(conn: &Connection, project_id: NodeId) -> Result<HashMap<NodeId, Baseline>> {
    let mut stmt = conn.prepare(
        "SELECT b.* FROM task_baselines b
         INNER JOIN tasks t ON t.id = b.task_id
         WHERE t.project_id = ?1 AND t.deleted_at IS NULL
           AND b.baseline_number = (
               SELECT MAX(baseline_number) FROM task_baselines WHERE task_id = b.task_id
           )",
    )?;
    let baselines = stmt
        .query_map(params![project_id], parse_baseline_row)?
        .map(|r| r.map(|b| (b.task_id, b)))
        .collect::<rusqlite::Result<HashMap<_, _>>>()?;
    Ok(baselines)
}

impl Database {
    /// Snapshot a task's planned dates and effort as its next baseline.
    pub fn create_baseline(&self, task_id: NodeId, name: Option<&str>) -> PlanResult<Baseline> {
        let name = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);

        let baseline = self.with_write_tx(|tx| {
            let task = Tasks::fetch_live(tx, task_id)?;
            let baseline_number = next_baseline_number(tx, task_id)?;
            let created_at = now_ms();

            tx.execute(
                "INSERT INTO task_baselines (
                    task_id, baseline_number, name, planned_start, planned_end, estimated_hours, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    task_id,
                    baseline_number,
                    &name,
                    task.planned_start,
                    task.planned_end,
                    task.estimated_hours,
                    created_at,
                ],
            )?;

            Ok(Baseline {
                id: tx.last_insert_rowid(),
                task_id,
                baseline_number,
                name,
                planned_start: task.planned_start,
                planned_end: task.planned_end,
                estimated_hours: task.estimated_hours,
                created_at,
            })
        })?;

        info!(
            task_id,
            baseline_id = baseline.id,
            baseline_number = baseline.baseline_number,
            "Created baseline"
        );
        Ok(baseline)
    }

    pub fn get_baseline(&self, baseline_id: NodeId) -> PlanResult<Option<Baseline>> {
        Ok(self.with_conn(|conn| {
            let baseline = conn
                .query_row(
                    "SELECT * FROM task_baselines WHERE id = ?1",
                    params![baseline_id],
                    parse_baseline_row,
                )
                .optional()?;
            Ok(baseline)
        })?)
    }

    /// Baselines of a task, oldest first.
    pub fn list_baselines(&self, task_id: NodeId) -> PlanResult<Vec<Baseline>> {
        Ok(self.with_conn(|conn| {
            Tasks::require(conn, task_id)?;
            let mut stmt = conn.prepare(
                "SELECT * FROM task_baselines WHERE task_id = ?1 ORDER BY baseline_number",
            )?;
            let baselines = stmt
                .query_map(params![task_id], parse_baseline_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(baselines)
        })?)
    }

    pub fn latest_baseline(&self, task_id: NodeId) -> PlanResult<Option<Baseline>> {
        Ok(self.with_conn(|conn| {
            Tasks::require(conn, task_id)?;
            let baseline = conn
                .query_row(
                    "SELECT * FROM task_baselines WHERE task_id = ?1
                     ORDER BY baseline_number DESC LIMIT 1",
                    params![task_id],
                    parse_baseline_row,
                )
                .optional()?;
            Ok(baseline)
        })?)
    }

    /// Delete one baseline. Its number stays retired.
    pub fn delete_baseline(&self, baseline_id: NodeId) -> PlanResult<()> {
        self.with_write_tx(|tx| {
            let n = tx.execute("DELETE FROM task_baselines WHERE id = ?1", params![baseline_id])?;
            if n == 0 {
                return Err(PlanError::not_found("baseline", baseline_id).into());
            }
            Ok(())
        })?;
        info!(baseline_id, "Deleted baseline");
        Ok(())
    }
}
