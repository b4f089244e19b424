//! Projects: the scheduling scope of a task forest.

use super::{now_ms, Database};
use crate::error::{PlanError, PlanResult};
use crate::types::{NodeId, Project};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

fn parse_project_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

/// Fail with NotFound unless the project exists.
pub(crate) fn require_project(conn: &Connection, project_id: NodeId) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
        params![project_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(PlanError::not_found("project", project_id).into());
    }
    Ok(())
}

impl Database {
    /// Create a new, empty project.
    pub fn create_project(&self, name: &str) -> PlanResult<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlanError::invalid_value("name", "project name must not be empty"));
        }
        let now = now_ms();
        let project = self.with_write_tx(|tx| {
            tx.execute(
                "INSERT INTO projects (name, created_at) VALUES (?1, ?2)",
                params![name, now],
            )?;
            Ok(Project {
                id: tx.last_insert_rowid(),
                name: name.to_string(),
                created_at: now,
            })
        })?;
        info!(project_id = project.id, name = %project.name, "Created project");
        Ok(project)
    }

    pub fn get_project(&self, project_id: NodeId) -> PlanResult<Option<Project>> {
        let project = self.with_conn(|conn| {
            let project = conn
                .query_row(
                    "SELECT * FROM projects WHERE id = ?1",
                    params![project_id],
                    parse_project_row,
                )
                .optional()?;
            Ok(project)
        })?;
        Ok(project)
    }

    pub fn list_projects(&self) -> PlanResult<Vec<Project>> {
        let projects = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM projects ORDER BY id")?;
            let projects = stmt
                .query_map([], parse_project_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(projects)
        })?;
        Ok(projects)
    }
}
