//! Organizational department tree.

use super::hierarchy::{parse_tree_fields, Hierarchy, NodeKind};
use super::{now_ms, Database};
use crate::error::{PlanError, PlanResult};
use crate::types::{Department, HierarchyViolation, NodeId};
use rusqlite::{params, Row};
use tracing::info;

/// Departments form a single global forest.
pub struct DepartmentKind;

impl NodeKind for DepartmentKind {
    type Node = Department;

    const TABLE: &'static str = "departments";
    const LABEL: &'static str = "department";
    const SCOPE_COLUMN: Option<&'static str> = None;

    fn parse_row(row: &Row) -> rusqlite::Result<Department> {
        Ok(Department {
            id: row.get("id")?,
            tree: parse_tree_fields(row)?,
            name: row.get("name")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            deleted_at: row.get("deleted_at")?,
        })
    }
}

type Departments = Hierarchy<DepartmentKind>;

impl Database {
    pub fn create_department(&self, name: &str, parent_id: Option<NodeId>) -> PlanResult<Department> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlanError::invalid_value("name", "department name must not be empty"));
        }

        let now = now_ms();
        let department = self.with_write_tx(|tx| {
            let parent = match parent_id {
                Some(parent_id) => Some(Departments::require(tx, parent_id)?),
                None => None,
            };
            tx.execute(
                "INSERT INTO departments (parent_id, path, depth, position, name, created_at, updated_at)
                 VALUES (?1, '', 0, 0, ?2, ?3, ?4)",
                params![parent_id, name, now, now],
            )?;
            let id = tx.last_insert_rowid();
            Departments::attach(tx, id, parent.as_ref(), None)?;
            Departments::fetch_live(tx, id)
        })?;

        info!(department_id = department.id, path = %department.tree.path, "Created department");
        Ok(department)
    }

    pub fn get_department(&self, department_id: NodeId) -> PlanResult<Option<Department>> {
        Ok(self.with_conn(|conn| Departments::fetch(conn, department_id))?)
    }

    pub fn rename_department(&self, department_id: NodeId, name: &str) -> PlanResult<Department> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlanError::invalid_value("name", "department name must not be empty"));
        }
        Ok(self.with_write_tx(|tx| {
            Departments::require(tx, department_id)?;
            tx.execute(
                "UPDATE departments SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![name, now_ms(), department_id],
            )?;
            Departments::fetch_live(tx, department_id)
        })?)
    }

    pub fn move_department(&self, department_id: NodeId, new_parent_id: Option<NodeId>) -> PlanResult<Department> {
        Ok(self.with_write_tx(|tx| {
            Departments::relocate(tx, department_id, new_parent_id)?;
            Departments::fetch_live(tx, department_id)
        })?)
    }

    pub fn reorder_department(&self, department_id: NodeId, position: i64) -> PlanResult<Department> {
        Ok(self.with_write_tx(|tx| {
            Departments::reorder(tx, department_id, position)?;
            Departments::fetch_live(tx, department_id)
        })?)
    }

    pub fn root_departments(&self) -> PlanResult<Vec<Department>> {
        Ok(self.with_conn(|conn| Departments::roots(conn, None))?)
    }

    pub fn department_children(&self, department_id: NodeId) -> PlanResult<Vec<Department>> {
        Ok(self.with_conn(|conn| Departments::children(conn, department_id))?)
    }

    pub fn department_descendants(&self, department_id: NodeId) -> PlanResult<Vec<Department>> {
        Ok(self.with_conn(|conn| Departments::descendants(conn, department_id))?)
    }

    pub fn department_ancestors(&self, department_id: NodeId) -> PlanResult<Vec<Department>> {
        Ok(self.with_conn(|conn| Departments::ancestors(conn, department_id))?)
    }

    /// Delete a department and every department below it.
    pub fn delete_department(&self, department_id: NodeId) -> PlanResult<usize> {
        Ok(self.with_write_tx(|tx| Departments::delete_subtree(tx, department_id))?)
    }

    pub fn verify_department_hierarchy(&self) -> PlanResult<Vec<HierarchyViolation>> {
        Ok(self.with_conn(Departments::verify)?)
    }
}
