//! Nested checklist items owned by a task.

use super::hierarchy::{parse_tree_fields, Hierarchy, NodeKind};
use super::tasks::TaskKind;
use super::{now_ms, Database};
use crate::error::{PlanError, PlanResult};
use crate::types::{ChecklistItem, ChecklistProgress, HierarchyViolation, NodeId};
use rusqlite::{params, Row};
use tracing::info;

/// Each task owns an independent checklist forest.
pub struct ChecklistKind;

impl NodeKind for ChecklistKind {
    type Node = ChecklistItem;

    const TABLE: &'static str = "checklist_items";
    const LABEL: &'static str = "checklist item";
    const SCOPE_COLUMN: Option<&'static str> = Some("task_id");

    fn parse_row(row: &Row) -> rusqlite::Result<ChecklistItem> {
        Ok(ChecklistItem {
            id: row.get("id")?,
            task_id: row.get("task_id")?,
            tree: parse_tree_fields(row)?,
            content: row.get("content")?,
            is_checked: row.get("is_checked")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            deleted_at: row.get("deleted_at")?,
        })
    }
}

type Checklist = Hierarchy<ChecklistKind>;

impl Database {
    /// Add an item to a task's checklist, optionally nested under another item
    /// of the same checklist.
    pub fn create_checklist_item(
        &self,
        task_id: NodeId,
        content: &str,
        parent_id: Option<NodeId>,
    ) -> PlanResult<ChecklistItem> {
        let content = content.trim();
        if content.is_empty() {
            return Err(PlanError::invalid_value("content", "checklist item must not be empty"));
        }

        let now = now_ms();
        let item = self.with_write_tx(|tx| {
            Hierarchy::<TaskKind>::require(tx, task_id)?;
            let parent = match parent_id {
                Some(parent_id) => {
                    let parent = Checklist::require(tx, parent_id)?;
                    if parent.scope != Some(task_id) {
                        return Err(PlanError::invalid_value(
                            "parent_id",
                            &format!("checklist item {} belongs to another task", parent_id),
                        )
                        .into());
                    }
                    Some(parent)
                }
                None => None,
            };

            tx.execute(
                "INSERT INTO checklist_items (task_id, parent_id, path, depth, position, content, created_at, updated_at)
                 VALUES (?1, ?2, '', 0, 0, ?3, ?4, ?5)",
                params![task_id, parent_id, content, now, now],
            )?;
            let id = tx.last_insert_rowid();
            Checklist::attach(tx, id, parent.as_ref(), Some(task_id))?;
            Checklist::fetch_live(tx, id)
        })?;

        info!(item_id = item.id, task_id, "Created checklist item");
        Ok(item)
    }

    pub fn get_checklist_item(&self, item_id: NodeId) -> PlanResult<Option<ChecklistItem>> {
        Ok(self.with_conn(|conn| Checklist::fetch(conn, item_id))?)
    }

    /// Re-parent an item within its task's checklist.
    pub fn move_checklist_item(&self, item_id: NodeId, new_parent_id: Option<NodeId>) -> PlanResult<ChecklistItem> {
        Ok(self.with_write_tx(|tx| {
            Checklist::relocate(tx, item_id, new_parent_id)?;
            Checklist::fetch_live(tx, item_id)
        })?)
    }

    pub fn reorder_checklist_item(&self, item_id: NodeId, position: i64) -> PlanResult<ChecklistItem> {
        Ok(self.with_write_tx(|tx| {
            Checklist::reorder(tx, item_id, position)?;
            Checklist::fetch_live(tx, item_id)
        })?)
    }

    pub fn set_checklist_item_checked(&self, item_id: NodeId, checked: bool) -> PlanResult<ChecklistItem> {
        Ok(self.with_write_tx(|tx| {
            Checklist::require(tx, item_id)?;
            tx.execute(
                "UPDATE checklist_items SET is_checked = ?1, updated_at = ?2 WHERE id = ?3",
                params![checked, now_ms(), item_id],
            )?;
            Checklist::fetch_live(tx, item_id)
        })?)
    }

    /// Top-level items of a task's checklist.
    pub fn task_checklist(&self, task_id: NodeId) -> PlanResult<Vec<ChecklistItem>> {
        Ok(self.with_conn(|conn| {
            Hierarchy::<TaskKind>::require(conn, task_id)?;
            Checklist::roots(conn, Some(task_id))
        })?)
    }

    pub fn checklist_children(&self, item_id: NodeId) -> PlanResult<Vec<ChecklistItem>> {
        Ok(self.with_conn(|conn| Checklist::children(conn, item_id))?)
    }

    pub fn checklist_descendants(&self, item_id: NodeId) -> PlanResult<Vec<ChecklistItem>> {
        Ok(self.with_conn(|conn| Checklist::descendants(conn, item_id))?)
    }

    pub fn checklist_ancestors(&self, item_id: NodeId) -> PlanResult<Vec<ChecklistItem>> {
        Ok(self.with_conn(|conn| Checklist::ancestors(conn, item_id))?)
    }

    pub fn delete_checklist_item(&self, item_id: NodeId) -> PlanResult<usize> {
        Ok(self.with_write_tx(|tx| Checklist::delete_subtree(tx, item_id))?)
    }

    /// Checked vs. total live items across every level of a task's checklist.
    pub fn checklist_progress(&self, task_id: NodeId) -> PlanResult<ChecklistProgress> {
        Ok(self.with_conn(|conn| {
            Hierarchy::<TaskKind>::require(conn, task_id)?;
            let progress = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_checked), 0) FROM checklist_items
                 WHERE task_id = ?1 AND deleted_at IS NULL",
                params![task_id],
                |row| {
                    Ok(ChecklistProgress {
                        total: row.get(0)?,
                        checked: row.get(1)?,
                    })
                },
            )?;
            Ok(progress)
        })?)
    }

    pub fn verify_checklist_hierarchy(&self) -> PlanResult<Vec<HierarchyViolation>> {
        Ok(self.with_conn(Checklist::verify)?)
    }
}
