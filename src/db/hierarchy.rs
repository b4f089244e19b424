//! Generic materialized-path hierarchy engine.
//!
//! Every hierarchical table carries the same tree columns (`parent_id`,
//! `path`, `depth`, `position`, `deleted_at`). [`Hierarchy`] implements the
//! tree operations once over any [`NodeKind`]; the task, department and
//! checklist services only add their own columns.
//!
//! All functions take a connection that the caller has already wrapped in a
//! transaction, so a multi-statement operation such as [`Hierarchy::relocate`]
//! commits or rolls back as a unit.

use super::now_ms;
use crate::error::PlanError;
use crate::path::MaterializedPath;
use crate::types::{HierarchyViolation, NodeId, PathNode, TreeFields, ViolationKind};
use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::marker::PhantomData;
use tracing::{debug, info};

/// Table-level description of one hierarchical entity kind.
pub trait NodeKind {
    type Node: PathNode;

    /// Backing table.
    const TABLE: &'static str;
    /// Human-readable name used in error messages.
    const LABEL: &'static str;
    /// Column splitting the table into independent forests (owning project,
    /// owning task). Nodes may only be re-parented within the same scope.
    const SCOPE_COLUMN: Option<&'static str>;

    fn parse_row(row: &Row) -> rusqlite::Result<Self::Node>;
}

/// Read the shared tree columns from a full-row query.
pub fn parse_tree_fields(row: &Row) -> rusqlite::Result<TreeFields> {
    Ok(TreeFields {
        parent_id: row.get("parent_id")?,
        path: row.get("path")?,
        depth: row.get("depth")?,
        position: row.get("position")?,
    })
}

/// Tree columns of a single row, without entity-specific fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub path: MaterializedPath,
    pub depth: i64,
    pub position: i64,
    pub scope: Option<i64>,
    pub deleted: bool,
}

fn parse_record(row: &Row) -> rusqlite::Result<NodeRecord> {
    let deleted_at: Option<i64> = row.get(5)?;
    Ok(NodeRecord {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        path: row.get(2)?,
        depth: row.get(3)?,
        position: row.get(4)?,
        scope: row.get(6)?,
        deleted: deleted_at.is_some(),
    })
}

/// Tree operations for one [`NodeKind`].
pub struct Hierarchy<K: NodeKind>(PhantomData<K>);

impl<K: NodeKind> Hierarchy<K> {
    fn scope_expr() -> &'static str {
        K::SCOPE_COLUMN.unwrap_or("NULL")
    }

    fn record_select() -> String {
        format!(
            "SELECT id, parent_id, path, depth, position, deleted_at, {} AS scope FROM {}",
            Self::scope_expr(),
            K::TABLE
        )
    }

    /// Tree columns of `id`, including soft-deleted rows.
    pub fn record(conn: &Connection, id: NodeId) -> Result<Option<NodeRecord>> {
        let sql = format!("{} WHERE id = ?1", Self::record_select());
        let record = conn
            .query_row(&sql, params![id], parse_record)
            .optional()?;
        Ok(record)
    }

    /// Tree columns of a live (not soft-deleted) node, or NotFound.
    pub fn require(conn: &Connection, id: NodeId) -> Result<NodeRecord> {
        match Self::record(conn, id)? {
            Some(record) if !record.deleted => Ok(record),
            _ => Err(PlanError::not_found(K::LABEL, id).into()),
        }
    }

    /// Full entity row, including soft-deleted rows.
    pub fn fetch(conn: &Connection, id: NodeId) -> Result<Option<K::Node>> {
        let sql = format!("SELECT * FROM {} WHERE id = ?1", K::TABLE);
        let node = conn.query_row(&sql, params![id], K::parse_row).optional()?;
        Ok(node)
    }

    /// Full entity row of a live node, or NotFound.
    pub fn fetch_live(conn: &Connection, id: NodeId) -> Result<K::Node> {
        Self::require(conn, id)?;
        Self::fetch(conn, id)?.ok_or_else(|| PlanError::not_found(K::LABEL, id).into())
    }

    /// Position after the last live sibling under `parent_id` within `scope`.
    pub fn next_position(conn: &Connection, parent_id: Option<NodeId>, scope: Option<i64>) -> Result<i64> {
        let sql = format!(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM {}
             WHERE parent_id IS ?1 AND {} IS ?2 AND deleted_at IS NULL",
            K::TABLE,
            Self::scope_expr()
        );
        let next: i64 = conn.query_row(&sql, params![parent_id, scope], |row| row.get(0))?;
        Ok(next)
    }

    /// Second phase of creation: the row has been inserted and owns its id,
    /// so its path can now be computed and stored. The node is appended after
    /// its last live sibling.
    pub fn attach(
        conn: &Connection,
        id: NodeId,
        parent: Option<&NodeRecord>,
        scope: Option<i64>,
    ) -> Result<MaterializedPath> {
        let path = MaterializedPath::under(parent.map(|p| &p.path), id);
        let parent_id = parent.map(|p| p.id);

        // The new row is already live; exclude it from the sibling scan.
        let sql = format!(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM {}
             WHERE parent_id IS ?1 AND {} IS ?2 AND deleted_at IS NULL AND id != ?3",
            K::TABLE,
            Self::scope_expr()
        );
        let position: i64 = conn.query_row(&sql, params![parent_id, scope, id], |row| row.get(0))?;

        let sql = format!(
            "UPDATE {} SET parent_id = ?1, path = ?2, depth = ?3, position = ?4 WHERE id = ?5",
            K::TABLE
        );
        conn.execute(&sql, params![parent_id, &path, path.depth(), position, id])?;
        debug!(kind = K::LABEL, id, path = %path, position, "Attached node");
        Ok(path)
    }

    /// Re-parent `id` under `new_parent_id` (or make it a root) and rewrite
    /// the path and depth of every descendant.
    ///
    /// Returns false when the node already had that parent.
    pub fn relocate(conn: &Connection, id: NodeId, new_parent_id: Option<NodeId>) -> Result<bool> {
        let node = Self::require(conn, id)?;

        let parent = match new_parent_id {
            Some(parent_id) => {
                let parent = Self::record(conn, parent_id)?
                    .filter(|p| !p.deleted)
                    .ok_or_else(|| PlanError::not_found(K::LABEL, parent_id))?;
                if node.path.contains(&parent.path) {
                    return Err(PlanError::move_into_own_subtree(K::LABEL, id, parent_id).into());
                }
                if parent.scope != node.scope {
                    return Err(PlanError::validation(format!(
                        "cannot move {} {} under {} {}: they belong to different {}s",
                        K::LABEL,
                        id,
                        K::LABEL,
                        parent_id,
                        K::SCOPE_COLUMN.unwrap_or("scope").trim_end_matches("_id")
                    ))
                    .into());
                }
                Some(parent)
            }
            None => None,
        };

        if node.parent_id == new_parent_id {
            return Ok(false);
        }

        let old_path = node.path.clone();
        let new_path = MaterializedPath::under(parent.as_ref().map(|p| &p.path), id);
        let position = Self::next_position(conn, new_parent_id, node.scope)?;
        let now = now_ms();

        let descendants = Self::descendant_records(conn, &old_path)?;

        let sql = format!(
            "UPDATE {} SET parent_id = ?1, path = ?2, depth = ?3, position = ?4, updated_at = ?5
             WHERE id = ?6",
            K::TABLE
        );
        conn.execute(
            &sql,
            params![new_parent_id, &new_path, new_path.depth(), position, now, id],
        )?;

        let sql = format!(
            "UPDATE {} SET path = ?1, depth = ?2, updated_at = ?3 WHERE id = ?4",
            K::TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        for descendant in &descendants {
            let rebased = descendant.path.rebase(&old_path, &new_path).ok_or_else(|| {
                anyhow!(
                    "{} {} path {} is not under {}",
                    K::LABEL,
                    descendant.id,
                    descendant.path,
                    old_path
                )
            })?;
            stmt.execute(params![&rebased, rebased.depth(), now, descendant.id])?;
        }

        info!(
            kind = K::LABEL,
            id,
            from = %old_path,
            to = %new_path,
            descendants = descendants.len(),
            "Moved node"
        );
        Ok(true)
    }

    /// Every row strictly under `path`, soft-deleted included, in pre-order.
    pub fn descendant_records(conn: &Connection, path: &MaterializedPath) -> Result<Vec<NodeRecord>> {
        let prefix = path.descendant_prefix();
        let sql = format!(
            "{} WHERE substr(path, 1, length(?1)) = ?1",
            Self::record_select()
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut records = stmt
            .query_map(params![prefix], parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }

    /// Live direct children ordered by position.
    pub fn children(conn: &Connection, id: NodeId) -> Result<Vec<K::Node>> {
        Self::require(conn, id)?;
        let sql = format!(
            "SELECT * FROM {} WHERE parent_id = ?1 AND deleted_at IS NULL ORDER BY position, id",
            K::TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        let nodes = stmt
            .query_map(params![id], K::parse_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(nodes)
    }

    /// Live root nodes of one scope ordered by position.
    pub fn roots(conn: &Connection, scope: Option<i64>) -> Result<Vec<K::Node>> {
        let sql = format!(
            "SELECT * FROM {} WHERE parent_id IS NULL AND {} IS ?1 AND deleted_at IS NULL
             ORDER BY position, id",
            K::TABLE,
            Self::scope_expr()
        );
        let mut stmt = conn.prepare(&sql)?;
        let nodes = stmt
            .query_map(params![scope], K::parse_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(nodes)
    }

    /// Live nodes strictly below `id`, in pre-order.
    pub fn descendants(conn: &Connection, id: NodeId) -> Result<Vec<K::Node>> {
        let node = Self::require(conn, id)?;
        let prefix = node.path.descendant_prefix();
        let sql = format!(
            "SELECT * FROM {} WHERE substr(path, 1, length(?1)) = ?1 AND deleted_at IS NULL",
            K::TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut nodes = stmt
            .query_map(params![prefix], K::parse_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        nodes.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(nodes)
    }

    /// Strict ancestors of `id`, root first.
    pub fn ancestors(conn: &Connection, id: NodeId) -> Result<Vec<K::Node>> {
        let node = Self::require(conn, id)?;
        // Candidate is an ancestor iff node.path starts with candidate.path + "."
        let sql = format!(
            "SELECT * FROM {} WHERE substr(?1, 1, length(path) + 1) = path || '.'",
            K::TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut nodes = stmt
            .query_map(params![&node.path], K::parse_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        nodes.sort_by_key(|n| n.depth());
        Ok(nodes)
    }

    /// Remove `id` and its whole subtree. Returns the number of rows removed.
    pub fn delete_subtree(conn: &Connection, id: NodeId) -> Result<usize> {
        let node = Self::record(conn, id)?.ok_or_else(|| PlanError::not_found(K::LABEL, id))?;
        let prefix = node.path.descendant_prefix();
        // Rows removed by the parent_id cascade are not reported by execute().
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE id = ?1 OR substr(path, 1, length(?2)) = ?2",
            K::TABLE
        );
        let removed: i64 = conn.query_row(&sql, params![id, &prefix], |row| row.get(0))?;
        let removed = removed as usize;

        let sql = format!(
            "DELETE FROM {} WHERE id = ?1 OR substr(path, 1, length(?2)) = ?2",
            K::TABLE
        );
        conn.execute(&sql, params![id, &prefix])?;
        info!(kind = K::LABEL, id, removed, "Deleted subtree");
        Ok(removed)
    }

    /// Mark `id` and its whole subtree deleted. Returns the number of rows marked.
    pub fn soft_delete_subtree(conn: &Connection, id: NodeId) -> Result<usize> {
        let node = Self::require(conn, id)?;
        let now = now_ms();
        let sql = format!(
            "UPDATE {} SET deleted_at = ?1, updated_at = ?1
             WHERE (id = ?2 OR substr(path, 1, length(?3)) = ?3) AND deleted_at IS NULL",
            K::TABLE
        );
        let marked = conn.execute(&sql, params![now, id, node.path.descendant_prefix()])?;
        info!(kind = K::LABEL, id, marked, "Soft-deleted subtree");
        Ok(marked)
    }

    /// Move `id` to `position` among its live siblings and renumber them 0..n.
    pub fn reorder(conn: &Connection, id: NodeId, position: i64) -> Result<()> {
        let node = Self::require(conn, id)?;
        let sql = format!(
            "SELECT id FROM {} WHERE parent_id IS ?1 AND {} IS ?2 AND deleted_at IS NULL AND id != ?3
             ORDER BY position, id",
            K::TABLE,
            Self::scope_expr()
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut siblings = stmt
            .query_map(params![node.parent_id, node.scope, id], |row| row.get::<_, NodeId>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let index = position.clamp(0, siblings.len() as i64) as usize;
        siblings.insert(index, id);

        let now = now_ms();
        let sql = format!(
            "UPDATE {} SET position = ?1, updated_at = ?2 WHERE id = ?3",
            K::TABLE
        );
        let mut update = conn.prepare(&sql)?;
        for (i, sibling) in siblings.iter().enumerate() {
            update.execute(params![i as i64, now, sibling])?;
        }
        debug!(kind = K::LABEL, id, position = index, "Reordered node");
        Ok(())
    }

    /// Check every row's path and depth against its parent chain.
    pub fn verify(conn: &Connection) -> Result<Vec<HierarchyViolation>> {
        let sql = format!("SELECT id, parent_id, path, depth FROM {} ORDER BY id", K::TABLE);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, NodeId>(0)?,
                    row.get::<_, Option<NodeId>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let stored: HashMap<NodeId, &str> = rows
            .iter()
            .map(|(id, _, path, _)| (*id, path.as_str()))
            .collect();

        let mut violations = Vec::new();
        for (id, parent_id, raw_path, depth) in &rows {
            let path = match MaterializedPath::parse(raw_path) {
                Ok(path) => path,
                Err(_) => {
                    violations.push(HierarchyViolation {
                        node_id: *id,
                        kind: ViolationKind::MalformedPath {
                            stored: raw_path.clone(),
                        },
                    });
                    continue;
                }
            };

            let expected = match parent_id {
                Some(parent_id) => match stored.get(parent_id) {
                    Some(parent_raw) => MaterializedPath::parse(parent_raw)
                        .ok()
                        .map(|parent_path| parent_path.child(id)),
                    None => {
                        violations.push(HierarchyViolation {
                            node_id: *id,
                            kind: ViolationKind::DanglingParent {
                                parent_id: *parent_id,
                            },
                        });
                        continue;
                    }
                },
                None => Some(MaterializedPath::root(id)),
            };

            // A malformed parent path is reported on the parent itself.
            if let Some(expected) = expected {
                if expected != path {
                    violations.push(HierarchyViolation {
                        node_id: *id,
                        kind: ViolationKind::PathMismatch {
                            stored: path.to_string(),
                            expected: expected.to_string(),
                        },
                    });
                }
            }

            if *depth != path.depth() {
                violations.push(HierarchyViolation {
                    node_id: *id,
                    kind: ViolationKind::DepthMismatch {
                        stored: *depth,
                        expected: path.depth(),
                    },
                });
            }
        }

        Ok(violations)
    }
}
