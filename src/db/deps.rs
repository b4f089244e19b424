//! Dependency edges between tasks.

use super::hierarchy::Hierarchy;
use super::tasks::TaskKind;
use super::{now_ms, placeholders, Database};
use crate::error::{PlanError, PlanResult};
use crate::scheduler::MAX_LAG_DAYS;
use crate::types::{DependencyEdge, DependencyType, NodeEdges, NodeId};
use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info};

type Tasks = Hierarchy<TaskKind>;

pub fn parse_edge_row(row: &Row) -> rusqlite::Result<DependencyEdge> {
    let code: String = row.get("dep_type")?;
    let dep_type = DependencyType::from_code(&code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Text,
            format!("unknown dependency type: {}", code).into(),
        )
    })?;
    Ok(DependencyEdge {
        predecessor_id: row.get("predecessor_id")?,
        successor_id: row.get("successor_id")?,
        dep_type,
        lag_days: row.get("lag_days")?,
        created_at: row.get("created_at")?,
    })
}

/// True if `predecessor_id` is already reachable from `successor_id`, so the
/// edge `predecessor_id -> successor_id` would close a cycle.
fn would_create_cycle(conn: &Connection, predecessor_id: NodeId, successor_id: NodeId) -> Result<bool> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    queue.push_back(successor_id);

    let mut stmt = conn.prepare("SELECT successor_id FROM task_dependencies WHERE predecessor_id = ?1")?;

    while let Some(current) = queue.pop_front() {
        if current == predecessor_id {
            return Ok(true);
        }
        if !visited.insert(current) {
            continue;
        }

        let next = stmt
            .query_map(params![current], |row| row.get::<_, NodeId>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for id in next {
            if !visited.contains(&id) {
                queue.push_back(id);
            }
        }
    }

    Ok(false)
}

fn validate_lag(lag_days: i64) -> Result<()> {
    if !(-MAX_LAG_DAYS..=MAX_LAG_DAYS).contains(&lag_days) {
        return Err(PlanError::invalid_value(
            "lag_days",
            &format!("lag must be within {} days either way", MAX_LAG_DAYS),
        )
        .into());
    }
    Ok(())
}

fn find_edge(conn: &Connection, predecessor_id: NodeId, successor_id: NodeId) -> Result<Option<DependencyEdge>> {
    let edge = conn
        .query_row(
            "SELECT * FROM task_dependencies WHERE predecessor_id = ?1 AND successor_id = ?2",
            params![predecessor_id, successor_id],
            parse_edge_row,
        )
        .optional()?;
    Ok(edge)
}

/// Edges with at least one endpoint in `task_ids`.
pub(crate) fn edges_touching(conn: &Connection, task_ids: &[NodeId]) -> Result<Vec<DependencyEdge>> {
    if task_ids.is_empty() {
        return Ok(Vec::new());
    }
    let list = placeholders(task_ids.len());
    let sql = format!(
        "SELECT * FROM task_dependencies
         WHERE predecessor_id IN ({list}) OR successor_id IN ({list})
         ORDER BY predecessor_id, successor_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let edges = stmt
        .query_map(params_from_iter(task_ids.iter().chain(task_ids.iter())), parse_edge_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(edges)
}

impl Database {
    /// Add a dependency edge `predecessor_id -> successor_id`.
    ///
    /// Checks run in order: lag in range, both tasks exist, no
    /// self-dependency, same project, no existing edge between the pair, no
    /// cycle.
    pub fn add_dependency(
        &self,
        predecessor_id: NodeId,
        successor_id: NodeId,
        dep_type: DependencyType,
        lag_days: i64,
    ) -> PlanResult<DependencyEdge> {
        validate_lag(lag_days)?;
        let edge = self.with_write_tx(|tx| {
            let predecessor = Tasks::require(tx, predecessor_id)?;
            let successor = Tasks::require(tx, successor_id)?;

            if predecessor_id == successor_id {
                return Err(PlanError::self_dependency(predecessor_id).into());
            }
            if predecessor.scope != successor.scope {
                return Err(PlanError::validation(format!(
                    "tasks {} and {} belong to different projects",
                    predecessor_id, successor_id
                ))
                .into());
            }
            if find_edge(tx, predecessor_id, successor_id)?.is_some() {
                return Err(PlanError::duplicate_dependency(predecessor_id, successor_id).into());
            }
            if would_create_cycle(tx, predecessor_id, successor_id)? {
                return Err(PlanError::dependency_cycle(predecessor_id, successor_id).into());
            }

            let edge = DependencyEdge {
                predecessor_id,
                successor_id,
                dep_type,
                lag_days,
                created_at: now_ms(),
            };
            tx.execute(
                "INSERT INTO task_dependencies (predecessor_id, successor_id, dep_type, lag_days, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    edge.predecessor_id,
                    edge.successor_id,
                    edge.dep_type.as_code(),
                    edge.lag_days,
                    edge.created_at,
                ],
            )?;
            Ok(edge)
        })?;

        info!(
            predecessor_id,
            successor_id,
            dep_type = %edge.dep_type,
            lag_days,
            "Added dependency"
        );
        Ok(edge)
    }

    /// Remove a dependency edge. Returns false if there was none.
    pub fn remove_dependency(&self, predecessor_id: NodeId, successor_id: NodeId) -> PlanResult<bool> {
        let removed = self.with_write_tx(|tx| {
            let n = tx.execute(
                "DELETE FROM task_dependencies WHERE predecessor_id = ?1 AND successor_id = ?2",
                params![predecessor_id, successor_id],
            )?;
            Ok(n > 0)
        })?;
        if removed {
            info!(predecessor_id, successor_id, "Removed dependency");
        } else {
            debug!(predecessor_id, successor_id, "No dependency to remove");
        }
        Ok(removed)
    }

    /// Change the type and lag of an existing edge in place.
    pub fn update_dependency(
        &self,
        predecessor_id: NodeId,
        successor_id: NodeId,
        dep_type: DependencyType,
        lag_days: i64,
    ) -> PlanResult<DependencyEdge> {
        validate_lag(lag_days)?;
        let edge = self.with_write_tx(|tx| {
            let mut edge = find_edge(tx, predecessor_id, successor_id)?.ok_or_else(|| {
                PlanError::not_found("dependency", format!("{} -> {}", predecessor_id, successor_id))
            })?;
            tx.execute(
                "UPDATE task_dependencies SET dep_type = ?1, lag_days = ?2
                 WHERE predecessor_id = ?3 AND successor_id = ?4",
                params![dep_type.as_code(), lag_days, predecessor_id, successor_id],
            )?;
            edge.dep_type = dep_type;
            edge.lag_days = lag_days;
            Ok(edge)
        })?;
        info!(predecessor_id, successor_id, dep_type = %dep_type, lag_days, "Updated dependency");
        Ok(edge)
    }

    pub fn get_dependency(&self, predecessor_id: NodeId, successor_id: NodeId) -> PlanResult<Option<DependencyEdge>> {
        Ok(self.with_conn(|conn| find_edge(conn, predecessor_id, successor_id))?)
    }

    /// Edges touching a task, split by direction.
    pub fn dependencies_for(&self, task_id: NodeId) -> PlanResult<NodeEdges> {
        Ok(self.with_read_tx(|tx| {
            Tasks::require(tx, task_id)?;
            let mut edges = NodeEdges::default();
            for edge in edges_touching(tx, &[task_id])? {
                if edge.predecessor_id == task_id {
                    edges.as_predecessor.push(edge);
                } else {
                    edges.as_successor.push(edge);
                }
            }
            Ok(edges)
        })?)
    }

    /// Edges with at least one endpoint in `task_ids`.
    pub fn get_edges_for(&self, task_ids: &[NodeId]) -> PlanResult<Vec<DependencyEdge>> {
        Ok(self.with_conn(|conn| edges_touching(conn, task_ids))?)
    }
}
