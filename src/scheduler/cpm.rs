//! Critical path calculation using forward and backward passes.

use super::duration::{DurationRules, TaskTiming};
use super::relation::{bound, Pass, Window};
use super::{MAX_DURATION_DAYS, MAX_LAG_DAYS};
use crate::types::{DependencyEdge, DependencyType, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// One schedulable activity: a node id and its duration in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: NodeId,
    pub duration: i64,
}

impl Activity {
    pub fn new(id: NodeId, duration: i64) -> Self {
        Self { id, duration }
    }
}

/// Computed timing of one node, in day offsets from the project start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSchedule {
    pub node_id: NodeId,
    pub duration: i64,
    pub earliest_start: i64,
    pub earliest_finish: i64,
    pub latest_start: i64,
    pub latest_finish: i64,
    pub float: i64,
    pub is_critical: bool,
}

/// Full schedule for a node set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResult {
    /// Per-node timings, in input order.
    pub nodes: Vec<NodeSchedule>,
    pub project_duration: i64,
    /// Every zero-float node, ordered by earliest start then id.
    ///
    /// Several chains may tie for the longest path, so this is a set rather
    /// than a single ordered chain.
    pub critical_path: Vec<NodeId>,
}

impl ScheduleResult {
    pub fn get(&self, node_id: NodeId) -> Option<&NodeSchedule> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    pub fn is_critical(&self, node_id: NodeId) -> bool {
        self.get(node_id).is_some_and(|n| n.is_critical)
    }
}

/// Edge re-expressed over dense node indices.
#[derive(Debug, Clone, Copy)]
struct Link {
    other: usize,
    dep_type: DependencyType,
    lag: i64,
}

/// Stateless critical-path scheduler.
#[derive(Debug, Clone, Default)]
pub struct CpmScheduler {
    rules: DurationRules,
}

impl CpmScheduler {
    pub fn new(rules: DurationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &DurationRules {
        &self.rules
    }

    /// Resolve durations for task timings and compute the schedule.
    pub fn schedule(&self, timings: &[TaskTiming], edges: &[DependencyEdge]) -> ScheduleResult {
        let activities: Vec<Activity> = timings
            .iter()
            .map(|t| Activity::new(t.id, self.rules.duration_days(t)))
            .collect();
        Self::compute(&activities, edges)
    }

    /// Compute forward/backward passes, float and the critical set.
    ///
    /// Edges with an endpoint outside `activities` are dropped. Never fails:
    /// a cyclic edge set (which the dependency store rejects) degrades to
    /// ignoring the edges that close a cycle. Durations and lags are clamped
    /// to [`MAX_DURATION_DAYS`] and [`MAX_LAG_DAYS`] and offsets saturate, so
    /// out-of-range input cannot overflow.
    pub fn compute(activities: &[Activity], edges: &[DependencyEdge]) -> ScheduleResult {
        let n = activities.len();
        if n == 0 {
            return ScheduleResult::default();
        }

        let mut index: HashMap<NodeId, usize> = HashMap::with_capacity(n);
        for (i, activity) in activities.iter().enumerate() {
            index.entry(activity.id).or_insert(i);
        }
        let durations: Vec<i64> = activities
            .iter()
            .map(|a| a.duration.clamp(0, MAX_DURATION_DAYS))
            .collect();

        let mut predecessors: Vec<Vec<Link>> = vec![Vec::new(); n];
        let mut successors: Vec<Vec<Link>> = vec![Vec::new(); n];
        let mut dropped = 0usize;
        for edge in edges {
            let (Some(&p), Some(&s)) = (index.get(&edge.predecessor_id), index.get(&edge.successor_id))
            else {
                dropped += 1;
                continue;
            };
            if p == s {
                dropped += 1;
                continue;
            }
            let lag = edge.lag_days.clamp(-MAX_LAG_DAYS, MAX_LAG_DAYS);
            successors[p].push(Link {
                other: s,
                dep_type: edge.dep_type,
                lag,
            });
            predecessors[s].push(Link {
                other: p,
                dep_type: edge.dep_type,
                lag,
            });
        }
        if dropped > 0 {
            debug!(dropped, "Ignoring dependency edges outside the scheduled node set");
        }

        let order = topological_order(&successors);

        // Forward pass
        let mut early: Vec<Option<Window>> = vec![None; n];
        for &i in &order {
            let mut es = 0i64;
            for link in &predecessors[i] {
                // None only when a cycle slipped through; treat as unconstrained.
                if let Some(pred) = early[link.other] {
                    es = es.max(bound(link.dep_type, Pass::Forward, pred, link.lag, durations[i]));
                }
            }
            early[i] = Some(Window {
                start: es,
                finish: es.saturating_add(durations[i]),
            });
        }
        let early: Vec<Window> = early
            .into_iter()
            .zip(durations.iter())
            .map(|(w, &d)| w.unwrap_or(Window { start: 0, finish: d }))
            .collect();

        let project_duration = early.iter().map(|w| w.finish).max().unwrap_or(0);

        // Backward pass
        let mut late: Vec<Option<Window>> = vec![None; n];
        for &i in order.iter().rev() {
            let mut lf = project_duration;
            for link in &successors[i] {
                if let Some(succ) = late[link.other] {
                    lf = lf.min(bound(link.dep_type, Pass::Backward, succ, link.lag, durations[i]));
                }
            }
            late[i] = Some(Window {
                start: lf.saturating_sub(durations[i]),
                finish: lf,
            });
        }

        let mut nodes = Vec::with_capacity(n);
        for (i, activity) in activities.iter().enumerate() {
            let e = early[i];
            let l = late[i].unwrap_or(Window {
                start: project_duration.saturating_sub(durations[i]),
                finish: project_duration,
            });
            let float = l.start.saturating_sub(e.start);
            nodes.push(NodeSchedule {
                node_id: activity.id,
                duration: durations[i],
                earliest_start: e.start,
                earliest_finish: e.finish,
                latest_start: l.start,
                latest_finish: l.finish,
                float,
                is_critical: float == 0,
            });
        }

        let mut critical: Vec<&NodeSchedule> = nodes.iter().filter(|s| s.is_critical).collect();
        critical.sort_by_key(|s| (s.earliest_start, s.node_id));
        let critical_path: Vec<NodeId> = critical.into_iter().map(|s| s.node_id).collect();

        debug!(
            nodes = n,
            project_duration,
            critical = critical_path.len(),
            "Computed critical path schedule"
        );

        ScheduleResult {
            nodes,
            project_duration,
            critical_path,
        }
    }
}

/// Reverse DFS post-order over the successor lists.
///
/// Iterative so deep chains cannot overflow the stack. A successor that is
/// still on the DFS stack closes a cycle; that edge is skipped and logged.
fn topological_order(successors: &[Vec<Link>]) -> Vec<usize> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        Active,
        Done,
    }

    let n = successors.len();
    let mut marks = vec![Mark::Unvisited; n];
    let mut post_order = Vec::with_capacity(n);
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::Active;
        stack.push((root, 0));

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            if next < successors[node].len() {
                frame.1 += 1;
                let child = successors[node][next].other;
                match marks[child] {
                    Mark::Unvisited => {
                        marks[child] = Mark::Active;
                        stack.push((child, 0));
                    }
                    Mark::Active => {
                        warn!(from = node, to = child, "Dependency cycle reached the scheduler; edge ignored");
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                post_order.push(node);
                stack.pop();
            }
        }
    }

    post_order.reverse();
    post_order
}
