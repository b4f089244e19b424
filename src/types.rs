//! Core types for tasks, departments, checklist items, dependencies and baselines.

use crate::path::MaterializedPath;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// Store-assigned row id shared by every hierarchical entity.
pub type NodeId = i64;

/// Tree bookkeeping columns every hierarchical entity carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeFields {
    pub parent_id: Option<NodeId>,
    pub path: MaterializedPath,
    pub depth: i64,
    /// Sibling order; only meaningful among nodes sharing a parent.
    pub position: i64,
}

/// Capability set the hierarchy engine relies on.
pub trait PathNode {
    fn id(&self) -> NodeId;
    fn tree(&self) -> &TreeFields;

    fn parent_id(&self) -> Option<NodeId> {
        self.tree().parent_id
    }

    fn path(&self) -> &MaterializedPath {
        &self.tree().path
    }

    fn depth(&self) -> i64 {
        self.tree().depth
    }

    fn position(&self) -> i64 {
        self.tree().position
    }
}

/// Convert a millisecond timestamp to its UTC calendar date.
pub fn ms_to_date(ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// A project groups tasks for scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: NodeId,
    pub name: String,
    pub created_at: i64,
}

/// A task in a project's work breakdown tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: NodeId,
    pub project_id: NodeId,
    #[serde(flatten)]
    pub tree: TreeFields,
    pub title: String,

    // Scheduling inputs
    pub is_milestone: bool,
    pub estimated_hours: Option<f64>,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,

    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl PathNode for Task {
    fn id(&self) -> NodeId {
        self.id
    }

    fn tree(&self) -> &TreeFields {
        &self.tree
    }
}

/// Input for creating a task.
///
/// `project_id` is required for root tasks; children inherit their parent's
/// project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub project_id: Option<NodeId>,
    pub parent_id: Option<NodeId>,
    /// Explicit sibling position; appended after the last sibling if absent.
    pub position: Option<i64>,
    #[serde(default)]
    pub is_milestone: bool,
    pub estimated_hours: Option<f64>,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn in_project(mut self, project_id: NodeId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn under(mut self, parent_id: NodeId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_effort(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    pub fn with_plan(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.planned_start = Some(start);
        self.planned_end = Some(end);
        self
    }

    pub fn milestone(mut self) -> Self {
        self.is_milestone = true;
        self
    }
}

/// Partial update of a task's scheduling fields.
///
/// The outer `Option` means "leave unchanged"; `Some(None)` clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskScheduleUpdate {
    pub title: Option<String>,
    pub is_milestone: Option<bool>,
    pub estimated_hours: Option<Option<f64>>,
    pub planned_start: Option<Option<NaiveDate>>,
    pub planned_end: Option<Option<NaiveDate>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub started_at: Option<Option<i64>>,
    pub completed_at: Option<Option<i64>>,
}

/// A task with its children for tree operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTree {
    #[serde(flatten)]
    pub task: Task,
    pub children: Vec<TaskTree>,
}

/// An organizational department.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: NodeId,
    #[serde(flatten)]
    pub tree: TreeFields,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl PathNode for Department {
    fn id(&self) -> NodeId {
        self.id
    }

    fn tree(&self) -> &TreeFields {
        &self.tree
    }
}

/// A nested checklist entry owned by a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: NodeId,
    pub task_id: NodeId,
    #[serde(flatten)]
    pub tree: TreeFields,
    pub content: String,
    pub is_checked: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl PathNode for ChecklistItem {
    fn id(&self) -> NodeId {
        self.id
    }

    fn tree(&self) -> &TreeFields {
        &self.tree
    }
}

/// Checked vs. total items of a task's checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistProgress {
    pub total: i64,
    pub checked: i64,
}

/// Temporal relationship between a predecessor and a successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DependencyType {
    /// Finish-to-Start
    #[default]
    #[serde(rename = "FS")]
    FinishToStart,
    /// Start-to-Start
    #[serde(rename = "SS")]
    StartToStart,
    /// Finish-to-Finish
    #[serde(rename = "FF")]
    FinishToFinish,
    /// Start-to-Finish
    #[serde(rename = "SF")]
    StartToFinish,
}

impl DependencyType {
    pub const ALL: [DependencyType; 4] = [
        DependencyType::FinishToStart,
        DependencyType::StartToStart,
        DependencyType::FinishToFinish,
        DependencyType::StartToFinish,
    ];

    /// Two-letter persisted code.
    pub fn as_code(&self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "FS",
            DependencyType::StartToStart => "SS",
            DependencyType::FinishToFinish => "FF",
            DependencyType::StartToFinish => "SF",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FS" => Some(DependencyType::FinishToStart),
            "SS" => Some(DependencyType::StartToStart),
            "FF" => Some(DependencyType::FinishToFinish),
            "SF" => Some(DependencyType::StartToFinish),
            _ => None,
        }
    }
}

impl std::fmt::Display for DependencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_code())
    }
}

/// A directed dependency edge between two tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub predecessor_id: NodeId,
    pub successor_id: NodeId,
    pub dep_type: DependencyType,
    /// Signed day offset: positive delays, negative overlaps.
    pub lag_days: i64,
    pub created_at: i64,
}

/// Edges touching a single task, split by direction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeEdges {
    pub as_predecessor: Vec<DependencyEdge>,
    pub as_successor: Vec<DependencyEdge>,
}

/// Immutable snapshot of a task's plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub id: NodeId,
    pub task_id: NodeId,
    pub baseline_number: i64,
    pub name: Option<String>,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    pub estimated_hours: Option<f64>,
    pub created_at: i64,
}

/// A node whose stored tree columns disagree with its parent chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyViolation {
    pub node_id: NodeId,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViolationKind {
    /// `parent_id` references a row that does not exist.
    DanglingParent { parent_id: NodeId },
    /// Stored path differs from the one implied by the parent chain.
    PathMismatch { stored: String, expected: String },
    /// Stored depth differs from the path's segment count.
    DepthMismatch { stored: i64, expected: i64 },
    /// Stored path could not be parsed.
    MalformedPath { stored: String },
}
