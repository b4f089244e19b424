//! Output formatting utilities for markdown and JSON.

use crate::gantt::GanttChart;
use crate::types::{Baseline, HierarchyViolation, NodeEdges, TaskTree, ViolationKind};
use clap::ValueEnum;
use serde::Serialize;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    #[value(alias = "md")]
    Markdown,
}

/// Pretty-printed JSON for any serializable result.
pub fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Format a task forest as an indented markdown list.
pub fn format_task_tree_markdown(trees: &[TaskTree]) -> String {
    fn walk(md: &mut String, tree: &TaskTree, indent: usize) {
        let task = &tree.task;
        let marker = if task.is_milestone { " ◆" } else { "" };
        md.push_str(&format!(
            "{}- `{}` {}{}\n",
            "  ".repeat(indent),
            task.tree.path,
            task.title,
            marker
        ));
        for child in &tree.children {
            walk(md, child, indent + 1);
        }
    }

    let mut md = String::new();
    for tree in trees {
        walk(&mut md, tree, 0);
    }
    if md.is_empty() {
        md.push_str("_No tasks._\n");
    }
    md
}

/// Format a Gantt chart as a markdown table.
pub fn format_gantt_markdown(chart: &GanttChart) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Schedule: project {}\n\n", chart.project_id));
    md.push_str(&format!(
        "- **start**: {}\n- **finish**: {}\n- **duration**: {} days\n",
        chart.project_start, chart.project_finish, chart.project_duration
    ));
    let critical: Vec<String> = chart.critical_path.iter().map(|id| format!("`{}`", id)).collect();
    md.push_str(&format!("- **critical**: {}\n\n", critical.join(", ")));

    if chart.rows.is_empty() {
        md.push_str("_No tasks._\n");
        return md;
    }

    md.push_str("| Task | Title | Start | Finish | Days | Float | Critical | Variance |\n");
    md.push_str("|------|-------|-------|--------|------|-------|----------|----------|\n");
    for row in &chart.rows {
        let indent = "&nbsp;&nbsp;".repeat(row.task.tree.depth.max(0) as usize);
        let variance = match row.variance_days {
            Some(days) if days > 0 => format!("+{}", days),
            Some(days) => days.to_string(),
            None => "-".to_string(),
        };
        md.push_str(&format!(
            "| `{}` | {}{} | {} | {} | {} | {} | {} | {} |\n",
            row.task.id,
            indent,
            row.task.title,
            row.start_date,
            row.finish_date,
            row.duration_days,
            row.schedule.float,
            if row.schedule.is_critical { "yes" } else { "" },
            variance
        ));
    }

    if !chart.edges.is_empty() {
        md.push_str("\n## Dependencies\n");
        for edge in &chart.edges {
            md.push_str(&format!(
                "- `{}` → `{}` {}{:+}\n",
                edge.predecessor_id, edge.successor_id, edge.dep_type, edge.lag_days
            ));
        }
    }

    md
}

/// Format the edges touching one task.
pub fn format_edges_markdown(task_id: i64, edges: &NodeEdges) -> String {
    let mut md = format!("## Dependencies of `{}`\n", task_id);
    if edges.as_successor.is_empty() && edges.as_predecessor.is_empty() {
        md.push_str("_None._\n");
        return md;
    }
    for edge in &edges.as_successor {
        md.push_str(&format!(
            "- after `{}` ({} {:+})\n",
            edge.predecessor_id, edge.dep_type, edge.lag_days
        ));
    }
    for edge in &edges.as_predecessor {
        md.push_str(&format!(
            "- before `{}` ({} {:+})\n",
            edge.successor_id, edge.dep_type, edge.lag_days
        ));
    }
    md
}

pub fn format_baselines_markdown(task_id: i64, baselines: &[Baseline]) -> String {
    let mut md = format!("## Baselines of `{}`\n", task_id);
    if baselines.is_empty() {
        md.push_str("_None._\n");
        return md;
    }
    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
    for b in baselines {
        md.push_str(&format!(
            "- #{} {} ({} → {}, {}h)\n",
            b.baseline_number,
            b.name.as_deref().unwrap_or(""),
            date(b.planned_start),
            date(b.planned_end),
            b.estimated_hours.map(|h| h.to_string()).unwrap_or_else(|| "-".into())
        ));
    }
    md
}

/// Format hierarchy check results, grouped by entity kind.
pub fn format_violations_markdown(groups: &[(&str, Vec<HierarchyViolation>)]) -> String {
    let mut md = String::new();
    for (kind, violations) in groups {
        md.push_str(&format!("## {} ({} issues)\n", kind, violations.len()));
        for v in violations {
            let detail = match &v.kind {
                ViolationKind::DanglingParent { parent_id } => {
                    format!("parent {} does not exist", parent_id)
                }
                ViolationKind::PathMismatch { stored, expected } => {
                    format!("path `{}`, expected `{}`", stored, expected)
                }
                ViolationKind::DepthMismatch { stored, expected } => {
                    format!("depth {}, expected {}", stored, expected)
                }
                ViolationKind::MalformedPath { stored } => format!("malformed path `{}`", stored),
            };
            md.push_str(&format!("- `{}`: {}\n", v.node_id, detail));
        }
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violations_markdown() {
        let groups = vec![
            ("tasks", Vec::new()),
            (
                "departments",
                vec![HierarchyViolation {
                    node_id: 7,
                    kind: ViolationKind::DepthMismatch {
                        stored: 3,
                        expected: 1,
                    },
                }],
            ),
        ];
        let md = format_violations_markdown(&groups);
        assert!(md.contains("## tasks (0 issues)"));
        assert!(md.contains("- `7`: depth 3, expected 1"));
    }

    #[test]
    fn test_empty_tree_markdown() {
        assert_eq!(format_task_tree_markdown(&[]), "_No tasks._\n");
    }
}
