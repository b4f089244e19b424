//! taskplan CLI
//!
//! Maintains task hierarchies, dependencies and baselines in a SQLite file
//! and prints critical-path schedules.

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::fs::OpenOptions;
use taskplan::cli::{BaselineCommand, Cli, Command, DepCommand, ProjectCommand, TaskCommand};
use taskplan::config::Config;
use taskplan::db::Database;
use taskplan::error::PlanError;
use taskplan::format::{self, OutputFormat};
use taskplan::types::NewTask;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

/// Print `value` as JSON, or as the markdown `render` produces.
fn emit<T: Serialize>(format: OutputFormat, value: &T, render: impl FnOnce(&T) -> String) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", format::to_json(value)?),
        OutputFormat::Markdown => print!("{}", render(value)),
    }
    Ok(())
}

fn run(cli: Cli, config: Config, db: Database) -> Result<(), PlanError> {
    let fmt = cli.format;
    let scheduling = &config.scheduling;

    match cli.command {
        Command::Project(ProjectCommand::Create { name }) => {
            let project = db.create_project(&name)?;
            emit(fmt, &project, |p| format!("Created project `{}`: {}\n", p.id, p.name))?;
        }
        Command::Project(ProjectCommand::List) => {
            let projects = db.list_projects()?;
            emit(fmt, &projects, |ps| {
                ps.iter()
                    .map(|p| format!("- `{}` {}\n", p.id, p.name))
                    .collect()
            })?;
        }

        Command::Task(TaskCommand::Create(args)) => {
            let input = NewTask {
                title: args.title,
                project_id: args.project,
                parent_id: args.parent,
                position: args.position,
                is_milestone: args.milestone,
                estimated_hours: args.hours,
                planned_start: args.start,
                planned_end: args.end,
                due_date: args.due,
            };
            let task = db.create_task(input)?;
            emit(fmt, &task, |t| format!("Created task `{}` at `{}`\n", t.id, t.tree.path))?;
        }
        Command::Task(TaskCommand::Move { task, parent }) => {
            let task = db.move_task(task, parent)?;
            emit(fmt, &task, |t| format!("Moved task `{}` to `{}`\n", t.id, t.tree.path))?;
        }
        Command::Task(TaskCommand::Tree { task, project }) => {
            let trees = match (task, project) {
                (Some(task), _) => vec![db.task_tree(task)?],
                (None, Some(project)) => db.project_task_tree(project)?,
                (None, None) => {
                    return Err(PlanError::validation("give a task id or --project"));
                }
            };
            emit(fmt, &trees, |t| format::format_task_tree_markdown(t))?;
        }
        Command::Task(TaskCommand::Delete { task, soft }) => {
            let removed = if soft {
                db.soft_delete_task(task)?
            } else {
                db.delete_task(task)?
            };
            emit(fmt, &serde_json::json!({ "task_id": task, "removed": removed }), |_| {
                format!("Deleted {} task(s)\n", removed)
            })?;
        }

        Command::Dep(DepCommand::Add {
            predecessor,
            successor,
            dep_type,
            lag,
        }) => {
            let edge = db.add_dependency(predecessor, successor, dep_type, lag)?;
            emit(fmt, &edge, |e| {
                format!(
                    "Added `{}` → `{}` {}{:+}\n",
                    e.predecessor_id, e.successor_id, e.dep_type, e.lag_days
                )
            })?;
        }
        Command::Dep(DepCommand::Remove {
            predecessor,
            successor,
        }) => {
            let removed = db.remove_dependency(predecessor, successor)?;
            emit(fmt, &serde_json::json!({ "removed": removed }), |_| {
                if removed {
                    "Removed dependency\n".to_string()
                } else {
                    "No such dependency\n".to_string()
                }
            })?;
        }
        Command::Dep(DepCommand::List { task }) => {
            let edges = db.dependencies_for(task)?;
            emit(fmt, &edges, |e| format::format_edges_markdown(task, e))?;
        }

        Command::Baseline(BaselineCommand::Create { task, name }) => {
            let baseline = db.create_baseline(task, name.as_deref())?;
            emit(fmt, &baseline, |b| {
                format!("Created baseline #{} for task `{}`\n", b.baseline_number, b.task_id)
            })?;
        }
        Command::Baseline(BaselineCommand::List { task }) => {
            let baselines = db.list_baselines(task)?;
            emit(fmt, &baselines, |b| format::format_baselines_markdown(task, b))?;
        }
        Command::Baseline(BaselineCommand::Delete { baseline }) => {
            db.delete_baseline(baseline)?;
            emit(fmt, &serde_json::json!({ "deleted": baseline }), |_| {
                format!("Deleted baseline `{}`\n", baseline)
            })?;
        }

        Command::Schedule { project, today } => {
            let chart = match today {
                Some(today) => db.project_gantt_at(project, scheduling, today)?,
                None => db.project_gantt(project, scheduling)?,
            };
            emit(fmt, &chart, format::format_gantt_markdown)?;
        }

        Command::Verify => {
            let groups = vec![
                ("tasks", db.verify_task_hierarchy()?),
                ("departments", db.verify_department_hierarchy()?),
                ("checklist_items", db.verify_checklist_hierarchy()?),
            ];
            let clean = groups.iter().all(|(_, v)| v.is_empty());
            emit(fmt, &groups, |g| format::format_violations_markdown(g))?;
            if !clean {
                return Err(PlanError::validation("hierarchy check found inconsistencies"));
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(db_path) = &cli.database {
        config.storage.db_path = db_path.clone();
    }

    init_logging(&cli, &config)?;
    debug!(db_path = %config.storage.db_path.display(), "Opening database");

    config.ensure_db_dir()?;
    let db = Database::open(&config.storage.db_path)?;

    if let Err(err) = run(cli, config, db) {
        eprintln!("{}", serde_json::to_string(&err)?);
        std::process::exit(1);
    }
    Ok(())
}
