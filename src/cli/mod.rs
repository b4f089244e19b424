//! CLI command definitions for taskplan
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use crate::types::DependencyType;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Task hierarchies and critical-path scheduling
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Manage the task tree
    #[command(subcommand)]
    Task(TaskCommand),

    /// Manage dependencies between tasks
    #[command(subcommand)]
    Dep(DepCommand),

    /// Manage plan baselines
    #[command(subcommand)]
    Baseline(BaselineCommand),

    /// Compute the critical-path schedule of a project
    Schedule {
        /// Project id
        project: i64,

        /// Anchor date when no task carries one (default: today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        today: Option<NaiveDate>,
    },

    /// Check stored paths and depths against the parent chain
    Verify,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project
    Create {
        name: String,
    },
    /// List projects
    List,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Create a task
    Create(TaskCreateArgs),

    /// Move a task (and its subtree) under a new parent
    Move {
        task: i64,

        /// New parent task; omit to make the task a root
        #[arg(long)]
        parent: Option<i64>,
    },

    /// Show a task subtree, or a whole project with --project
    Tree {
        task: Option<i64>,

        #[arg(long, conflicts_with = "task")]
        project: Option<i64>,
    },

    /// Delete a task and its subtree
    Delete {
        task: i64,

        /// Mark deleted instead of removing rows
        #[arg(long)]
        soft: bool,
    },
}

/// Arguments for `task create`
#[derive(Args, Debug)]
pub struct TaskCreateArgs {
    pub title: String,

    /// Owning project (required for root tasks)
    #[arg(long)]
    pub project: Option<i64>,

    /// Parent task
    #[arg(long)]
    pub parent: Option<i64>,

    /// Sibling position (default: after the last sibling)
    #[arg(long)]
    pub position: Option<i64>,

    /// Effort estimate in hours
    #[arg(long)]
    pub hours: Option<f64>,

    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: Option<NaiveDate>,

    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end: Option<NaiveDate>,

    #[arg(long, value_name = "YYYY-MM-DD")]
    pub due: Option<NaiveDate>,

    /// Zero-duration milestone
    #[arg(long)]
    pub milestone: bool,
}

#[derive(Subcommand, Debug)]
pub enum DepCommand {
    /// Add a dependency: SUCCESSOR waits on PREDECESSOR
    Add {
        predecessor: i64,
        successor: i64,

        /// FS, SS, FF or SF
        #[arg(long = "type", default_value = "FS", value_parser = parse_dep_type)]
        dep_type: DependencyType,

        /// Signed lag in days
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        lag: i64,
    },
    /// Remove a dependency
    Remove {
        predecessor: i64,
        successor: i64,
    },
    /// List dependencies of a task
    List {
        task: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum BaselineCommand {
    /// Snapshot a task's current plan
    Create {
        task: i64,

        #[arg(long)]
        name: Option<String>,
    },
    /// List baselines of a task
    List {
        task: i64,
    },
    /// Delete a baseline by id
    Delete {
        baseline: i64,
    },
}

fn parse_dep_type(s: &str) -> Result<DependencyType, String> {
    DependencyType::from_code(s).ok_or_else(|| format!("unknown dependency type '{}' (expected FS, SS, FF or SF)", s))
}
