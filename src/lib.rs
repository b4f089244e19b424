//! taskplan Library
//!
//! Materialized-path hierarchies for tasks, departments and checklists, a
//! dependency graph between tasks, and a Critical-Path-Method scheduler with
//! plan baselines. This module exports the core components for testing and
//! integration.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod gantt;
pub mod path;
pub mod scheduler;
pub mod types;
