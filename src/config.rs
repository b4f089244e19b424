//! Configuration loading and management.
//!
//! Lookup order: explicit path, `taskplan/config.yaml` in the working
//! directory, `~/.taskplan/config.yaml`, then built-in defaults. Environment
//! variables override whatever was loaded:
//! - `TASKPLAN_DB_PATH` - database path
//! - `TASKPLAN_HOURS_PER_DAY` - working hours per scheduled day
//! - `TASKPLAN_LOG_LEVEL` - default log level

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, Level};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub scheduling: SchedulingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("taskplan/plan.db")
}

/// Duration rules used by the critical-path scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Effort hours that make up one scheduled day.
    #[serde(default = "default_hours_per_day")]
    pub hours_per_day: f64,

    /// Duration for tasks with neither effort nor a resolvable date range.
    #[serde(default = "default_duration_days")]
    pub default_duration_days: i64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            hours_per_day: default_hours_per_day(),
            default_duration_days: default_duration_days(),
        }
    }
}

fn default_hours_per_day() -> f64 {
    8.0
}

fn default_duration_days() -> i64 {
    1
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `--verbose` is not given (error, warn, info, debug, trace).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Candidate config files, highest priority first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("taskplan/config.yaml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".taskplan").join("config.yaml"));
        }
        paths
    }

    /// Load from an explicit path, else the first existing search path, else
    /// defaults; then apply environment overrides.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let found = Self::search_paths().into_iter().find(|p| p.exists());
                match found {
                    Some(path) => {
                        debug!(path = %path.display(), "Loading config");
                        Self::load(path)?
                    }
                    None => Self::default(),
                }
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TASKPLAN_*` environment variables. A value that does not
    /// parse is an error rather than silently ignored.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(db_path) = std::env::var("TASKPLAN_DB_PATH") {
            self.storage.db_path = PathBuf::from(db_path);
        }

        if let Ok(hours) = std::env::var("TASKPLAN_HOURS_PER_DAY") {
            self.scheduling.hours_per_day = parse_hours_override(&hours)?;
        }

        if let Ok(level) = std::env::var("TASKPLAN_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Reject values the scheduler cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.scheduling.hours_per_day > 0.0) {
            anyhow::bail!(
                "scheduling.hours_per_day must be positive, got {}",
                self.scheduling.hours_per_day
            );
        }
        if self.logging.level.parse::<Level>().is_err() {
            anyhow::bail!(
                "logging.level must be one of error, warn, info, debug, trace; got {:?}",
                self.logging.level
            );
        }
        if self.scheduling.default_duration_days < 0 {
            anyhow::bail!(
                "scheduling.default_duration_days must not be negative, got {}",
                self.scheduling.default_duration_days
            );
        }
        Ok(())
    }

    /// Log level from `logging.level`.
    pub fn log_level(&self) -> Result<Level> {
        self.logging
            .level
            .parse()
            .with_context(|| format!("invalid logging.level {:?}", self.logging.level))
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.storage.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

fn parse_hours_override(value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("TASKPLAN_HOURS_PER_DAY is not a number: {:?}", value))
}
