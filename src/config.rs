//! Configuration loading and management
//!
//! Handles parsing of `.tiki.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::task::{Status, TaskType, DEFAULT_MAX_POINTS, MAX_PRIORITY, MIN_PRIORITY};

/// Name of the configuration file at the repository root
pub const CONFIG_FILE: &str = ".tiki.toml";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log level used when neither `--log-level` nor `RUST_LOG` is set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Task storage and defaults for new tasks
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Board presentation
    #[serde(default)]
    pub ui: UiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            tasks: TasksConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Task-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Task directory, relative to the repository root
    #[serde(default = "default_task_dir")]
    pub dir: PathBuf,

    /// Prefix for generated task IDs
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Upper bound for story points
    #[serde(default = "default_max_points")]
    pub max_points: i32,

    #[serde(default = "default_status")]
    pub default_status: String,

    #[serde(default = "default_type")]
    pub default_type: String,

    #[serde(default = "default_priority")]
    pub default_priority: i32,

    #[serde(default = "default_points")]
    pub default_points: i32,
}

fn default_task_dir() -> PathBuf {
    PathBuf::from(".doc").join("tiki")
}

fn default_id_prefix() -> String {
    "TIKI".to_string()
}

fn default_max_points() -> i32 {
    DEFAULT_MAX_POINTS
}

fn default_status() -> String {
    Status::Backlog.as_str().to_string()
}

fn default_type() -> String {
    TaskType::Story.as_str().to_string()
}

fn default_priority() -> i32 {
    3
}

fn default_points() -> i32 {
    1
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            dir: default_task_dir(),
            id_prefix: default_id_prefix(),
            max_points: default_max_points(),
            default_status: default_status(),
            default_type: default_type(),
            default_priority: default_priority(),
            default_points: default_points(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    /// `compact` or `expanded`
    #[serde(default = "default_view_mode")]
    pub view_mode: String,
}

fn default_view_mode() -> String {
    "compact".to_string()
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            view_mode: default_view_mode(),
        }
    }
}

impl Config {
    /// Load configuration from a `.tiki.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the repo root; defaults when the file is missing
    pub fn load_from_repo(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Absolute task directory for a repository root
    pub fn task_dir(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.tasks.dir)
    }

    /// A project is initialized once its task directory exists
    pub fn is_initialized(&self, repo_root: &Path) -> bool {
        self.task_dir(repo_root).is_dir()
    }

    pub fn validate(&self) -> Result<()> {
        if !crate::logging::is_valid_level(&self.log_level) {
            return Err(Error::InvalidConfig(format!(
                "log_level '{}' must be one of {}",
                self.log_level,
                crate::logging::LEVELS.join(", ")
            )));
        }
        self.tasks.validate()?;
        self.ui.validate()?;
        Ok(())
    }
}

impl TasksConfig {
    fn validate(&self) -> Result<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("tasks.dir cannot be empty".to_string()));
        }
        if self.dir.is_absolute() {
            return Err(Error::InvalidConfig(
                "tasks.dir must be relative to the repository root".to_string(),
            ));
        }

        let prefix = self.id_prefix.trim();
        if prefix.is_empty() {
            return Err(Error::InvalidConfig(
                "tasks.id_prefix cannot be empty".to_string(),
            ));
        }
        if !prefix.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(Error::InvalidConfig(
                "tasks.id_prefix must be alphanumeric".to_string(),
            ));
        }

        if self.max_points < 1 {
            return Err(Error::InvalidConfig(
                "tasks.max_points must be >= 1".to_string(),
            ));
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.default_priority) {
            return Err(Error::InvalidConfig(format!(
                "tasks.default_priority must be between {MIN_PRIORITY} and {MAX_PRIORITY}"
            )));
        }
        if !(0..=self.max_points).contains(&self.default_points) {
            return Err(Error::InvalidConfig(format!(
                "tasks.default_points must be between 0 and {}",
                self.max_points
            )));
        }

        if Status::parse(&self.default_status).is_none() {
            return Err(Error::InvalidConfig(format!(
                "tasks.default_status '{}' is not a known status",
                self.default_status
            )));
        }
        if TaskType::parse(&self.default_type).is_none() {
            return Err(Error::InvalidConfig(format!(
                "tasks.default_type '{}' is not a known type",
                self.default_type
            )));
        }
        Ok(())
    }

    pub fn status(&self) -> Status {
        Status::parse(&self.default_status).unwrap_or_default()
    }

    pub fn task_type(&self) -> TaskType {
        TaskType::parse(&self.default_type).unwrap_or_default()
    }
}

impl UiConfig {
    fn validate(&self) -> Result<()> {
        match self.view_mode.as_str() {
            "compact" | "expanded" => Ok(()),
            other => Err(Error::InvalidConfig(format!(
                "ui.view_mode '{other}' must be 'compact' or 'expanded'"
            ))),
        }
    }
}
