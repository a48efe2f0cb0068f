//! tiki init command implementation
//!
//! Creates the task directory and a default `.tiki.toml` in a git repository.

use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::plugin::project_workflow_path;

#[derive(serde::Serialize)]
struct InitReport {
    repo: PathBuf,
    task_dir: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    task_dir: bool,
}

pub fn run(repo_root: &Path, config: &Config, output: OutputOptions) -> Result<()> {
    let task_dir = config.task_dir(repo_root);
    let created_dir = ensure_dir(&task_dir)?;
    let created_config = ensure_config(repo_root, config)?;
    tracing::info!(dir = %task_dir.display(), created_dir, created_config, "project initialized");

    let report = InitReport {
        repo: repo_root.to_path_buf(),
        task_dir: task_dir.clone(),
        created: InitCreated {
            config: created_config,
            task_dir: created_dir,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE.to_string());
    }
    if created_dir {
        created_items.push(format!("{}/", config.tasks.dir.display()));
    }

    let header = if created_items.is_empty() {
        "tiki init: nothing to do".to_string()
    } else {
        "tiki init: initialized project".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("repo", repo_root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step("tiki create --title \"First task\"");
    human.push_next_step(format!(
        "customize plugins in {}",
        project_workflow_path(&task_dir).display()
    ));

    emit_success(output, "init", &report, Some(&human))
}

fn ensure_config(repo_root: &Path, config: &Config) -> Result<bool> {
    let config_path = repo_root.join(CONFIG_FILE);
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::OperationFailed(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok(false);
    }

    config.save(&config_path)?;
    Ok(true)
}

fn ensure_dir(path: &Path) -> Result<bool> {
    if path.exists() {
        if !path.is_dir() {
            return Err(Error::OperationFailed(format!(
                "Expected directory at {}",
                path.display()
            )));
        }
        return Ok(false);
    }

    std::fs::create_dir_all(path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let config = Config::default();
        let quiet = OutputOptions {
            json: false,
            quiet: true,
        };

        run(temp.path(), &config, quiet).unwrap();
        assert!(config.is_initialized(temp.path()));
        assert!(temp.path().join(CONFIG_FILE).is_file());

        assert!(!ensure_dir(&config.task_dir(temp.path())).unwrap());
        assert!(!ensure_config(temp.path(), &config).unwrap());
        run(temp.path(), &config, quiet).unwrap();
    }

    #[test]
    fn task_dir_that_is_a_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tasks");
        std::fs::write(&path, "").unwrap();
        assert!(ensure_dir(&path).is_err());
    }
}
