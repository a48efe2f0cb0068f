//! Workflow loading across scopes.
//!
//! Scopes are layered: built-in defaults, then the user's config directory,
//! then the project's task directory. Entries with the same name (ignoring
//! case) are merged field by field; new names are appended. A bad entry is
//! reported and skipped without affecting the others.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::{Error, Result};

use super::config::{PluginConfig, WorkflowFile};
use super::defaults::default_plugin_configs;
use super::Plugin;

pub const WORKFLOW_FILE: &str = "workflow.yaml";

/// Plugins that loaded plus the problems found on the way.
#[derive(Debug, Default)]
pub struct PluginLoad {
    pub plugins: Vec<Plugin>,
    pub errors: Vec<Error>,
}

impl PluginLoad {
    pub fn find(&self, name: &str) -> Option<&Plugin> {
        self.plugins
            .iter()
            .find(|plugin| plugin.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// `workflow.yaml` in the per-user config directory.
pub fn user_workflow_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "tiki").map(|dirs| dirs.config_dir().join(WORKFLOW_FILE))
}

/// `workflow.yaml` next to the task files.
pub fn project_workflow_path(task_dir: &Path) -> PathBuf {
    task_dir.join(WORKFLOW_FILE)
}

/// Parse a workflow document into entries.
///
/// Malformed YAML fails the whole document; an entry that does not fit
/// the plugin schema is returned as an error alongside the good ones.
pub fn parse_workflow(content: &str) -> Result<(Vec<PluginConfig>, Vec<Error>)> {
    if content.trim().is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let file: WorkflowFile = serde_yaml::from_str(content)?;
    let mut configs = Vec::with_capacity(file.plugins.len());
    let mut errors = Vec::new();
    for (index, entry) in file.plugins.into_iter().enumerate() {
        let name = entry
            .get("name")
            .and_then(serde_yaml::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index + 1));
        match serde_yaml::from_value::<PluginConfig>(entry) {
            Ok(config) => configs.push(config),
            Err(err) => errors.push(Error::InvalidPlugin {
                name,
                message: err.to_string(),
            }),
        }
    }
    Ok((configs, errors))
}

/// Layer `overrides` onto `base`.
pub fn merge_configs(base: &mut Vec<PluginConfig>, overrides: Vec<PluginConfig>) {
    for over in overrides {
        let existing = base.iter_mut().find(|config| {
            !over.name.trim().is_empty() && config.name.trim().eq_ignore_ascii_case(over.name.trim())
        });
        match existing {
            Some(config) => {
                let name = std::mem::take(&mut config.name);
                *config = config.merged_with(&over);
                config.name = name;
            }
            None => base.push(over),
        }
    }
}

/// Load the built-in workflow overlaid with each existing file in `layers`.
///
/// Fails only when workflow files were present and no plugin survived.
pub fn load_workflow(layers: &[PathBuf], max_points: i32) -> Result<PluginLoad> {
    let mut configs = default_plugin_configs()?;
    let mut load = PluginLoad::default();
    let mut files_present = false;

    for path in layers {
        if !path.is_file() {
            continue;
        }
        files_present = true;
        let parsed = fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|content| parse_workflow(&content));
        match parsed {
            Ok((overrides, errors)) => {
                tracing::debug!(path = %path.display(), entries = overrides.len(), "loaded workflow");
                load.errors.extend(errors);
                merge_configs(&mut configs, overrides);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping workflow file");
                load.errors.push(err);
            }
        }
    }

    for (index, config) in configs.iter().enumerate() {
        let plugin = match config.build(index, max_points) {
            Ok(plugin) => plugin,
            Err(err) => {
                load.errors.push(err);
                continue;
            }
        };
        let clash = load.plugins.iter().find(|other| other.key() == plugin.key());
        if let Some(other) = clash {
            load.errors.push(Error::InvalidPlugin {
                name: plugin.name().to_string(),
                message: format!("key {} is already used by '{}'", plugin.key(), other.name()),
            });
            continue;
        }
        load.plugins.push(plugin);
    }

    for error in &load.errors {
        tracing::warn!(%error, "plugin skipped");
    }
    if load.plugins.is_empty() && files_present {
        return Err(Error::InvalidPlugin {
            name: WORKFLOW_FILE.to_string(),
            message: "no valid plugins found".to_string(),
        });
    }
    Ok(load)
}

/// Load from the standard user and project scopes.
pub fn load_default_scopes(task_dir: &Path, max_points: i32) -> Result<PluginLoad> {
    let mut layers = Vec::with_capacity(2);
    if let Some(user) = user_workflow_path() {
        layers.push(user);
    }
    layers.push(project_workflow_path(task_dir));
    load_workflow(&layers, max_points)
}
