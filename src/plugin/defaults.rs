//! Built-in workflow, always the lowest-precedence scope.

use crate::error::Result;

use super::config::PluginConfig;
use super::loader::parse_workflow;

pub const DEFAULT_WORKFLOW: &str = include_str!("default_workflow.yaml");

pub fn default_plugin_configs() -> Result<Vec<PluginConfig>> {
    let (configs, errors) = parse_workflow(DEFAULT_WORKFLOW)?;
    for error in errors {
        tracing::error!(%error, "invalid entry in built-in workflow");
    }
    Ok(configs)
}
