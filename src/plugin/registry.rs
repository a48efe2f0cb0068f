//! Process-wide plugin activation table.
//!
//! Installed once at startup and read by key dispatch afterwards. Once any
//! reader has looked at the table it is frozen: a later
//! [`init_plugin_actions`] fails until [`teardown_plugin_actions`] resets it.

use std::sync::{PoisonError, RwLock};

use crossterm::event::KeyEvent;

use crate::error::{Error, Result};

use super::{Plugin, PluginKey};

/// What a key press activates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginActivation {
    pub name: String,
    pub key: PluginKey,
    /// Index of the plugin in the slice passed to [`init_plugin_actions`].
    pub index: usize,
}

struct Registry {
    activations: Vec<PluginActivation>,
    frozen: bool,
}

static REGISTRY: RwLock<Registry> = RwLock::new(Registry {
    activations: Vec::new(),
    frozen: false,
});

pub fn init_plugin_actions(plugins: &[Plugin]) -> Result<()> {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if registry.frozen {
        return Err(Error::OperationFailed(
            "plugin actions are already in use and cannot be re-initialized".to_string(),
        ));
    }
    registry.activations = plugins
        .iter()
        .enumerate()
        .map(|(index, plugin)| PluginActivation {
            name: plugin.name().to_string(),
            key: plugin.key(),
            index,
        })
        .collect();
    tracing::debug!(count = registry.activations.len(), "plugin actions installed");
    Ok(())
}

fn freeze() {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    registry.frozen = true;
}

/// Every installed activation, in plugin order.
pub fn plugin_actions() -> Vec<PluginActivation> {
    freeze();
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .activations
        .clone()
}

/// The activation bound to `event`, if any.
pub fn plugin_for_key(event: &KeyEvent) -> Option<PluginActivation> {
    freeze();
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .activations
        .iter()
        .find(|activation| activation.key.matches(event))
        .cloned()
}

/// Empty the table and allow a fresh init.
pub fn teardown_plugin_actions() {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    registry.activations.clear();
    registry.frozen = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::load_workflow;
    use crate::task::DEFAULT_MAX_POINTS;
    use crossterm::event::{KeyCode, KeyModifiers};

    // The table is process-wide, so the whole lifecycle lives in one test.
    #[test]
    fn lifecycle_init_read_freeze_teardown() {
        teardown_plugin_actions();
        let plugins = load_workflow(&[], DEFAULT_MAX_POINTS).unwrap().plugins;

        init_plugin_actions(&plugins).unwrap();
        init_plugin_actions(&plugins).unwrap();

        let f3 = KeyEvent::new(KeyCode::F(3), KeyModifiers::NONE);
        let hit = plugin_for_key(&f3).unwrap();
        assert_eq!(hit.name, "Backlog");
        assert_eq!(hit.index, 1);
        assert!(plugin_for_key(&KeyEvent::new(KeyCode::F(12), KeyModifiers::NONE)).is_none());

        assert!(init_plugin_actions(&plugins).is_err());
        assert_eq!(plugin_actions().len(), plugins.len());

        teardown_plugin_actions();
        assert!(plugin_actions().is_empty());
        teardown_plugin_actions();
        init_plugin_actions(&plugins[..1]).unwrap();
        assert_eq!(plugin_actions().len(), 1);
        teardown_plugin_actions();
    }
}
