//! Plugins: named views over the task set.
//!
//! A *tiki* plugin selects and orders tasks (filter + sort), optionally
//! splits them into lanes and offers single-key bulk actions. A *doki*
//! plugin shows a markdown document instead of tasks.

use std::fmt;

use crate::action::{apply_action, Action};
use crate::error::{Error, Result};
use crate::filter::{EvalContext, FilterExpr};
use crate::sort::{sort_tasks, SortRule};
use crate::task::Task;

pub mod config;
pub mod defaults;
pub mod key;
pub mod loader;
pub mod registry;

pub use config::{ActionConfig, LaneConfig, PluginConfig, WorkflowFile};
pub use key::{PluginKey, PluginKeyCode};
pub use loader::{load_workflow, project_workflow_path, user_workflow_path, PluginLoad};
pub use registry::{
    init_plugin_actions, plugin_actions, plugin_for_key, teardown_plugin_actions,
    PluginActivation,
};

/// Upper bound on bulk actions per plugin; one per digit key.
pub const MAX_PLUGIN_ACTIONS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ViewMode {
    #[default]
    Compact,
    Expanded,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Compact => "compact",
            ViewMode::Expanded => "expanded",
        }
    }

    pub fn parse(input: &str) -> Option<ViewMode> {
        match input.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(ViewMode::Compact),
            "expanded" => Some(ViewMode::Expanded),
            _ => None,
        }
    }

    pub fn toggled(self) -> ViewMode {
        match self {
            ViewMode::Compact => ViewMode::Expanded,
            ViewMode::Expanded => ViewMode::Compact,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by both plugin kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginBase {
    pub name: String,
    pub key: PluginKey,
    pub foreground: Option<String>,
    pub background: Option<String>,
    /// Position of the entry in the merged workflow.
    pub config_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lane {
    pub name: String,
    pub columns: usize,
    pub filter: Option<FilterExpr>,
    /// Applied to a task moved into this lane.
    pub action: Option<Action>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PluginAction {
    pub key: char,
    pub label: String,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TikiPlugin {
    pub base: PluginBase,
    pub filter: Option<FilterExpr>,
    pub sort: Vec<SortRule>,
    pub view_mode: ViewMode,
    pub lanes: Vec<Lane>,
    pub actions: Vec<PluginAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DokiSource {
    /// Markdown embedded in the workflow file.
    Internal(String),
    /// Path or URL of a markdown document.
    File(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DokiPlugin {
    pub base: PluginBase,
    pub source: DokiSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plugin {
    Tiki(TikiPlugin),
    Doki(DokiPlugin),
}

impl Plugin {
    pub fn base(&self) -> &PluginBase {
        match self {
            Plugin::Tiki(tiki) => &tiki.base,
            Plugin::Doki(doki) => &doki.base,
        }
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn key(&self) -> PluginKey {
        self.base().key
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Plugin::Tiki(_) => "tiki",
            Plugin::Doki(_) => "doki",
        }
    }

    pub fn as_tiki(&self) -> Option<&TikiPlugin> {
        match self {
            Plugin::Tiki(tiki) => Some(tiki),
            Plugin::Doki(_) => None,
        }
    }
}

impl TikiPlugin {
    fn matches(&self, filter: Option<&FilterExpr>, task: &Task, ctx: &EvalContext<'_>) -> bool {
        let plugin_ok = self.filter.as_ref().map_or(true, |expr| expr.evaluate(task, ctx));
        plugin_ok && filter.map_or(true, |expr| expr.evaluate(task, ctx))
    }

    /// Tasks selected by the plugin filter, in plugin sort order.
    pub fn tasks(&self, tasks: &[Task], ctx: &EvalContext<'_>) -> Vec<Task> {
        let mut selected: Vec<Task> = tasks
            .iter()
            .filter(|task| self.matches(None, task, ctx))
            .cloned()
            .collect();
        sort_tasks(&mut selected, &self.sort);
        selected
    }

    /// Tasks shown in one lane: plugin filter and lane filter both apply.
    pub fn lane_tasks(&self, lane: usize, tasks: &[Task], ctx: &EvalContext<'_>) -> Vec<Task> {
        let Some(lane) = self.lanes.get(lane) else {
            return Vec::new();
        };
        let mut selected: Vec<Task> = tasks
            .iter()
            .filter(|task| self.matches(lane.filter.as_ref(), task, ctx))
            .cloned()
            .collect();
        sort_tasks(&mut selected, &self.sort);
        selected
    }

    /// Index of the first lane showing `task`.
    pub fn lane_of(&self, task: &Task, ctx: &EvalContext<'_>) -> Option<usize> {
        self.lanes
            .iter()
            .position(|lane| self.matches(lane.filter.as_ref(), task, ctx))
    }

    /// The task as it would be after moving into `lane`.
    ///
    /// Lanes without an action leave the task unchanged.
    pub fn move_to_lane(
        &self,
        task: &Task,
        lane: usize,
        current_user: Option<&str>,
        max_points: i32,
    ) -> Result<Task> {
        let target = self.lanes.get(lane).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "plugin '{}' has no lane {}",
                self.base.name,
                lane + 1
            ))
        })?;
        match &target.action {
            Some(action) => apply_action(task, action, current_user, max_points),
            None => Ok(task.clone()),
        }
    }

    pub fn action_for_key(&self, key: char) -> Option<&PluginAction> {
        self.actions.iter().find(|action| action.key == key)
    }
}
