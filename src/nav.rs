//! Navigation stack shared by all views.
//!
//! Entries carry an untyped `serde_json` parameter map so the stack stays
//! agnostic of the views it holds. Each view reads its own typed parameter
//! record through [`ViewParams`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Well-known view IDs.
pub mod views {
    pub const BOARD: &str = "board";
    pub const TASK_DETAIL: &str = "task_detail";
    pub const TASK_EDIT: &str = "task_edit";
    pub const PLUGIN: &str = "plugin";
}

pub type Params = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEntry {
    pub view_id: String,
    #[serde(default)]
    pub params: Params,
}

impl ViewEntry {
    pub fn new(view_id: impl Into<String>, params: Params) -> Self {
        Self {
            view_id: view_id.into(),
            params,
        }
    }

    /// Decode this entry's parameters as `P`.
    pub fn params_as<P: ViewParams>(&self) -> Result<P> {
        P::decode(&self.params)
    }
}

/// Stack of open views; the bottom entry is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewStack {
    entries: Vec<ViewEntry>,
}

impl ViewStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stack whose root is `view_id`.
    pub fn with_root(view_id: impl Into<String>, params: Params) -> Self {
        let mut stack = Self::new();
        stack.push(view_id, params);
        stack
    }

    pub fn push(&mut self, view_id: impl Into<String>, params: Params) {
        self.entries.push(ViewEntry::new(view_id, params));
    }

    /// Push a view with typed parameters.
    pub fn push_typed<P: ViewParams>(&mut self, view_id: impl Into<String>, params: &P) -> Result<()> {
        let params = params.encode()?;
        self.push(view_id, params);
        Ok(())
    }

    /// Remove the top entry. The root is never popped.
    pub fn pop(&mut self) -> Option<ViewEntry> {
        if self.entries.len() <= 1 {
            return None;
        }
        self.entries.pop()
    }

    /// Swap the top entry in place; `false` on an empty stack.
    pub fn replace_top(&mut self, view_id: impl Into<String>, params: Params) -> bool {
        match self.entries.last_mut() {
            Some(top) => {
                *top = ViewEntry::new(view_id, params);
                true
            }
            None => false,
        }
    }

    pub fn current_view(&self) -> Option<&ViewEntry> {
        self.entries.last()
    }

    /// ID of the top entry, empty when the stack is empty.
    pub fn current_view_id(&self) -> &str {
        self.current_view()
            .map(|entry| entry.view_id.as_str())
            .unwrap_or("")
    }

    /// The entry below the top, for peeking at where Escape leads.
    pub fn previous_view(&self) -> Option<&ViewEntry> {
        self.entries
            .len()
            .checked_sub(2)
            .and_then(|index| self.entries.get(index))
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn can_go_back(&self) -> bool {
        self.entries.len() > 1
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[ViewEntry] {
        &self.entries
    }
}

/// Typed parameters for one kind of view.
///
/// The default methods go through `serde_json`, so implementors only need
/// `Serialize + Deserialize`.
pub trait ViewParams: Serialize + DeserializeOwned {
    fn encode(&self) -> Result<Params> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Params::new()),
            other => Err(Error::InvalidArgument(format!(
                "view parameters must encode to an object, got {other}"
            ))),
        }
    }

    fn decode(params: &Params) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(params.clone()))?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDetailParams {
    pub task_id: String,
}

impl ViewParams for TaskDetailParams {}

/// Parameters for the edit view.
///
/// A new task has no file yet, so its draft travels with the entry instead
/// of an ID lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEditParams {
    pub task_id: String,
    #[serde(default)]
    pub is_new: bool,
    /// Field that receives focus when the view opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    /// Open the description in the external editor immediately.
    #[serde(default)]
    pub description_only: bool,
}

impl ViewParams for TaskEditParams {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginViewParams {
    pub plugin: String,
    /// Lane selected when the view opens.
    #[serde(default)]
    pub lane: usize,
}

impl ViewParams for PluginViewParams {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn push_then_pop_restores_previous_state() {
        let mut stack = ViewStack::with_root(views::BOARD, Params::new());
        stack.push(views::TASK_DETAIL, params(json!({"task_id": "TIKI-1"})));
        let before = stack.clone();

        stack.push(views::TASK_EDIT, params(json!({"task_id": "TIKI-1"})));
        let popped = stack.pop().unwrap();
        assert_eq!(popped.view_id, views::TASK_EDIT);
        assert_eq!(stack, before);
    }

    #[test]
    fn root_is_never_popped() {
        let mut stack = ViewStack::new();
        assert!(stack.pop().is_none());
        assert_eq!(stack.current_view_id(), "");

        stack.push(views::BOARD, Params::new());
        assert!(!stack.can_go_back());
        assert!(stack.pop().is_none());
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current_view_id(), views::BOARD);
    }

    #[test]
    fn replace_keeps_depth() {
        let mut stack = ViewStack::new();
        assert!(!stack.replace_top(views::BOARD, Params::new()));

        stack.push(views::BOARD, Params::new());
        stack.push(views::TASK_DETAIL, Params::new());
        assert!(stack.replace_top(views::TASK_EDIT, Params::new()));
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.current_view_id(), views::TASK_EDIT);
        assert_eq!(stack.previous_view().unwrap().view_id, views::BOARD);
    }

    #[test]
    fn previous_view_needs_two_entries() {
        let mut stack = ViewStack::with_root(views::BOARD, Params::new());
        assert!(stack.previous_view().is_none());
        stack.clear();
        assert_eq!(stack.depth(), 0);
        assert!(stack.current_view().is_none());
    }

    #[test]
    fn typed_params_round_trip_through_the_stack() {
        let mut stack = ViewStack::with_root(views::BOARD, Params::new());
        let edit = TaskEditParams {
            task_id: "TIKI-ABC123".to_string(),
            is_new: true,
            focus: Some("title".to_string()),
            description_only: false,
        };
        stack.push_typed(views::TASK_EDIT, &edit).unwrap();

        let top = stack.current_view().unwrap();
        assert_eq!(top.params["task_id"], json!("TIKI-ABC123"));
        assert_eq!(top.params_as::<TaskEditParams>().unwrap(), edit);
    }

    #[test]
    fn decoding_wrong_params_is_an_error() {
        let entry = ViewEntry::new(views::TASK_DETAIL, params(json!({"plugin": "Kanban"})));
        assert!(entry.params_as::<TaskDetailParams>().is_err());

        let plugin = entry.params_as::<PluginViewParams>().unwrap();
        assert_eq!(plugin.plugin, "Kanban");
        assert_eq!(plugin.lane, 0);
    }
}
