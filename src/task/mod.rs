//! The task entity.
//!
//! A task is one markdown file in the task directory. Metadata lives in YAML
//! front-matter, the description is the markdown body. See [`crate::codec`]
//! for the on-disk format.

use std::time::SystemTime;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

mod kind;
mod priority;
mod status;
mod tags;
mod validation;

pub use kind::TaskType;
pub use priority::{
    clamp_priority, normalize_priority, priority_from_word, priority_label, LenientPriority,
    DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY,
};
pub use status::Status;
pub use tags::{normalize_tags, LenientTags};
pub use validation::{
    quick_validate, validate, validate_points, validate_priority, validate_status_value,
    validate_title, validate_type_value, ErrorCode, FieldError, ValidationErrors,
};

/// Default upper bound for story points.
pub const DEFAULT_MAX_POINTS: i32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: TaskType,
    pub status: Status,
    pub tags: Vec<String>,
    pub assignee: String,
    pub priority: i32,
    pub points: i32,
    pub comments: Vec<Comment>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// File modification time observed when the task was read from disk.
    #[serde(skip)]
    pub loaded_mtime: Option<SystemTime>,
    /// Unrecognized front-matter keys, written back verbatim.
    #[serde(skip)]
    pub extra: serde_yaml::Mapping,
}

impl Task {
    /// A task with default metadata, timestamps set to now.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = now_secs();
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            kind: TaskType::default(),
            status: Status::default(),
            tags: Vec::new(),
            assignee: String::new(),
            priority: DEFAULT_PRIORITY,
            points: 0,
            comments: Vec::new(),
            created_by: String::new(),
            created_at: now,
            updated_at: now,
            loaded_mtime: None,
            extra: serde_yaml::Mapping::new(),
        }
    }

    /// File name for this task inside the task directory.
    pub fn file_name(&self) -> String {
        file_name_for_id(&self.id)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|existing| existing.eq_ignore_ascii_case(tag))
    }

    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
    }

    pub fn quick_validate(&self, max_points: i32) -> ValidationErrors {
        quick_validate(self, max_points)
    }

    pub fn validate(&self, max_points: i32) -> ValidationErrors {
        validate(self, max_points)
    }

    pub fn is_valid(&self, max_points: i32) -> bool {
        !self.validate(max_points).has_errors()
    }
}

/// Lowercase `<id>.md`.
pub fn file_name_for_id(id: &str) -> String {
    format!("{}.md", id.trim().to_lowercase())
}

/// Canonical form of a task ID used as the index key.
pub fn normalize_id(id: &str) -> String {
    id.trim().to_uppercase()
}

/// Current time truncated to whole seconds, so timestamps stay short on disk.
pub fn now_secs() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_shares_no_storage() {
        let mut original = Task::new("TIKI-AAAAAA", "Original");
        original.tags = vec!["one".to_string()];
        original.comments.push(Comment {
            id: "c1".to_string(),
            author: "alice".to_string(),
            text: "hello".to_string(),
            created_at: now_secs(),
        });

        let mut copy = original.clone();
        assert_eq!(copy, original);

        copy.tags.push("two".to_string());
        copy.comments[0].text = "changed".to_string();
        assert_eq!(original.tags, vec!["one".to_string()]);
        assert_eq!(original.comments[0].text, "hello");
    }

    #[test]
    fn file_name_is_lowercase_id() {
        let task = Task::new("TIKI-ABC123", "x");
        assert_eq!(task.file_name(), "tiki-abc123.md");
        assert_eq!(normalize_id(" tiki-abc123 "), "TIKI-ABC123");
    }

    #[test]
    fn set_tags_normalizes() {
        let mut task = Task::new("TIKI-AAAAAA", "x");
        task.set_tags([" a", "b", "a", ""]);
        assert_eq!(task.tags, vec!["a".to_string(), "b".to_string()]);
        assert!(task.has_tag("A"));
    }
}
