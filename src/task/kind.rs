//! Task type (story, bug, spike, epic).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TaskType {
    #[default]
    Story,
    Bug,
    Spike,
    Epic,
}

impl TaskType {
    pub const ALL: [TaskType; 4] = [TaskType::Story, TaskType::Bug, TaskType::Spike, TaskType::Epic];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Story => "story",
            TaskType::Bug => "bug",
            TaskType::Spike => "spike",
            TaskType::Epic => "epic",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskType::Story => "Story",
            TaskType::Bug => "Bug",
            TaskType::Spike => "Spike",
            TaskType::Epic => "Epic",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            TaskType::Story => "🌀",
            TaskType::Bug => "💥",
            TaskType::Spike => "🔍",
            TaskType::Epic => "🗂️",
        }
    }

    /// Match a free-form type name; `feature` and `task` are stories.
    pub fn parse(input: &str) -> Option<TaskType> {
        let key: String = input
            .trim()
            .to_lowercase()
            .chars()
            .filter(|ch| !matches!(ch, ' ' | '-' | '_'))
            .collect();
        let kind = match key.as_str() {
            "story" | "feature" | "task" => TaskType::Story,
            "bug" => TaskType::Bug,
            "spike" => TaskType::Spike,
            "epic" => TaskType::Epic,
            _ => return None,
        };
        Some(kind)
    }

    /// Lenient parse: unknown input falls back to `Story`.
    pub fn normalize(input: &str) -> TaskType {
        match TaskType::parse(input) {
            Some(kind) => kind,
            None => {
                if !input.trim().is_empty() {
                    tracing::warn!(value = input, "unknown task type, using story");
                }
                TaskType::Story
            }
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::parse(s).ok_or_else(|| format!("unknown task type '{}'", s.trim()))
    }
}

impl Serialize for TaskType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TaskType::normalize(&raw))
    }
}
