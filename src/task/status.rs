//! Workflow status of a task.
//!
//! Input is free-form: case, spaces, dashes and underscores are ignored when
//! matching, and a handful of aliases from other trackers are accepted
//! (`open`, `on hold`, `closed`, ...). Output is always the canonical
//! snake_case name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Status {
    #[default]
    Backlog,
    Todo,
    Ready,
    InProgress,
    Waiting,
    Blocked,
    Review,
    Done,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::Backlog,
        Status::Todo,
        Status::Ready,
        Status::InProgress,
        Status::Waiting,
        Status::Blocked,
        Status::Review,
        Status::Done,
    ];

    /// Canonical on-disk name.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Backlog => "backlog",
            Status::Todo => "todo",
            Status::Ready => "ready",
            Status::InProgress => "in_progress",
            Status::Waiting => "waiting",
            Status::Blocked => "blocked",
            Status::Review => "review",
            Status::Done => "done",
        }
    }

    /// Human-readable label for display layers.
    pub fn label(self) -> &'static str {
        match self {
            Status::Backlog => "Backlog",
            Status::Todo => "To Do",
            Status::Ready => "Ready",
            Status::InProgress => "In Progress",
            Status::Waiting => "Waiting",
            Status::Blocked => "Blocked",
            Status::Review => "Review",
            Status::Done => "Done",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Status::Backlog => "📥",
            Status::Todo => "📋",
            Status::Ready => "🚦",
            Status::InProgress => "⚙️",
            Status::Waiting => "⏳",
            Status::Blocked => "⛔",
            Status::Review => "👀",
            Status::Done => "✅",
        }
    }

    /// Match a free-form status, returning `None` for unknown input.
    ///
    /// Empty input is treated as unknown here; use [`Status::normalize`] for
    /// the lenient form that maps empty to `Backlog`.
    pub fn parse(input: &str) -> Option<Status> {
        let key = normalize_key(input);
        let status = match key.as_str() {
            "backlog" => Status::Backlog,
            "todo" | "to_do" | "open" => Status::Todo,
            "ready" => Status::Ready,
            "in_progress" | "inprogress" | "in_process" | "inprocess" => Status::InProgress,
            "waiting" | "hold" | "on_hold" | "onhold" => Status::Waiting,
            "blocked" | "blocker" => Status::Blocked,
            "review" | "in_review" | "inreview" => Status::Review,
            "done" | "closed" | "completed" => Status::Done,
            _ => return None,
        };
        Some(status)
    }

    /// Lenient parse: empty and unknown input both fall back to `Backlog`.
    pub fn normalize(input: &str) -> Status {
        if input.trim().is_empty() {
            return Status::Backlog;
        }
        match Status::parse(input) {
            Some(status) => status,
            None => {
                tracing::warn!(value = input, "unknown status, using backlog");
                Status::Backlog
            }
        }
    }

    pub fn is_done(self) -> bool {
        self == Status::Done
    }
}

fn normalize_key(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .chars()
        .map(|ch| if ch == ' ' || ch == '-' { '_' } else { ch })
        .collect()
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::parse(s).ok_or_else(|| format!("unknown status '{}'", s.trim()))
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Status::normalize(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_names_case_insensitively() {
        assert_eq!(Status::parse("Backlog"), Some(Status::Backlog));
        assert_eq!(Status::parse("IN_PROGRESS"), Some(Status::InProgress));
        assert_eq!(Status::parse("in progress"), Some(Status::InProgress));
        assert_eq!(Status::parse("in-progress"), Some(Status::InProgress));
        assert_eq!(Status::parse(" review "), Some(Status::Review));
    }

    #[test]
    fn parses_aliases() {
        assert_eq!(Status::parse("open"), Some(Status::Todo));
        assert_eq!(Status::parse("to_do"), Some(Status::Todo));
        assert_eq!(Status::parse("To Do"), Some(Status::Todo));
        assert_eq!(Status::parse("inprogress"), Some(Status::InProgress));
        assert_eq!(Status::parse("in_process"), Some(Status::InProgress));
        assert_eq!(Status::parse("hold"), Some(Status::Waiting));
        assert_eq!(Status::parse("on hold"), Some(Status::Waiting));
        assert_eq!(Status::parse("blocker"), Some(Status::Blocked));
        assert_eq!(Status::parse("in_review"), Some(Status::Review));
        assert_eq!(Status::parse("inreview"), Some(Status::Review));
        assert_eq!(Status::parse("closed"), Some(Status::Done));
        assert_eq!(Status::parse("completed"), Some(Status::Done));
    }

    #[test]
    fn normalize_falls_back_to_backlog() {
        assert_eq!(Status::normalize(""), Status::Backlog);
        assert_eq!(Status::normalize("   "), Status::Backlog);
        assert_eq!(Status::normalize("someday"), Status::Backlog);
        assert_eq!(Status::parse("someday"), None);
    }

    #[test]
    fn round_trips_through_canonical_name() {
        for status in Status::ALL {
            assert_eq!(Status::parse(status.as_str()), Some(status));
            assert!(!status.label().is_empty());
            assert!(!status.emoji().is_empty());
        }
    }

    #[test]
    fn deserializes_leniently() {
        let status: Status = serde_yaml::from_str("Closed").expect("decode");
        assert_eq!(status, Status::Done);
        let status: Status = serde_yaml::from_str("nonsense").expect("decode");
        assert_eq!(status, Status::Backlog);
        assert_eq!(serde_yaml::to_string(&Status::InProgress).unwrap().trim(), "in_progress");
    }
}
