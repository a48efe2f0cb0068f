//! Task file codec: YAML front-matter followed by a markdown body.
//!
//! ```text
//! ---
//! id: TIKI-ABC123
//! title: Fix login
//! type: story
//! status: todo
//! tags:
//! - frontend
//! assignee: alice
//! priority: 3
//! points: 1
//! created_by: alice
//! created_at: 2024-05-01T10:00:00Z
//! updated_at: 2024-05-01T10:00:00Z
//! ---
//! Description in markdown.
//! ```
//!
//! Decoding never fails on a readable file: malformed values are coerced to
//! defaults and reported as warnings. Encoding always emits the canonical
//! form, with unknown keys appended after the known ones.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::error::Result;
use crate::task::{
    normalize_id, Comment, LenientPriority, LenientTags, Status, Task, TaskType,
    DEFAULT_PRIORITY,
};

const DELIMITER: &str = "---";

/// Inputs the decoder needs beyond the file content.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Upper bound for points; larger values are clamped.
    pub max_points: i32,
    /// ID used when the front-matter has none (usually derived from the file name).
    pub fallback_id: String,
    /// Timestamp used when `created_at` / `updated_at` are missing.
    pub fallback_time: DateTime<Utc>,
}

/// A decoded task plus everything the decoder had to paper over.
#[derive(Debug, Clone)]
pub struct DecodedTask {
    pub task: Task,
    pub warnings: Vec<String>,
    pub missing_created_by: bool,
    pub missing_created_at: bool,
    pub missing_updated_at: bool,
}

/// Derive the fallback task ID from a file path (`tiki-abc123.md` -> `TIKI-ABC123`).
pub fn id_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(normalize_id)
        .unwrap_or_default()
}

pub fn decode_task(content: &str, options: &DecodeOptions) -> DecodedTask {
    let mut warnings = Vec::new();
    let (mapping, body) = match split_front_matter(content) {
        Some((yaml, body)) => (parse_mapping(yaml, &mut warnings), body),
        None => {
            warnings.push("missing front-matter; treating whole file as description".to_string());
            (Mapping::new(), content)
        }
    };
    decode_mapping(mapping, body, options, warnings)
}

fn decode_mapping(
    mut mapping: Mapping,
    body: &str,
    options: &DecodeOptions,
    mut warnings: Vec<String>,
) -> DecodedTask {
    let id = take_string(&mut mapping, "id", &mut warnings)
        .map(|id| normalize_id(&id))
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| options.fallback_id.clone());

    let mut task = Task::new(id, String::new());
    task.description = body.to_string();

    task.title = match take_string(&mut mapping, "title", &mut warnings) {
        Some(title) => title.trim().to_string(),
        None => {
            let derived = title_from_body(body);
            if !derived.is_empty() {
                warnings.push("missing title; using first line of description".to_string());
            }
            derived
        }
    };

    if let Some(kind) = take_string(&mut mapping, "type", &mut warnings) {
        task.kind = match TaskType::parse(&kind) {
            Some(kind) => kind,
            None => {
                warnings.push(format!("unknown type '{kind}'; using story"));
                TaskType::Story
            }
        };
    }

    if let Some(status) = take_string(&mut mapping, "status", &mut warnings) {
        task.status = match Status::parse(&status) {
            Some(status) => status,
            None => {
                if !status.trim().is_empty() {
                    warnings.push(format!("unknown status '{status}'; using backlog"));
                }
                Status::Backlog
            }
        };
    }

    if let Some(value) = mapping.remove("tags") {
        if !value.is_sequence() && !value.is_null() {
            warnings.push("tags is not a list; ignoring".to_string());
        }
        task.tags = LenientTags::from_value(&value).0;
    }

    task.assignee = take_string(&mut mapping, "assignee", &mut warnings)
        .map(|value| value.trim().to_string())
        .unwrap_or_default();

    task.priority = match mapping.remove("priority") {
        Some(value) => LenientPriority::from_value(&value).0,
        None => DEFAULT_PRIORITY,
    };

    if let Some(value) = mapping.remove("points") {
        task.points = decode_points(&value, options.max_points, &mut warnings);
    }

    let created_by = take_string(&mut mapping, "created_by", &mut warnings)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let missing_created_by = created_by.is_none();
    task.created_by = created_by.unwrap_or_default();

    let created_at = take_timestamp(&mut mapping, "created_at", &mut warnings);
    let updated_at = take_timestamp(&mut mapping, "updated_at", &mut warnings);
    let missing_created_at = created_at.is_none();
    let missing_updated_at = updated_at.is_none();
    task.created_at = created_at.unwrap_or(options.fallback_time);
    task.updated_at = updated_at.unwrap_or(options.fallback_time);
    if task.updated_at < task.created_at {
        task.updated_at = task.created_at;
    }

    if let Some(value) = mapping.remove("comments") {
        task.comments = decode_comments(value, &mut warnings);
    }

    mapping.remove("description_present");
    task.extra = mapping;

    DecodedTask {
        task,
        warnings,
        missing_created_by,
        missing_created_at,
        missing_updated_at,
    }
}

#[derive(Serialize)]
struct FrontMatter<'a> {
    id: &'a str,
    title: &'a str,
    #[serde(rename = "type")]
    kind: TaskType,
    status: Status,
    tags: &'a [String],
    assignee: &'a str,
    priority: LenientPriority,
    points: i32,
    created_by: &'a str,
    created_at: &'a DateTime<Utc>,
    updated_at: &'a DateTime<Utc>,
    #[serde(skip_serializing_if = "is_empty_slice")]
    comments: &'a [Comment],
    #[serde(flatten)]
    extra: &'a Mapping,
}

fn is_empty_slice<T>(items: &&[T]) -> bool {
    items.is_empty()
}

/// Render a task in canonical file form.
pub fn encode_task(task: &Task) -> Result<String> {
    let front = FrontMatter {
        id: &task.id,
        title: &task.title,
        kind: task.kind,
        status: task.status,
        tags: &task.tags,
        assignee: &task.assignee,
        priority: LenientPriority(task.priority),
        points: task.points,
        created_by: &task.created_by,
        created_at: &task.created_at,
        updated_at: &task.updated_at,
        comments: &task.comments,
        extra: &task.extra,
    };
    let yaml = serde_yaml::to_string(&front)?;
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{}", task.description))
}

/// Split `---\n<yaml>---\n<body>`; `None` when the file has no front-matter.
fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = rest.strip_prefix(DELIMITER)?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn parse_mapping(yaml: &str, warnings: &mut Vec<String>) -> Mapping {
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(mapping)) => mapping,
        Ok(Value::Null) => Mapping::new(),
        Ok(_) => {
            warnings.push("front-matter is not a mapping; using defaults".to_string());
            Mapping::new()
        }
        Err(err) => {
            warnings.push(format!("malformed front-matter ({err}); using defaults"));
            Mapping::new()
        }
    }
}

fn take_string(mapping: &mut Mapping, key: &str, warnings: &mut Vec<String>) -> Option<String> {
    match mapping.remove(key)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => None,
        _ => {
            warnings.push(format!("{key} is not a scalar; ignoring"));
            None
        }
    }
}

fn take_timestamp(
    mapping: &mut Mapping,
    key: &str,
    warnings: &mut Vec<String>,
) -> Option<DateTime<Utc>> {
    let raw = take_string(mapping, key, warnings)?;
    let parsed = parse_timestamp(&raw);
    if parsed.is_none() {
        warnings.push(format!("{key} '{raw}' is not an RFC3339 timestamp; ignoring"));
    }
    parsed
}

/// RFC3339, or a bare `YYYY-MM-DD` date taken as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn decode_points(value: &Value, max_points: i32, warnings: &mut Vec<String>) -> i32 {
    let raw = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.round() as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        Value::Null => Some(0),
        _ => None,
    };
    match raw {
        Some(points) => {
            let clamped = points.clamp(0, max_points as i64) as i32;
            if clamped as i64 != points {
                warnings.push(format!("points {points} out of range; clamped to {clamped}"));
            }
            clamped
        }
        None => {
            warnings.push("points is not a number; using 0".to_string());
            0
        }
    }
}

fn decode_comments(value: Value, warnings: &mut Vec<String>) -> Vec<Comment> {
    let Value::Sequence(items) = value else {
        if !value.is_null() {
            warnings.push("comments is not a list; ignoring".to_string());
        }
        return Vec::new();
    };
    let mut comments = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_yaml::from_value::<Comment>(item) {
            Ok(comment) => comments.push(comment),
            Err(err) => warnings.push(format!("comment #{index} is malformed ({err}); dropped")),
        }
    }
    comments
}

fn title_from_body(body: &str) -> String {
    body.lines()
        .map(|line| line.trim().trim_start_matches('#').trim())
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}
