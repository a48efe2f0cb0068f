//! Field-level task validation.

use std::fmt;

use serde::Serialize;

use super::priority::{MAX_PRIORITY, MIN_PRIORITY};
use super::{Status, Task, TaskType};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_ASSIGNEE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Required,
    TooLong,
    TooShort,
    OutOfRange,
    InvalidEnum,
    InvalidFormat,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Required => "required",
            ErrorCode::TooLong => "too_long",
            ErrorCode::TooShort => "too_short",
            ErrorCode::OutOfRange => "out_of_range",
            ErrorCode::InvalidEnum => "invalid_enum",
            ErrorCode::InvalidFormat => "invalid_format",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: ErrorCode,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Ordered collection of field errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn has_errors(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[FieldError] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn by_field(&self, field: &str) -> Vec<&FieldError> {
        self.0.iter().filter(|err| err.field == field).collect()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|err| err.field == field)
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|err| err.to_string()).collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

pub fn validate_title(title: &str) -> Option<FieldError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Some(FieldError::new("title", ErrorCode::Required, "title is required"));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Some(FieldError::new(
            "title",
            ErrorCode::TooLong,
            format!("title must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
    None
}

pub fn validate_priority(priority: i32) -> Option<FieldError> {
    if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        None
    } else {
        Some(FieldError::new(
            "priority",
            ErrorCode::OutOfRange,
            format!("priority must be between {MIN_PRIORITY} and {MAX_PRIORITY}, got {priority}"),
        ))
    }
}

pub fn validate_points(points: i32, max_points: i32) -> Option<FieldError> {
    if (0..=max_points).contains(&points) {
        None
    } else {
        Some(FieldError::new(
            "points",
            ErrorCode::OutOfRange,
            format!("points must be between 0 and {max_points}, got {points}"),
        ))
    }
}

/// Validate a raw status string against the canonical set (aliases allowed).
pub fn validate_status_value(raw: &str) -> Result<Status, FieldError> {
    Status::parse(raw).ok_or_else(|| {
        FieldError::new(
            "status",
            ErrorCode::InvalidEnum,
            format!("unknown status '{}'", raw.trim()),
        )
    })
}

/// Validate a raw type string against the canonical set (aliases allowed).
pub fn validate_type_value(raw: &str) -> Result<TaskType, FieldError> {
    TaskType::parse(raw).ok_or_else(|| {
        FieldError::new(
            "type",
            ErrorCode::InvalidEnum,
            format!("unknown type '{}'", raw.trim()),
        )
    })
}

/// Title, priority and points. Status and type are enums and cannot hold
/// values outside their canonical sets.
pub fn quick_validate(task: &Task, max_points: i32) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    if let Some(err) = validate_title(&task.title) {
        errors.push(err);
    }
    if let Some(err) = validate_priority(task.priority) {
        errors.push(err);
    }
    if let Some(err) = validate_points(task.points, max_points) {
        errors.push(err);
    }
    errors
}

/// Everything in [`quick_validate`] plus identity, length and timestamp checks.
pub fn validate(task: &Task, max_points: i32) -> ValidationErrors {
    let mut errors = quick_validate(task, max_points);
    if task.id.trim().is_empty() {
        errors.push(FieldError::new("id", ErrorCode::Required, "id is required"));
    } else if !task
        .id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        errors.push(FieldError::new(
            "id",
            ErrorCode::InvalidFormat,
            "id may only contain letters, digits, '-' and '_'",
        ));
    }
    if task.assignee.chars().count() > MAX_ASSIGNEE_LEN {
        errors.push(FieldError::new(
            "assignee",
            ErrorCode::TooLong,
            format!("assignee must be at most {MAX_ASSIGNEE_LEN} characters"),
        ));
    }
    if task.description.len() > MAX_DESCRIPTION_LEN {
        errors.push(FieldError::new(
            "description",
            ErrorCode::TooLong,
            format!("description must be at most {MAX_DESCRIPTION_LEN} bytes"),
        ));
    }
    if task.updated_at < task.created_at {
        errors.push(FieldError::new(
            "updated_at",
            ErrorCode::OutOfRange,
            "updated_at must not precede created_at",
        ));
    }
    for comment in &task.comments {
        if comment.text.trim().is_empty() {
            errors.push(FieldError::new(
                "comments",
                ErrorCode::Required,
                format!("comment {} has no text", comment.id),
            ));
        }
    }
    errors
}
