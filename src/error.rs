//! Error types for tiki
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, missing repo, empty input)
//! - 3: Rejected input (validation failure, DSL parse error, lock conflict)
//! - 4: Operation failed (git error, IO error)

use std::path::PathBuf;
use thiserror::Error;

use crate::task::ValidationErrors;

/// Exit codes for the tiki CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const REJECTED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tiki operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Not a git repository: {0}")]
    NotARepo(PathBuf),

    #[error("Project not initialized: {0} does not exist (run `tiki init`)")]
    NotInitialized(PathBuf),

    #[error("No input: expected a title on the first line of standard input")]
    EmptyInput,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task already exists: {0}")]
    DuplicateTask(String),

    #[error("No current git user configured (set user.name)")]
    NoCurrentUser,

    // Rejected input (exit code 3)
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid sort: {0}")]
    InvalidSort(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid plugin '{name}': {message}")]
    InvalidPlugin { name: String, message: String },

    #[error("Task {0} was modified on disk since it was loaded")]
    Conflict(String),

    // Operation failures (exit code 4)
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("git {command} failed: {stderr}")]
    GitCommand { command: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotARepo(_)
            | Error::NotInitialized(_)
            | Error::EmptyInput
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::TaskNotFound(_)
            | Error::DuplicateTask(_)
            | Error::NoCurrentUser => exit_codes::USER_ERROR,

            Error::Validation(_)
            | Error::InvalidFilter(_)
            | Error::InvalidSort(_)
            | Error::InvalidAction(_)
            | Error::InvalidPlugin { .. }
            | Error::Conflict(_) => exit_codes::REJECTED,

            Error::Git(_)
            | Error::GitCommand { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::Yaml(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Field-level validation details, when this error carries them.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Error::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Result type alias for tiki operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        let details = err
            .validation_errors()
            .and_then(|errors| serde_json::to_value(errors.as_slice()).ok());
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{ErrorCode, FieldError};

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(Error::EmptyInput.exit_code(), exit_codes::USER_ERROR);
        assert_eq!(
            Error::InvalidFilter("bad".to_string()).exit_code(),
            exit_codes::REJECTED
        );
        assert_eq!(
            Error::OperationFailed("boom".to_string()).exit_code(),
            exit_codes::OPERATION_FAILED
        );
    }

    #[test]
    fn json_error_carries_validation_details() {
        let mut errors = ValidationErrors::default();
        errors.push(FieldError::new("title", ErrorCode::Required, "title is required"));
        let err = Error::from(errors);
        let json = JsonError::from(&err);
        assert_eq!(json.code, exit_codes::REJECTED);
        let details = json.details.expect("details");
        assert_eq!(details[0]["field"], "title");
        assert_eq!(details[0]["code"], "required");
    }
}
