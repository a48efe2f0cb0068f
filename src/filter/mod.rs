//! Filter language for selecting tasks.
//!
//! ```text
//! status = 'ready' AND (NOW - CreatedAt) < 24hour
//! assignee = CURRENT_USER OR tags IN [urgent, 'needs review']
//! NOT type = epic AND priority <= 2
//! ```
//!
//! Parsing is strict and reports the position of the first problem.
//! Evaluation never fails: fields it does not know simply do not match.

use std::fmt;

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::{
    canonical_field, ArithOp, BinaryOp, CompareOp, FilterExpr, Literal, Operand, TimeExpr,
    TimeField, TimeOperand,
};
pub use eval::{evaluate, EvalContext, CURRENT_USER};

use crate::error::Error;
use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterError {
    pub message: String,
    pub position: usize,
}

impl FilterError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.position)
    }
}

impl std::error::Error for FilterError {}

impl From<FilterError> for Error {
    fn from(err: FilterError) -> Self {
        Error::InvalidFilter(err.to_string())
    }
}

pub fn parse_filter(input: &str) -> Result<FilterExpr, FilterError> {
    parser::Parser::new(input)?.parse()
}

/// `None` for blank input, otherwise the parsed expression.
pub fn parse_optional_filter(input: &str) -> Result<Option<FilterExpr>, FilterError> {
    if input.trim().is_empty() {
        Ok(None)
    } else {
        parse_filter(input).map(Some)
    }
}

/// Tasks matching `filter`, in input order. A missing filter matches everything.
pub fn filter_tasks(tasks: &[Task], filter: Option<&FilterExpr>, ctx: &EvalContext<'_>) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| filter.map_or(true, |expr| expr.evaluate(task, ctx)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Status;
    use chrono::Utc;

    #[test]
    fn blank_filter_is_none() {
        assert_eq!(parse_optional_filter("   ").unwrap(), None);
        assert!(parse_optional_filter("status = done").unwrap().is_some());
    }

    #[test]
    fn parse_error_converts_to_invalid_filter() {
        let err: Error = parse_filter("status = ").unwrap_err().into();
        assert!(matches!(err, Error::InvalidFilter(ref msg) if msg.contains("at 9")));
        assert_eq!(err.exit_code(), crate::error::exit_codes::REJECTED);
    }

    #[test]
    fn filter_tasks_keeps_order() {
        let mut a = Task::new("TIKI-A", "a");
        a.status = Status::Done;
        let b = Task::new("TIKI-B", "b");
        let mut c = Task::new("TIKI-C", "c");
        c.status = Status::Done;

        let expr = parse_filter("status = done").unwrap();
        let ctx = EvalContext::new(Utc::now(), None);
        let ids: Vec<String> = filter_tasks(&[a, b, c], Some(&expr), &ctx)
            .into_iter()
            .map(|task| task.id)
            .collect();
        assert_eq!(ids, vec!["TIKI-A", "TIKI-C"]);
    }
}
