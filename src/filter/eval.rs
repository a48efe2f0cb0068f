//! Evaluation of filter expressions against a task.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};

use super::ast::{
    canonical_field, ArithOp, BinaryOp, CompareOp, FilterExpr, Literal, Operand, TimeExpr,
    TimeField, TimeOperand,
};
use crate::task::{priority_from_word, Status, Task, TaskType};

/// Placeholder resolved to the current git user.
pub const CURRENT_USER: &str = "CURRENT_USER";

/// Everything a filter needs besides the task itself.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub now: DateTime<Utc>,
    pub current_user: Option<&'a str>,
}

impl<'a> EvalContext<'a> {
    pub fn new(now: DateTime<Utc>, current_user: Option<&'a str>) -> Self {
        Self { now, current_user }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Text(String),
    Int(i64),
    Status(Status),
    Type(TaskType),
    Time(DateTime<Utc>),
    Span(Duration),
    List(Vec<String>),
    Missing,
}

impl FilterExpr {
    pub fn evaluate(&self, task: &Task, ctx: &EvalContext<'_>) -> bool {
        evaluate(self, task, ctx)
    }
}

pub fn evaluate(expr: &FilterExpr, task: &Task, ctx: &EvalContext<'_>) -> bool {
    match expr {
        FilterExpr::Binary { op, left, right } => match op {
            BinaryOp::And => evaluate(left, task, ctx) && evaluate(right, task, ctx),
            BinaryOp::Or => evaluate(left, task, ctx) || evaluate(right, task, ctx),
        },
        FilterExpr::Not(inner) => !evaluate(inner, task, ctx),
        FilterExpr::Compare { left, op, right } => {
            let lhs = resolve_left(left, task, ctx);
            let rhs = resolve_right(right, task, ctx);
            compare(&lhs, *op, &rhs, ctx)
        }
        FilterExpr::In {
            field,
            negated,
            values,
        } => {
            let value = field_value(field, task);
            if value == Value::Missing {
                return false;
            }
            let found = values
                .iter()
                .map(|literal| resolve_literal(literal, task, ctx, false))
                .any(|candidate| compare(&value, CompareOp::Eq, &candidate, ctx));
            found != *negated
        }
    }
}

/// Bare words on the left name task fields.
fn resolve_left(operand: &Operand, task: &Task, ctx: &EvalContext<'_>) -> Value {
    match operand {
        Operand::Literal(literal) => resolve_literal(literal, task, ctx, true),
        Operand::Time(expr) => resolve_time(expr, task, ctx),
    }
}

/// Bare words on the right are values, except `CURRENT_USER`.
fn resolve_right(operand: &Operand, task: &Task, ctx: &EvalContext<'_>) -> Value {
    match operand {
        Operand::Literal(literal) => resolve_literal(literal, task, ctx, false),
        Operand::Time(expr) => resolve_time(expr, task, ctx),
    }
}

fn resolve_literal(literal: &Literal, task: &Task, ctx: &EvalContext<'_>, as_field: bool) -> Value {
    match literal {
        Literal::Str(value) => Value::Text(value.clone()),
        Literal::Int(value) => Value::Int(*value),
        Literal::Duration(value) => Value::Span(*value),
        Literal::Ident(name) if name.eq_ignore_ascii_case(CURRENT_USER) => match ctx.current_user
        {
            Some(user) => Value::Text(user.to_string()),
            None => Value::Missing,
        },
        Literal::Ident(name) if as_field => field_value(name, task),
        Literal::Ident(name) => Value::Text(name.clone()),
    }
}

fn field_value(name: &str, task: &Task) -> Value {
    match canonical_field(name).as_str() {
        "id" => Value::Text(task.id.clone()),
        "title" => Value::Text(task.title.clone()),
        "description" => Value::Text(task.description.clone()),
        "status" => Value::Status(task.status),
        "type" => Value::Type(task.kind),
        "assignee" => Value::Text(task.assignee.clone()),
        "createdby" => Value::Text(task.created_by.clone()),
        "priority" => Value::Int(task.priority as i64),
        "points" => Value::Int(task.points as i64),
        "tags" | "tag" => Value::List(task.tags.clone()),
        "createdat" => Value::Time(task.created_at),
        "updatedat" => Value::Time(task.updated_at),
        _ => Value::Missing,
    }
}

fn time_of(field: TimeField, task: &Task, ctx: &EvalContext<'_>) -> DateTime<Utc> {
    match field {
        TimeField::Now => ctx.now,
        TimeField::CreatedAt => task.created_at,
        TimeField::UpdatedAt => task.updated_at,
    }
}

fn resolve_time(expr: &TimeExpr, task: &Task, ctx: &EvalContext<'_>) -> Value {
    let base = time_of(expr.base, task, ctx);
    match expr.offset {
        None => Value::Time(base),
        Some((ArithOp::Add, TimeOperand::Duration(span))) => base
            .checked_add_signed(span)
            .map_or(Value::Missing, Value::Time),
        Some((ArithOp::Sub, TimeOperand::Duration(span))) => base
            .checked_sub_signed(span)
            .map_or(Value::Missing, Value::Time),
        Some((ArithOp::Sub, TimeOperand::Field(field))) => {
            Value::Span(base.signed_duration_since(time_of(field, task, ctx)))
        }
        Some((ArithOp::Add, TimeOperand::Field(_))) => Value::Missing,
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value, ctx: &EvalContext<'_>) -> bool {
    match (left, right) {
        (Value::Missing, _) | (_, Value::Missing) => false,

        (Value::List(items), other) | (other, Value::List(items)) => {
            let Some(needle) = as_text(other) else {
                return false;
            };
            let contains = items.iter().any(|item| item.eq_ignore_ascii_case(&needle));
            match op {
                CompareOp::Eq => contains,
                CompareOp::Ne => !contains,
                _ => false,
            }
        }

        (Value::Time(time), Value::Span(span)) => match ctx.now.checked_sub_signed(*span) {
            Some(anchor) => op.holds(time.cmp(&anchor)),
            None => false,
        },
        (Value::Span(span), Value::Time(time)) => match ctx.now.checked_sub_signed(*span) {
            Some(anchor) => op.holds(anchor.cmp(time)),
            None => false,
        },
        (Value::Time(a), Value::Time(b)) => op.holds(a.cmp(b)),
        (Value::Span(a), Value::Span(b)) => op.holds(a.cmp(b)),

        (Value::Status(status), other) => match status_of(other) {
            Some(rhs) => op.holds(status.cmp(&rhs)),
            None => false,
        },
        (other, Value::Status(status)) => match status_of(other) {
            Some(lhs) => op.holds(lhs.cmp(status)),
            None => false,
        },
        (Value::Type(kind), other) => match type_of(other) {
            Some(rhs) => type_equality(op, *kind == rhs),
            None => false,
        },
        (other, Value::Type(kind)) => match type_of(other) {
            Some(lhs) => type_equality(op, lhs == *kind),
            None => false,
        },

        (Value::Int(a), other) => match int_of(other) {
            Some(b) => op.holds(a.cmp(&b)),
            None => false,
        },
        (other, Value::Int(b)) => match int_of(other) {
            Some(a) => op.holds(a.cmp(b)),
            None => false,
        },

        (Value::Text(a), Value::Text(b)) => op.holds(a.to_lowercase().cmp(&b.to_lowercase())),

        _ => false,
    }
}

fn type_equality(op: CompareOp, equal: bool) -> bool {
    match op {
        CompareOp::Eq => equal,
        CompareOp::Ne => !equal,
        _ => false,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Text(text) => Some(text.clone()),
        Value::Int(number) => Some(number.to_string()),
        Value::Status(status) => Some(status.as_str().to_string()),
        Value::Type(kind) => Some(kind.as_str().to_string()),
        _ => None,
    }
}

fn status_of(value: &Value) -> Option<Status> {
    match value {
        Value::Status(status) => Some(*status),
        Value::Text(text) => Status::parse(text),
        _ => None,
    }
}

fn type_of(value: &Value) -> Option<TaskType> {
    match value {
        Value::Type(kind) => Some(*kind),
        Value::Text(text) => TaskType::parse(text),
        _ => None,
    }
}

fn int_of(value: &Value) -> Option<i64> {
    match value {
        Value::Int(number) => Some(*number),
        Value::Text(text) => text
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| priority_from_word(text).map(i64::from)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_filter;

    fn ctx(now: DateTime<Utc>) -> EvalContext<'static> {
        EvalContext::new(now, Some("alice"))
    }

    fn task() -> Task {
        let mut task = Task::new("TIKI-ABC123", "Fix login");
        task.status = Status::Ready;
        task.kind = TaskType::Bug;
        task.priority = 2;
        task.points = 5;
        task.assignee = "Alice".to_string();
        task.tags = vec!["frontend".to_string(), "Needs Review".to_string()];
        task
    }

    fn matches(filter: &str, task: &Task, now: DateTime<Utc>) -> bool {
        parse_filter(filter).unwrap().evaluate(task, &ctx(now))
    }

    #[test]
    fn recent_ready_tasks() {
        let now = Utc::now();
        let filter = "status = 'ready' AND (NOW - CreatedAt) < 24hour";

        let mut fresh = task();
        fresh.created_at = now - Duration::hours(1);
        assert!(matches(filter, &fresh, now));

        let mut stale = task();
        stale.created_at = now - Duration::hours(48);
        assert!(!matches(filter, &stale, now));

        let mut done = fresh.clone();
        done.status = Status::Done;
        assert!(!matches(filter, &done, now));
    }

    #[test]
    fn status_and_type_values_are_normalized() {
        let now = Utc::now();
        let task = task();
        assert!(matches("status = READY", &task, now));
        assert!(matches("type == 'bug'", &task, now));
        assert!(matches("type != feature", &task, now));
        assert!(matches("status < done", &task, now));
        assert!(matches("status IN [todo, 'ready']", &task, now));
        assert!(!matches("status NOT IN [todo, ready]", &task, now));
    }

    #[test]
    fn numeric_fields_compare_as_integers() {
        let now = Utc::now();
        let task = task();
        assert!(matches("priority <= 2", &task, now));
        assert!(matches("priority = 'medium-high'", &task, now));
        assert!(matches("priority < low", &task, now));
        assert!(matches("points > 3 AND points >= 5", &task, now));
        assert!(!matches("points < 5", &task, now));
        assert!(matches("points IN [1, 5]", &task, now));
    }

    #[test]
    fn current_user_and_case_insensitive_text() {
        let now = Utc::now();
        let task = task();
        assert!(matches("assignee = CURRENT_USER", &task, now));
        assert!(matches("assignee IN ['bob', CURRENT_USER]", &task, now));

        let no_user = EvalContext::new(now, None);
        let expr = parse_filter("assignee = CURRENT_USER").unwrap();
        assert!(!expr.evaluate(&task, &no_user));
    }

    #[test]
    fn tags_use_membership() {
        let now = Utc::now();
        let task = task();
        assert!(matches("tags = frontend", &task, now));
        assert!(matches("tags = 'needs review'", &task, now));
        assert!(matches("tags != backend", &task, now));
        assert!(matches("tags IN [backend, frontend]", &task, now));
        assert!(matches("tags NOT IN [backend]", &task, now));
    }

    #[test]
    fn time_fields_against_durations() {
        let now = Utc::now();
        let mut task = task();
        task.created_at = now - Duration::days(3);
        task.updated_at = now - Duration::hours(2);

        assert!(matches("CreatedAt < 2day", &task, now));
        assert!(matches("UpdatedAt > 1day", &task, now));
        assert!(matches("UpdatedAt > NOW - 1day", &task, now));
        assert!(matches("(NOW - UpdatedAt) <= 2hour", &task, now));
        assert!(matches("UpdatedAt > CreatedAt", &task, now));
        assert!(matches("CreatedAt + 1week > NOW", &task, now));
    }

    #[test]
    fn unknown_fields_never_match() {
        let now = Utc::now();
        let task = task();
        assert!(!matches("color = 'red'", &task, now));
        assert!(!matches("color != 'red'", &task, now));
        assert!(!matches("color IN [red]", &task, now));
        assert!(!matches("color NOT IN [red]", &task, now));
    }

    #[test]
    fn double_negation_is_identity() {
        let now = Utc::now();
        let task = task();
        for filter in ["status = ready", "points > 7", "tags = x", "color = red"] {
            let plain = matches(filter, &task, now);
            let doubled = matches(&format!("NOT NOT {filter}"), &task, now);
            assert_eq!(plain, doubled, "{filter}");
        }
    }
}
