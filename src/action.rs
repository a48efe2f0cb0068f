//! Action language: field assignments applied to a task.
//!
//! ```text
//! status=done, priority=2, assignee='Alice', tags+=[frontend, 'needs review']
//! ```
//!
//! Every value is checked while parsing, so a parsed [`Action`] can only fail
//! to apply when `CURRENT_USER` cannot be resolved or when the resulting task
//! fails validation.

use std::fmt;

use crate::error::{Error, Result};
use crate::filter::CURRENT_USER;
use crate::task::{
    normalize_tags, validate_points, validate_priority, validate_status_value,
    validate_type_value, Status, Task, TaskType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionField {
    Status,
    Type,
    Priority,
    Assignee,
    Points,
    Tags,
}

impl ActionField {
    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "status" => Some(ActionField::Status),
            "type" => Some(ActionField::Type),
            "priority" => Some(ActionField::Priority),
            "assignee" => Some(ActionField::Assignee),
            "points" => Some(ActionField::Points),
            "tags" | "tag" => Some(ActionField::Tags),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionField::Status => "status",
            ActionField::Type => "type",
            ActionField::Priority => "priority",
            ActionField::Assignee => "assignee",
            ActionField::Points => "points",
            ActionField::Tags => "tags",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOperator {
    Assign,
    Add,
    Remove,
}

impl ActionOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionOperator::Assign => "=",
            ActionOperator::Add => "+=",
            ActionOperator::Remove => "-=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionValue {
    Status(Status),
    Type(TaskType),
    Int(i32),
    Text(String),
    Tags(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOp {
    pub field: ActionField,
    pub operator: ActionOperator,
    pub value: ActionValue,
}

/// A parsed, ordered list of operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Action {
    pub ops: Vec<ActionOp>,
}

impl Action {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Apply to a copy of `task`. See [`apply_action`].
    pub fn apply(&self, task: &Task, current_user: Option<&str>, max_points: i32) -> Result<Task> {
        apply_action(task, self, current_user, max_points)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionError {
    pub message: String,
    pub segment: String,
}

impl ActionError {
    fn new(message: impl Into<String>, segment: &str) -> Self {
        Self {
            message: message.into(),
            segment: segment.trim().to_string(),
        }
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in '{}'", self.message, self.segment)
    }
}

impl std::error::Error for ActionError {}

impl From<ActionError> for Error {
    fn from(err: ActionError) -> Self {
        Error::InvalidAction(err.to_string())
    }
}

/// Parse an action string. Blank input parses to an empty action.
pub fn parse_action(input: &str, max_points: i32) -> std::result::Result<Action, ActionError> {
    let mut ops = Vec::new();
    for segment in split_top_level(input, ',') {
        if segment.trim().is_empty() {
            continue;
        }
        ops.push(parse_op(segment, max_points)?);
    }
    Ok(Action { ops })
}

fn parse_op(segment: &str, max_points: i32) -> std::result::Result<ActionOp, ActionError> {
    let (index, operator) = find_operator(segment)
        .ok_or_else(|| ActionError::new("expected '=', '+=' or '-='", segment))?;
    let name = &segment[..index];
    let raw_value = segment[index + operator.as_str().len()..].trim();

    let field = ActionField::parse(name).ok_or_else(|| {
        ActionError::new(format!("unknown field '{}'", name.trim()), segment)
    })?;

    if field == ActionField::Tags {
        if operator == ActionOperator::Assign {
            return Err(ActionError::new(
                "tags only support '+=' and '-='",
                segment,
            ));
        }
        let tags = parse_tag_list(raw_value).map_err(|msg| ActionError::new(msg, segment))?;
        if tags.is_empty() {
            return Err(ActionError::new("tag list is empty", segment));
        }
        return Ok(ActionOp {
            field,
            operator,
            value: ActionValue::Tags(tags),
        });
    }

    if operator != ActionOperator::Assign {
        return Err(ActionError::new(
            format!("{} only supports '='", field.as_str()),
            segment,
        ));
    }

    let text = unquote(raw_value);
    let value = match field {
        ActionField::Status => validate_status_value(&text)
            .map(ActionValue::Status)
            .map_err(|err| ActionError::new(err.message, segment))?,
        ActionField::Type => validate_type_value(&text)
            .map(ActionValue::Type)
            .map_err(|err| ActionError::new(err.message, segment))?,
        ActionField::Priority => {
            let number = parse_int(&text, segment)?;
            if let Some(err) = validate_priority(number) {
                return Err(ActionError::new(err.message, segment));
            }
            ActionValue::Int(number)
        }
        ActionField::Points => {
            let number = parse_int(&text, segment)?;
            if let Some(err) = validate_points(number, max_points) {
                return Err(ActionError::new(err.message, segment));
            }
            ActionValue::Int(number)
        }
        ActionField::Assignee => ActionValue::Text(text.trim().to_string()),
        ActionField::Tags => unreachable!("handled above"),
    };
    Ok(ActionOp {
        field,
        operator,
        value,
    })
}

fn parse_int(text: &str, segment: &str) -> std::result::Result<i32, ActionError> {
    text.trim()
        .parse::<i32>()
        .map_err(|_| ActionError::new(format!("'{}' is not an integer", text.trim()), segment))
}

/// First `=`, `+=` or `-=` outside quotes.
fn find_operator(segment: &str) -> Option<(usize, ActionOperator)> {
    let mut quote: Option<char> = None;
    let mut prev: Option<(usize, char)> = None;
    for (index, ch) in segment.char_indices() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => {}
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            None if ch == '=' => {
                return Some(match prev {
                    Some((at, '+')) => (at, ActionOperator::Add),
                    Some((at, '-')) => (at, ActionOperator::Remove),
                    _ => (index, ActionOperator::Assign),
                });
            }
            None => {}
        }
        prev = Some((index, ch));
    }
    None
}

/// Split on `separator` where it is not inside quotes or brackets.
fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut start = 0;
    for (index, ch) in input.char_indices() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                _ if ch == separator && depth == 0 => {
                    parts.push(&input[start..index]);
                    start = index + ch.len_utf8();
                }
                _ => {}
            },
        }
    }
    parts.push(&input[start..]);
    parts
}

fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    for quote in ['\'', '"'] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

/// `[a, 'b c']` or a single bare tag.
fn parse_tag_list(raw: &str) -> std::result::Result<Vec<String>, String> {
    let trimmed = raw.trim();
    let inner = match (trimmed.strip_prefix('['), trimmed.ends_with(']')) {
        (Some(rest), true) => &rest[..rest.len() - 1],
        (Some(_), false) => return Err("unterminated tag list".to_string()),
        (None, _) => trimmed,
    };
    let items: Vec<String> = split_top_level(inner, ',')
        .into_iter()
        .map(unquote)
        .collect();
    Ok(normalize_tags(items))
}

/// Apply `action` to a clone of `src` and validate the result.
///
/// `src` is never modified; on any failure the caller keeps the original.
pub fn apply_action(
    src: &Task,
    action: &Action,
    current_user: Option<&str>,
    max_points: i32,
) -> Result<Task> {
    let mut task = src.clone();
    for op in &action.ops {
        match (&op.value, op.operator) {
            (ActionValue::Status(status), _) => task.status = *status,
            (ActionValue::Type(kind), _) => task.kind = *kind,
            (ActionValue::Int(number), _) => match op.field {
                ActionField::Priority => task.priority = *number,
                ActionField::Points => task.points = *number,
                _ => {}
            },
            (ActionValue::Text(text), _) => {
                task.assignee = if text.eq_ignore_ascii_case(CURRENT_USER) {
                    match current_user {
                        Some(user) if !user.trim().is_empty() => user.trim().to_string(),
                        _ => return Err(Error::NoCurrentUser),
                    }
                } else {
                    text.clone()
                };
            }
            (ActionValue::Tags(tags), ActionOperator::Add) => {
                let merged = task.tags.iter().chain(tags.iter());
                task.tags = normalize_tags(merged);
            }
            (ActionValue::Tags(tags), ActionOperator::Remove) => {
                task.tags.retain(|existing| !tags.contains(existing));
            }
            (ActionValue::Tags(_), ActionOperator::Assign) => {
                return Err(Error::InvalidAction(
                    "tags only support '+=' and '-='".to_string(),
                ))
            }
        }
    }
    task.quick_validate(max_points).into_result()?;
    Ok(task)
}

impl fmt::Display for ActionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match &self.value {
            ActionValue::Status(status) => status.as_str().to_string(),
            ActionValue::Type(kind) => kind.as_str().to_string(),
            ActionValue::Int(number) => number.to_string(),
            ActionValue::Text(text) => format!("'{text}'"),
            ActionValue::Tags(tags) => format!("[{}]", tags.join(", ")),
        };
        write!(f, "{}{}{}", self.field.as_str(), self.operator.as_str(), value)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ops.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Task {
        let mut task = Task::new("TIKI-ABC123", "Fix login");
        task.tags = vec!["existing".to_string()];
        task
    }

    #[test]
    fn full_action_parses_in_order_and_applies() {
        let action = parse_action(
            "status=done, type=bug, priority=2, points=3, assignee='Alice', tags+=[frontend,'needs review']",
            10,
        )
        .unwrap();
        let fields: Vec<ActionField> = action.ops.iter().map(|op| op.field).collect();
        assert_eq!(
            fields,
            vec![
                ActionField::Status,
                ActionField::Type,
                ActionField::Priority,
                ActionField::Points,
                ActionField::Assignee,
                ActionField::Tags,
            ]
        );

        let original = base();
        let updated = action.apply(&original, None, 10).unwrap();
        assert_eq!(updated.tags, vec!["existing", "frontend", "needs review"]);
        assert_eq!(updated.status, Status::Done);
        assert_eq!(updated.kind, TaskType::Bug);
        assert_eq!(updated.priority, 2);
        assert_eq!(updated.points, 3);
        assert_eq!(updated.assignee, "Alice");
        assert_eq!(original, base());
    }

    #[test]
    fn commas_inside_quotes_and_brackets_do_not_split() {
        let action = parse_action("assignee='Doe, Jane', tags-=[a, b]", 10).unwrap();
        assert_eq!(action.len(), 2);
        assert_eq!(action.ops[0].value, ActionValue::Text("Doe, Jane".to_string()));
        assert_eq!(
            action.ops[1].value,
            ActionValue::Tags(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn tag_removal_preserves_order() {
        let mut task = base();
        task.tags = vec!["a".into(), "moved".into(), "b".into()];
        let action = parse_action("tags-=[moved, missing]", 10).unwrap();
        assert_eq!(action.apply(&task, None, 10).unwrap().tags, vec!["a", "b"]);
    }

    #[test]
    fn invalid_actions_name_the_segment() {
        let err = parse_action("status=done, tags=[x]", 10).unwrap_err();
        assert_eq!(err.segment, "tags=[x]");

        let err = parse_action("priority=9", 10).unwrap_err();
        assert!(err.message.contains("priority"));

        let err = parse_action("points=11", 10).unwrap_err();
        assert!(err.message.contains("points"));
        assert!(parse_action("points=11", 20).is_ok());

        assert!(parse_action("status=someday", 10).is_err());
        assert!(parse_action("color=red", 10).is_err());
        assert!(parse_action("status+=done", 10).is_err());
        assert!(parse_action("status", 10).is_err());
        assert!(parse_action("points=many", 10).is_err());
        assert!(parse_action("tags+=[a", 10).is_err());
    }

    #[test]
    fn status_and_type_aliases_normalize() {
        let action = parse_action("status='In Progress', type=feature", 10).unwrap();
        assert_eq!(action.ops[0].value, ActionValue::Status(Status::InProgress));
        assert_eq!(action.ops[1].value, ActionValue::Type(TaskType::Story));
    }

    #[test]
    fn current_user_is_resolved_at_apply() {
        let action = parse_action("assignee=CURRENT_USER", 10).unwrap();
        let task = base();
        assert_eq!(action.apply(&task, Some("bob"), 10).unwrap().assignee, "bob");
        assert!(matches!(
            action.apply(&task, None, 10),
            Err(Error::NoCurrentUser)
        ));
    }

    #[test]
    fn failed_validation_leaves_source_untouched() {
        let mut task = base();
        task.title = String::new();
        let action = parse_action("status=done", 10).unwrap();
        let err = action.apply(&task, None, 10).unwrap_err();
        assert!(err.validation_errors().is_some_and(|errs| errs.has_field("title")));
        assert_eq!(task.status, Status::Backlog);
    }

    #[test]
    fn blank_and_trailing_commas() {
        assert!(parse_action("", 10).unwrap().is_empty());
        assert_eq!(parse_action("status=todo,", 10).unwrap().len(), 1);
    }

    #[test]
    fn display_is_reparseable() {
        let action = parse_action("status=done, assignee='A B', tags+=[x, y]", 10).unwrap();
        let again = parse_action(&action.to_string(), 10).unwrap();
        assert_eq!(action, again);
    }
}
