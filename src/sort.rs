//! Sort rules: `priority, updatedAt DESC, title`.

use std::cmp::Ordering;
use std::fmt;

use crate::error::Error;
use crate::filter::canonical_field;
use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortRule {
    /// Canonical field name: lowercase, separators removed.
    pub field: String,
    pub descending: bool,
}

impl fmt::Display for SortRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "{} DESC", self.field)
        } else {
            f.write_str(&self.field)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortError {
    pub message: String,
    pub term: String,
}

impl fmt::Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in '{}'", self.message, self.term)
    }
}

impl std::error::Error for SortError {}

impl From<SortError> for Error {
    fn from(err: SortError) -> Self {
        Error::InvalidSort(err.to_string())
    }
}

/// Parse a comma-separated list of `field [ASC|DESC]` terms.
///
/// Blank input yields no rules. Unknown field names are accepted and
/// compare as equal.
pub fn parse_sort(input: &str) -> Result<Vec<SortRule>, SortError> {
    let mut rules = Vec::new();
    if input.trim().is_empty() {
        return Ok(rules);
    }
    for term in input.split(',') {
        let words: Vec<&str> = term.split_whitespace().collect();
        let (field, descending) = match words.as_slice() {
            [field] => (*field, false),
            [field, direction] if direction.eq_ignore_ascii_case("asc") => (*field, false),
            [field, direction] if direction.eq_ignore_ascii_case("desc") => (*field, true),
            [] => {
                return Err(SortError {
                    message: "empty sort term".to_string(),
                    term: term.to_string(),
                })
            }
            _ => {
                return Err(SortError {
                    message: "expected 'field', 'field ASC' or 'field DESC'".to_string(),
                    term: term.trim().to_string(),
                })
            }
        };
        let field = canonical_field(field);
        if !SORT_FIELDS.contains(&field.as_str()) {
            tracing::debug!(field = %field, "unknown sort field, ordering unaffected");
        }
        rules.push(SortRule { field, descending });
    }
    Ok(rules)
}

/// Fields with a defined ordering.
pub const SORT_FIELDS: &[&str] = &[
    "assignee",
    "points",
    "priority",
    "createdat",
    "updatedat",
    "status",
    "type",
    "title",
    "id",
];

/// Compare two tasks on one canonical field, ascending.
pub fn compare_field(a: &Task, b: &Task, field: &str) -> Ordering {
    match field {
        "assignee" => cmp_text(&a.assignee, &b.assignee),
        "points" => a.points.cmp(&b.points),
        "priority" => a.priority.cmp(&b.priority),
        "createdat" => a.created_at.cmp(&b.created_at),
        "updatedat" => a.updated_at.cmp(&b.updated_at),
        "status" => a.status.cmp(&b.status),
        "type" => cmp_text(a.kind.as_str(), b.kind.as_str()),
        "title" => cmp_text(&a.title, &b.title),
        "id" => cmp_text(&a.id, &b.id),
        _ => Ordering::Equal,
    }
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Multi-key ordering; later rules break ties of earlier ones.
pub fn compare_tasks(a: &Task, b: &Task, rules: &[SortRule]) -> Ordering {
    for rule in rules {
        let ordering = compare_field(a, b, &rule.field);
        let ordering = if rule.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Stable sort in place. Empty rules leave the order untouched.
pub fn sort_tasks(tasks: &mut [Task], rules: &[SortRule]) {
    if rules.is_empty() {
        return;
    }
    tasks.sort_by(|a, b| compare_tasks(a, b, rules));
}
