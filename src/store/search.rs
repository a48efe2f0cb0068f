//! Title search with relevance scoring.

use std::cmp::Ordering;

use serde::Serialize;

use crate::filter::{EvalContext, FilterExpr};
use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub task: Task,
    /// Higher is better. Prefix matches score above 1.0, other matches in (0.5, 1.0].
    pub score: f64,
}

/// Score of `query` against `title`, or `None` when it does not match.
///
/// Both arguments are compared case-insensitively; `query` must be non-empty.
pub fn score_title(title: &str, query: &str) -> Option<f64> {
    let title = title.to_lowercase();
    let query = query.to_lowercase();
    let byte_pos = title.find(&query)?;
    if byte_pos == 0 {
        // Exact title ranks above a longer title with the same prefix.
        let coverage = query.chars().count() as f64 / title.chars().count().max(1) as f64;
        return Some(2.0 + coverage);
    }
    let position = title[..byte_pos].chars().count() as f64;
    let length = title.chars().count().max(1) as f64;
    Some(1.0 - 0.5 * (position / length))
}

/// Search `tasks` by title, best match first; ties break on task ID.
pub fn search_tasks<'a, I>(
    tasks: I,
    query: &str,
    filter: Option<&FilterExpr>,
    ctx: &EvalContext<'_>,
) -> Vec<SearchResult>
where
    I: IntoIterator<Item = &'a Task>,
{
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }
    let mut results: Vec<SearchResult> = tasks
        .into_iter()
        .filter(|task| filter.map_or(true, |expr| expr.evaluate(task, ctx)))
        .filter_map(|task| {
            score_title(&task.title, query).map(|score| SearchResult {
                task: task.clone(),
                score,
            })
        })
        .collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.task.id.cmp(&b.task.id))
    });
    results
}
