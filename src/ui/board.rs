//! What a tiki plugin shows: tasks per lane, or one grid.

use std::collections::HashMap;

use crate::filter::EvalContext;
use crate::plugin::TikiPlugin;
use crate::store::SearchResult;
use crate::task::Task;

/// How a tiki plugin is laid out on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    /// One column per lane, selection by pane and row.
    Lanes,
    /// A single lane wrapped `columns` wide, selection by index.
    Grid { columns: usize },
}

pub(crate) fn layout_of(plugin: &TikiPlugin) -> Layout {
    if plugin.lanes.len() > 1 {
        Layout::Lanes
    } else {
        let columns = plugin.lanes.first().map_or(1, |lane| lane.columns);
        Layout::Grid {
            columns: columns.max(1),
        }
    }
}

/// Pane names for the lane layout.
pub(crate) fn pane_names(plugin: &TikiPlugin) -> Vec<String> {
    if plugin.lanes.is_empty() {
        vec![plugin.base.name.clone()]
    } else {
        plugin.lanes.iter().map(|lane| lane.name.clone()).collect()
    }
}

/// Tasks for each pane. With `search` the panes keep only hits, best first.
pub(crate) fn build_columns(
    plugin: &TikiPlugin,
    tasks: &[Task],
    ctx: &EvalContext<'_>,
    search: Option<&[SearchResult]>,
) -> Vec<Vec<Task>> {
    let mut columns = if plugin.lanes.is_empty() {
        vec![plugin.tasks(tasks, ctx)]
    } else {
        (0..plugin.lanes.len())
            .map(|lane| plugin.lane_tasks(lane, tasks, ctx))
            .collect()
    };
    if let Some(results) = search {
        let rank: HashMap<&str, usize> = results
            .iter()
            .enumerate()
            .map(|(index, result)| (result.task.id.as_str(), index))
            .collect();
        for column in &mut columns {
            column.retain(|task| rank.contains_key(task.id.as_str()));
            column.sort_by_key(|task| rank.get(task.id.as_str()).copied().unwrap_or(usize::MAX));
        }
    }
    columns
}

/// Largest valid row for a list of `len` items.
pub(crate) fn clamp_row(row: usize, len: usize) -> usize {
    row.min(len.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::load_workflow;
    use crate::task::{Status, DEFAULT_MAX_POINTS};
    use chrono::Utc;

    fn task(id: &str, title: &str, status: Status, priority: i32) -> Task {
        let mut task = Task::new(id, title);
        task.status = status;
        task.priority = priority;
        task
    }

    fn kanban() -> TikiPlugin {
        let load = load_workflow(&[], DEFAULT_MAX_POINTS).unwrap();
        load.find("Kanban").and_then(|plugin| plugin.as_tiki()).cloned().unwrap()
    }

    #[test]
    fn kanban_uses_lanes_and_backlog_uses_grid() {
        let load = load_workflow(&[], DEFAULT_MAX_POINTS).unwrap();
        let backlog = load.find("Backlog").and_then(|plugin| plugin.as_tiki()).unwrap();
        assert_eq!(layout_of(&kanban()), Layout::Lanes);
        assert_eq!(layout_of(backlog), Layout::Grid { columns: 4 });
        assert_eq!(pane_names(&kanban()), vec!["To Do", "In Progress", "Review", "Done"]);
    }

    #[test]
    fn columns_follow_lane_filters_and_sort() {
        let tasks = vec![
            task("T-1", "Write docs", Status::Todo, 3),
            task("T-2", "Fix bug", Status::Todo, 1),
            task("T-3", "Ship", Status::Done, 2),
            task("T-4", "Someday", Status::Backlog, 1),
        ];
        let ctx = EvalContext::new(Utc::now(), None);
        let columns = build_columns(&kanban(), &tasks, &ctx, None);
        let ids: Vec<Vec<&str>> = columns
            .iter()
            .map(|column| column.iter().map(|task| task.id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["T-2", "T-1"], vec![], vec![], vec!["T-3"]]);
    }

    #[test]
    fn search_narrows_columns_in_rank_order() {
        let tasks = vec![
            task("T-1", "Fix login", Status::Todo, 1),
            task("T-2", "Login page", Status::Todo, 2),
            task("T-3", "Ship", Status::Todo, 3),
        ];
        let ctx = EvalContext::new(Utc::now(), None);
        let results = vec![
            SearchResult {
                task: tasks[1].clone(),
                score: 2.5,
            },
            SearchResult {
                task: tasks[0].clone(),
                score: 0.8,
            },
        ];
        let columns = build_columns(&kanban(), &tasks, &ctx, Some(&results));
        let todo: Vec<&str> = columns[0].iter().map(|task| task.id.as_str()).collect();
        assert_eq!(todo, vec!["T-2", "T-1"]);
    }

    #[test]
    fn clamp_handles_empty_lists() {
        assert_eq!(clamp_row(5, 0), 0);
        assert_eq!(clamp_row(5, 3), 2);
        assert_eq!(clamp_row(1, 3), 1);
    }
}
