//! End-to-end task flows through the store without git.

use std::fs::{self, File};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tempfile::TempDir;
use tiki::action::parse_action;
use tiki::codec::encode_task;
use tiki::filter::{filter_tasks, parse_filter, EvalContext};
use tiki::plugin::load_workflow;
use tiki::selection::BoardSelection;
use tiki::sort::{parse_sort, sort_tasks};
use tiki::store::{StoreOptions, TaskStore};
use tiki::task::{Status, Task, DEFAULT_MAX_POINTS};
use tiki::Error;

fn store_in(temp: &TempDir) -> TaskStore {
    let options = StoreOptions {
        stage_changes: false,
        ..StoreOptions::default()
    };
    TaskStore::open(temp.path().join("tasks"), options, None).unwrap()
}

fn create(store: &TaskStore, title: &str, status: Status, priority: i32) -> Task {
    let mut task = store.new_task_template().unwrap();
    task.title = title.to_string();
    task.status = status;
    task.priority = priority;
    store.create_task(task).unwrap()
}

#[test]
fn action_updates_persist_across_reload() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    let task = create(&store, "Fix login", Status::Todo, 3);

    let action = parse_action("status=in_progress, tags+=[auth, ui], assignee=CURRENT_USER", DEFAULT_MAX_POINTS)
        .unwrap();
    let changed = action
        .apply(&store.get_task(&task.id).unwrap(), Some("alice"), DEFAULT_MAX_POINTS)
        .unwrap();
    store.try_update_task(changed).unwrap();

    let reopened = store_in(&temp);
    let loaded = reopened.get_task(&task.id).unwrap();
    assert_eq!(loaded.status, Status::InProgress);
    assert_eq!(loaded.assignee, "alice");
    assert_eq!(loaded.tags, vec!["auth", "ui"]);
}

#[test]
fn filter_and_sort_over_stored_tasks() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    create(&store, "Write docs", Status::Todo, 3);
    create(&store, "Fix crash", Status::Todo, 1);
    create(&store, "Refactor", Status::Todo, 2);
    create(&store, "Release", Status::Done, 1);

    let filter = parse_filter("status = todo AND priority <= 2").unwrap();
    let ctx = EvalContext::new(Utc::now(), None);
    let mut selected = filter_tasks(&store.get_all_tasks(), Some(&filter), &ctx);
    sort_tasks(&mut selected, &parse_sort("priority desc").unwrap());

    let titles: Vec<&str> = selected.iter().map(|task| task.title.as_str()).collect();
    assert_eq!(titles, vec!["Refactor", "Fix crash"]);
}

#[test]
fn moving_between_kanban_lanes_rewrites_status() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    let task = create(&store, "Ship it", Status::Todo, 2);

    let load = load_workflow(&[], DEFAULT_MAX_POINTS).unwrap();
    let kanban = load.find("Kanban").and_then(|plugin| plugin.as_tiki()).unwrap();
    let ctx = EvalContext::new(Utc::now(), None);
    assert_eq!(kanban.lane_of(&task, &ctx), Some(0));

    let moved = kanban
        .move_to_lane(&store.get_task(&task.id).unwrap(), 2, None, DEFAULT_MAX_POINTS)
        .unwrap();
    store.try_update_task(moved).unwrap();

    let stored = store.get_task(&task.id).unwrap();
    assert_eq!(stored.status, Status::Review);
    assert_eq!(kanban.lane_of(&stored, &ctx), Some(2));
    assert!(kanban.lane_tasks(0, &store.get_all_tasks(), &ctx).is_empty());
}

#[test]
fn search_restores_the_board_selection() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    create(&store, "Login page", Status::Todo, 1);
    create(&store, "Fix login redirect", Status::InProgress, 2);
    create(&store, "Unrelated", Status::Done, 3);

    let board = BoardSelection::new(["To Do", "In Progress", "Review", "Done"]);
    board.set_selection("Done", 0);

    let results = store.search("login", None);
    assert_eq!(results.len(), 2);
    board.set_search_results(results, "login");
    board.set_selection("In Progress", 0);
    assert!(board.is_search_active());

    // A second query keeps the original anchor.
    board.set_search_results(store.search("redirect", None), "redirect");
    board.clear_search();

    assert!(!board.is_search_active());
    assert_eq!(board.selected_pane(), "Done");
    assert_eq!(board.selected_row(), 0);
}

#[test]
fn concurrent_edit_is_refused_until_reload() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    let task = create(&store, "Shared", Status::Todo, 2);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    store.add_listener(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let mut theirs = store.get_task(&task.id).unwrap();
    theirs.title = "Theirs".to_string();
    let path = store.dir().join(task.file_name());
    fs::write(&path, encode_task(&theirs).unwrap()).unwrap();
    let file = File::options().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(5)).unwrap();

    let mut stale = store.get_task(&task.id).unwrap();
    stale.title = "Mine".to_string();
    let err = store.try_update_task(stale).unwrap_err();
    assert!(matches!(err, Error::Conflict(ref id) if *id == task.id));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(store.get_task(&task.id).unwrap().title, "Shared");

    store.reload().unwrap();
    assert_eq!(store.get_task(&task.id).unwrap().title, "Theirs");
    let mut fresh = store.get_task(&task.id).unwrap();
    fresh.title = "Mine".to_string();
    store.try_update_task(fresh).unwrap();
    assert_eq!(store.get_task(&task.id).unwrap().title, "Mine");
}
