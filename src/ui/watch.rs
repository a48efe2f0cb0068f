//! Reload the store when task files change on disk.

use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use glob::Pattern;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::store::TaskStore;

const WATCH_DEBOUNCE_MS: u64 = 200;
const TASK_FILE_PATTERN: &str = "*.md";

/// Whether `event` touches a task file.
pub(crate) fn is_task_event(event: &Event, pattern: &Pattern) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.iter().any(|path| is_task_path(path, pattern))
}

fn is_task_path(path: &Path, pattern: &Pattern) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| pattern.matches(name))
}

/// Watch the task directory and call [`TaskStore::reload`] after a burst
/// of changes settles. Problems are reported on `errors`.
pub(crate) fn spawn_watch(store: Arc<TaskStore>, errors: Sender<String>) {
    let dir = store.dir().to_path_buf();
    if !dir.is_dir() {
        return;
    }
    let pattern = match Pattern::new(TASK_FILE_PATTERN) {
        Ok(pattern) => pattern,
        Err(err) => {
            let _ = errors.send(err.to_string());
            return;
        }
    };

    thread::spawn(move || {
        let (event_tx, event_rx) = mpsc::channel();
        let watcher: notify::Result<RecommendedWatcher> = notify::recommended_watcher(move |res| {
            let _ = event_tx.send(res);
        });
        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(err) => {
                let _ = errors.send(err.to_string());
                return;
            }
        };
        if let Err(err) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            let _ = errors.send(err.to_string());
            return;
        }
        tracing::debug!(dir = %dir.display(), "watching task directory");

        let debounce = Duration::from_millis(WATCH_DEBOUNCE_MS);
        let mut pending: Option<Instant> = None;
        loop {
            let timeout = pending
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_secs(3600));
            match event_rx.recv_timeout(timeout) {
                Ok(Ok(event)) => {
                    if is_task_event(&event, &pattern) {
                        pending = Some(Instant::now() + debounce);
                    }
                }
                Ok(Err(err)) => {
                    if errors.send(err.to_string()).is_err() {
                        break;
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if pending.take().is_some() {
                        if let Err(err) = store.reload() {
                            tracing::warn!(error = %err, "reload after file change failed");
                            if errors.send(err.to_string()).is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });
}
