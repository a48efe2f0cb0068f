//! Directory-backed task store.
//!
//! The in-memory index is the source of truth between reloads. Every
//! mutation writes the file first, then updates the index, then notifies
//! listeners outside the lock.
//!
//! Concurrent writers are detected, not prevented: a task remembers the file
//! mtime it was loaded with, and an update is refused when the file on disk
//! has a different mtime.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::codec::{decode_task, encode_task, id_from_path, DecodeOptions};
use crate::config::TasksConfig;
use crate::error::{Error, Result};
use crate::filter::{EvalContext, FilterExpr};
use crate::git::{GitOps, GitUser};
use crate::listeners::{ListenerId, ListenerRegistry};
use crate::storage::{file_mtime, list_task_files, remove_if_exists, write_atomic};
use crate::task::{
    file_name_for_id, normalize_id, normalize_tags, now_secs, Comment, Status, Task, TaskType,
    DEFAULT_MAX_POINTS, DEFAULT_PRIORITY,
};

mod history;
mod search;

pub use history::{compute_burndown, snapshots_from_versions, BurndownPoint, TaskSnapshot};
pub use search::{score_title, search_tasks, SearchResult};

/// Length of the random part of generated IDs.
const ID_RANDOM_LEN: usize = 6;
const ID_ATTEMPTS: usize = 32;

/// Settings the store needs from the project configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub id_prefix: String,
    pub max_points: i32,
    pub default_status: Status,
    pub default_type: TaskType,
    pub default_priority: i32,
    pub default_points: i32,
    /// Stage written and deleted files with git.
    pub stage_changes: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            id_prefix: "TIKI".to_string(),
            max_points: DEFAULT_MAX_POINTS,
            default_status: Status::Backlog,
            default_type: TaskType::Story,
            default_priority: DEFAULT_PRIORITY,
            default_points: 1,
            stage_changes: true,
        }
    }
}

impl StoreOptions {
    pub fn from_config(config: &TasksConfig) -> Self {
        Self {
            id_prefix: config.id_prefix.trim().to_uppercase(),
            max_points: config.max_points,
            default_status: config.status(),
            default_type: config.task_type(),
            default_priority: config.default_priority,
            default_points: config.default_points,
            stage_changes: true,
        }
    }
}

/// A problem found while loading one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Default)]
struct StoreState {
    tasks: HashMap<String, Task>,
    /// File each task was loaded from or written to.
    paths: HashMap<String, PathBuf>,
    warnings: Vec<LoadWarning>,
}

pub struct TaskStore {
    dir: PathBuf,
    options: StoreOptions,
    git: Option<Arc<dyn GitOps>>,
    state: RwLock<StoreState>,
    listeners: ListenerRegistry,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("dir", &self.dir)
            .field("options", &self.options)
            .field("git", &self.git.is_some())
            .finish()
    }
}

impl TaskStore {
    /// An empty store over `dir`; call [`TaskStore::reload`] to load it.
    pub fn new(dir: impl Into<PathBuf>, options: StoreOptions, git: Option<Arc<dyn GitOps>>) -> Self {
        Self {
            dir: dir.into(),
            options,
            git,
            state: RwLock::new(StoreState::default()),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Create a store and load the directory.
    pub fn open(
        dir: impl Into<PathBuf>,
        options: StoreOptions,
        git: Option<Arc<dyn GitOps>>,
    ) -> Result<Self> {
        let store = Self::new(dir, options, git);
        store.reload()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn max_points(&self) -> i32 {
        self.options.max_points
    }

    pub fn git(&self) -> Option<&Arc<dyn GitOps>> {
        self.git.as_ref()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(file_name_for_id(id))
    }

    /// The file backing `id`: where it was loaded from, else the canonical name.
    fn path_of(&self, state: &StoreState, id: &str) -> PathBuf {
        state
            .paths
            .get(id)
            .cloned()
            .unwrap_or_else(|| self.path_for(id))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.read().tasks.get(&normalize_id(id)).cloned()
    }

    /// Snapshot of every task, ordered by ID.
    pub fn get_all_tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.read().tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    pub fn get_tasks_by_status(&self, status: Status) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .read()
            .tasks
            .values()
            .filter(|task| task.status == status)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    pub fn len(&self) -> usize {
        self.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Problems found by the last [`TaskStore::reload`].
    pub fn load_warnings(&self) -> Vec<LoadWarning> {
        self.read().warnings.clone()
    }

    /// Title search over tasks matching `filter`. Empty query, empty result.
    pub fn search(&self, query: &str, filter: Option<&FilterExpr>) -> Vec<SearchResult> {
        let user = self.get_current_user().ok().map(|user| user.name);
        let ctx = EvalContext::new(Utc::now(), user.as_deref());
        let state = self.read();
        search_tasks(state.tasks.values(), query, filter, &ctx)
    }

    pub fn get_current_user(&self) -> Result<GitUser> {
        match &self.git {
            Some(git) => git.current_user(),
            None => Err(Error::NoCurrentUser),
        }
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// A new, unsaved task with a fresh ID and configured defaults.
    pub fn new_task_template(&self) -> Result<Task> {
        let id = self.generate_id()?;
        let mut task = Task::new(id, String::new());
        task.status = self.options.default_status;
        task.kind = self.options.default_type;
        task.priority = self.options.default_priority;
        task.points = self.options.default_points;
        if let Ok(user) = self.get_current_user() {
            task.created_by = user.name;
        }
        Ok(task)
    }

    fn generate_id(&self) -> Result<String> {
        let prefix = if self.options.id_prefix.is_empty() {
            "TIKI"
        } else {
            self.options.id_prefix.as_str()
        };
        for _ in 0..ID_ATTEMPTS {
            let ulid = Ulid::new().to_string();
            // The last 16 characters of a ULID are random.
            let random: String = ulid
                .chars()
                .skip(ulid.len().saturating_sub(ID_RANDOM_LEN))
                .collect();
            let id = format!("{prefix}-{random}");
            let taken = self.read().tasks.contains_key(&id) || self.path_for(&id).exists();
            if !taken {
                return Ok(id);
            }
        }
        Err(Error::OperationFailed(
            "could not generate a unique task ID".to_string(),
        ))
    }

    /// Validate and persist a new task, returning it as stored.
    ///
    /// A blank ID is replaced with a generated one.
    pub fn create_task(&self, mut task: Task) -> Result<Task> {
        task.id = normalize_id(&task.id);
        if task.id.is_empty() {
            task.id = self.generate_id()?;
        }
        task.title = task.title.trim().to_string();
        task.tags = normalize_tags(&task.tags);
        if task.created_by.trim().is_empty() {
            if let Ok(user) = self.get_current_user() {
                task.created_by = user.name;
            }
        }
        if task.updated_at < task.created_at {
            task.updated_at = task.created_at;
        }
        task.validate(self.options.max_points).into_result()?;

        let path = self.path_for(&task.id);
        let stored = {
            let mut state = self.write();
            if state.tasks.contains_key(&task.id) || path.exists() {
                return Err(Error::DuplicateTask(task.id));
            }
            let content = encode_task(&task)?;
            task.loaded_mtime = Some(write_atomic(&path, content.as_bytes())?);
            state.paths.insert(task.id.clone(), path.clone());
            state.tasks.insert(task.id.clone(), task.clone());
            task
        };

        tracing::debug!(id = %stored.id, "created task");
        self.stage(&path);
        self.listeners.notify();
        Ok(stored)
    }

    /// Persist changes to an existing task under the optimistic lock.
    ///
    /// Fails with [`Error::Conflict`] when the file changed on disk since
    /// `task` was loaded, leaving the index untouched.
    pub fn try_update_task(&self, mut task: Task) -> Result<Task> {
        let key = normalize_id(&task.id);
        task.id = key.clone();
        task.title = task.title.trim().to_string();
        task.tags = normalize_tags(&task.tags);

        let (stored, path) = {
            let mut state = self.write();
            if !state.tasks.contains_key(&key) {
                return Err(Error::TaskNotFound(key));
            }
            let path = self.path_of(&state, &key);
            let on_disk = file_mtime(&path).map_err(|_| Error::Conflict(key.clone()))?;
            if task.loaded_mtime != Some(on_disk) {
                return Err(Error::Conflict(key));
            }

            task.updated_at = now_secs().max(task.created_at);
            task.validate(self.options.max_points).into_result()?;

            let content = encode_task(&task)?;
            task.loaded_mtime = Some(write_atomic(&path, content.as_bytes())?);
            state.tasks.insert(key, task.clone());
            (task, path)
        };

        tracing::debug!(id = %stored.id, "updated task");
        self.stage(&path);
        self.listeners.notify();
        Ok(stored)
    }

    /// [`TaskStore::try_update_task`] reporting only success.
    pub fn update_task(&self, task: Task) -> bool {
        let id = task.id.clone();
        match self.try_update_task(task) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(id = %id, error = %err, "task update rejected");
                false
            }
        }
    }

    pub fn update_status(&self, id: &str, status: Status) -> bool {
        let Some(mut task) = self.get_task(id) else {
            return false;
        };
        task.status = status;
        self.update_task(task)
    }

    /// Append a comment to a task.
    pub fn add_comment(&self, id: &str, author: &str, text: &str) -> Result<Comment> {
        let mut task = self
            .get_task(id)
            .ok_or_else(|| Error::TaskNotFound(normalize_id(id)))?;
        let comment = Comment {
            id: uuid::Uuid::new_v4().to_string(),
            author: author.trim().to_string(),
            text: text.trim().to_string(),
            created_at: now_secs(),
        };
        task.comments.push(comment.clone());
        self.try_update_task(task)?;
        Ok(comment)
    }

    /// Remove a task's file and index entry. Unknown IDs are ignored.
    pub fn delete_task(&self, id: &str) -> Result<()> {
        let key = normalize_id(id);
        let path = {
            let mut state = self.write();
            if !state.tasks.contains_key(&key) {
                return Ok(());
            }
            let path = self.path_of(&state, &key);
            remove_if_exists(&path)?;
            state.tasks.remove(&key);
            state.paths.remove(&key);
            path
        };

        tracing::debug!(id = %key, "deleted task");
        if self.options.stage_changes {
            if let Some(git) = &self.git {
                if let Err(err) = git.remove(&[path]) {
                    tracing::error!(error = %err, "failed to stage task removal");
                }
            }
        }
        self.listeners.notify();
        Ok(())
    }

    fn stage(&self, path: &Path) {
        if !self.options.stage_changes {
            return;
        }
        if let Some(git) = &self.git {
            if let Err(err) = git.add(&[path.to_path_buf()]) {
                tracing::error!(path = %path.display(), error = %err, "failed to stage task file");
            }
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Rescan the task directory and replace the index.
    ///
    /// Unreadable or invalid files are skipped and reported through
    /// [`TaskStore::load_warnings`]. Listeners are notified once.
    pub fn reload(&self) -> Result<()> {
        let files = list_task_files(&self.dir)?;
        let mut warnings = Vec::new();
        let mut decoded = Vec::with_capacity(files.len());

        for path in files {
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(err) => {
                    warnings.push(warning(&path, format!("unreadable: {err}")));
                    continue;
                }
            };
            let mtime = match file_mtime(&path) {
                Ok(mtime) => mtime,
                Err(err) => {
                    warnings.push(warning(&path, format!("no modification time: {err}")));
                    continue;
                }
            };
            let options = DecodeOptions {
                max_points: self.options.max_points,
                fallback_id: id_from_path(&path),
                fallback_time: DateTime::<Utc>::from(mtime),
            };
            let mut result = decode_task(&content, &options);
            for message in result.warnings.drain(..) {
                tracing::warn!(path = %path.display(), "{message}");
                warnings.push(warning(&path, message));
            }
            result.task.loaded_mtime = Some(mtime);
            decoded.push((path, result));
        }

        let needs_git = decoded.iter().any(|(_, result)| {
            result.missing_created_by || result.missing_created_at || result.missing_updated_at
        });
        let backfill = if needs_git {
            self.git_metadata()
        } else {
            GitMetadata::default()
        };

        let mut tasks: HashMap<String, Task> = HashMap::new();
        let mut paths: HashMap<String, PathBuf> = HashMap::new();
        for (path, result) in decoded {
            let mut task = result.task;
            let file_key = file_key(&path);
            if result.missing_created_by {
                if let Some(author) = backfill.authors.get(&file_key) {
                    task.created_by = author.0.clone();
                }
            }
            if result.missing_created_at {
                if let Some(author) = backfill.authors.get(&file_key) {
                    task.created_at = author.1;
                }
            }
            if result.missing_updated_at {
                if let Some(time) = backfill.updated.get(&file_key) {
                    task.updated_at = *time;
                }
            }
            if task.updated_at < task.created_at {
                task.updated_at = task.created_at;
            }

            let errors = task.quick_validate(self.options.max_points);
            if errors.has_errors() {
                warnings.push(warning(&path, format!("skipped: {errors}")));
                continue;
            }
            let key = normalize_id(&task.id);
            if tasks.contains_key(&key) {
                warnings.push(warning(&path, format!("skipped: duplicate id {key}")));
                continue;
            }
            task.id = key.clone();
            paths.insert(key.clone(), path);
            tasks.insert(key, task);
        }

        tracing::debug!(dir = %self.dir.display(), count = tasks.len(), warnings = warnings.len(), "reloaded tasks");
        {
            let mut state = self.write();
            state.tasks = tasks;
            state.paths = paths;
            state.warnings = warnings;
        }
        self.listeners.notify();
        Ok(())
    }

    /// Pathspec matching task files, relative to the git root.
    fn git_pattern(&self, git: &dyn GitOps) -> Option<String> {
        let rel = match self.dir.strip_prefix(git.root()) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                let root = git.root().canonicalize().ok()?;
                let dir = self.dir.canonicalize().ok()?;
                dir.strip_prefix(&root).ok()?.to_path_buf()
            }
        };
        let rel = rel.to_string_lossy().replace('\\', "/");
        Some(if rel.is_empty() {
            "*.md".to_string()
        } else {
            format!("{rel}/*.md")
        })
    }

    fn git_metadata(&self) -> GitMetadata {
        let mut metadata = GitMetadata::default();
        let Some(git) = &self.git else {
            return metadata;
        };
        let Some(pattern) = self.git_pattern(git.as_ref()) else {
            return metadata;
        };
        match git.all_authors(&pattern) {
            Ok(authors) => {
                for (path, author) in authors {
                    metadata
                        .authors
                        .insert(file_key(&path), (author.name, author.date));
                }
            }
            Err(err) => tracing::warn!(error = %err, "could not read task authors from git"),
        }
        match git.all_last_commit_times(&pattern) {
            Ok(times) => {
                for (path, time) in times {
                    metadata.updated.insert(file_key(&path), time);
                }
            }
            Err(err) => tracing::warn!(error = %err, "could not read commit times from git"),
        }
        metadata
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Every committed version of a task since `since` (all history when `None`).
    pub fn task_history(
        &self,
        id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TaskSnapshot>> {
        let git = self.git.as_ref().ok_or_else(|| {
            Error::OperationFailed("task history requires a git repository".to_string())
        })?;
        let key = normalize_id(id);
        let path = self.path_of(&self.read(), &key);
        let since = since.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let versions = git.file_versions_since(&path, since, false)?;
        Ok(snapshots_from_versions(&path, &versions, self.options.max_points))
    }

    /// Remaining points and tasks per day from `since` through `now`.
    pub fn burndown(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> Result<Vec<BurndownPoint>> {
        let git = self.git.as_ref().ok_or_else(|| {
            Error::OperationFailed("burndown requires a git repository".to_string())
        })?;
        let pattern = self.git_pattern(git.as_ref()).ok_or_else(|| {
            Error::OperationFailed(format!(
                "task directory {} is outside the repository",
                self.dir.display()
            ))
        })?;
        let histories = git.all_file_versions_since(&pattern, since, true)?;
        Ok(compute_burndown(&histories, since, now, self.options.max_points))
    }
}

#[derive(Debug, Default)]
struct GitMetadata {
    authors: HashMap<String, (String, DateTime<Utc>)>,
    updated: HashMap<String, DateTime<Utc>>,
}

/// Lowercased file name; task files live in a single flat directory.
fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn warning(path: &Path, message: impl Into<String>) -> LoadWarning {
    LoadWarning {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests;
