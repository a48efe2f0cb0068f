use super::*;
use std::fs::File;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use crate::git::{CommitAuthor, FileVersion};
use tempfile::TempDir;

/// In-memory git double that records staged paths.
#[derive(Default)]
struct FakeGit {
    root: PathBuf,
    user: Option<GitUser>,
    authors: HashMap<PathBuf, CommitAuthor>,
    times: HashMap<PathBuf, DateTime<Utc>>,
    staged: std::sync::Mutex<Vec<PathBuf>>,
    removed: std::sync::Mutex<Vec<PathBuf>>,
}

impl GitOps for FakeGit {
    fn root(&self) -> &Path {
        &self.root
    }
    fn add(&self, paths: &[PathBuf]) -> Result<()> {
        self.staged.lock().unwrap().extend_from_slice(paths);
        Ok(())
    }
    fn remove(&self, paths: &[PathBuf]) -> Result<()> {
        self.removed.lock().unwrap().extend_from_slice(paths);
        Ok(())
    }
    fn current_user(&self) -> Result<GitUser> {
        self.user.clone().ok_or(Error::NoCurrentUser)
    }
    fn current_branch(&self) -> Result<String> {
        Ok("main".to_string())
    }
    fn author(&self, path: &Path) -> Result<Option<CommitAuthor>> {
        Ok(self.authors.get(path).cloned())
    }
    fn last_commit_time(&self, path: &Path) -> Result<Option<DateTime<Utc>>> {
        Ok(self.times.get(path).copied())
    }
    fn all_authors(&self, _pattern: &str) -> Result<HashMap<PathBuf, CommitAuthor>> {
        Ok(self.authors.clone())
    }
    fn all_last_commit_times(&self, _pattern: &str) -> Result<HashMap<PathBuf, DateTime<Utc>>> {
        Ok(self.times.clone())
    }
    fn file_versions_since(
        &self,
        _path: &Path,
        _since: DateTime<Utc>,
        _include_prior: bool,
    ) -> Result<Vec<FileVersion>> {
        Ok(Vec::new())
    }
    fn all_file_versions_since(
        &self,
        _pattern: &str,
        _since: DateTime<Utc>,
        _include_prior: bool,
    ) -> Result<HashMap<PathBuf, Vec<FileVersion>>> {
        Ok(HashMap::new())
    }
}

fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
}

fn store_in(temp: &TempDir) -> TaskStore {
    TaskStore::open(temp.path().join("tasks"), StoreOptions::default(), None).unwrap()
}

fn counting_listener(store: &TaskStore) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    store.add_listener(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    hits
}

/// Push the file's mtime away from what the store remembers.
fn touch_later(path: &Path) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();
}

#[test]
fn create_then_reload_round_trips() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);

    let mut task = store.new_task_template().unwrap();
    assert!(task.id.starts_with("TIKI-"));
    assert_eq!(task.id.len(), "TIKI-".len() + 6);
    task.title = "  Write docs ".to_string();
    task.tags = vec!["docs".into(), " docs ".into(), "ux".into()];
    task.description = "Body text\n".to_string();
    let created = store.create_task(task).unwrap();
    assert_eq!(created.title, "Write docs");
    assert_eq!(created.tags, vec!["docs", "ux"]);
    assert!(created.loaded_mtime.is_some());

    let file = temp.path().join("tasks").join(created.file_name());
    assert!(file.exists());

    let reopened = store_in(&temp);
    let loaded = reopened.get_task(&created.id.to_lowercase()).unwrap();
    assert_eq!(loaded.title, "Write docs");
    assert_eq!(loaded.tags, vec!["docs", "ux"]);
    assert_eq!(loaded.description, "Body text\n");
    assert_eq!(loaded.created_at, created.created_at);
    assert!(reopened.load_warnings().is_empty());
}

#[test]
fn create_rejects_invalid_and_duplicate_tasks() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);

    let err = store.create_task(Task::new("TIKI-AAAAAA", "   ")).unwrap_err();
    assert!(err.validation_errors().unwrap().has_field("title"));
    assert!(store.is_empty());

    store.create_task(Task::new("tiki-aaaaaa", "First")).unwrap();
    let err = store.create_task(Task::new("TIKI-AAAAAA", "Again")).unwrap_err();
    assert!(matches!(err, Error::DuplicateTask(id) if id == "TIKI-AAAAAA"));
    assert_eq!(store.len(), 1);
}

#[test]
fn update_detects_external_modification() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    let task = store.create_task(Task::new("TIKI-LOCK01", "Locked")).unwrap();

    let mut stale = task.clone();
    stale.title = "Mine".to_string();
    touch_later(&temp.path().join("tasks").join(task.file_name()));

    let err = store.try_update_task(stale.clone()).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert!(!store.update_task(stale));
    assert_eq!(store.get_task("TIKI-LOCK01").unwrap().title, "Locked");

    store.reload().unwrap();
    let mut fresh = store.get_task("TIKI-LOCK01").unwrap();
    fresh.title = "Mine".to_string();
    let updated = store.try_update_task(fresh).unwrap();
    assert_eq!(updated.title, "Mine");
    assert!(updated.updated_at >= updated.created_at);
}

#[test]
fn update_of_deleted_file_is_a_conflict() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    let task = store.create_task(Task::new("TIKI-GONE01", "Gone")).unwrap();
    fs::remove_file(temp.path().join("tasks").join(task.file_name())).unwrap();

    let err = store.try_update_task(task).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[test]
fn sequential_updates_use_refreshed_mtime() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    let task = store.create_task(Task::new("TIKI-SEQ001", "One")).unwrap();

    let mut next = store.try_update_task(task).unwrap();
    next.points = 5;
    let next = store.try_update_task(next).unwrap();
    assert_eq!(store.get_task("TIKI-SEQ001").unwrap().points, 5);
    assert_eq!(next.loaded_mtime, store.get_task("TIKI-SEQ001").unwrap().loaded_mtime);
}

#[test]
fn update_status_and_grouping() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    store.create_task(Task::new("TIKI-B00001", "b")).unwrap();
    store.create_task(Task::new("TIKI-A00001", "a")).unwrap();

    assert!(store.update_status("tiki-a00001", Status::Review));
    assert!(!store.update_status("TIKI-NOPE00", Status::Review));

    let review = store.get_tasks_by_status(Status::Review);
    assert_eq!(review.len(), 1);
    assert_eq!(review[0].id, "TIKI-A00001");

    let ids: Vec<String> = store.get_all_tasks().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec!["TIKI-A00001", "TIKI-B00001"]);
}

#[test]
fn listeners_fire_once_per_mutation() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    let hits = counting_listener(&store);

    let task = store.create_task(Task::new("TIKI-LSN001", "Listen")).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    store.try_update_task(task).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    store.delete_task("TIKI-LSN001").unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    store.delete_task("TIKI-LSN001").unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    store.reload().unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[test]
fn rejected_update_does_not_notify() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    let task = store.create_task(Task::new("TIKI-QUIET1", "Quiet")).unwrap();
    let hits = counting_listener(&store);

    let mut bad = task;
    bad.priority = 42;
    assert!(!store.update_task(bad));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn delete_unknown_is_a_no_op() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    store.delete_task("TIKI-NONE00").unwrap();
    assert!(store.is_empty());
}

#[test]
fn reload_skips_bad_files_and_reports_them() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("tasks");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("tiki-good01.md"), "---\ntitle: Good\nstatus: todo\n---\n").unwrap();
    fs::write(dir.join("tiki-dup001.md"), "---\nid: TIKI-GOOD01\ntitle: Dup\n---\n").unwrap();
    fs::write(dir.join("tiki-empty1.md"), "---\nstatus: todo\n---\n").unwrap();
    fs::write(dir.join("tiki-weird1.md"), "---\ntitle: Weird\nstatus: someday\n---\n").unwrap();
    fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let store = TaskStore::open(&dir, StoreOptions::default(), None).unwrap();
    let ids: Vec<String> = store.get_all_tasks().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec!["TIKI-GOOD01", "TIKI-WEIRD1"]);

    let warnings = store.load_warnings();
    let flagged: Vec<String> = warnings
        .iter()
        .map(|w| w.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(flagged.iter().any(|name| name == "tiki-empty1.md"));
    assert!(flagged.iter().any(|name| name == "tiki-weird1.md"));
    assert!(warnings.iter().any(|w| w.message.contains("duplicate")));
}

#[test]
fn tasks_keep_the_file_they_were_loaded_from() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("tasks");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("foo.md"), "---\nid: TIKI-ABC123\ntitle: Renamed\nstatus: todo\n---\n").unwrap();
    fs::write(dir.join("tiki-up0001.MD"), "---\ntitle: Shouting\nstatus: todo\n---\n").unwrap();
    let store = TaskStore::open(&dir, StoreOptions::default(), None).unwrap();

    let mut task = store.get_task("TIKI-ABC123").unwrap();
    task.title = "Edited".to_string();
    store.try_update_task(task).unwrap();
    assert!(fs::read_to_string(dir.join("foo.md")).unwrap().contains("Edited"));
    assert!(!dir.join("tiki-abc123.md").exists());

    let mut upper = store.get_task("TIKI-UP0001").unwrap();
    upper.points = 3;
    store.try_update_task(upper).unwrap();

    store.delete_task("TIKI-ABC123").unwrap();
    store.delete_task("TIKI-UP0001").unwrap();
    assert!(!dir.join("foo.md").exists());
    assert!(!dir.join("tiki-up0001.MD").exists());
    store.reload().unwrap();
    assert!(store.is_empty());
}

#[test]
fn reload_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    store.create_task(Task::new("TIKI-IDEM01", "Same")).unwrap();

    store.reload().unwrap();
    let first = store.get_all_tasks();
    store.reload().unwrap();
    assert_eq!(store.get_all_tasks(), first);
}

#[test]
fn reload_backfills_metadata_from_git() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("tasks");
    fs::create_dir_all(&dir).unwrap();
    let file = dir.join("tiki-hist01.md");
    fs::write(&file, "---\ntitle: From history\n---\n").unwrap();

    let mut git = FakeGit {
        root: temp.path().to_path_buf(),
        ..FakeGit::default()
    };
    git.authors.insert(
        file.clone(),
        CommitAuthor {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            date: ts("2024-01-01T08:00:00Z"),
            commit_hash: "abc".to_string(),
            message: "add".to_string(),
        },
    );
    git.times.insert(file, ts("2024-02-01T08:00:00Z"));

    let store = TaskStore::open(&dir, StoreOptions::default(), Some(Arc::new(git))).unwrap();
    let task = store.get_task("TIKI-HIST01").unwrap();
    assert_eq!(task.created_by, "Ada");
    assert_eq!(task.created_at, ts("2024-01-01T08:00:00Z"));
    assert_eq!(task.updated_at, ts("2024-02-01T08:00:00Z"));
}

#[test]
fn mutations_are_staged_with_git() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("tasks");
    let git = Arc::new(FakeGit {
        root: temp.path().to_path_buf(),
        user: Some(GitUser {
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
        }),
        ..FakeGit::default()
    });
    let store = TaskStore::open(&dir, StoreOptions::default(), Some(git.clone())).unwrap();

    let template = store.new_task_template().unwrap();
    assert_eq!(template.created_by, "Grace");

    let task = store.create_task(Task::new("TIKI-GIT001", "Staged")).unwrap();
    assert_eq!(task.created_by, "Grace");
    store.delete_task(&task.id).unwrap();

    let expected = dir.join("tiki-git001.md");
    assert_eq!(*git.staged.lock().unwrap(), vec![expected.clone()]);
    assert_eq!(*git.removed.lock().unwrap(), vec![expected]);
}

#[test]
fn comments_are_appended_and_persisted() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    store.create_task(Task::new("TIKI-CMT001", "Discuss")).unwrap();

    let comment = store.add_comment("tiki-cmt001", "Ada", " Looks good ").unwrap();
    assert_eq!(comment.text, "Looks good");
    assert_eq!(comment.id.len(), 36);

    let reopened = store_in(&temp);
    let task = reopened.get_task("TIKI-CMT001").unwrap();
    assert_eq!(task.comments, vec![comment]);

    let err = store.add_comment("TIKI-NOPE00", "Ada", "hi").unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(_)));
}

#[test]
fn search_ranks_titles() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    store.create_task(Task::new("TIKI-S00001", "Fix login")).unwrap();
    store.create_task(Task::new("TIKI-S00002", "Login page")).unwrap();
    store.create_task(Task::new("TIKI-S00003", "Other")).unwrap();

    let ids: Vec<String> = store
        .search("login", None)
        .into_iter()
        .map(|r| r.task.id)
        .collect();
    assert_eq!(ids, vec!["TIKI-S00002", "TIKI-S00001"]);
    assert!(store.search("", None).is_empty());
}

#[test]
fn history_requires_git() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    assert!(store.task_history("TIKI-X00001", None).is_err());
    assert!(store.burndown(Utc::now(), Utc::now()).is_err());
    assert!(matches!(store.get_current_user(), Err(Error::NoCurrentUser)));
}

#[test]
fn pattern_is_relative_to_git_root() {
    let temp = TempDir::new().unwrap();
    let git = FakeGit {
        root: temp.path().to_path_buf(),
        ..FakeGit::default()
    };
    let store = TaskStore::new(temp.path().join(".doc/tiki"), StoreOptions::default(), None);
    assert_eq!(store.git_pattern(&git).as_deref(), Some(".doc/tiki/*.md"));
}
