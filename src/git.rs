//! Git collaborator used by the task store.
//!
//! The store only ever reads history and stages working-tree changes; it
//! never commits. Repository metadata (config, HEAD) comes from libgit2,
//! history queries shell out to `git log` / `git show`, which handle
//! pathspecs and rename-free path history the way users expect.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, OnceLock};
use std::thread;

use chrono::{DateTime, Utc};
use git2::{ErrorCode, Repository};

use crate::error::{Error, Result};

/// Blob fetches run on this many worker threads.
const VERSION_WORKERS: usize = 10;

const RECORD_SEP: char = '\u{1e}';
const FIELD_SEP: char = '\u{1f}';
const COMMIT_FORMAT: &str = "--format=%x1e%H%x1f%an%x1f%ae%x1f%aI%x1f%s";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitUser {
    pub name: String,
    pub email: String,
}

/// The commit that first added a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
    pub date: DateTime<Utc>,
    pub commit_hash: String,
    pub message: String,
}

/// Content of a file as of one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileVersion {
    pub hash: String,
    pub author: String,
    pub email: String,
    pub when: DateTime<Utc>,
    pub content: String,
}

/// Git operations the store depends on.
///
/// Paths passed in may be absolute or relative to the repository root.
/// Paths in returned maps are absolute (repository root joined with the path
/// git reports).
pub trait GitOps: Send + Sync {
    /// Working-tree root.
    fn root(&self) -> &Path;
    /// Stage new or modified files.
    fn add(&self, paths: &[PathBuf]) -> Result<()>;
    /// Stage removal of files already deleted from the working tree.
    fn remove(&self, paths: &[PathBuf]) -> Result<()>;
    fn current_user(&self) -> Result<GitUser>;
    /// Branch name, or the short commit hash when HEAD is detached.
    fn current_branch(&self) -> Result<String>;
    fn author(&self, path: &Path) -> Result<Option<CommitAuthor>>;
    fn last_commit_time(&self, path: &Path) -> Result<Option<DateTime<Utc>>>;
    fn all_authors(&self, pattern: &str) -> Result<HashMap<PathBuf, CommitAuthor>>;
    fn all_last_commit_times(&self, pattern: &str) -> Result<HashMap<PathBuf, DateTime<Utc>>>;
    /// Versions of one file committed at or after `since`, oldest first.
    ///
    /// With `include_prior`, the newest version from before `since` is
    /// prepended when one exists.
    fn file_versions_since(
        &self,
        path: &Path,
        since: DateTime<Utc>,
        include_prior: bool,
    ) -> Result<Vec<FileVersion>>;
    /// [`GitOps::file_versions_since`] for every file matching `pattern`,
    /// limited to commits that changed a `status:` line.
    fn all_file_versions_since(
        &self,
        pattern: &str,
        since: DateTime<Utc>,
        include_prior: bool,
    ) -> Result<HashMap<PathBuf, Vec<FileVersion>>>;
}

/// Discover the enclosing repository from `start` (or the current directory).
pub fn discover_repo(start: Option<&Path>) -> Result<Repository> {
    let start_path = match start {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };

    Repository::discover(&start_path).map_err(|err| {
        if err.code() == ErrorCode::NotFound {
            Error::NotARepo(start_path)
        } else {
            Error::Git(err)
        }
    })
}

/// Root of the working tree containing `start`.
pub fn discover_root(start: Option<&Path>) -> Result<PathBuf> {
    let repo = discover_repo(start)?;
    repo.workdir()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::OperationFailed("bare repositories are not supported".to_string()))
}

/// [`GitOps`] backed by libgit2 and the `git` executable.
#[derive(Debug)]
pub struct GitCli {
    root: PathBuf,
    user: OnceLock<GitUser>,
}

impl GitCli {
    pub fn open(start: &Path) -> Result<Self> {
        Ok(Self::new(discover_root(Some(start))?))
    }

    /// Wrap an already-known working-tree root.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            user: OnceLock::new(),
        }
    }

    fn repo(&self) -> Result<Repository> {
        Ok(Repository::open(&self.root)?)
    }

    fn has_commits(&self) -> bool {
        self.repo().map(|repo| repo.head().is_ok()).unwrap_or(false)
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        tracing::debug!(args = ?args, "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?;
        if !output.status.success() {
            return Err(Error::GitCommand {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Repository-relative path with forward slashes.
    fn relative(&self, path: &Path) -> String {
        let rel = if path.is_absolute() {
            path.strip_prefix(&self.root)
                .map(Path::to_path_buf)
                .or_else(|_| {
                    let root = self.root.canonicalize()?;
                    let full = canonical_lenient(path)?;
                    full.strip_prefix(&root)
                        .map(Path::to_path_buf)
                        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))
                })
                .unwrap_or_else(|_| path.to_path_buf())
        } else {
            path.to_path_buf()
        };
        rel.to_string_lossy().replace('\\', "/")
    }

    fn absolute(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    fn show(&self, hash: &str, rel: &str) -> Option<String> {
        match self.run(&["show", &format!("{hash}:{rel}")]) {
            Ok(content) => Some(content),
            Err(err) => {
                tracing::debug!(hash, path = rel, error = %err, "no blob at commit");
                None
            }
        }
    }

    /// Newest version of each matching file committed before `since`.
    fn versions_before(
        &self,
        pattern: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<(String, CommitMeta)>> {
        let until = format!("--until={}", since.to_rfc3339());
        let log = self.run(&["log", "--name-only", COMMIT_FORMAT, &until, "--", pattern])?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (meta, files) in parse_log(&log) {
            for file in files {
                if seen.insert(file.clone()) {
                    out.push((file, meta.clone()));
                }
            }
        }
        Ok(out)
    }
}

/// Canonicalize the parent when the file itself no longer exists.
fn canonical_lenient(path: &Path) -> std::io::Result<PathBuf> {
    match path.canonicalize() {
        Ok(full) => Ok(full),
        Err(_) => {
            let parent = path.parent().unwrap_or(path).canonicalize()?;
            Ok(match path.file_name() {
                Some(name) => parent.join(name),
                None => parent,
            })
        }
    }
}

#[derive(Debug, Clone)]
struct CommitMeta {
    hash: String,
    name: String,
    email: String,
    when: DateTime<Utc>,
    subject: String,
}

impl CommitMeta {
    fn parse(header: &str) -> Option<Self> {
        let mut fields = header.split(FIELD_SEP);
        let hash = fields.next()?.trim().to_string();
        let name = fields.next()?.to_string();
        let email = fields.next()?.to_string();
        let when = DateTime::parse_from_rfc3339(fields.next()?.trim())
            .ok()?
            .with_timezone(&Utc);
        let subject = fields.next().unwrap_or_default().trim().to_string();
        if hash.is_empty() {
            return None;
        }
        Some(Self {
            hash,
            name,
            email,
            when,
            subject,
        })
    }

    fn author(&self) -> CommitAuthor {
        CommitAuthor {
            name: self.name.clone(),
            email: self.email.clone(),
            date: self.when,
            commit_hash: self.hash.clone(),
            message: self.subject.clone(),
        }
    }

    fn version(&self, content: String) -> FileVersion {
        FileVersion {
            hash: self.hash.clone(),
            author: self.name.clone(),
            email: self.email.clone(),
            when: self.when,
            content,
        }
    }
}

/// Parse `git log --name-only` output produced with [`COMMIT_FORMAT`],
/// newest commit first.
fn parse_log(output: &str) -> Vec<(CommitMeta, Vec<String>)> {
    let mut commits = Vec::new();
    for record in output.split(RECORD_SEP) {
        let mut lines = record.lines();
        let Some(header) = lines.next() else {
            continue;
        };
        let Some(meta) = CommitMeta::parse(header) else {
            continue;
        };
        let files = lines
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        commits.push((meta, files));
    }
    commits
}

impl GitOps for GitCli {
    fn root(&self) -> &Path {
        &self.root
    }

    fn add(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let rels: Vec<String> = paths.iter().map(|path| self.relative(path)).collect();
        let mut args = vec!["add", "--"];
        args.extend(rels.iter().map(String::as_str));
        self.run(&args).map(|_| ())
    }

    fn remove(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let rels: Vec<String> = paths.iter().map(|path| self.relative(path)).collect();
        let mut args = vec!["rm", "--quiet", "--cached", "--ignore-unmatch", "--"];
        args.extend(rels.iter().map(String::as_str));
        self.run(&args).map(|_| ())
    }

    fn current_user(&self) -> Result<GitUser> {
        if let Some(user) = self.user.get() {
            return Ok(user.clone());
        }
        // The repository config already layers local over global over system.
        let config = self.repo()?.config()?;
        let name = config.get_string("user.name").unwrap_or_default();
        let email = config.get_string("user.email").unwrap_or_default();
        if name.trim().is_empty() {
            return Err(Error::NoCurrentUser);
        }
        let user = GitUser {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
        };
        Ok(self.user.get_or_init(|| user).clone())
    }

    fn current_branch(&self) -> Result<String> {
        let repo = self.repo()?;
        let result = match repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().unwrap_or("HEAD").to_string()),
            Ok(head) => {
                let oid = head
                    .target()
                    .ok_or_else(|| Error::OperationFailed("HEAD has no target".to_string()))?;
                Ok(oid.to_string().chars().take(7).collect())
            }
            Err(err) if err.code() == ErrorCode::UnbornBranch => {
                let head = repo.find_reference("HEAD")?;
                let target = head.symbolic_target().unwrap_or("HEAD");
                Ok(target.trim_start_matches("refs/heads/").to_string())
            }
            Err(err) => Err(err.into()),
        };
        result
    }

    fn author(&self, path: &Path) -> Result<Option<CommitAuthor>> {
        if !self.has_commits() {
            return Ok(None);
        }
        let rel = self.relative(path);
        let log = self.run(&["log", "--diff-filter=A", COMMIT_FORMAT, "--", &rel])?;
        Ok(parse_log(&log).last().map(|(meta, _)| meta.author()))
    }

    fn last_commit_time(&self, path: &Path) -> Result<Option<DateTime<Utc>>> {
        if !self.has_commits() {
            return Ok(None);
        }
        let rel = self.relative(path);
        let log = self.run(&["log", "-1", COMMIT_FORMAT, "--", &rel])?;
        Ok(parse_log(&log).first().map(|(meta, _)| meta.when))
    }

    fn all_authors(&self, pattern: &str) -> Result<HashMap<PathBuf, CommitAuthor>> {
        let mut authors = HashMap::new();
        if !self.has_commits() {
            return Ok(authors);
        }
        let log = self.run(&["log", "--diff-filter=A", "--name-only", COMMIT_FORMAT, "--", pattern])?;
        // Newest first: the oldest add wins.
        for (meta, files) in parse_log(&log) {
            for file in files {
                authors.insert(self.absolute(&file), meta.author());
            }
        }
        Ok(authors)
    }

    fn all_last_commit_times(&self, pattern: &str) -> Result<HashMap<PathBuf, DateTime<Utc>>> {
        let mut times = HashMap::new();
        if !self.has_commits() {
            return Ok(times);
        }
        let log = self.run(&["log", "--name-only", COMMIT_FORMAT, "--", pattern])?;
        for (meta, files) in parse_log(&log) {
            for file in files {
                times.entry(self.absolute(&file)).or_insert(meta.when);
            }
        }
        Ok(times)
    }

    fn file_versions_since(
        &self,
        path: &Path,
        since: DateTime<Utc>,
        include_prior: bool,
    ) -> Result<Vec<FileVersion>> {
        if !self.has_commits() {
            return Ok(Vec::new());
        }
        let rel = self.relative(path);
        let after = format!("--since={}", since.to_rfc3339());
        let log = self.run(&["log", COMMIT_FORMAT, &after, "--", &rel])?;
        let mut commits: Vec<CommitMeta> = parse_log(&log).into_iter().map(|(meta, _)| meta).collect();
        commits.reverse();

        if include_prior {
            let until = format!("--until={}", since.to_rfc3339());
            let prior = self.run(&["log", "-1", COMMIT_FORMAT, &until, "--", &rel])?;
            if let Some((meta, _)) = parse_log(&prior).into_iter().next() {
                if !commits.iter().any(|commit| commit.hash == meta.hash) {
                    commits.insert(0, meta);
                }
            }
        }

        Ok(commits
            .iter()
            .filter_map(|meta| self.show(&meta.hash, &rel).map(|content| meta.version(content)))
            .collect())
    }

    fn all_file_versions_since(
        &self,
        pattern: &str,
        since: DateTime<Utc>,
        include_prior: bool,
    ) -> Result<HashMap<PathBuf, Vec<FileVersion>>> {
        if !self.has_commits() {
            return Ok(HashMap::new());
        }
        let after = format!("--since={}", since.to_rfc3339());
        let log = self.run(&[
            "log",
            "--name-only",
            "-G^status:",
            COMMIT_FORMAT,
            &after,
            "--",
            pattern,
        ])?;

        let mut jobs: Vec<(String, CommitMeta)> = Vec::new();
        for (meta, files) in parse_log(&log) {
            for file in files {
                jobs.push((file, meta.clone()));
            }
        }
        if include_prior {
            for (file, meta) in self.versions_before(pattern, since)? {
                if !jobs.iter().any(|(f, m)| *f == file && m.hash == meta.hash) {
                    jobs.push((file, meta));
                }
            }
        }

        let fetched = self.fetch_blobs(&jobs);
        let mut versions: HashMap<PathBuf, Vec<FileVersion>> = HashMap::new();
        for (file, version) in fetched {
            versions.entry(self.absolute(&file)).or_default().push(version);
        }
        for list in versions.values_mut() {
            list.sort_by(|a, b| a.when.cmp(&b.when).then_with(|| a.hash.cmp(&b.hash)));
        }
        Ok(versions)
    }
}

impl GitCli {
    /// Fetch `(path, commit)` blobs on a fixed pool of worker threads.
    fn fetch_blobs(&self, jobs: &[(String, CommitMeta)]) -> Vec<(String, FileVersion)> {
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();
        let workers = VERSION_WORKERS.min(jobs.len());

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                scope.spawn(move || loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some((file, meta)) = jobs.get(index) else {
                        break;
                    };
                    if let Some(content) = self.show(&meta.hash, file) {
                        if tx.send((file.clone(), meta.version(content))).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(tx);
        rx.into_iter().collect()
    }
}
