#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{IndexAddOption, Oid, Repository, Signature};
use tempfile::TempDir;
use tiki::git::{GitCli, GitOps};
use tiki::store::{StoreOptions, TaskStore};

pub const TASK_DIR: &str = ".doc/tiki";

pub struct TestRepo {
    dir: TempDir,
    repo: Repository,
}

impl TestRepo {
    pub fn init() -> Result<Self, git2::Error> {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let repo = Repository::init(dir.path())?;
        set_identity(&repo)?;
        Ok(Self { dir, repo })
    }

    /// A repository with the task directory already created.
    pub fn initialized() -> Self {
        let repo = Self::init().expect("init repo");
        fs::create_dir_all(repo.task_dir()).expect("create task dir");
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn task_dir(&self) -> PathBuf {
        self.dir.path().join(TASK_DIR)
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_task(&self, file_name: &str, contents: &str) -> std::io::Result<PathBuf> {
        self.write_file(&format!("{TASK_DIR}/{file_name}"), contents)
    }

    pub fn git(&self) -> Arc<GitCli> {
        Arc::new(GitCli::new(self.dir.path().to_path_buf()))
    }

    /// Store over the task directory backed by the git CLI.
    pub fn open_store(&self) -> TaskStore {
        let git: Arc<dyn GitOps> = self.git();
        TaskStore::open(self.task_dir(), StoreOptions::default(), Some(git)).expect("open store")
    }

    pub fn commit_all(&self, message: &str) -> Result<Oid, git2::Error> {
        let mut index = self.repo.index()?;
        index.read(true)?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Signature::now("tiki-test", "tiki-test@example.com")?;

        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .and_then(|oid| self.repo.find_commit(oid).ok());

        match parent {
            Some(parent) => self
                .repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent]),
            None => self.repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[]),
        }
    }

    /// Paths currently in the git index.
    pub fn staged_paths(&self) -> Vec<String> {
        let mut index = self.repo.index().expect("index");
        index.read(true).expect("read index");
        index
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect()
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }
}

fn set_identity(repo: &Repository) -> Result<(), git2::Error> {
    let mut cfg = repo.config()?;
    cfg.set_str("user.name", "tiki-test")?;
    cfg.set_str("user.email", "tiki-test@example.com")?;
    Ok(())
}
