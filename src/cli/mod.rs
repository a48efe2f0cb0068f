//! Command-line interface for tiki
//!
//! This module defines the CLI structure using clap derive macros.
//! Each group of subcommands is implemented in its own submodule.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::git::{discover_root, GitCli, GitOps};
use crate::output::{OutputOptions, VALUE_FLAGS};
use crate::store::{StoreOptions, TaskStore};

mod history;
mod init;
mod plugins;
mod task;

/// tiki - tasks as markdown files in git
///
/// Run without a subcommand to open the board, or pipe text in to create
/// a task from it (first line is the title).
#[derive(Parser, Debug)]
#[command(name = "tiki")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path inside the repository (defaults to current directory)
    #[arg(long, global = true, env = "TIKI_REPO")]
    pub repo: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error, off
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the task directory and .tiki.toml
    Init,

    /// Create a task from flags, or from standard input
    Create {
        /// Task title (reads standard input when omitted)
        #[arg(short, long)]
        title: Option<String>,

        /// Markdown description
        #[arg(short, long)]
        description: Option<String>,

        /// Action applied before saving, e.g. "status=todo, tags+=[ui]"
        #[arg(short, long)]
        action: Option<String>,
    },

    /// List tasks
    List {
        /// Filter expression, e.g. "status = todo AND priority <= 2"
        #[arg(short, long)]
        filter: Option<String>,

        /// Sort order, e.g. "priority, updated_at desc"
        #[arg(short, long)]
        sort: Option<String>,

        /// Show the tasks a plugin shows
        #[arg(short, long)]
        plugin: Option<String>,
    },

    /// Show one task
    Show {
        /// Task ID
        id: String,
    },

    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },

    /// Apply an action to a task, e.g. "status=done, assignee=CURRENT_USER"
    Apply {
        /// Task ID
        id: String,

        /// Action expression
        action: String,
    },

    /// Add a comment to a task
    Comment {
        /// Task ID
        id: String,

        /// Comment text
        text: String,

        /// Author (defaults to the git user)
        #[arg(long)]
        author: Option<String>,
    },

    /// Show the committed history of a task
    History {
        /// Task ID
        id: String,

        /// Only versions from the last N days
        #[arg(long)]
        days: Option<u32>,
    },

    /// Remaining points and tasks per day
    Burndown {
        /// Number of days to cover
        #[arg(long, default_value_t = 14)]
        days: u32,
    },

    /// List loaded plugins and their keys
    Plugins,
}

/// How the process was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    /// A subcommand was given.
    Command,
    /// No subcommand and standard input is piped.
    Pipe,
    /// No subcommand, interactive terminal.
    Tui,
}

impl EntryMode {
    pub fn detect(args: &[String], stdin_is_terminal: bool) -> Self {
        if has_positional_args(args) {
            EntryMode::Command
        } else if stdin_is_terminal {
            EntryMode::Tui
        } else {
            EntryMode::Pipe
        }
    }
}

/// Whether `args` (without the program name) contain a positional argument.
///
/// Values of value-bearing flags such as `--log-level debug` are not
/// positional; a bare `-` and `--` are.
pub fn has_positional_args(args: &[String]) -> bool {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "-" || arg == "--" {
            return true;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            iter.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return true;
    }
    false
}

/// An initialized project: config, git collaborator and loaded store.
pub(crate) struct Project {
    pub root: PathBuf,
    pub config: Config,
    pub git: Arc<GitCli>,
    pub store: Arc<TaskStore>,
}

impl Project {
    pub fn current_user_name(&self) -> Option<String> {
        self.git.current_user().ok().map(|user| user.name)
    }

    pub fn max_points(&self) -> i32 {
        self.config.tasks.max_points
    }

    pub fn task_dir(&self) -> PathBuf {
        self.config.task_dir(&self.root)
    }
}

fn start_dir(repo: Option<&Path>) -> Result<PathBuf> {
    match repo {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(std::env::current_dir()?),
    }
}

impl Cli {
    fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }

    fn load_config(&self) -> Result<(PathBuf, Config)> {
        let start = start_dir(self.repo.as_deref())?;
        let root = discover_root(Some(&start))?;
        let config = Config::load_from_repo(&root)?;
        crate::logging::init(self.log_level.as_deref(), &config.log_level)?;
        Ok((root, config))
    }

    /// Open the project, failing when `tiki init` has not run.
    fn open_project(&self) -> Result<Project> {
        let (root, config) = self.load_config()?;
        let task_dir = config.task_dir(&root);
        if !config.is_initialized(&root) {
            return Err(Error::NotInitialized(task_dir));
        }
        let git = Arc::new(GitCli::new(root.clone()));
        let store = TaskStore::open(
            task_dir,
            StoreOptions::from_config(&config.tasks),
            Some(git.clone() as Arc<dyn GitOps>),
        )?;
        for warning in store.load_warnings() {
            tracing::warn!(path = %warning.path.display(), "{}", warning.message);
        }
        Ok(Project {
            root,
            config,
            git,
            store: Arc::new(store),
        })
    }

    /// Execute the CLI command
    pub fn run(self, mode: EntryMode) -> Result<()> {
        let output = self.output();
        let Some(command) = self.command.as_ref() else {
            let project = self.open_project()?;
            return match mode {
                EntryMode::Tui if std::io::stdin().is_terminal() => crate::ui::run(project),
                _ => task::run_pipe_create(&project, std::io::stdin().lock(), output),
            };
        };

        match command {
            Commands::Init => {
                let (root, config) = self.load_config()?;
                init::run(&root, &config, output)
            }
            Commands::Create {
                title,
                description,
                action,
            } => {
                let project = self.open_project()?;
                match title {
                    Some(title) => task::run_create(
                        &project,
                        task::CreateOptions {
                            title: title.clone(),
                            description: description.clone().unwrap_or_default(),
                            action: action.clone(),
                        },
                        output,
                    ),
                    None => task::run_pipe_create(&project, std::io::stdin().lock(), output),
                }
            }
            Commands::List {
                filter,
                sort,
                plugin,
            } => {
                let project = self.open_project()?;
                task::run_list(
                    &project,
                    task::ListOptions {
                        filter: filter.clone(),
                        sort: sort.clone(),
                        plugin: plugin.clone(),
                    },
                    output,
                )
            }
            Commands::Show { id } => task::run_show(&self.open_project()?, id, output),
            Commands::Delete { id } => task::run_delete(&self.open_project()?, id, output),
            Commands::Apply { id, action } => {
                task::run_apply(&self.open_project()?, id, action, output)
            }
            Commands::Comment { id, text, author } => task::run_comment(
                &self.open_project()?,
                id,
                text,
                author.as_deref(),
                output,
            ),
            Commands::History { id, days } => {
                history::run_history(&self.open_project()?, id, *days, output)
            }
            Commands::Burndown { days } => {
                history::run_burndown(&self.open_project()?, *days, output)
            }
            Commands::Plugins => plugins::run(&self.open_project()?, output),
        }
    }
}
