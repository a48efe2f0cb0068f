//! tiki - git-backed terminal kanban
//!
//! Tasks are markdown files with YAML front-matter stored in a directory of
//! a git repository. This library holds the task model and codec, the filter,
//! sort and action expression languages, the task store and the models the
//! terminal board is built from.
//!
//! # Module Organization
//!
//! - `task`: Task model, field normalizers and validation
//! - `codec`: Front-matter encoding and lenient decoding
//! - `filter`, `sort`, `action`: Expression languages over tasks
//! - `git`: Git collaborator (blame, history, staging)
//! - `store`: Task store with optimistic locking, search and burndown
//! - `plugin`: Workflow plugins, key bindings and the activation registry
//! - `nav`, `selection`, `search_state`: View stack and selection models
//! - `config`: Configuration loading from `.tiki.toml`
//! - `logging`: Tracing subscriber setup
//! - `cli`: Command-line interface using clap

pub mod action;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod git;
pub mod listeners;
pub mod logging;
pub mod nav;
pub mod output;
pub mod plugin;
pub mod search_state;
pub mod selection;
pub mod sort;
pub mod storage;
pub mod store;
pub mod task;
mod ui;

pub use error::{Error, Result};
