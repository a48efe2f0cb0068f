//! Terminal board over the configured plugins.

mod app;
mod board;
mod editor;
mod view;
mod watch;

pub(crate) use app::run;
