//! tiki - git-backed terminal kanban
//!
//! Without a subcommand, opens the board; with piped input, creates a task
//! from it.

use std::io::IsTerminal;

use clap::Parser;
use tiki::cli::{Cli, EntryMode};
use tiki::output::{emit_error, infer_command_name_from_args};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = EntryMode::detect(&args, std::io::stdin().is_terminal());

    let command = infer_command_name_from_args();
    let cli = Cli::parse();
    let json = cli.json;
    if let Err(err) = cli.run(mode) {
        tracing::error!(error = %err, command = %command, "command failed");
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}
