//! External editor support.
//!
//! The terminal is handed to `$VISUAL`, `$EDITOR` or `vi` while a task
//! file is edited in a temporary buffer.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, ExitStatus};

use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tempfile::Builder;

pub(crate) type Term = Terminal<CrosstermBackend<io::Stdout>>;

/// Edit `content` externally and return the saved buffer.
pub(crate) fn edit_external(terminal: &mut Term, content: &str) -> Result<String, String> {
    let mut temp = Builder::new()
        .prefix("tiki-")
        .suffix(".md")
        .tempfile()
        .map_err(|err| format!("failed to create temp file for editor: {err}"))?;
    temp.write_all(content.as_bytes())
        .map_err(|err| format!("failed to write temp file: {err}"))?;
    temp.flush()
        .map_err(|err| format!("failed to flush temp file: {err}"))?;
    let path = temp.path().to_path_buf();

    suspend_terminal(terminal).map_err(|err| format!("failed to suspend terminal: {err}"))?;
    let editor_result = launch_editor(&path, &editor_candidates());
    if let Err(err) = resume_terminal(terminal) {
        return Err(format!("failed to restore terminal: {err}"));
    }

    let status = editor_result?;
    if !status.success() {
        let detail = status
            .code()
            .map(|code| format!("exit code {code}"))
            .unwrap_or_else(|| "signal".to_string());
        return Err(format!("editor exited with {detail}"));
    }

    fs::read_to_string(&path).map_err(|err| format!("failed to read editor buffer: {err}"))
}

fn suspend_terminal(terminal: &mut Term) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    Ok(())
}

fn resume_terminal(terminal: &mut Term) -> io::Result<()> {
    execute!(terminal.backend_mut(), EnterAlternateScreen)?;
    enable_raw_mode()?;
    terminal.clear()?;
    Ok(())
}

fn launch_editor(path: &Path, candidates: &[String]) -> Result<ExitStatus, String> {
    let mut attempted: Vec<String> = Vec::new();
    for candidate in candidates {
        let parts = split_editor_command(candidate);
        let Some((program, args)) = parts.split_first() else {
            continue;
        };
        attempted.push(program.clone());
        match Command::new(program).args(args).arg(path).status() {
            Ok(status) => return Ok(status),
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(format!("failed to launch editor '{program}': {err}")),
        }
    }
    let tried = if attempted.is_empty() {
        "no editor candidates".to_string()
    } else {
        attempted.join(", ")
    };
    Err(format!("no editor found (tried {tried}); set $VISUAL or $EDITOR"))
}

pub(crate) fn editor_candidates() -> Vec<String> {
    candidates_from(
        std::env::var("VISUAL").ok().as_deref(),
        std::env::var("EDITOR").ok().as_deref(),
    )
}

fn candidates_from(visual: Option<&str>, editor: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = [visual, editor]
        .into_iter()
        .flatten()
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .collect();
    out.push("vi".to_string());
    out
}

fn split_editor_command(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_prefer_visual_then_editor() {
        assert_eq!(
            candidates_from(Some("code --wait"), Some("nano")),
            vec!["code --wait", "nano", "vi"]
        );
        assert_eq!(candidates_from(Some("  "), None), vec!["vi"]);
    }

    #[test]
    fn editor_command_keeps_arguments() {
        assert_eq!(split_editor_command("code  --wait"), vec!["code", "--wait"]);
        assert!(split_editor_command("   ").is_empty());
    }

    #[test]
    fn missing_editors_are_reported() {
        let candidates = vec!["tiki-no-such-editor-xyz".to_string()];
        let err = launch_editor(Path::new("/tmp/none.md"), &candidates).unwrap_err();
        assert!(err.contains("tiki-no-such-editor-xyz"));
    }
}
