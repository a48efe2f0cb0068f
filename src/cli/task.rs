//! tiki task command implementations.

use std::io::Read;

use chrono::Utc;
use serde::Serialize;

use crate::action::parse_action;
use crate::error::{Error, Result};
use crate::filter::{parse_optional_filter, EvalContext};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::plugin::loader::load_default_scopes;
use crate::plugin::Plugin;
use crate::sort::{parse_sort, sort_tasks};
use crate::task::{Comment, Task};

use super::Project;

pub struct CreateOptions {
    pub title: String,
    pub description: String,
    pub action: Option<String>,
}

pub struct ListOptions {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub plugin: Option<String>,
}

#[derive(Serialize)]
struct TaskList {
    total: usize,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct DeleteReport {
    id: String,
}

/// Split piped text into a title (first non-blank line) and description.
pub fn parse_pipe_input(input: &str) -> Result<(String, String)> {
    let mut lines = input.trim_start().splitn(2, '\n');
    let title = lines.next().unwrap_or_default().trim().to_string();
    if title.is_empty() {
        return Err(Error::EmptyInput);
    }
    let description = strip_leading_blank_lines(lines.next().unwrap_or_default())
        .trim_end()
        .to_string();
    Ok((title, description))
}

/// Drop whole blank lines only, so indented markdown keeps its indentation.
fn strip_leading_blank_lines(text: &str) -> &str {
    let mut rest = text;
    while let Some((line, tail)) = rest.split_once('\n') {
        if !line.trim().is_empty() {
            break;
        }
        rest = tail;
    }
    if rest.trim().is_empty() {
        ""
    } else {
        rest
    }
}

pub fn run_pipe_create<R: Read>(project: &Project, mut input: R, output: OutputOptions) -> Result<()> {
    let mut raw = String::new();
    input.read_to_string(&mut raw)?;
    let (title, description) = parse_pipe_input(&raw)?;
    run_create(
        project,
        CreateOptions {
            title,
            description,
            action: None,
        },
        output,
    )
}

pub fn run_create(project: &Project, options: CreateOptions, output: OutputOptions) -> Result<()> {
    let store = &project.store;
    let max_points = project.max_points();
    let user = project.current_user_name();

    let mut task = store.new_task_template()?;
    task.title = options.title;
    task.description = options.description;
    if let Some(raw) = options.action.as_deref() {
        let action = parse_action(raw, max_points).map_err(|err| Error::InvalidAction(err.to_string()))?;
        task = action.apply(&task, user.as_deref(), max_points)?;
    }

    let task = store.create_task(task)?;
    tracing::info!(id = %task.id, "task created");

    let mut human = HumanOutput::new(format!("tiki create: {}", task.id));
    push_task_summary(&mut human, &task);
    human.push_next_step(format!("tiki show {}", task.id));

    emit_success(output, "create", &task, Some(&human))
}

pub fn run_list(project: &Project, options: ListOptions, output: OutputOptions) -> Result<()> {
    let filter = parse_optional_filter(options.filter.as_deref().unwrap_or_default())
        .map_err(|err| Error::InvalidFilter(err.to_string()))?;
    let sort = match options.sort.as_deref() {
        Some(raw) => Some(parse_sort(raw).map_err(|err| Error::InvalidSort(err.to_string()))?),
        None => None,
    };

    let user = project.current_user_name();
    let ctx = EvalContext::new(Utc::now(), user.as_deref());
    let mut tasks = project.store.get_all_tasks();

    if let Some(name) = options.plugin.as_deref() {
        let load = load_default_scopes(&project.task_dir(), project.max_points())?;
        let plugin = load
            .find(name)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown plugin '{name}'")))?;
        match plugin {
            Plugin::Tiki(tiki) => tasks = tiki.tasks(&tasks, &ctx),
            Plugin::Doki(_) => {
                return Err(Error::InvalidArgument(format!(
                    "plugin '{}' shows a document, not tasks",
                    plugin.name()
                )))
            }
        }
    }

    if let Some(filter) = filter.as_ref() {
        tasks.retain(|task| filter.evaluate(task, &ctx));
    }
    if let Some(rules) = sort.as_ref() {
        sort_tasks(&mut tasks, rules);
    }

    let mut human = HumanOutput::new(format!("tiki list: {} task(s)", tasks.len()));
    for task in &tasks {
        human.push_detail(format!(
            "{}  [{}] p{} {}{}",
            task.id,
            task.status,
            task.priority,
            task.title,
            if task.assignee.is_empty() {
                String::new()
            } else {
                format!(" @{}", task.assignee)
            }
        ));
    }

    let report = TaskList {
        total: tasks.len(),
        tasks,
    };
    emit_success(output, "list", &report, Some(&human))
}

pub fn run_show(project: &Project, id: &str, output: OutputOptions) -> Result<()> {
    let task = find(project, id)?;

    let mut human = HumanOutput::new(format!("{}: {}", task.id, task.title));
    push_task_summary(&mut human, &task);
    if !task.description.is_empty() {
        human.push_detail(task.description.clone());
    }
    for comment in &task.comments {
        human.push_detail(format_comment(comment));
    }

    emit_success(output, "show", &task, Some(&human))
}

pub fn run_delete(project: &Project, id: &str, output: OutputOptions) -> Result<()> {
    let task = find(project, id)?;
    project.store.delete_task(&task.id)?;
    tracing::info!(id = %task.id, "task deleted");

    let human = HumanOutput::new(format!("tiki delete: {}", task.id));
    emit_success(output, "delete", &DeleteReport { id: task.id }, Some(&human))
}

pub fn run_apply(project: &Project, id: &str, raw: &str, output: OutputOptions) -> Result<()> {
    let max_points = project.max_points();
    let action = parse_action(raw, max_points).map_err(|err| Error::InvalidAction(err.to_string()))?;
    let task = find(project, id)?;
    let user = project.current_user_name();

    let updated = action.apply(&task, user.as_deref(), max_points)?;
    let stored = project.store.try_update_task(updated)?;
    tracing::info!(id = %stored.id, action = %action, "action applied");

    let mut human = HumanOutput::new(format!("tiki apply: {}", stored.id));
    human.push_summary("action", action.to_string());
    push_task_summary(&mut human, &stored);
    emit_success(output, "apply", &stored, Some(&human))
}

pub fn run_comment(
    project: &Project,
    id: &str,
    text: &str,
    author: Option<&str>,
    output: OutputOptions,
) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::InvalidArgument("comment text is empty".to_string()));
    }
    let task = find(project, id)?;
    let author = match author {
        Some(author) => author.to_string(),
        None => project.current_user_name().ok_or(Error::NoCurrentUser)?,
    };

    let comment = project.store.add_comment(&task.id, &author, text.trim())?;

    let mut human = HumanOutput::new(format!("tiki comment: {}", task.id));
    human.push_detail(format_comment(&comment));
    emit_success(output, "comment", &comment, Some(&human))
}

fn find(project: &Project, id: &str) -> Result<Task> {
    project
        .store
        .get_task(id)
        .ok_or_else(|| Error::TaskNotFound(id.trim().to_string()))
}

fn push_task_summary(human: &mut HumanOutput, task: &Task) {
    human.push_summary("title", task.title.clone());
    human.push_summary("status", task.status.to_string());
    human.push_summary("type", task.kind.to_string());
    human.push_summary("priority", task.priority.to_string());
    human.push_summary("points", task.points.to_string());
    if !task.assignee.is_empty() {
        human.push_summary("assignee", task.assignee.clone());
    }
    if !task.tags.is_empty() {
        human.push_summary("tags", task.tags.join(", "));
    }
}

fn format_comment(comment: &Comment) -> String {
    format!(
        "{} {}: {}",
        comment.created_at.format("%Y-%m-%d %H:%M"),
        comment.author,
        comment.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_input_first_line_is_title() {
        let (title, description) = parse_pipe_input("\n\n  Fix login  \nSteps:\n1. open\n").unwrap();
        assert_eq!(title, "Fix login");
        assert_eq!(description, "Steps:\n1. open");
    }

    #[test]
    fn pipe_input_title_only() {
        let (title, description) = parse_pipe_input("Just a title").unwrap();
        assert_eq!(title, "Just a title");
        assert!(description.is_empty());
    }

    #[test]
    fn pipe_description_keeps_indentation() {
        let input = "Crash on save\n\n  \n    let x = 1;\n    save(x);\n\n";
        let (_, description) = parse_pipe_input(input).unwrap();
        assert_eq!(description, "    let x = 1;\n    save(x);");
    }

    #[test]
    fn blank_pipe_input_is_empty_input() {
        assert!(matches!(parse_pipe_input(""), Err(Error::EmptyInput)));
        assert!(matches!(parse_pipe_input(" \n\t\n"), Err(Error::EmptyInput)));
    }
}
