//! tiki plugins command.

use serde::Serialize;

use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::plugin::loader::load_default_scopes;
use crate::plugin::{user_workflow_path, Plugin};

use super::Project;

#[derive(Serialize)]
struct PluginSummary {
    name: String,
    key: String,
    #[serde(rename = "type")]
    kind: &'static str,
    lanes: Vec<String>,
    actions: Vec<String>,
}

#[derive(Serialize)]
struct PluginsReport {
    plugins: Vec<PluginSummary>,
    errors: Vec<String>,
}

fn summarize(plugin: &Plugin) -> PluginSummary {
    let (lanes, actions) = match plugin.as_tiki() {
        Some(tiki) => (
            tiki.lanes.iter().map(|lane| lane.name.clone()).collect(),
            tiki.actions
                .iter()
                .map(|action| format!("{} {}", action.key, action.label))
                .collect(),
        ),
        None => (Vec::new(), Vec::new()),
    };
    PluginSummary {
        name: plugin.name().to_string(),
        key: plugin.key().to_string(),
        kind: plugin.kind(),
        lanes,
        actions,
    }
}

pub fn run(project: &Project, output: OutputOptions) -> Result<()> {
    let load = load_default_scopes(&project.task_dir(), project.max_points())?;
    let report = PluginsReport {
        plugins: load.plugins.iter().map(summarize).collect(),
        errors: load.errors.iter().map(ToString::to_string).collect(),
    };

    let mut human = HumanOutput::new(format!("tiki plugins: {} loaded", report.plugins.len()));
    for plugin in &report.plugins {
        let mut line = format!("{:<8} {} ({})", plugin.key, plugin.name, plugin.kind);
        if !plugin.lanes.is_empty() {
            line.push_str(&format!(" lanes: {}", plugin.lanes.join(" | ")));
        }
        human.push_detail(line);
    }
    for error in &report.errors {
        human.push_warning(error.clone());
    }
    if let Some(path) = user_workflow_path() {
        human.push_next_step(format!("override plugins in {}", path.display()));
    }

    emit_success(output, "plugins", &report, Some(&human))
}
