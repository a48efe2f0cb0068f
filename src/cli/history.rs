//! tiki history and burndown commands.

use chrono::{Days, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::{BurndownPoint, TaskSnapshot};
use crate::task::normalize_id;

use super::Project;

#[derive(Serialize)]
struct HistoryReport {
    id: String,
    versions: Vec<TaskSnapshot>,
}

#[derive(Serialize)]
struct BurndownReport {
    days: u32,
    points: Vec<BurndownPoint>,
}

pub fn run_history(project: &Project, id: &str, days: Option<u32>, output: OutputOptions) -> Result<()> {
    let id = normalize_id(id);
    let since = days.and_then(|days| Utc::now().checked_sub_days(Days::new(u64::from(days))));
    let versions = project.store.task_history(&id, since)?;

    let mut human = HumanOutput::new(format!("tiki history: {} ({} version(s))", id, versions.len()));
    for snapshot in &versions {
        let short = snapshot.commit.get(..7).unwrap_or(&snapshot.commit);
        human.push_detail(format!(
            "{} {} {}  [{}] p{} {}pt {}",
            short,
            snapshot.when.format("%Y-%m-%d %H:%M"),
            snapshot.author,
            snapshot.task.status,
            snapshot.task.priority,
            snapshot.task.points,
            snapshot.task.title
        ));
    }
    if versions.is_empty() {
        human.push_warning("no committed versions; commit the task file to record history");
    }

    emit_success(output, "history", &HistoryReport { id, versions }, Some(&human))
}

pub fn run_burndown(project: &Project, days: u32, output: OutputOptions) -> Result<()> {
    let now = Utc::now();
    let since = now
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(now);
    let points = project.store.burndown(since, now)?;

    let mut human = HumanOutput::new(format!("tiki burndown: last {days} day(s)"));
    for point in &points {
        human.push_detail(format!(
            "{}  {:>4} pt  {:>3} task(s)",
            point.date, point.remaining_points, point.remaining_tasks
        ));
    }

    emit_success(output, "burndown", &BurndownReport { days, points }, Some(&human))
}
