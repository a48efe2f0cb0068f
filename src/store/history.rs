//! Task history and burndown derived from git file versions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::codec::{decode_task, id_from_path, DecodeOptions};
use crate::git::FileVersion;
use crate::task::{Status, Task};

/// A task as it was at one commit.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub commit: String,
    pub author: String,
    pub when: DateTime<Utc>,
    pub task: Task,
}

/// Open work at the end of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurndownPoint {
    pub date: NaiveDate,
    pub remaining_points: i64,
    pub remaining_tasks: usize,
}

fn decode_version(path: &Path, version: &FileVersion, max_points: i32) -> Task {
    let options = DecodeOptions {
        max_points,
        fallback_id: id_from_path(path),
        fallback_time: version.when,
    };
    decode_task(&version.content, &options).task
}

/// Decode every version of one file, keeping git order (oldest first).
pub fn snapshots_from_versions(
    path: &Path,
    versions: &[FileVersion],
    max_points: i32,
) -> Vec<TaskSnapshot> {
    versions
        .iter()
        .map(|version| TaskSnapshot {
            commit: version.hash.clone(),
            author: version.author.clone(),
            when: version.when,
            task: decode_version(path, version, max_points),
        })
        .collect()
}

/// One point per calendar day (UTC) from `since` through `now`, inclusive.
///
/// A file counts toward a day once its first version is committed, using
/// the newest version committed by the end of that day. Tasks whose status
/// is done count as burned.
pub fn compute_burndown(
    histories: &HashMap<PathBuf, Vec<FileVersion>>,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
    max_points: i32,
) -> Vec<BurndownPoint> {
    if since > now {
        return Vec::new();
    }

    let timelines: Vec<Vec<(DateTime<Utc>, Status, i32)>> = histories
        .iter()
        .map(|(path, versions)| {
            let mut states: Vec<_> = versions
                .iter()
                .map(|version| {
                    let task = decode_version(path, version, max_points);
                    (version.when, task.status, task.points)
                })
                .collect();
            states.sort_by_key(|(when, _, _)| *when);
            states
        })
        .collect();

    let mut points = Vec::new();
    let mut day = since.date_naive();
    let last = now.date_naive();
    while day <= last {
        let end_of_day = day
            .succ_opt()
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
            .unwrap_or(now)
            .min(now);

        let mut remaining_points = 0i64;
        let mut remaining_tasks = 0usize;
        for timeline in &timelines {
            let current = timeline
                .iter()
                .take_while(|(when, _, _)| *when <= end_of_day)
                .last();
            if let Some((_, status, task_points)) = current {
                if !status.is_done() {
                    remaining_points += i64::from(*task_points);
                    remaining_tasks += 1;
                }
            }
        }
        points.push(BurndownPoint {
            date: day,
            remaining_points,
            remaining_tasks,
        });

        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }
    points
}
