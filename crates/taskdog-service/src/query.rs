//! Read-side queries: list filtering, gantt data, tag statistics.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use taskdog_core::{Task, TaskId, TaskStatus};
use taskdog_optimizer::allocation;
use taskdog_optimizer::Workdays;

/// Filter and ordering for task listings. Archived tasks are excluded
/// unless asked for.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    /// Tasks must carry these tags; any-of by default, all-of when
    /// `match_all_tags` is set.
    pub tags: Vec<String>,
    pub match_all_tags: bool,
    pub include_archived: bool,
    /// Keep only tasks whose planned window intersects this date range.
    pub planned_within: Option<(NaiveDate, NaiveDate)>,
    pub sort: SortKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Id,
    /// Highest priority first.
    Priority,
    /// Earliest deadline first; tasks without one sort last.
    Deadline,
}

pub fn filter_tasks(mut tasks: Vec<Task>, filter: &TaskFilter) -> Vec<Task> {
    tasks.retain(|task| {
        if !filter.include_archived && task.is_archived {
            return false;
        }
        if let Some(status) = filter.status {
            if task.status != status {
                return false;
            }
        }
        if !filter.tags.is_empty() {
            let matches = if filter.match_all_tags {
                filter.tags.iter().all(|t| task.tags.contains(t))
            } else {
                filter.tags.iter().any(|t| task.tags.contains(t))
            };
            if !matches {
                return false;
            }
        }
        if let Some((from, to)) = filter.planned_within {
            if !planned_window_intersects(task, from, to) {
                return false;
            }
        }
        true
    });

    match filter.sort {
        SortKey::Id => tasks.sort_by_key(|t| t.id),
        SortKey::Priority => tasks.sort_by_key(|t| (std::cmp::Reverse(t.priority), t.id)),
        SortKey::Deadline => tasks.sort_by_key(|t| (t.deadline.is_none(), t.deadline, t.id)),
    }
    tasks
}

fn planned_window_intersects(task: &Task, from: NaiveDate, to: NaiveDate) -> bool {
    match (task.planned_start, task.planned_end) {
        (Some(start), Some(end)) => start.date() <= to && end.date() >= from,
        (Some(start), None) => start.date() <= to,
        _ => false,
    }
}

/// A task entity together with its notes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDetail {
    pub task: Task,
    pub notes: Option<String>,
    pub has_notes: bool,
}

/// One row of a gantt chart: the task plus its per-day planned hours
/// clipped to the requested range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GanttRow {
    pub task_id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub is_fixed: bool,
    pub planned_start: Option<NaiveDateTime>,
    pub planned_end: Option<NaiveDateTime>,
    pub deadline: Option<NaiveDateTime>,
    pub estimated_duration: Option<f64>,
    pub daily_hours: BTreeMap<NaiveDate, f64>,
}

/// Gantt data over a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GanttData {
    pub rows: Vec<GanttRow>,
    pub date_range: (NaiveDate, NaiveDate),
    pub total_estimated_hours: f64,
}

/// Build gantt rows for every non-archived task whose planned window
/// intersects the range, ordered by deadline (missing deadlines last).
pub fn gantt_data(
    tasks: &[Task],
    from: NaiveDate,
    to: NaiveDate,
    workdays: &Workdays<'_>,
) -> GanttData {
    let mut rows: Vec<GanttRow> = tasks
        .iter()
        .filter(|&t| !t.is_archived && planned_window_intersects(t, from, to))
        .map(|task| {
            let daily_hours: BTreeMap<NaiveDate, f64> = allocation::distribute(task, workdays)
                .into_iter()
                .filter(|(date, _)| *date >= from && *date <= to)
                .collect();
            GanttRow {
                task_id: task.id,
                name: task.name.clone(),
                status: task.status,
                is_fixed: task.is_fixed,
                planned_start: task.planned_start,
                planned_end: task.planned_end,
                deadline: task.deadline,
                estimated_duration: task.estimated_duration,
                daily_hours,
            }
        })
        .collect();
    rows.sort_by_key(|r| (r.deadline.is_none(), r.deadline, r.task_id));

    let total_estimated_hours = rows.iter().filter_map(|r| r.estimated_duration).sum();
    GanttData {
        rows,
        date_range: (from, to),
        total_estimated_hours,
    }
}

/// Per-tag aggregate counts and hours.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TagStats {
    pub total: usize,
    pub completed: usize,
    pub estimated_hours: f64,
    pub actual_hours: f64,
}

/// Aggregate non-archived tasks by tag.
pub fn tag_statistics(tasks: &[Task]) -> BTreeMap<String, TagStats> {
    let mut stats: BTreeMap<String, TagStats> = BTreeMap::new();
    for task in tasks.iter().filter(|t| !t.is_archived) {
        for tag in &task.tags {
            let entry = stats.entry(tag.clone()).or_default();
            entry.total += 1;
            if task.status == TaskStatus::Completed {
                entry.completed += 1;
            }
            entry.estimated_hours += task.estimated_duration.unwrap_or(0.0);
            entry.actual_hours += task.actual_duration_hours().unwrap_or(0.0);
        }
    }
    stats
}
