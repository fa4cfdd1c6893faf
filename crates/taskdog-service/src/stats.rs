//! Task statistics: counts, time tracking, estimation accuracy, deadline
//! compliance, priority distribution and completion trends.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, TimeDelta};
use serde::Serialize;
use taskdog_core::{Task, TaskError, TaskId, TaskStatus};

/// Priority classification thresholds.
const HIGH_PRIORITY_THRESHOLD: i32 = 70;
const LOW_PRIORITY_THRESHOLD: i32 = 30;

/// Estimation counts as exact within this tolerance (±10%).
const ESTIMATION_TOLERANCE: f64 = 0.1;

/// Reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsPeriod {
    Last7Days,
    Last30Days,
    All,
}

impl FromStr for StatisticsPeriod {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(StatisticsPeriod::Last7Days),
            "30d" => Ok(StatisticsPeriod::Last30Days),
            "all" => Ok(StatisticsPeriod::All),
            other => Err(TaskError::Validation(format!(
                "Unknown statistics period: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskCounts {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub canceled: usize,
    /// Completed over finished (completed + canceled).
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeStats {
    pub total_work_hours: f64,
    pub average_work_hours: f64,
    pub median_work_hours: f64,
    pub longest_task_id: TaskId,
    pub shortest_task_id: TaskId,
    pub tasks_with_time_tracking: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationStats {
    pub tasks_with_estimation: usize,
    /// Mean of actual / estimated.
    pub accuracy_rate: f64,
    pub over_estimated: usize,
    pub under_estimated: usize,
    pub exact: usize,
    /// Up to three ids closest to their estimate.
    pub best_estimated: Vec<TaskId>,
    /// Up to three ids farthest from their estimate, worst first.
    pub worst_estimated: Vec<TaskId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadlineStats {
    pub tasks_with_deadline: usize,
    pub met: usize,
    pub missed: usize,
    pub compliance_rate: f64,
    pub average_delay_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityStats {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub high_completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendStats {
    pub last_7_days_completed: usize,
    pub last_30_days_completed: usize,
    /// ISO week ("2025-W02") -> completions.
    pub weekly: BTreeMap<String, usize>,
    /// Month ("2025-01") -> completions.
    pub monthly: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub counts: TaskCounts,
    pub time: Option<TimeStats>,
    pub estimation: Option<EstimationStats>,
    pub deadline: Option<DeadlineStats>,
    pub priority: PriorityStats,
    /// Only computed for the `all` period.
    pub trends: Option<TrendStats>,
}

/// Calculate every statistics section over the given period.
pub fn calculate_statistics(
    tasks: &[Task],
    period: StatisticsPeriod,
    now: NaiveDateTime,
) -> StatisticsReport {
    let filtered: Vec<&Task> = match period {
        StatisticsPeriod::All => tasks.iter().collect(),
        StatisticsPeriod::Last7Days => filter_by_cutoff(tasks, now - TimeDelta::days(7)),
        StatisticsPeriod::Last30Days => filter_by_cutoff(tasks, now - TimeDelta::days(30)),
    };

    StatisticsReport {
        counts: task_counts(&filtered),
        time: time_stats(&filtered),
        estimation: estimation_stats(&filtered),
        deadline: deadline_stats(&filtered),
        priority: priority_stats(&filtered),
        trends: (period == StatisticsPeriod::All).then(|| trend_stats(&filtered, now)),
    }
}

/// Tasks finished within the period, plus every still-active task.
fn filter_by_cutoff(tasks: &[Task], cutoff: NaiveDateTime) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|t| match t.actual_end {
            Some(end) => end >= cutoff,
            None => matches!(t.status, TaskStatus::Pending | TaskStatus::InProgress),
        })
        .collect()
}

fn task_counts(tasks: &[&Task]) -> TaskCounts {
    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
    let completed = count(TaskStatus::Completed);
    let canceled = count(TaskStatus::Canceled);
    let finished = completed + canceled;
    TaskCounts {
        total: tasks.len(),
        pending: count(TaskStatus::Pending),
        in_progress: count(TaskStatus::InProgress),
        completed,
        canceled,
        completion_rate: if finished > 0 {
            completed as f64 / finished as f64
        } else {
            0.0
        },
    }
}

fn time_stats(tasks: &[&Task]) -> Option<TimeStats> {
    let mut tracked: Vec<(TaskId, f64)> = tasks
        .iter()
        .filter_map(|t| t.actual_duration_hours().map(|h| (t.id, h)))
        .collect();
    if tracked.is_empty() {
        return None;
    }

    let total: f64 = tracked.iter().map(|(_, h)| h).sum();
    let average = total / tracked.len() as f64;

    let mut durations: Vec<f64> = tracked.iter().map(|(_, h)| *h).collect();
    durations.sort_by(|a, b| a.total_cmp(b));
    let n = durations.len();
    let median = if n % 2 == 0 {
        (durations[n / 2 - 1] + durations[n / 2]) / 2.0
    } else {
        durations[n / 2]
    };

    tracked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    let shortest = tracked.first()?.0;
    let longest = tracked.last()?.0;

    Some(TimeStats {
        total_work_hours: total,
        average_work_hours: average,
        median_work_hours: median,
        longest_task_id: longest,
        shortest_task_id: shortest,
        tasks_with_time_tracking: n,
    })
}

fn estimation_stats(tasks: &[&Task]) -> Option<EstimationStats> {
    // Ratio of actual to estimated, with the distance from a perfect
    // estimate for ranking.
    let mut rated: Vec<(TaskId, f64, f64)> = tasks
        .iter()
        .filter_map(|t| {
            let estimate = t.estimated_duration?;
            let actual = t.actual_duration_hours()?;
            let rate = actual / estimate;
            Some((t.id, rate, (rate - 1.0).abs()))
        })
        .collect();
    if rated.is_empty() {
        return None;
    }

    let mut over = 0;
    let mut under = 0;
    let mut exact = 0;
    for &(_, rate, _) in &rated {
        if rate < 1.0 - ESTIMATION_TOLERANCE {
            over += 1;
        } else if rate > 1.0 + ESTIMATION_TOLERANCE {
            under += 1;
        } else {
            exact += 1;
        }
    }
    let accuracy = rated.iter().map(|(_, rate, _)| rate).sum::<f64>() / rated.len() as f64;

    rated.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)));
    let best: Vec<TaskId> = rated.iter().take(3).map(|(id, _, _)| *id).collect();
    let worst: Vec<TaskId> = rated.iter().rev().take(3).map(|(id, _, _)| *id).collect();

    Some(EstimationStats {
        tasks_with_estimation: rated.len(),
        accuracy_rate: accuracy,
        over_estimated: over,
        under_estimated: under,
        exact,
        best_estimated: best,
        worst_estimated: worst,
    })
}

fn deadline_stats(tasks: &[&Task]) -> Option<DeadlineStats> {
    let relevant: Vec<(&Task, NaiveDateTime, NaiveDateTime)> = tasks
        .iter()
        .filter(|t| t.is_finished())
        .filter_map(|t| Some((*t, t.deadline?, t.actual_end?)))
        .collect();
    if relevant.is_empty() {
        return None;
    }

    let mut met = 0;
    let mut missed = 0;
    let mut total_delay_days = 0.0;
    for &(_, deadline, actual_end) in &relevant {
        if actual_end <= deadline {
            met += 1;
        } else {
            missed += 1;
            total_delay_days += (actual_end - deadline).num_seconds() as f64 / 86_400.0;
        }
    }

    Some(DeadlineStats {
        tasks_with_deadline: relevant.len(),
        met,
        missed,
        compliance_rate: met as f64 / relevant.len() as f64,
        average_delay_days: if missed > 0 {
            total_delay_days / missed as f64
        } else {
            0.0
        },
    })
}

fn priority_stats(tasks: &[&Task]) -> PriorityStats {
    let mut high = 0;
    let mut medium = 0;
    let mut low = 0;
    let mut high_completed = 0;
    for task in tasks {
        if task.priority >= HIGH_PRIORITY_THRESHOLD {
            high += 1;
            if task.status == TaskStatus::Completed {
                high_completed += 1;
            }
        } else if task.priority >= LOW_PRIORITY_THRESHOLD {
            medium += 1;
        } else {
            low += 1;
        }
    }
    PriorityStats {
        high,
        medium,
        low,
        high_completion_rate: if high > 0 {
            high_completed as f64 / high as f64
        } else {
            0.0
        },
    }
}

fn trend_stats(tasks: &[&Task], now: NaiveDateTime) -> TrendStats {
    let week_ago = now - TimeDelta::days(7);
    let month_ago = now - TimeDelta::days(30);

    let mut last_7 = 0;
    let mut last_30 = 0;
    let mut weekly: BTreeMap<String, usize> = BTreeMap::new();
    let mut monthly: BTreeMap<String, usize> = BTreeMap::new();

    for task in tasks {
        let Some(end) = task.actual_end.filter(|_| task.is_finished()) else {
            continue;
        };
        if end >= week_ago {
            last_7 += 1;
        }
        if end >= month_ago {
            last_30 += 1;
        }
        let iso = end.date().iso_week();
        *weekly
            .entry(format!("{}-W{:02}", iso.year(), iso.week()))
            .or_insert(0) += 1;
        *monthly
            .entry(format!("{}-{:02}", end.year(), end.month()))
            .or_insert(0) += 1;
    }

    TrendStats {
        last_7_days_completed: last_7,
        last_30_days_completed: last_30,
        weekly,
        monthly,
    }
}
