//! Hour-distribution policies over a task's planned window.
//!
//! Three policies produce a date -> hours map. Precedence when computing a
//! task's workload view: optimizer map, then fixed interval (only for
//! fixed tasks), then even split.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use taskdog_core::Task;

use crate::ledger::Workdays;

/// Which policy governs a task's workload view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionPolicy {
    /// The task's own `daily_allocations`, authoritative when present.
    OptimizerMap,
    /// Even split over the pinned window of a fixed task.
    FixedInterval,
    /// Even split over planned workdays; fallback when optimizer data is
    /// absent.
    EvenSplit,
}

pub fn policy_for(task: &Task) -> DistributionPolicy {
    if !task.daily_allocations.is_empty() {
        DistributionPolicy::OptimizerMap
    } else if task.is_fixed {
        DistributionPolicy::FixedInterval
    } else {
        DistributionPolicy::EvenSplit
    }
}

/// Distribute a task's hours per the policy precedence. Tasks without an
/// estimate or planned window contribute nothing unless they carry an
/// optimizer map.
pub fn distribute(task: &Task, workdays: &Workdays<'_>) -> BTreeMap<NaiveDate, f64> {
    match policy_for(task) {
        DistributionPolicy::OptimizerMap => task.daily_allocations.clone(),
        DistributionPolicy::FixedInterval | DistributionPolicy::EvenSplit => {
            even_split(task, workdays)
        }
    }
}

/// Even split: estimated hours divided across the workdays of the planned
/// window.
pub fn even_split(task: &Task, workdays: &Workdays<'_>) -> BTreeMap<NaiveDate, f64> {
    let (Some(start), Some(end), Some(estimate)) =
        (task.planned_start, task.planned_end, task.estimated_duration)
    else {
        return BTreeMap::new();
    };
    let days = workdays_between(start.date(), end.date(), workdays);
    if days.is_empty() {
        return BTreeMap::new();
    }
    let per_day = estimate / days.len() as f64;
    days.into_iter().map(|d| (d, per_day)).collect()
}

/// All workdays in the inclusive range.
pub fn workdays_between(
    start: NaiveDate,
    end: NaiveDate,
    workdays: &Workdays<'_>,
) -> Vec<NaiveDate> {
    let mut result = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        if workdays.is_workday(cursor) {
            result.push(cursor);
        }
        cursor = match cursor.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => break,
        };
    }
    result
}

pub fn count_workdays(start: NaiveDate, end: NaiveDate, workdays: &Workdays<'_>) -> usize {
    workdays_between(start, end, workdays).len()
}

/// Round up to one decimal place (used for per-day quotas).
pub fn ceil_to_tenth(hours: f64) -> f64 {
    (hours * 10.0).ceil() / 10.0
}
