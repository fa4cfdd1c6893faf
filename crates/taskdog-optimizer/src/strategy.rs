//! Strategy framework: the optimizer contract and the selection registry.
//!
//! A strategy receives candidates that already passed the schedulability
//! filter plus a ledger pre-seeded with every reservation it must schedule
//! around. Strategies work on copies and commit hours to the ledger only
//! for fully scheduled tasks, so a failed task leaves no trace.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;
use taskdog_core::{HolidayChecker, Task, TaskError, TaskId};

use crate::backward::BackwardStrategy;
use crate::balanced::BalancedStrategy;
use crate::greedy::GreedyStrategy;
use crate::ledger::{WorkloadLedger, Workdays};
use crate::round_robin::RoundRobinStrategy;

/// Below this, a remaining-hours value counts as zero.
pub const SCHEDULING_EPSILON: f64 = 1e-6;

/// Horizon for tasks without a deadline: 14 calendar days, i.e. 10
/// workdays.
pub const DEFAULT_HORIZON_DAYS: i64 = 14;

/// Hard bound on any forward day-walk. Only reachable with pathological
/// input (zero capacity on every day).
pub const MAX_SCHEDULING_WINDOW_DAYS: i64 = 3650;

/// Iteration cap for the round-robin loop.
pub const ROUND_ROBIN_MAX_ITERATIONS: usize = 10_000;

/// Parameters shared by every strategy invocation.
#[derive(Clone, Copy)]
pub struct OptimizeParams<'a> {
    pub start_date: NaiveDateTime,
    pub max_hours_per_day: f64,
    pub holiday_checker: Option<&'a dyn HolidayChecker>,
    pub current_time: NaiveDateTime,
    pub include_all_days: bool,
}

impl<'a> OptimizeParams<'a> {
    pub fn workdays(&self) -> Workdays<'a> {
        Workdays::new(self.holiday_checker, self.include_all_days)
    }

    /// The task's own deadline, or `start_date` plus the default horizon.
    pub fn effective_deadline(&self, task: &Task) -> NaiveDateTime {
        task.deadline
            .unwrap_or(self.start_date + TimeDelta::days(DEFAULT_HORIZON_DAYS))
    }
}

/// A task the strategy could not place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleFailure {
    pub task_id: TaskId,
    pub name: String,
    pub reason: String,
}

/// What one strategy run produced.
#[derive(Debug, Clone, Default)]
pub struct StrategyOutcome {
    /// Tasks with planned times and allocations assigned; copies of the
    /// inputs, ready to persist.
    pub scheduled: Vec<Task>,
    pub failures: Vec<ScheduleFailure>,
    /// Hours this run committed, by date (excludes seeded reservations).
    pub daily_allocations: BTreeMap<NaiveDate, f64>,
}

impl StrategyOutcome {
    pub(crate) fn record_failure(&mut self, task: &Task, reason: impl Into<String>) {
        self.failures.push(ScheduleFailure {
            task_id: task.id,
            name: task.name.clone(),
            reason: reason.into(),
        });
    }
}

/// The optimizer contract.
pub trait OptimizeStrategy: Send + Sync + std::fmt::Debug {
    fn optimize(
        &self,
        tasks: &[Task],
        ledger: &mut WorkloadLedger,
        params: &OptimizeParams<'_>,
    ) -> StrategyOutcome;
}

/// Registry metadata for one algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

/// Every registered algorithm, in selection-menu order.
pub const STRATEGIES: &[StrategyInfo] = &[
    StrategyInfo {
        name: "greedy",
        display_name: "Earliest First",
        description: "Pack tasks into the earliest available hours",
    },
    StrategyInfo {
        name: "balanced",
        display_name: "Equal Distribution",
        description: "Spread each task evenly across the days before its deadline",
    },
    StrategyInfo {
        name: "backward",
        display_name: "Just-In-Time",
        description: "Pack tasks backward from their deadlines",
    },
    StrategyInfo {
        name: "round_robin",
        display_name: "Round Robin",
        description: "Parallel progress on all tasks",
    },
];

/// Instantiate a strategy by algorithm name.
pub fn create_strategy(
    name: &str,
    day_start: NaiveTime,
    day_end: NaiveTime,
) -> Result<Box<dyn OptimizeStrategy>, TaskError> {
    match name {
        "greedy" => Ok(Box::new(GreedyStrategy::new(day_start, day_end))),
        "balanced" => Ok(Box::new(BalancedStrategy::new(day_start, day_end))),
        "backward" => Ok(Box::new(BackwardStrategy::new(day_start, day_end))),
        "round_robin" => Ok(Box::new(RoundRobinStrategy::new(day_start, day_end))),
        other => Err(TaskError::Validation(format!(
            "Unknown optimization algorithm: {other}"
        ))),
    }
}

/// Stamp a copy of `task` with its planned window and allocation map.
/// Time-of-day comes from the configured day start/end; the ledger is
/// day-granular.
pub(crate) fn schedule_task(
    task: &Task,
    first_day: NaiveDate,
    last_day: NaiveDate,
    allocations: BTreeMap<NaiveDate, f64>,
    day_start: NaiveTime,
    day_end: NaiveTime,
    now: NaiveDateTime,
) -> Task {
    let mut scheduled = task.clone();
    scheduled.planned_start = Some(first_day.and_time(day_start));
    scheduled.planned_end = Some(last_day.and_time(day_end));
    scheduled.daily_allocations = allocations;
    scheduled.updated_at = now;
    scheduled
}

pub(crate) fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(date)
}

pub(crate) fn prev_day(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(1))
}
