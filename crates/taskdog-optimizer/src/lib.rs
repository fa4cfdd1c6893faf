//! # taskdog-optimizer
//!
//! Schedule optimization engine for taskdog.
//!
//! This crate provides:
//! - The four scheduling strategies (greedy, balanced, backward, round-robin)
//! - The per-invocation workload ledger and workday calendar
//! - Dependency-graph validation (cycle detection, topological order)
//! - The optimization orchestrator that ties them to a repository
//!
//! ## Example
//!
//! ```rust
//! use chrono::{NaiveDate, NaiveTime};
//! use taskdog_core::Task;
//! use taskdog_optimizer::{
//!     GreedyStrategy, OptimizeParams, OptimizeStrategy, WorkloadLedger,
//! };
//!
//! let monday = NaiveDate::from_ymd_opt(2025, 1, 6)
//!     .unwrap()
//!     .and_hms_opt(9, 0, 0)
//!     .unwrap();
//! let task = Task::new(1, "Write report", monday)
//!     .priority(100)
//!     .estimated_duration(4.0);
//!
//! let strategy = GreedyStrategy::new(
//!     NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
//!     NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
//! );
//! let params = OptimizeParams {
//!     start_date: monday,
//!     max_hours_per_day: 6.0,
//!     holiday_checker: None,
//!     current_time: monday,
//!     include_all_days: false,
//! };
//! let mut ledger = WorkloadLedger::new();
//! let outcome = strategy.optimize(&[task], &mut ledger, &params);
//! assert_eq!(outcome.scheduled.len(), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use taskdog_core::{HolidayChecker, Task, TaskError, TaskId, TaskRepository};
use tracing::{debug, info};

pub mod allocation;
pub mod backward;
pub mod balanced;
pub mod graph;
pub mod greedy;
pub mod ledger;
pub mod round_robin;
pub mod strategy;

pub use backward::BackwardStrategy;
pub use balanced::BalancedStrategy;
pub use graph::DependencyGraph;
pub use greedy::GreedyStrategy;
pub use ledger::{WorkloadLedger, Workdays};
pub use round_robin::RoundRobinStrategy;
pub use strategy::{
    create_strategy, OptimizeParams, OptimizeStrategy, ScheduleFailure, StrategyInfo,
    StrategyOutcome, DEFAULT_HORIZON_DAYS, ROUND_ROBIN_MAX_ITERATIONS, SCHEDULING_EPSILON,
    STRATEGIES,
};

/// One optimization request.
#[derive(Debug, Clone)]
pub struct OptimizeRequest {
    /// Explicit target ids; `None` targets every task.
    pub task_ids: Option<Vec<TaskId>>,
    pub algorithm: String,
    pub start_date: NaiveDateTime,
    pub max_hours_per_day: f64,
    /// Reschedule over existing plans and clear orphan schedules.
    pub force_override: bool,
    /// Treat weekends and holidays as schedulable days.
    pub include_all_days: bool,
    pub current_time: NaiveDateTime,
}

impl OptimizeRequest {
    pub fn new(algorithm: impl Into<String>, start_date: NaiveDateTime) -> Self {
        Self {
            task_ids: None,
            algorithm: algorithm.into(),
            start_date,
            max_hours_per_day: 6.0,
            force_override: false,
            include_all_days: false,
            current_time: start_date,
        }
    }

    pub fn tasks(mut self, ids: Vec<TaskId>) -> Self {
        self.task_ids = Some(ids);
        self
    }

    pub fn max_hours_per_day(mut self, cap: f64) -> Self {
        self.max_hours_per_day = cap;
        self
    }

    pub fn force_override(mut self, force: bool) -> Self {
        self.force_override = force;
        self
    }

    pub fn include_all_days(mut self, include: bool) -> Self {
        self.include_all_days = include;
        self
    }

    pub fn at(mut self, now: NaiveDateTime) -> Self {
        self.current_time = now;
        self
    }
}

/// Aggregate view of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationSummary {
    pub scheduled_count: usize,
    pub failed_count: usize,
    /// Hours committed by this run.
    pub total_hours: f64,
    /// Dates where the ledger ended above the cap (seeded reservations
    /// included).
    pub overloaded_days: Vec<NaiveDate>,
    /// First and last date that received hours.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Scheduled tasks that already had a planned start before the run.
    pub rescheduled_count: usize,
}

/// Everything a caller needs to report an optimization run.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationOutput {
    pub scheduled: Vec<Task>,
    pub failed: Vec<ScheduleFailure>,
    pub daily_allocations: BTreeMap<NaiveDate, f64>,
    pub summary: OptimizationSummary,
    /// Planned-start snapshot per task id, taken before the run.
    pub planned_start_before: BTreeMap<TaskId, Option<NaiveDateTime>>,
}

/// Orchestrates one optimization: target selection, schedulability
/// filtering, ledger seeding, strategy dispatch, persistence, orphan
/// clearing and parent-period propagation.
pub struct ScheduleOptimizer<'a> {
    repository: &'a dyn TaskRepository,
    holiday_checker: Option<&'a dyn HolidayChecker>,
    day_start: NaiveTime,
    day_end: NaiveTime,
}

impl<'a> ScheduleOptimizer<'a> {
    pub fn new(repository: &'a dyn TaskRepository) -> Self {
        Self {
            repository,
            holiday_checker: None,
            day_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            day_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
        }
    }

    pub fn with_holiday_checker(mut self, checker: &'a dyn HolidayChecker) -> Self {
        self.holiday_checker = Some(checker);
        self
    }

    pub fn with_day_times(mut self, day_start: NaiveTime, day_end: NaiveTime) -> Self {
        self.day_start = day_start;
        self.day_end = day_end;
        self
    }

    /// Run one optimization end to end.
    ///
    /// Individual task failures land in the output's `failed` list;
    /// structural problems (unknown ids, unknown algorithm, nothing
    /// schedulable among explicit targets) are errors.
    pub fn run(&self, request: &OptimizeRequest) -> Result<OptimizationOutput, TaskError> {
        let all_tasks = self.repository.get_all()?;
        let planned_start_before: BTreeMap<TaskId, Option<NaiveDateTime>> =
            all_tasks.iter().map(|t| (t.id, t.planned_start)).collect();

        let targets = self.select_targets(&all_tasks, request)?;

        let mut schedulable = Vec::new();
        let mut reasons: BTreeMap<TaskId, String> = BTreeMap::new();
        for task in targets {
            match task.validate_schedulable(request.force_override) {
                Ok(()) => schedulable.push(task),
                Err(TaskError::NotSchedulable { task_id, reason }) => {
                    reasons.insert(task_id, reason);
                }
                Err(other) => return Err(other),
            }
        }
        if let Some(ids) = &request.task_ids {
            if schedulable.is_empty() {
                return Err(TaskError::NoSchedulableTasks {
                    task_ids: ids.clone(),
                    reasons,
                });
            }
        }

        let context = filter_context_tasks(
            &all_tasks,
            request.force_override,
            request.task_ids.as_deref(),
        );
        debug!(
            candidates = schedulable.len(),
            context = context.len(),
            "seeding workload ledger"
        );

        let workdays = Workdays::new(self.holiday_checker, request.include_all_days);
        let mut ledger = WorkloadLedger::new();
        ledger.seed(&context, request.force_override, &workdays);

        let strategy = create_strategy(&request.algorithm, self.day_start, self.day_end)?;
        let params = OptimizeParams {
            start_date: request.start_date,
            max_hours_per_day: request.max_hours_per_day,
            holiday_checker: self.holiday_checker,
            current_time: request.current_time,
            include_all_days: request.include_all_days,
        };
        let outcome = strategy.optimize(&schedulable, &mut ledger, &params);

        // Batched persist: all scheduled tasks commit together.
        self.repository.save_all(&outcome.scheduled)?;

        if request.force_override {
            self.clear_orphan_schedules(&all_tasks, &schedulable, &outcome, request)?;
        }

        self.propagate_parent_periods(&all_tasks, &outcome.scheduled, request.current_time)?;

        let summary = build_summary(
            &outcome,
            &ledger,
            &planned_start_before,
            request.max_hours_per_day,
        );
        info!(
            algorithm = %request.algorithm,
            scheduled = summary.scheduled_count,
            failed = summary.failed_count,
            "schedule optimization complete"
        );

        Ok(OptimizationOutput {
            scheduled: outcome.scheduled,
            failed: outcome.failures,
            daily_allocations: outcome.daily_allocations,
            summary,
            planned_start_before,
        })
    }

    fn select_targets(
        &self,
        all_tasks: &[Task],
        request: &OptimizeRequest,
    ) -> Result<Vec<Task>, TaskError> {
        let Some(ids) = &request.task_ids else {
            return Ok(all_tasks.to_vec());
        };
        let by_id: BTreeMap<TaskId, &Task> = all_tasks.iter().map(|t| (t.id, t)).collect();
        let missing: Vec<TaskId> = ids
            .iter()
            .filter(|id| !by_id.contains_key(id))
            .copied()
            .collect();
        match missing.len() {
            0 => Ok(ids.iter().map(|id| by_id[id].clone()).collect()),
            1 => Err(TaskError::NotFound(missing[0])),
            _ => Err(TaskError::NotFoundMany(missing)),
        }
    }

    /// Under `force_override`, tasks that were schedulable but ended the
    /// run without a schedule lose their stale planned window and
    /// allocations. Finished tasks and hierarchy parents are left alone.
    fn clear_orphan_schedules(
        &self,
        all_tasks: &[Task],
        schedulable: &[Task],
        outcome: &StrategyOutcome,
        request: &OptimizeRequest,
    ) -> Result<(), TaskError> {
        let scheduled_ids: BTreeSet<TaskId> = outcome.scheduled.iter().map(|t| t.id).collect();
        let parent_ids: BTreeSet<TaskId> = all_tasks.iter().filter_map(|t| t.parent_id).collect();

        let mut cleared = Vec::new();
        for task in schedulable {
            if scheduled_ids.contains(&task.id)
                || task.planned_start.is_none()
                || parent_ids.contains(&task.id)
            {
                continue;
            }
            let mut orphan = task.clone();
            orphan.clear_schedule(request.current_time);
            cleared.push(orphan);
        }
        if !cleared.is_empty() {
            debug!(count = cleared.len(), "clearing orphan schedules");
            self.repository.save_all(&cleared)?;
        }
        Ok(())
    }

    /// Walk up the hierarchy so every parent's planned window exactly
    /// spans its children. Archived parents are skipped.
    fn propagate_parent_periods(
        &self,
        all_tasks: &[Task],
        updated: &[Task],
        now: NaiveDateTime,
    ) -> Result<(), TaskError> {
        let task_map: BTreeMap<TaskId, &Task> = all_tasks.iter().map(|t| (t.id, t)).collect();
        let mut children_of: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();
        for task in all_tasks {
            if let Some(pid) = task.parent_id {
                children_of.entry(pid).or_default().push(task.id);
            }
        }

        let mut updated_map: BTreeMap<TaskId, Task> =
            updated.iter().map(|t| (t.id, t.clone())).collect();
        let mut pending: BTreeSet<TaskId> = updated.iter().filter_map(|t| t.parent_id).collect();
        let mut processed: BTreeSet<TaskId> = BTreeSet::new();
        let mut modified: Vec<Task> = Vec::new();

        while let Some(pid) = pending.pop_first() {
            if !processed.insert(pid) {
                continue;
            }
            let Some(&parent) = task_map.get(&pid) else {
                continue;
            };
            if parent.is_archived {
                continue;
            }
            let Some(child_ids) = children_of.get(&pid) else {
                continue;
            };

            let mut starts = Vec::new();
            let mut ends = Vec::new();
            for cid in child_ids {
                let Some(child) = updated_map.get(cid).or_else(|| task_map.get(cid).copied())
                else {
                    continue;
                };
                if let Some(start) = child.planned_start {
                    starts.push(start);
                }
                if let Some(end) = child.planned_end {
                    ends.push(end);
                }
            }

            let (Some(&min_start), Some(&max_end)) = (starts.iter().min(), ends.iter().max())
            else {
                continue;
            };
            if parent.planned_start == Some(min_start) && parent.planned_end == Some(max_end) {
                continue;
            }

            let mut updated_parent = updated_map.get(&pid).cloned().unwrap_or_else(|| parent.clone());
            updated_parent.planned_start = Some(min_start);
            updated_parent.planned_end = Some(max_end);
            updated_parent.updated_at = now;
            updated_map.insert(pid, updated_parent.clone());
            modified.push(updated_parent);
            if let Some(grandparent) = parent.parent_id {
                pending.insert(grandparent);
            }
        }

        if !modified.is_empty() {
            debug!(count = modified.len(), "propagating parent periods");
            self.repository.save_all(&modified)?;
        }
        Ok(())
    }
}

/// Which tasks constrain the ledger:
/// - explicit targets: every other non-finished scheduled task;
/// - otherwise, under force: only fixed or in-progress tasks;
/// - otherwise: all active scheduled tasks.
fn filter_context_tasks(
    all_tasks: &[Task],
    force_override: bool,
    task_ids: Option<&[TaskId]>,
) -> Vec<Task> {
    let target_ids: BTreeSet<TaskId> = task_ids
        .map(|ids| ids.iter().copied().collect())
        .unwrap_or_default();

    all_tasks
        .iter()
        .filter(|task| {
            if !task.should_count_in_workload() {
                return false;
            }
            if task_ids.is_some() {
                return !target_ids.contains(&task.id) && task.planned_start.is_some();
            }
            if force_override {
                return task.is_fixed || task.status == taskdog_core::TaskStatus::InProgress;
            }
            true
        })
        .cloned()
        .collect()
}

fn build_summary(
    outcome: &StrategyOutcome,
    ledger: &WorkloadLedger,
    planned_start_before: &BTreeMap<TaskId, Option<NaiveDateTime>>,
    cap: f64,
) -> OptimizationSummary {
    let total_hours: f64 = outcome.daily_allocations.values().sum();
    let date_range = match (
        outcome.daily_allocations.keys().next(),
        outcome.daily_allocations.keys().next_back(),
    ) {
        (Some(&first), Some(&last)) => Some((first, last)),
        _ => None,
    };
    let rescheduled_count = outcome
        .scheduled
        .iter()
        .filter(|t| {
            planned_start_before
                .get(&t.id)
                .map_or(false, |before| before.is_some())
        })
        .count();

    OptimizationSummary {
        scheduled_count: outcome.scheduled.len(),
        failed_count: outcome.failures.len(),
        total_hours,
        overloaded_days: ledger.overloaded_days(cap),
        date_range,
        rescheduled_count,
    }
}
