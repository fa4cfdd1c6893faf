//! Task entity, status lifecycle and invariants.
//!
//! Every mutation goes through a named operation that refuses transitions
//! which would break an invariant and returns a typed [`TaskError`]. The
//! scheduling engine only ever sees tasks that passed these checks.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Unique identifier for a task
pub type TaskId = u32;

/// Task lifecycle status. The archived flag is orthogonal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Canceled,
}

impl TaskStatus {
    /// Completed and canceled tasks no longer contribute to future workload.
    pub fn is_finished(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Canceled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::InProgress => write!(f, "IN_PROGRESS"),
            TaskStatus::Completed => write!(f, "COMPLETED"),
            TaskStatus::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// The unit of work.
///
/// Ordered collections keep serialization and iteration deterministic.
/// Dates in `daily_allocations` and `actual_daily_hours` are calendar
/// dates; timestamps are naive local time, converted to ISO-8601 strings
/// only at the serde boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Higher = more important; >= 70 high, 30-69 medium, < 30 low.
    pub priority: i32,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub is_archived: bool,
    /// A fixed task's planned window and allocations are immutable to
    /// every strategy.
    #[serde(default)]
    pub is_fixed: bool,
    #[serde(default)]
    pub planned_start: Option<NaiveDateTime>,
    #[serde(default)]
    pub planned_end: Option<NaiveDateTime>,
    #[serde(default)]
    pub deadline: Option<NaiveDateTime>,
    /// Work estimate in hours; a task without one is never schedulable.
    #[serde(default)]
    pub estimated_duration: Option<f64>,
    #[serde(default)]
    pub actual_start: Option<NaiveDateTime>,
    #[serde(default)]
    pub actual_end: Option<NaiveDateTime>,
    /// Logged hours per calendar date.
    #[serde(default)]
    pub actual_daily_hours: BTreeMap<NaiveDate, f64>,
    /// Planned hours per calendar date; sums to `estimated_duration` when
    /// fully scheduled.
    #[serde(default)]
    pub daily_allocations: BTreeMap<NaiveDate, f64>,
    /// Prerequisite task ids. The induced graph is acyclic at all times.
    #[serde(default)]
    pub depends_on: BTreeSet<TaskId>,
    /// Optional hierarchy parent, used by parent-period propagation.
    #[serde(default)]
    pub parent_id: Option<TaskId>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Task {
    /// Create a new pending task.
    pub fn new(id: TaskId, name: impl Into<String>, now: NaiveDateTime) -> Self {
        Self {
            id,
            name: name.into(),
            priority: 50,
            tags: BTreeSet::new(),
            status: TaskStatus::Pending,
            is_archived: false,
            is_fixed: false,
            planned_start: None,
            planned_end: None,
            deadline: None,
            estimated_duration: None,
            actual_start: None,
            actual_end: None,
            actual_daily_hours: BTreeMap::new(),
            daily_allocations: BTreeMap::new(),
            depends_on: BTreeSet::new(),
            parent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the priority
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the work estimate in hours
    pub fn estimated_duration(mut self, hours: f64) -> Self {
        self.estimated_duration = Some(hours);
        self
    }

    /// Set the deadline
    pub fn deadline(mut self, deadline: NaiveDateTime) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the planned window
    pub fn planned(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.planned_start = Some(start);
        self.planned_end = Some(end);
        self
    }

    /// Mark the schedule as fixed
    pub fn fixed(mut self) -> Self {
        self.is_fixed = true;
        self
    }

    /// Add a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Set the hierarchy parent
    pub fn parent(mut self, parent_id: TaskId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the status
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Add a prerequisite
    pub fn depends_on(mut self, prereq_id: TaskId) -> Self {
        self.depends_on.insert(prereq_id);
        self
    }

    // ========================================================================
    // Derived state
    // ========================================================================

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// False iff finished or archived: such tasks never contribute to
    /// future workload.
    pub fn should_count_in_workload(&self) -> bool {
        !self.is_finished() && !self.is_archived
    }

    /// Total hours actually worked: logged daily hours when present,
    /// otherwise the actual start..end span.
    pub fn actual_duration_hours(&self) -> Option<f64> {
        if !self.actual_daily_hours.is_empty() {
            return Some(self.actual_daily_hours.values().sum());
        }
        match (self.actual_start, self.actual_end) {
            (Some(start), Some(end)) if end >= start => {
                Some((end - start).num_minutes() as f64 / 60.0)
            }
            _ => None,
        }
    }

    /// Check whether any strategy may schedule this task.
    pub fn validate_schedulable(&self, force_override: bool) -> Result<(), TaskError> {
        if self.is_finished() {
            return Err(self.not_schedulable(format!("already {}", self.status)));
        }
        if self.is_archived {
            return Err(self.not_schedulable("archived"));
        }
        if self.estimated_duration.is_none() {
            return Err(self.not_schedulable("no estimated duration"));
        }
        if self.is_fixed && !force_override {
            return Err(self.not_schedulable("fixed schedule (requires force override)"));
        }
        Ok(())
    }

    fn not_schedulable(&self, reason: impl Into<String>) -> TaskError {
        TaskError::NotSchedulable {
            task_id: self.id,
            reason: reason.into(),
        }
    }

    fn ensure_active(&self) -> Result<(), TaskError> {
        if self.is_finished() {
            return Err(TaskError::AlreadyFinished {
                task_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Named mutations
    // ========================================================================

    /// Replace the allocation map, rejecting nonpositive values and dates
    /// outside the planned window.
    pub fn set_daily_allocations(
        &mut self,
        allocations: BTreeMap<NaiveDate, f64>,
    ) -> Result<(), TaskError> {
        if allocations.is_empty() {
            self.daily_allocations = allocations;
            return Ok(());
        }
        let (start, end) = match (self.planned_start, self.planned_end) {
            (Some(s), Some(e)) => (s.date(), e.date()),
            _ => {
                return Err(TaskError::Validation(format!(
                    "Task {} has no planned window for daily allocations",
                    self.id
                )))
            }
        };
        for (&date, &hours) in &allocations {
            if hours <= 0.0 {
                return Err(TaskError::Validation(format!(
                    "Allocation for {date} must be positive, got {hours}"
                )));
            }
            if date < start || date > end {
                return Err(TaskError::Validation(format!(
                    "Allocation date {date} is outside the planned window {start}..{end}"
                )));
            }
        }
        self.daily_allocations = allocations;
        Ok(())
    }

    /// Begin work: PENDING -> IN_PROGRESS, stamping `actual_start`.
    pub fn start(&mut self, now: NaiveDateTime) -> Result<(), TaskError> {
        self.ensure_active()?;
        if self.status == TaskStatus::InProgress {
            return Err(TaskError::Validation(format!(
                "Task {} is already in progress",
                self.id
            )));
        }
        self.status = TaskStatus::InProgress;
        if self.actual_start.is_none() {
            self.actual_start = Some(now);
        }
        self.actual_end = None;
        self.touch(now);
        Ok(())
    }

    /// Finish work: stamps `actual_end` and, if work was never started,
    /// `actual_start` as well.
    pub fn complete(&mut self, now: NaiveDateTime) -> Result<(), TaskError> {
        self.ensure_active()?;
        self.status = TaskStatus::Completed;
        if self.actual_start.is_none() {
            self.actual_start = Some(now);
        }
        self.actual_end = Some(now);
        self.touch(now);
        Ok(())
    }

    /// Put an in-progress task back to PENDING. `actual_start` is kept as
    /// history.
    pub fn pause(&mut self, now: NaiveDateTime) -> Result<(), TaskError> {
        self.ensure_active()?;
        if self.status != TaskStatus::InProgress {
            return Err(TaskError::Validation(format!(
                "Task {} is not in progress",
                self.id
            )));
        }
        self.status = TaskStatus::Pending;
        self.touch(now);
        Ok(())
    }

    /// Cancel the task. Stamps `actual_end` only if work had started.
    pub fn cancel(&mut self, now: NaiveDateTime) -> Result<(), TaskError> {
        self.ensure_active()?;
        self.status = TaskStatus::Canceled;
        if self.actual_start.is_some() && self.actual_end.is_none() {
            self.actual_end = Some(now);
        }
        self.touch(now);
        Ok(())
    }

    /// Bring a finished task back to PENDING, clearing `actual_end`.
    pub fn reopen(&mut self, now: NaiveDateTime) -> Result<(), TaskError> {
        if !self.is_finished() {
            return Err(TaskError::Validation(format!(
                "Task {} is not finished",
                self.id
            )));
        }
        self.status = TaskStatus::Pending;
        self.actual_end = None;
        self.touch(now);
        Ok(())
    }

    /// Pin the planned window and mark the task fixed. Stale allocations
    /// are dropped; the fixed-interval policy governs its workload view.
    pub fn fix_times(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<(), TaskError> {
        self.ensure_active()?;
        if start > end {
            return Err(TaskError::Validation(format!(
                "Planned start {start} is after planned end {end}"
            )));
        }
        self.planned_start = Some(start);
        self.planned_end = Some(end);
        self.is_fixed = true;
        self.daily_allocations.clear();
        self.touch(now);
        Ok(())
    }

    /// Log hours actually worked on a date; accumulates.
    pub fn log_hours(
        &mut self,
        date: NaiveDate,
        hours: f64,
        now: NaiveDateTime,
    ) -> Result<(), TaskError> {
        if hours < 0.0 {
            return Err(TaskError::Validation(format!(
                "Logged hours must be non-negative, got {hours}"
            )));
        }
        *self.actual_daily_hours.entry(date).or_insert(0.0) += hours;
        self.touch(now);
        Ok(())
    }

    /// Soft-delete.
    pub fn archive(&mut self, now: NaiveDateTime) -> Result<(), TaskError> {
        if self.is_archived {
            return Err(TaskError::Validation(format!(
                "Task {} is already archived",
                self.id
            )));
        }
        self.is_archived = true;
        self.touch(now);
        Ok(())
    }

    /// Undo a soft-delete.
    pub fn restore(&mut self, now: NaiveDateTime) -> Result<(), TaskError> {
        if !self.is_archived {
            return Err(TaskError::Validation(format!(
                "Task {} is not archived",
                self.id
            )));
        }
        self.is_archived = false;
        self.touch(now);
        Ok(())
    }

    pub fn rename(&mut self, name: impl Into<String>, now: NaiveDateTime) -> Result<(), TaskError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TaskError::Validation("Task name must not be empty".into()));
        }
        self.name = name;
        self.touch(now);
        Ok(())
    }

    pub fn set_priority(&mut self, priority: i32, now: NaiveDateTime) -> Result<(), TaskError> {
        if priority <= 0 {
            return Err(TaskError::Validation(format!(
                "Priority must be positive, got {priority}"
            )));
        }
        self.priority = priority;
        self.touch(now);
        Ok(())
    }

    pub fn set_deadline(
        &mut self,
        deadline: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Result<(), TaskError> {
        self.ensure_active()?;
        self.deadline = deadline;
        self.touch(now);
        Ok(())
    }

    pub fn set_estimated_duration(
        &mut self,
        hours: Option<f64>,
        now: NaiveDateTime,
    ) -> Result<(), TaskError> {
        self.ensure_active()?;
        if let Some(h) = hours {
            if h <= 0.0 {
                return Err(TaskError::Validation(format!(
                    "Estimated duration must be positive, got {h}"
                )));
            }
        }
        self.estimated_duration = hours;
        self.touch(now);
        Ok(())
    }

    /// Update the planned window; clears allocations that no longer fit.
    pub fn set_planned_window(
        &mut self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Result<(), TaskError> {
        self.ensure_active()?;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(TaskError::Validation(format!(
                    "Planned start {s} is after planned end {e}"
                )));
            }
        }
        self.planned_start = start;
        self.planned_end = end;
        let window = match (start, end) {
            (Some(s), Some(e)) => Some((s.date(), e.date())),
            _ => None,
        };
        self.daily_allocations.retain(|date, _| {
            window.is_some_and(|(s, e)| *date >= s && *date <= e)
        });
        self.touch(now);
        Ok(())
    }

    pub fn set_tags(&mut self, tags: BTreeSet<String>, now: NaiveDateTime) -> Result<(), TaskError> {
        if tags.iter().any(|t| t.trim().is_empty()) {
            return Err(TaskError::Validation("Tags must not be empty".into()));
        }
        self.tags = tags;
        self.touch(now);
        Ok(())
    }

    /// Drop the planned window and allocations (orphan-schedule clearing).
    pub fn clear_schedule(&mut self, now: NaiveDateTime) {
        self.planned_start = None;
        self.planned_end = None;
        self.daily_allocations.clear();
        self.touch(now);
    }

    fn touch(&mut self, now: NaiveDateTime) {
        self.updated_at = now;
    }
}
