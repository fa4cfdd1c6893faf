//! The write path: request -> validate -> persist -> notify.
//!
//! Mutations are serialized through a single writer lock; readers go
//! straight to the repository and see repeatable snapshots. Every
//! successful mutation emits exactly one typed event, attributed to the
//! issuing client so the originator does not echo its own change.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use taskdog_core::{
    ChangeEvent, ClientContext, Clock, EventKind, HolidayChecker, NotesStore, Subscriber, Task,
    TaskError, TaskId, TaskRepository,
};
use taskdog_optimizer::{
    DependencyGraph, OptimizationOutput, OptimizeRequest, ScheduleOptimizer, Workdays,
};
use tracing::{debug, info};

use crate::broadcast::Broadcaster;
use crate::query::{self, GanttData, TaskDetail, TaskFilter};
use crate::stats::{calculate_statistics, StatisticsPeriod, StatisticsReport};

/// Fields for a new task.
#[derive(Debug, Clone, Default)]
pub struct CreateTaskInput {
    pub name: String,
    pub priority: Option<i32>,
    pub estimated_duration: Option<f64>,
    pub deadline: Option<NaiveDateTime>,
    pub tags: BTreeSet<String>,
    pub parent_id: Option<TaskId>,
}

impl CreateTaskInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update; `Some(None)` on an optional field clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub priority: Option<i32>,
    pub deadline: Option<Option<NaiveDateTime>>,
    pub estimated_duration: Option<Option<f64>>,
    pub planned_start: Option<Option<NaiveDateTime>>,
    pub planned_end: Option<Option<NaiveDateTime>>,
    pub is_fixed: Option<bool>,
    pub tags: Option<BTreeSet<String>>,
}

/// The multi-client task service.
pub struct TaskService {
    repository: Arc<dyn TaskRepository>,
    notes: Arc<dyn NotesStore>,
    holiday_checker: Option<Arc<dyn HolidayChecker>>,
    clock: Arc<dyn Clock>,
    broadcaster: Broadcaster,
    write_lock: Mutex<()>,
    day_start: NaiveTime,
    day_end: NaiveTime,
}

impl TaskService {
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        notes: Arc<dyn NotesStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            notes,
            holiday_checker: None,
            broadcaster: Broadcaster::new(Arc::clone(&clock)),
            clock,
            write_lock: Mutex::new(()),
            day_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            day_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
        }
    }

    pub fn with_holiday_checker(mut self, checker: Arc<dyn HolidayChecker>) -> Self {
        self.holiday_checker = Some(checker);
        self
    }

    pub fn with_day_times(mut self, day_start: NaiveTime, day_end: NaiveTime) -> Self {
        self.day_start = day_start;
        self.day_end = day_end;
        self
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub fn subscribe(&self, client_id: impl Into<String>, subscriber: Arc<dyn Subscriber>) {
        self.broadcaster.subscribe(client_id, subscriber);
    }

    pub fn unsubscribe(&self, client_id: &str) {
        self.broadcaster.unsubscribe(client_id);
    }

    pub fn connection_count(&self) -> usize {
        self.broadcaster.connection_count()
    }

    // ========================================================================
    // Write operations
    // ========================================================================

    pub fn create_task(
        &self,
        input: CreateTaskInput,
        source: &ClientContext,
    ) -> Result<Task, TaskError> {
        let _guard = self.writer();
        if input.name.trim().is_empty() {
            return Err(TaskError::Validation("Task name must not be empty".into()));
        }
        if let Some(priority) = input.priority {
            if priority <= 0 {
                return Err(TaskError::Validation(format!(
                    "Priority must be positive, got {priority}"
                )));
            }
        }
        if let Some(hours) = input.estimated_duration {
            if hours <= 0.0 {
                return Err(TaskError::Validation(format!(
                    "Estimated duration must be positive, got {hours}"
                )));
            }
        }
        if let Some(parent_id) = input.parent_id {
            // Existence check only; the parent's window follows later runs
            self.repository.get_by_id(parent_id)?;
        }

        let now = self.clock.now();
        let id = self.repository.generate_next_id()?;
        let mut task = Task::new(id, input.name, now);
        if let Some(priority) = input.priority {
            task.priority = priority;
        }
        task.estimated_duration = input.estimated_duration;
        task.deadline = input.deadline;
        task.tags = input.tags;
        task.parent_id = input.parent_id;
        self.repository.save(&task)?;
        info!(task_id = id, "task created");

        self.emit(
            EventKind::TaskCreated {
                task_id: task.id,
                name: task.name.clone(),
            },
            source,
        );
        Ok(task)
    }

    /// Apply a field patch. The emitted event names every changed field.
    pub fn update_task(
        &self,
        id: TaskId,
        patch: TaskPatch,
        source: &ClientContext,
    ) -> Result<Task, TaskError> {
        let _guard = self.writer();
        let mut task = self.repository.get_by_id(id)?;
        let now = self.clock.now();
        let mut updated_fields: Vec<String> = Vec::new();

        if let Some(name) = patch.name {
            task.rename(name, now)?;
            updated_fields.push("name".into());
        }
        if let Some(priority) = patch.priority {
            task.set_priority(priority, now)?;
            updated_fields.push("priority".into());
        }
        if let Some(deadline) = patch.deadline {
            task.set_deadline(deadline, now)?;
            updated_fields.push("deadline".into());
        }
        if let Some(estimate) = patch.estimated_duration {
            task.set_estimated_duration(estimate, now)?;
            updated_fields.push("estimated_duration".into());
        }
        if patch.planned_start.is_some() || patch.planned_end.is_some() {
            let start = patch.planned_start.unwrap_or(task.planned_start);
            let end = patch.planned_end.unwrap_or(task.planned_end);
            task.set_planned_window(start, end, now)?;
            if patch.planned_start.is_some() {
                updated_fields.push("planned_start".into());
            }
            if patch.planned_end.is_some() {
                updated_fields.push("planned_end".into());
            }
        }
        if let Some(is_fixed) = patch.is_fixed {
            task.is_fixed = is_fixed;
            task.updated_at = now;
            updated_fields.push("is_fixed".into());
        }
        if let Some(tags) = patch.tags {
            task.set_tags(tags, now)?;
            updated_fields.push("tags".into());
        }

        if updated_fields.is_empty() {
            return Ok(task);
        }
        self.repository.save(&task)?;
        debug!(task_id = id, fields = ?updated_fields, "task updated");

        self.emit(
            EventKind::TaskUpdated {
                task_id: task.id,
                name: task.name.clone(),
                updated_fields,
            },
            source,
        );
        Ok(task)
    }

    /// Add `task_id depends_on prereq_id`, keeping the graph acyclic.
    pub fn add_dependency(
        &self,
        task_id: TaskId,
        prereq_id: TaskId,
        source: &ClientContext,
    ) -> Result<Task, TaskError> {
        let _guard = self.writer();
        let all_tasks = self.repository.get_all()?;
        DependencyGraph::from_tasks(&all_tasks).validate_add(task_id, prereq_id)?;

        let mut task = self.repository.get_by_id(task_id)?;
        task.depends_on.insert(prereq_id);
        task.updated_at = self.clock.now();
        self.repository.save(&task)?;

        self.emit(
            EventKind::TaskUpdated {
                task_id: task.id,
                name: task.name.clone(),
                updated_fields: vec!["depends_on".into()],
            },
            source,
        );
        Ok(task)
    }

    pub fn remove_dependency(
        &self,
        task_id: TaskId,
        prereq_id: TaskId,
        source: &ClientContext,
    ) -> Result<Task, TaskError> {
        let _guard = self.writer();
        let all_tasks = self.repository.get_all()?;
        DependencyGraph::from_tasks(&all_tasks).validate_remove(task_id, prereq_id)?;

        let mut task = self.repository.get_by_id(task_id)?;
        task.depends_on.remove(&prereq_id);
        task.updated_at = self.clock.now();
        self.repository.save(&task)?;

        self.emit(
            EventKind::TaskUpdated {
                task_id: task.id,
                name: task.name.clone(),
                updated_fields: vec!["depends_on".into()],
            },
            source,
        );
        Ok(task)
    }

    pub fn set_tags(
        &self,
        id: TaskId,
        tags: BTreeSet<String>,
        source: &ClientContext,
    ) -> Result<Task, TaskError> {
        self.update_task(
            id,
            TaskPatch {
                tags: Some(tags),
                ..TaskPatch::default()
            },
            source,
        )
    }

    pub fn start_task(&self, id: TaskId, source: &ClientContext) -> Result<Task, TaskError> {
        self.transition(id, source, |task, now| task.start(now))
    }

    pub fn complete_task(&self, id: TaskId, source: &ClientContext) -> Result<Task, TaskError> {
        self.transition(id, source, |task, now| task.complete(now))
    }

    pub fn pause_task(&self, id: TaskId, source: &ClientContext) -> Result<Task, TaskError> {
        self.transition(id, source, |task, now| task.pause(now))
    }

    pub fn cancel_task(&self, id: TaskId, source: &ClientContext) -> Result<Task, TaskError> {
        self.transition(id, source, |task, now| task.cancel(now))
    }

    pub fn reopen_task(&self, id: TaskId, source: &ClientContext) -> Result<Task, TaskError> {
        self.transition(id, source, |task, now| task.reopen(now))
    }

    /// Pin a task's planned window and mark it fixed.
    pub fn fix_times(
        &self,
        id: TaskId,
        start: NaiveDateTime,
        end: NaiveDateTime,
        source: &ClientContext,
    ) -> Result<Task, TaskError> {
        let _guard = self.writer();
        let mut task = self.repository.get_by_id(id)?;
        task.fix_times(start, end, self.clock.now())?;
        self.repository.save(&task)?;

        self.emit(
            EventKind::TaskUpdated {
                task_id: task.id,
                name: task.name.clone(),
                updated_fields: vec![
                    "planned_start".into(),
                    "planned_end".into(),
                    "is_fixed".into(),
                ],
            },
            source,
        );
        Ok(task)
    }

    pub fn log_hours(
        &self,
        id: TaskId,
        date: NaiveDate,
        hours: f64,
        source: &ClientContext,
    ) -> Result<Task, TaskError> {
        let _guard = self.writer();
        let mut task = self.repository.get_by_id(id)?;
        task.log_hours(date, hours, self.clock.now())?;
        self.repository.save(&task)?;

        self.emit(
            EventKind::TaskUpdated {
                task_id: task.id,
                name: task.name.clone(),
                updated_fields: vec!["actual_daily_hours".into()],
            },
            source,
        );
        Ok(task)
    }

    pub fn archive_task(&self, id: TaskId, source: &ClientContext) -> Result<Task, TaskError> {
        let _guard = self.writer();
        let mut task = self.repository.get_by_id(id)?;
        task.archive(self.clock.now())?;
        self.repository.save(&task)?;

        self.emit(
            EventKind::TaskUpdated {
                task_id: task.id,
                name: task.name.clone(),
                updated_fields: vec!["is_archived".into()],
            },
            source,
        );
        Ok(task)
    }

    pub fn restore_task(&self, id: TaskId, source: &ClientContext) -> Result<Task, TaskError> {
        let _guard = self.writer();
        let mut task = self.repository.get_by_id(id)?;
        task.restore(self.clock.now())?;
        self.repository.save(&task)?;

        self.emit(
            EventKind::TaskUpdated {
                task_id: task.id,
                name: task.name.clone(),
                updated_fields: vec!["is_archived".into()],
            },
            source,
        );
        Ok(task)
    }

    /// Hard delete: removes the task, its notes, and any edges pointing
    /// at it.
    pub fn remove_task(&self, id: TaskId, source: &ClientContext) -> Result<(), TaskError> {
        let _guard = self.writer();
        let task = self.repository.get_by_id(id)?;
        self.repository.delete(id)?;
        self.notes.delete(id)?;

        let dependents: Vec<Task> = self
            .repository
            .get_all()?
            .into_iter()
            .filter(|t| t.depends_on.contains(&id))
            .map(|mut t| {
                t.depends_on.remove(&id);
                t.updated_at = self.clock.now();
                t
            })
            .collect();
        if !dependents.is_empty() {
            self.repository.save_all(&dependents)?;
        }
        info!(task_id = id, "task deleted");

        self.emit(
            EventKind::TaskDeleted {
                task_id: id,
                name: task.name,
            },
            source,
        );
        Ok(())
    }

    pub fn update_notes(
        &self,
        id: TaskId,
        content: &str,
        source: &ClientContext,
    ) -> Result<(), TaskError> {
        let _guard = self.writer();
        let task = self.repository.get_by_id(id)?;
        self.notes.write(id, content)?;

        self.emit(
            EventKind::TaskNotesUpdated {
                task_id: id,
                name: task.name,
            },
            source,
        );
        Ok(())
    }

    /// Run one schedule optimization and broadcast the outcome.
    pub fn optimize(
        &self,
        request: &OptimizeRequest,
        source: &ClientContext,
    ) -> Result<OptimizationOutput, TaskError> {
        let _guard = self.writer();
        let optimizer = ScheduleOptimizer::new(self.repository.as_ref())
            .with_day_times(self.day_start, self.day_end);
        let optimizer = match self.holiday_checker.as_deref() {
            Some(checker) => optimizer.with_holiday_checker(checker),
            None => optimizer,
        };
        let output = optimizer.run(request)?;

        self.emit(
            EventKind::ScheduleOptimized {
                scheduled_count: output.summary.scheduled_count,
                failed_count: output.summary.failed_count,
                algorithm: request.algorithm.clone(),
            },
            source,
        );
        Ok(output)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_task(&self, id: TaskId) -> Result<Task, TaskError> {
        self.repository.get_by_id(id)
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError> {
        Ok(query::filter_tasks(self.repository.get_all()?, filter))
    }

    pub fn get_task_detail(&self, id: TaskId) -> Result<TaskDetail, TaskError> {
        let task = self.repository.get_by_id(id)?;
        let notes = self.notes.read(id)?;
        let has_notes = notes.is_some();
        Ok(TaskDetail {
            task,
            notes,
            has_notes,
        })
    }

    pub fn read_notes(&self, id: TaskId) -> Result<Option<String>, TaskError> {
        self.repository.get_by_id(id)?;
        self.notes.read(id)
    }

    pub fn gantt_data(&self, from: NaiveDate, to: NaiveDate) -> Result<GanttData, TaskError> {
        let tasks = self.repository.get_all()?;
        let workdays = Workdays::new(self.holiday_checker.as_deref(), false);
        Ok(query::gantt_data(&tasks, from, to, &workdays))
    }

    pub fn tag_statistics(
        &self,
    ) -> Result<std::collections::BTreeMap<String, query::TagStats>, TaskError> {
        Ok(query::tag_statistics(&self.repository.get_all()?))
    }

    pub fn calculate_statistics(
        &self,
        period: StatisticsPeriod,
    ) -> Result<StatisticsReport, TaskError> {
        let tasks = self.repository.get_all()?;
        Ok(calculate_statistics(&tasks, period, self.clock.now()))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn transition(
        &self,
        id: TaskId,
        source: &ClientContext,
        apply: impl FnOnce(&mut Task, NaiveDateTime) -> Result<(), TaskError>,
    ) -> Result<Task, TaskError> {
        let _guard = self.writer();
        let mut task = self.repository.get_by_id(id)?;
        let old_status = task.status;
        apply(&mut task, self.clock.now())?;
        self.repository.save(&task)?;
        debug!(task_id = id, from = %old_status, to = %task.status, "status changed");

        self.emit(
            EventKind::TaskStatusChanged {
                task_id: task.id,
                name: task.name.clone(),
                old_status,
                new_status: task.status,
            },
            source,
        );
        Ok(task)
    }

    fn emit(&self, kind: EventKind, source: &ClientContext) {
        let event = ChangeEvent::new(kind, self.clock.now(), source);
        self.broadcaster.broadcast(&event);
    }

    fn writer(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|p| p.into_inner())
    }
}
