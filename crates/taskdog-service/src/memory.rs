//! In-memory collaborator implementations.
//!
//! Reference adapters used by tests and embedders; durable drivers live
//! outside this workspace and only need to honor the same traits.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use chrono::NaiveDateTime;
use taskdog_core::{Clock, NotesStore, Task, TaskError, TaskId, TaskRepository};

/// Task storage backed by a `BTreeMap`. `save_all` swaps every task in
/// under one write lock, so readers observe the batch atomically.
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<BTreeMap<TaskId, Task>>,
    next_id: AtomicU32,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let tasks: BTreeMap<TaskId, Task> = tasks.into_iter().map(|t| (t.id, t)).collect();
        let next_id = tasks.keys().next_back().copied().unwrap_or(0);
        Self {
            tasks: RwLock::new(tasks),
            next_id: AtomicU32::new(next_id),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<TaskId, Task>> {
        self.tasks.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<TaskId, Task>> {
        self.tasks.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl TaskRepository for InMemoryTaskRepository {
    fn get_all(&self) -> Result<Vec<Task>, TaskError> {
        Ok(self.read().values().cloned().collect())
    }

    fn get_by_id(&self, id: TaskId) -> Result<Task, TaskError> {
        self.read().get(&id).cloned().ok_or(TaskError::NotFound(id))
    }

    fn save(&self, task: &Task) -> Result<(), TaskError> {
        self.write().insert(task.id, task.clone());
        Ok(())
    }

    fn save_all(&self, tasks: &[Task]) -> Result<(), TaskError> {
        let mut store = self.write();
        for task in tasks {
            store.insert(task.id, task.clone());
        }
        Ok(())
    }

    fn delete(&self, id: TaskId) -> Result<(), TaskError> {
        self.write()
            .remove(&id)
            .map(|_| ())
            .ok_or(TaskError::NotFound(id))
    }

    fn generate_next_id(&self) -> Result<TaskId, TaskError> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Notes keyed by task id.
#[derive(Default)]
pub struct InMemoryNotesStore {
    notes: RwLock<BTreeMap<TaskId, String>>,
}

impl InMemoryNotesStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotesStore for InMemoryNotesStore {
    fn read(&self, task_id: TaskId) -> Result<Option<String>, TaskError> {
        Ok(self
            .notes
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&task_id)
            .cloned())
    }

    fn write(&self, task_id: TaskId, content: &str) -> Result<(), TaskError> {
        self.notes
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(task_id, content.to_string());
        Ok(())
    }

    fn delete(&self, task_id: TaskId) -> Result<(), TaskError> {
        self.notes
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&task_id);
        Ok(())
    }

    fn has(&self, task_id: TaskId) -> Result<bool, TaskError> {
        Ok(self
            .notes
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(&task_id))
    }
}

/// A clock pinned to a settable instant.
pub struct FixedClock {
    now: RwLock<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.write().unwrap_or_else(|p| p.into_inner()) = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.read().unwrap_or_else(|p| p.into_inner())
    }
}

/// Wall-clock time in the local timezone.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}
