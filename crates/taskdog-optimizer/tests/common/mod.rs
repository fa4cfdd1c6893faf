//! Shared fixtures for optimizer integration tests.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{NaiveDate, NaiveDateTime};
use taskdog_core::{Task, TaskError, TaskId, TaskRepository};

/// Minimal task store for driving the orchestrator in tests.
pub struct MemoryRepository {
    tasks: RwLock<BTreeMap<TaskId, Task>>,
}

impl MemoryRepository {
    pub fn new(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: RwLock::new(tasks.into_iter().map(|t| (t.id, t)).collect()),
        }
    }
}

impl TaskRepository for MemoryRepository {
    fn get_all(&self) -> Result<Vec<Task>, TaskError> {
        Ok(self.tasks.read().unwrap().values().cloned().collect())
    }

    fn get_by_id(&self, id: TaskId) -> Result<Task, TaskError> {
        self.tasks
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(TaskError::NotFound(id))
    }

    fn save(&self, task: &Task) -> Result<(), TaskError> {
        self.tasks.write().unwrap().insert(task.id, task.clone());
        Ok(())
    }

    fn save_all(&self, tasks: &[Task]) -> Result<(), TaskError> {
        let mut store = self.tasks.write().unwrap();
        for task in tasks {
            store.insert(task.id, task.clone());
        }
        Ok(())
    }

    fn delete(&self, id: TaskId) -> Result<(), TaskError> {
        self.tasks
            .write()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(TaskError::NotFound(id))
    }

    fn generate_next_id(&self) -> Result<TaskId, TaskError> {
        Ok(self
            .tasks
            .read()
            .unwrap()
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0)
            + 1)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, 0, 0).unwrap()
}
