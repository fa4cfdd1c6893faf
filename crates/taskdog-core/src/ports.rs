//! Traits for external collaborators.
//!
//! The core reasons about tasks; durable storage, holiday lookup, note
//! files, transports and wall clocks stay behind these seams. All traits
//! take `&self` so one instance can be shared behind `Arc` across the
//! parallel-request service; implementations use interior mutability.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::TaskError;
use crate::event::ChangeEvent;
use crate::task::{Task, TaskId};

/// Durable task storage. Persistence durability and id uniqueness are its
/// responsibility.
pub trait TaskRepository: Send + Sync {
    fn get_all(&self) -> Result<Vec<Task>, TaskError>;

    fn get_by_id(&self, id: TaskId) -> Result<Task, TaskError>;

    fn save(&self, task: &Task) -> Result<(), TaskError>;

    /// Batched write: either every task is persisted or none.
    fn save_all(&self, tasks: &[Task]) -> Result<(), TaskError>;

    fn delete(&self, id: TaskId) -> Result<(), TaskError>;

    fn generate_next_id(&self) -> Result<TaskId, TaskError>;
}

/// Holiday lookup. An absent checker means only weekends are non-workdays.
pub trait HolidayChecker: Send + Sync {
    fn is_holiday(&self, date: NaiveDate) -> bool;
}

/// Markdown note storage, keyed by task id.
pub trait NotesStore: Send + Sync {
    fn read(&self, task_id: TaskId) -> Result<Option<String>, TaskError>;

    fn write(&self, task_id: TaskId, content: &str) -> Result<(), TaskError>;

    fn delete(&self, task_id: TaskId) -> Result<(), TaskError>;

    fn has(&self, task_id: TaskId) -> Result<bool, TaskError>;
}

/// A connected observer. A failed delivery drops the subscriber; there is
/// no retry.
pub trait Subscriber: Send + Sync {
    fn deliver(&self, event: &ChangeEvent) -> Result<(), TaskError>;
}

/// Wall clock, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}
