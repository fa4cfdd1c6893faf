//! Error types shared across the taskdog crates.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::task::{TaskId, TaskStatus};

/// Domain error
///
/// Tagged variants, no shared base: each failure class carries exactly the
/// context its handlers need. Validation, NotFound, AlreadyFinished and
/// NoSchedulableTasks propagate to the caller untouched; Connection is
/// recovered locally by dropping the failing subscriber; CorruptedData
/// halts startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskError {
    #[error("Task {0} not found")]
    NotFound(TaskId),

    #[error("Tasks not found: {0:?}")]
    NotFoundMany(Vec<TaskId>),

    #[error("{0}")]
    Validation(String),

    #[error("Task {task_id} is not schedulable: {reason}")]
    NotSchedulable { task_id: TaskId, reason: String },

    #[error("No schedulable tasks among {task_ids:?}")]
    NoSchedulableTasks {
        task_ids: Vec<TaskId>,
        /// Per-task rejection reasons collected during the filter pass.
        reasons: BTreeMap<TaskId, String>,
    },

    #[error("Task {task_id} is already finished ({status})")]
    AlreadyFinished { task_id: TaskId, status: TaskStatus },

    #[error("Corrupted task data: {0}")]
    CorruptedData(String),

    #[error("Subscriber connection failed: {0}")]
    Connection(String),
}
