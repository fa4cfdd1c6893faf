//! # taskdog-service
//!
//! Multi-client task service around the taskdog scheduling engine.
//!
//! This crate provides:
//! - [`TaskService`]: the request -> validate -> persist -> notify write
//!   path, plus queries (list, gantt, statistics)
//! - [`Broadcaster`]: change-event fan-out with originator suppression
//! - In-memory collaborator implementations for tests and embedding
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use taskdog_core::ClientContext;
//! use taskdog_service::{
//!     CreateTaskInput, FixedClock, InMemoryNotesStore, InMemoryTaskRepository, TaskService,
//! };
//!
//! let clock = Arc::new(FixedClock::new(
//!     NaiveDate::from_ymd_opt(2025, 1, 6)
//!         .unwrap()
//!         .and_hms_opt(9, 0, 0)
//!         .unwrap(),
//! ));
//! let service = TaskService::new(
//!     Arc::new(InMemoryTaskRepository::new()),
//!     Arc::new(InMemoryNotesStore::new()),
//!     clock,
//! );
//!
//! let task = service
//!     .create_task(CreateTaskInput::new("Write report"), &ClientContext::anonymous())
//!     .unwrap();
//! assert_eq!(service.get_task(task.id).unwrap().name, "Write report");
//! ```

pub mod broadcast;
pub mod memory;
pub mod query;
pub mod service;
pub mod stats;

pub use broadcast::Broadcaster;
pub use memory::{FixedClock, InMemoryNotesStore, InMemoryTaskRepository, SystemClock};
pub use query::{GanttData, GanttRow, SortKey, TagStats, TaskDetail, TaskFilter};
pub use service::{CreateTaskInput, TaskPatch, TaskService};
pub use stats::{
    calculate_statistics, DeadlineStats, EstimationStats, PriorityStats, StatisticsPeriod,
    StatisticsReport, TaskCounts, TimeStats, TrendStats,
};
