//! # taskdog-core
//!
//! Core domain model and collaborator traits for the taskdog scheduling
//! engine.
//!
//! This crate provides:
//! - Domain types: [`Task`], [`TaskStatus`], [`ChangeEvent`]
//! - Collaborator traits: [`TaskRepository`], [`HolidayChecker`],
//!   [`NotesStore`], [`Subscriber`], [`Clock`]
//! - The [`TaskError`] type shared by every layer
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use taskdog_core::{Task, TaskStatus};
//!
//! let created = NaiveDate::from_ymd_opt(2025, 1, 6)
//!     .unwrap()
//!     .and_hms_opt(9, 0, 0)
//!     .unwrap();
//! let task = Task::new(1, "Write report", created)
//!     .priority(80)
//!     .estimated_duration(4.0)
//!     .tag("work");
//!
//! assert_eq!(task.status, TaskStatus::Pending);
//! assert!(task.validate_schedulable(false).is_ok());
//! ```

mod error;
mod event;
mod ports;
mod task;

pub use error::TaskError;
pub use event::{ChangeEvent, ClientContext, EventKind};
pub use ports::{Clock, HolidayChecker, NotesStore, Subscriber, TaskRepository};
pub use task::{Task, TaskId, TaskStatus};
