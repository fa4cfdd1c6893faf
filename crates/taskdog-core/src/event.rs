//! Change events fanned out to connected observers.
//!
//! The wire format is stable:
//!
//! ```json
//! { "type": "task_updated",
//!   "timestamp": "2025-01-06T09:00:00",
//!   "source_client_id": "client-a",
//!   "source_user_name": "alice",
//!   "payload": { "task_id": 7, "updated_fields": ["priority"] } }
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::task::{TaskId, TaskStatus};

/// Source attribution for a mutation: which client issued it, and under
/// which display name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub client_id: Option<String>,
    pub user_name: Option<String>,
}

impl ClientContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            user_name: None,
        }
    }

    pub fn named(client_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            user_name: Some(user_name.into()),
        }
    }
}

/// Event kind plus its kind-specific payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EventKind {
    Connected {
        client_id: String,
    },
    TaskCreated {
        task_id: TaskId,
        name: String,
    },
    TaskUpdated {
        task_id: TaskId,
        name: String,
        updated_fields: Vec<String>,
    },
    TaskDeleted {
        task_id: TaskId,
        name: String,
    },
    TaskStatusChanged {
        task_id: TaskId,
        name: String,
        old_status: TaskStatus,
        new_status: TaskStatus,
    },
    TaskNotesUpdated {
        task_id: TaskId,
        name: String,
    },
    ScheduleOptimized {
        scheduled_count: usize,
        failed_count: usize,
        algorithm: String,
    },
}

impl EventKind {
    /// The wire `type` tag, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Connected { .. } => "connected",
            EventKind::TaskCreated { .. } => "task_created",
            EventKind::TaskUpdated { .. } => "task_updated",
            EventKind::TaskDeleted { .. } => "task_deleted",
            EventKind::TaskStatusChanged { .. } => "task_status_changed",
            EventKind::TaskNotesUpdated { .. } => "task_notes_updated",
            EventKind::ScheduleOptimized { .. } => "schedule_optimized",
        }
    }
}

/// A single mutation, ready for fan-out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_user_name: Option<String>,
}

impl ChangeEvent {
    pub fn new(kind: EventKind, timestamp: NaiveDateTime, source: &ClientContext) -> Self {
        Self {
            kind,
            timestamp,
            source_client_id: source.client_id.clone(),
            source_user_name: source.user_name.clone(),
        }
    }

    /// Display attribution: the user name when non-empty, else the client id.
    pub fn source_display(&self) -> Option<&str> {
        match self.source_user_name.as_deref() {
            Some(name) if !name.is_empty() => Some(name),
            _ => self.source_client_id.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn wire_format_is_stable() {
        let event = ChangeEvent::new(
            EventKind::TaskUpdated {
                task_id: 7,
                name: "Report".into(),
                updated_fields: vec!["priority".into()],
            },
            ts(),
            &ClientContext::new("client-a"),
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "task_updated");
        assert_eq!(value["timestamp"], "2025-01-06T09:00:00");
        assert_eq!(value["source_client_id"], "client-a");
        assert_eq!(value["payload"]["task_id"], 7);
        assert_eq!(value["payload"]["updated_fields"][0], "priority");
    }

    #[test]
    fn status_change_payload_carries_both_statuses() {
        let event = ChangeEvent::new(
            EventKind::TaskStatusChanged {
                task_id: 3,
                name: "Task".into(),
                old_status: TaskStatus::Pending,
                new_status: TaskStatus::InProgress,
            },
            ts(),
            &ClientContext::anonymous(),
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["payload"]["old_status"], "PENDING");
        assert_eq!(value["payload"]["new_status"], "IN_PROGRESS");
        assert!(value.get("source_client_id").is_none());
    }

    #[test]
    fn event_round_trips() {
        let event = ChangeEvent::new(
            EventKind::ScheduleOptimized {
                scheduled_count: 5,
                failed_count: 2,
                algorithm: "greedy".into(),
            },
            ts(),
            &ClientContext::named("client-b", "bob"),
        );

        let json = serde_json::to_string(&event).unwrap();
        let back: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn user_name_preferred_over_client_id() {
        let named = ChangeEvent::new(
            EventKind::Connected {
                client_id: "c".into(),
            },
            ts(),
            &ClientContext::named("client-c", "carol"),
        );
        assert_eq!(named.source_display(), Some("carol"));

        let empty_name = ChangeEvent {
            source_user_name: Some(String::new()),
            ..named.clone()
        };
        assert_eq!(empty_name.source_display(), Some("client-c"));
    }
}
