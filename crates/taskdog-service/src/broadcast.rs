//! Change-event fan-out to connected subscribers.
//!
//! Subscribers are keyed by client id. Delivery iterates over a snapshot
//! of the subscriber set so no lock is held across external I/O; any
//! subscriber whose delivery fails is removed without retry.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use taskdog_core::{ChangeEvent, ClientContext, Clock, EventKind, Subscriber};
use tracing::{info, warn};

/// Subscriber registry plus the fan-out path.
pub struct Broadcaster {
    subscribers: RwLock<BTreeMap<String, Arc<dyn Subscriber>>>,
    clock: Arc<dyn Clock>,
}

impl Broadcaster {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            subscribers: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    /// Register a subscriber and greet it with a `connected` event.
    /// Re-subscribing an existing client id replaces the previous
    /// subscriber.
    pub fn subscribe(&self, client_id: impl Into<String>, subscriber: Arc<dyn Subscriber>) {
        let client_id = client_id.into();
        let greeting = ChangeEvent::new(
            EventKind::Connected {
                client_id: client_id.clone(),
            },
            self.clock.now(),
            &ClientContext::anonymous(),
        );
        if let Err(err) = subscriber.deliver(&greeting) {
            warn!(client_id = %client_id, error = %err, "dropping subscriber at connect");
            return;
        }
        self.write_lock().insert(client_id.clone(), subscriber);
        info!(client_id = %client_id, "client connected");
    }

    /// Remove a subscriber. Unknown ids are a no-op.
    pub fn unsubscribe(&self, client_id: &str) {
        if self.write_lock().remove(client_id).is_some() {
            info!(client_id = %client_id, "client disconnected");
        }
    }

    pub fn connection_count(&self) -> usize {
        self.read_lock().len()
    }

    /// Deliver an event to every subscriber except the originator. Failed
    /// subscribers are dropped from the set.
    pub fn broadcast(&self, event: &ChangeEvent) {
        let targets: Vec<(String, Arc<dyn Subscriber>)> = self
            .read_lock()
            .iter()
            .filter(|(id, _)| event.source_client_id.as_deref() != Some(id.as_str()))
            .map(|(id, sub)| (id.clone(), Arc::clone(sub)))
            .collect();

        let mut failed = Vec::new();
        for (client_id, subscriber) in targets {
            if let Err(err) = subscriber.deliver(event) {
                warn!(
                    client_id = %client_id,
                    event = event.kind.name(),
                    error = %err,
                    "delivery failed, dropping subscriber"
                );
                failed.push(client_id);
            }
        }
        if !failed.is_empty() {
            let mut subscribers = self.write_lock();
            for client_id in failed {
                subscribers.remove(&client_id);
            }
        }
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Arc<dyn Subscriber>>> {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Arc<dyn Subscriber>>> {
        self.subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
