use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
};

use serde_json::Value;

pub(crate) type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Whether a listener is removed after its first delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Fires at most once. Used for request/response pairs.
    #[default]
    Once,
    /// Fires for every matching event until unsubscribed. Used for server push events.
    Persistent,
}

struct Listener {
    id: u64,
    kind: SubscriptionKind,
    handler: Handler,
}

/// Event name to listeners map.
///
/// Dispatch snapshots the matching handlers and releases the lock before calling them, so
/// handlers are free to subscribe or unsubscribe.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
}

impl ListenerRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Listener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add(
        self: &Arc<Self>,
        event: &str,
        kind: SubscriptionKind,
        handler: Handler,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .entry(event.to_owned())
            .or_default()
            .push(Listener { id, kind, handler });

        Subscription {
            event: event.to_owned(),
            id,
            registry: Arc::downgrade(self),
        }
    }

    fn remove(&self, event: &str, id: u64) {
        let mut listeners = self.lock();
        if let Some(list) = listeners.get_mut(event) {
            list.retain(|l| l.id != id);
            if list.is_empty() {
                listeners.remove(event);
            }
        }
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    /// Deliver `payload` to every listener of `event`. Returns the number of handlers called.
    pub(crate) fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let handlers: Vec<Handler> = {
            let mut listeners = self.lock();
            let Some(list) = listeners.get_mut(event) else {
                return 0;
            };
            let handlers = list.iter().map(|l| l.handler.clone()).collect();
            list.retain(|l| l.kind == SubscriptionKind::Persistent);
            if list.is_empty() {
                listeners.remove(event);
            }
            handlers
        };

        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }
}

/// Handle to a registered listener. Dropping it removes the listener.
#[must_use = "dropping a Subscription removes the listener"]
pub struct Subscription {
    event: String,
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    /// The event this subscription listens to.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Remove the listener now. Same as dropping the handle.
    pub fn unsubscribe(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.event, self.id);
        }
    }
}
