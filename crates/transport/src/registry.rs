use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::filter::topic_matches;
use crate::types::{MessageHandler, SubscriptionId};

struct Entry {
    id: SubscriptionId,
    filter: String,
    handler: MessageHandler,
}

/// Local handler table shared by the transport adapters.
#[derive(Default)]
pub struct Subscriptions {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler. Returns its id and whether it is the first one for
    /// `filter` (the broker only needs to hear about new filters).
    pub fn add(&self, filter: &str, handler: MessageHandler) -> (SubscriptionId, bool) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let first = !entries.iter().any(|e| e.filter == filter);
        entries.push(Entry {
            id,
            filter: filter.to_string(),
            handler,
        });
        (id, first)
    }

    /// Removes every handler for `filter`, returning how many were dropped.
    pub fn remove_filter(&self, filter: &str) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|e| e.filter != filter);
        before - entries.len()
    }

    /// Removes one registration.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|e| e.id != id);
        before != entries.len()
    }

    /// Distinct filters, in registration order.
    pub fn filters(&self) -> Vec<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<String> = Vec::new();
        for e in entries.iter() {
            if !out.contains(&e.filter) {
                out.push(e.filter.clone());
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    /// Invokes every handler whose filter matches `topic`.
    ///
    /// Handlers are called after the table lock is released, so a handler
    /// may subscribe or publish without deadlocking.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> usize {
        let matched: Vec<MessageHandler> = {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries
                .iter()
                .filter(|e| topic_matches(&e.filter, topic))
                .map(|e| e.handler.clone())
                .collect()
        };
        trace!(topic, handlers = matched.len(), "dispatching message");
        for handler in &matched {
            handler(topic, payload);
        }
        matched.len()
    }
}
