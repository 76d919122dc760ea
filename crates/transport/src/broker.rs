//! In-process broker.
//!
//! Every [`MemoryTransport`] obtained from one [`MemoryBroker`] shares the
//! same topic space. Delivery is synchronous: `publish` returns after every
//! matching handler ran, which keeps tests deterministic.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::TransportError;
use crate::filter::validate_filter;
use crate::registry::Subscriptions;
use crate::types::{BoxFuture, MessageHandler, SubscriptionId, Transport};

/// One message accepted by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct BrokerInner {
    clients: Mutex<Vec<Weak<Subscriptions>>>,
    log: Mutex<Vec<Published>>,
    /// Publishes fail once the log holds this many messages.
    fail_after: Mutex<Option<usize>>,
    redeliver: AtomicBool,
}

/// Shared in-memory topic space.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client attached to this broker.
    pub fn client(&self) -> MemoryTransport {
        MemoryTransport {
            broker: self.clone(),
            subs: Arc::new(Subscriptions::new()),
            connected: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        }
    }

    /// Delivers `payload` to every subscriber of `topic` without going
    /// through a client (no log entry, no failure injection).
    pub fn deliver(&self, topic: &str, payload: &[u8]) -> usize {
        let clients: Vec<Arc<Subscriptions>> = {
            let mut clients = self.inner.clients.lock().unwrap_or_else(|e| e.into_inner());
            clients.retain(|w| w.strong_count() > 0);
            clients.iter().filter_map(Weak::upgrade).collect()
        };
        let copies = if self.inner.redeliver.load(Ordering::Relaxed) {
            2
        } else {
            1
        };
        let mut handled = 0;
        for _ in 0..copies {
            for subs in &clients {
                handled += subs.dispatch(topic, payload);
            }
        }
        handled
    }

    /// Every accepted publish, oldest first.
    pub fn published(&self) -> Vec<Published> {
        self.inner
            .log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Accepted publishes on `topic`.
    pub fn published_on(&self, topic: &str) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .collect()
    }

    /// Makes every publish fail once `count` messages were accepted.
    /// `None` restores normal operation.
    pub fn fail_after(&self, count: Option<usize>) {
        *self.inner.fail_after.lock().unwrap_or_else(|e| e.into_inner()) = count;
    }

    /// Delivers every message twice, as an at-least-once broker may.
    pub fn set_redelivery(&self, on: bool) {
        self.inner.redeliver.store(on, Ordering::Relaxed);
    }

    fn attach(&self, subs: &Arc<Subscriptions>) {
        self.inner
            .clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::downgrade(subs));
    }

    fn accept(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut log = self.inner.log.lock().unwrap_or_else(|e| e.into_inner());
        let limit = *self.inner.fail_after.lock().unwrap_or_else(|e| e.into_inner());
        if limit.is_some_and(|n| log.len() >= n) {
            return Err(TransportError::Closed);
        }
        log.push(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

/// A client of a [`MemoryBroker`].
pub struct MemoryTransport {
    broker: MemoryBroker,
    subs: Arc<Subscriptions>,
    connected: AtomicBool,
    connects: AtomicUsize,
}

impl MemoryTransport {
    /// How many times a link was actually established.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }

    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    fn ensure_connected(&self) {
        if !self.connected.swap(true, Ordering::AcqRel) {
            self.broker.attach(&self.subs);
            self.connects.fetch_add(1, Ordering::Relaxed);
            debug!("memory transport connected");
        }
    }
}

impl Transport for MemoryTransport {
    fn connect(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            self.ensure_connected();
            Ok(())
        })
    }

    fn publish<'a>(
        &'a self,
        topic: &'a str,
        payload: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.ensure_connected();
            self.broker.accept(topic, &payload)?;
            self.broker.deliver(topic, &payload);
            // A network publish suspends; let concurrent publishers interleave.
            tokio::task::yield_now().await;
            Ok(())
        })
    }

    fn subscribe<'a>(
        &'a self,
        filter: &'a str,
        handler: MessageHandler,
    ) -> BoxFuture<'a, Result<SubscriptionId, TransportError>> {
        Box::pin(async move {
            validate_filter(filter)?;
            self.ensure_connected();
            let (id, _) = self.subs.add(filter, handler);
            Ok(id)
        })
    }

    fn unsubscribe<'a>(&'a self, filter: &'a str) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.subs.remove_filter(filter);
            Ok(())
        })
    }
}
