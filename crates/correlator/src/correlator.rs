use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use printlink_protocol::{DeviceReply, Topics};

use crate::{CorrelatorError, WaitKey};

/// Invoked with intermediate (progress) replies for a wait.
pub type ProgressCallback = Arc<dyn Fn(&DeviceReply) + Send + Sync>;

type Outcome = Result<DeviceReply, CorrelatorError>;

struct PendingWait {
    id: u64,
    tx: oneshot::Sender<Outcome>,
    deadline: Instant,
    progress: Option<ProgressCallback>,
}

/// The pending-wait table.
///
/// At most one wait per key. A wait leaves the table exactly once: on its
/// final reply, on deadline expiry, or when its handle is abandoned.
pub struct Correlator {
    topics: Topics,
    waits: Mutex<HashMap<WaitKey, PendingWait>>,
    next_id: AtomicU64,
}

impl Correlator {
    /// Creates a correlator for result topics of `topics`.
    pub fn new(topics: Topics) -> Arc<Self> {
        Arc::new(Self {
            topics,
            waits: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    /// Registers a wait that expires after `timeout`.
    pub fn register(
        self: &Arc<Self>,
        key: WaitKey,
        timeout: Duration,
    ) -> Result<PendingHandle, CorrelatorError> {
        self.insert(key, timeout, None)
    }

    /// Like [`register`](Self::register), also forwarding progress replies
    /// to `progress`.
    pub fn register_with_progress(
        self: &Arc<Self>,
        key: WaitKey,
        timeout: Duration,
        progress: ProgressCallback,
    ) -> Result<PendingHandle, CorrelatorError> {
        self.insert(key, timeout, Some(progress))
    }

    fn insert(
        self: &Arc<Self>,
        key: WaitKey,
        timeout: Duration,
        progress: Option<ProgressCallback>,
    ) -> Result<PendingHandle, CorrelatorError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Err(CorrelatorError::InvalidTimeout { key, timeout });
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        {
            let mut waits = self.lock();
            if waits.contains_key(&key) {
                return Err(CorrelatorError::Duplicate(key));
            }
            waits.insert(
                key.clone(),
                PendingWait {
                    id,
                    tx,
                    deadline,
                    progress,
                },
            );
        }
        trace!(%key, timeout_ms = timeout.as_millis() as u64, "registered wait");
        Ok(PendingHandle {
            key,
            id,
            rx: Some(rx),
            correlator: Arc::downgrade(self),
        })
    }

    /// Feeds one message from a result topic.
    ///
    /// Final replies resolve and remove their wait; progress replies invoke
    /// the wait's callback. Anything else is dropped with a debug log.
    pub fn on_message(&self, topic: &str, payload: &[u8]) {
        let reply = match DeviceReply::parse(payload) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(topic, error = %e, "dropping unparsable reply");
                return;
            }
        };

        let Some(device_id) = reply.device_id().or_else(|| self.topics.device_id(topic)) else {
            debug!(topic, "dropping reply without device id");
            return;
        };
        let key = WaitKey::new(device_id, reply.correlation());

        if reply.is_final() {
            let wait = self.lock().remove(&key);
            match wait {
                Some(wait) => {
                    debug!(%key, "resolved wait");
                    let _ = wait.tx.send(Ok(reply));
                }
                None => debug!(%key, "dropping unmatched reply"),
            }
        } else {
            let callback = self.lock().get(&key).and_then(|w| w.progress.clone());
            match callback {
                Some(cb) => cb(&reply),
                None => trace!(%key, "progress reply without listener"),
            }
        }
    }

    /// Rejects every wait whose deadline is at or before `now`.
    pub fn sweep(&self, now: Instant) -> usize {
        let expired: Vec<(WaitKey, PendingWait)> = {
            let mut waits = self.lock();
            let keys: Vec<WaitKey> = waits
                .iter()
                .filter(|(_, w)| w.deadline <= now)
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter()
                .filter_map(|k| waits.remove(&k).map(|w| (k, w)))
                .collect()
        };

        let count = expired.len();
        for (key, wait) in expired {
            warn!(%key, "no reply before deadline");
            let _ = wait.tx.send(Err(CorrelatorError::Timeout(key)));
        }
        count
    }

    /// Spawns the expiry scanner. It stops when `cancel` fires or the
    /// correlator is dropped.
    pub fn spawn_scanner(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(correlator) = weak.upgrade() else { break };
                        correlator.sweep(Instant::now());
                    }
                }
            }
            debug!("wait scanner stopped");
        })
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_pending(&self, key: &WaitKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Removes the wait for `key` if it is still registration `id`.
    fn abandon(&self, key: &WaitKey, id: u64) -> bool {
        let mut waits = self.lock();
        if waits.get(key).is_some_and(|w| w.id == id) {
            waits.remove(key);
            debug!(%key, "abandoned wait");
            true
        } else {
            false
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<WaitKey, PendingWait>> {
        self.waits.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The registrant's side of a pending wait.
///
/// Dropping an unresolved handle abandons the wait, so a late reply is
/// ignored.
pub struct PendingHandle {
    key: WaitKey,
    id: u64,
    rx: Option<oneshot::Receiver<Outcome>>,
    correlator: Weak<Correlator>,
}

impl PendingHandle {
    pub fn key(&self) -> &WaitKey {
        &self.key
    }

    /// Waits for the final reply or the deadline.
    ///
    /// Cancel-safe: dropping the future leaves the wait registered.
    pub async fn wait(&mut self) -> Result<DeviceReply, CorrelatorError> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(CorrelatorError::Abandoned(self.key.clone()));
        };
        let outcome = match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(CorrelatorError::Abandoned(self.key.clone())),
        };
        self.rx = None;
        outcome
    }

    /// Removes the wait now; a reply arriving later is dropped.
    pub fn abandon(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.rx.take().is_none() {
            return;
        }
        if let Some(correlator) = self.correlator.upgrade() {
            correlator.abandon(&self.key, self.id);
        }
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        self.release();
    }
}
