use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use printlink_protocol::{DeviceStatusMessage, Topics};
use printlink_transport::{SubscriptionId, Transport, TransportError};

use crate::types::{DeviceStatusSnapshot, FleetSummary};
use crate::view::StatusView;

const CHANGES_CAPACITY: usize = 256;

pub(crate) struct Shared {
    devices: RwLock<HashMap<String, DeviceStatusSnapshot>>,
    pub(crate) summary_tx: watch::Sender<FleetSummary>,
    pub(crate) changes_tx: broadcast::Sender<DeviceStatusSnapshot>,
}

impl Shared {
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, HashMap<String, DeviceStatusSnapshot>> {
        self.devices.read().unwrap_or_else(|e| e.into_inner())
    }

    fn apply(&self, device_id: &str, msg: &DeviceStatusMessage) -> bool {
        let connected = msg.connected;
        let printing = msg.printing();

        let mut devices = self.devices.write().unwrap_or_else(|e| e.into_inner());
        if devices
            .get(device_id)
            .is_some_and(|s| s.same_observable_state(connected, printing))
        {
            return false;
        }
        let snapshot = DeviceStatusSnapshot {
            device_id: device_id.to_string(),
            connected,
            printing,
            last_updated_at: Utc::now(),
        };
        if devices.insert(device_id.to_string(), snapshot.clone()).is_none() {
            info!(device = %device_id, "new device on status topic");
        }
        debug!(device = %device_id, connected, printing, "device status changed");

        // Published under the write guard so summaries land in map order.
        let summary = FleetSummary::from_snapshots(devices.values());
        self.summary_tx.send_if_modified(|current| {
            let modified = *current != summary;
            *current = summary;
            modified
        });
        let _ = self.changes_tx.send(snapshot);
        drop(devices);
        true
    }
}

/// The single writer of the fleet status map.
///
/// Owned by the composition root; consumers get a [`StatusView`].
pub struct StatusFanIn {
    shared: Arc<Shared>,
}

impl Default for StatusFanIn {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusFanIn {
    pub fn new() -> Self {
        let (summary_tx, _) = watch::channel(FleetSummary::default());
        let (changes_tx, _) = broadcast::channel(CHANGES_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                devices: RwLock::new(HashMap::new()),
                summary_tx,
                changes_tx,
            }),
        }
    }

    pub fn view(&self) -> StatusView {
        StatusView {
            shared: self.shared.clone(),
        }
    }

    /// Applies one status payload for `device_id`.
    ///
    /// Returns whether a new snapshot was written. Payloads that do not
    /// decode are dropped.
    pub fn on_status_message(&self, device_id: &str, payload: &[u8]) -> bool {
        match DeviceStatusMessage::parse(payload) {
            Ok(msg) => self.shared.apply(device_id, &msg),
            Err(e) => {
                debug!(device = %device_id, error = %e, "dropping unparsable status");
                false
            }
        }
    }

    /// Subscribes to every device's status topic.
    pub async fn attach<T>(&self, transport: &T, topics: &Topics) -> Result<SubscriptionId, TransportError>
    where
        T: Transport + ?Sized,
    {
        let shared = self.shared.clone();
        let scheme = topics.clone();
        let filter = topics.status_filter();
        let id = transport
            .subscribe(
                &filter,
                Arc::new(move |topic: &str, payload: &[u8]| {
                    let msg = match DeviceStatusMessage::parse(payload) {
                        Ok(msg) => msg,
                        Err(e) => {
                            debug!(topic, error = %e, "dropping unparsable status");
                            return;
                        }
                    };
                    match status_device_id(&scheme, topic, &msg) {
                        Some(device) => {
                            shared.apply(device, &msg);
                        }
                        None => debug!(topic, "status without device id"),
                    }
                }),
            )
            .await?;
        info!(filter = %filter, "status fan-in attached");
        Ok(id)
    }
}

/// Device segment of the topic, else the payload's `deviceId`.
fn status_device_id<'a>(topics: &Topics, topic: &'a str, msg: &'a DeviceStatusMessage) -> Option<&'a str> {
    topics
        .device_id(topic)
        .or_else(|| msg.device_id.as_deref().filter(|id| !id.is_empty()))
}
