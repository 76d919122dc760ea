use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::fanin::Shared;
use crate::types::{DeviceStatusSnapshot, FleetSummary};

/// Read-only handle on the fleet status map.
#[derive(Clone)]
pub struct StatusView {
    pub(crate) shared: Arc<Shared>,
}

impl StatusView {
    pub fn get(&self, device_id: &str) -> Option<DeviceStatusSnapshot> {
        self.shared.read().get(device_id).cloned()
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.shared.read().contains_key(device_id)
    }

    /// Every snapshot, ordered by device id.
    pub fn snapshots(&self) -> Vec<DeviceStatusSnapshot> {
        let mut all: Vec<_> = self.shared.read().values().cloned().collect();
        all.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        all
    }

    pub fn summary(&self) -> FleetSummary {
        *self.shared.summary_tx.borrow()
    }

    /// Receiver that observes every aggregate change.
    pub fn subscribe_summary(&self) -> watch::Receiver<FleetSummary> {
        self.shared.summary_tx.subscribe()
    }

    /// Receiver of each snapshot written after this call.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<DeviceStatusSnapshot> {
        self.shared.changes_tx.subscribe()
    }
}
