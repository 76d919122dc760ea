use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last observed state of one controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusSnapshot {
    pub device_id: String,
    pub connected: bool,
    pub printing: bool,
    pub last_updated_at: DateTime<Utc>,
}

impl DeviceStatusSnapshot {
    /// Whether the fields consumers derive state from are equal.
    /// `last_updated_at` is ignored.
    pub fn same_observable_state(&self, connected: bool, printing: bool) -> bool {
        self.connected == connected && self.printing == printing
    }
}

/// Aggregate counts over every known device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub total: usize,
    pub connected: usize,
    pub printing: usize,
}

impl FleetSummary {
    pub(crate) fn from_snapshots<'a>(snapshots: impl Iterator<Item = &'a DeviceStatusSnapshot>) -> Self {
        snapshots.fold(Self::default(), |mut acc, s| {
            acc.total += 1;
            acc.connected += usize::from(s.connected);
            acc.printing += usize::from(s.printing);
            acc
        })
    }
}
