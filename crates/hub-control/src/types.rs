//! Data types for uploads and device commands.

use std::sync::Arc;
use std::time::Duration;

use printlink_protocol::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_COMMAND_RESULT_TIMEOUT, DEFAULT_SCAN_INTERVAL,
    DEFAULT_TOPIC_PREFIX, DEFAULT_UPLOAD_RESULT_TIMEOUT,
};
use printlink_protocol::{Destination, DeviceCommand};
use printlink_transfer::TransferState;

/// Per-upload tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// Raw bytes per chunk.
    pub chunk_size: usize,
    /// How long to wait for `upload_result` after the commit.
    pub result_timeout: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            result_timeout: DEFAULT_UPLOAD_RESULT_TIMEOUT,
        }
    }
}

/// Settings of a [`FleetClient`](crate::FleetClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetOptions {
    pub topic_prefix: String,
    pub upload: UploadOptions,
    pub command_timeout: Duration,
    /// Interval of the pending-wait expiry scanner.
    pub scan_interval: Duration,
}

impl Default for FleetOptions {
    fn default() -> Self {
        Self {
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            upload: UploadOptions::default(),
            command_timeout: DEFAULT_COMMAND_RESULT_TIMEOUT,
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }
}

/// One file to send to one device.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub device_id: String,
    pub filename: String,
    pub destination: Destination,
    pub data: Vec<u8>,
}

impl UploadRequest {
    pub fn new(device_id: &str, filename: &str, destination: Destination, data: Vec<u8>) -> Self {
        Self {
            device_id: device_id.to_string(),
            filename: filename.to_string(),
            destination,
            data,
        }
    }
}

/// How an upload that reached the controller ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The controller stored the file.
    Succeeded {
        filename: Option<String>,
        target: Option<String>,
    },
    /// The controller refused the file.
    Rejected { error: String },
    /// No result arrived before the deadline. The file may or may not be
    /// on the printer.
    Unconfirmed,
}

/// Summary of a finished upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub transfer_id: String,
    pub device_id: String,
    pub filename: String,
    pub total_size: u64,
    pub chunks_sent: u32,
    pub state: TransferState,
    pub outcome: UploadOutcome,
}

impl UploadReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, UploadOutcome::Succeeded { .. })
    }
}

/// Progress event emitted during an upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Started {
        transfer_id: String,
        device_id: String,
        filename: String,
        total_size: u64,
        chunks: usize,
    },
    /// A chunk publish returned.
    Progress {
        transfer_id: String,
        device_id: String,
        sent_bytes: u64,
        total_size: u64,
        percent: u8,
    },
    StateChanged {
        transfer_id: String,
        device_id: String,
        state: TransferState,
    },
    /// Intermediate report from the controller after the commit.
    ControllerProgress {
        transfer_id: String,
        device_id: String,
        received_bytes: Option<u64>,
        percent: Option<f64>,
    },
}

/// Receives [`UploadEvent`]s. Called inline, so it must not block.
pub type EventCallback = Arc<dyn Fn(&UploadEvent) + Send + Sync>;

/// How a device command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Succeeded,
    Rejected { error: String },
    Unconfirmed,
}

/// Summary of a sent command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    pub job_id: String,
    pub device_id: String,
    pub command: DeviceCommand,
    pub outcome: CommandOutcome,
}
