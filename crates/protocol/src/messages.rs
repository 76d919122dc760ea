use serde::{Deserialize, Deserializer, Serialize};

use crate::ProtocolError;
use crate::constants::MessageType;
use crate::types::{Correlation, Destination, DeviceCommand};

// ---------------------------------------------------------------------------
// Client to controller: upload
// ---------------------------------------------------------------------------

/// One slice of a transfer.
///
/// Chunk 0 also carries the file metadata the controller needs to allocate
/// its receive buffer; later chunks omit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEnvelope {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub transfer_id: String,
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
    /// Text-encoded slice bytes.
    pub payload: String,
    /// Raw (decoded) byte count of `payload`.
    pub payload_length: u64,
}

impl ChunkEnvelope {
    /// Builds chunk 0 with file metadata.
    pub fn first(
        transfer_id: &str,
        filename: &str,
        total_size: u64,
        destination: Destination,
        payload: String,
        payload_length: u64,
    ) -> Self {
        Self {
            msg_type: MessageType::Chunk,
            transfer_id: transfer_id.to_string(),
            index: 0,
            filename: Some(filename.to_string()),
            total_size: Some(total_size),
            destination: Some(destination),
            payload,
            payload_length,
        }
    }

    /// Builds a minimal envelope for `index > 0`.
    pub fn next(transfer_id: &str, index: u32, payload: String, payload_length: u64) -> Self {
        debug_assert!(index > 0, "chunk 0 must carry metadata");
        Self {
            msg_type: MessageType::Chunk,
            transfer_id: transfer_id.to_string(),
            index,
            filename: None,
            total_size: None,
            destination: None,
            payload,
            payload_length,
        }
    }

    /// Returns `true` for the metadata-bearing first chunk.
    pub fn is_first(&self) -> bool {
        self.index == 0
    }
}

/// Signals that every chunk of a transfer has been published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitMessage {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub transfer_id: String,
    pub destination: Destination,
}

impl CommitMessage {
    pub fn new(transfer_id: &str, destination: Destination) -> Self {
        Self {
            msg_type: MessageType::Commit,
            transfer_id: transfer_id.to_string(),
            destination,
        }
    }
}

// ---------------------------------------------------------------------------
// Client to controller: commands
// ---------------------------------------------------------------------------

/// A correlated device command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMessage {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub device_id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Destination>,
}

impl CommandMessage {
    pub fn new(device_id: &str, job_id: &str, command: &DeviceCommand) -> Self {
        let (msg_type, filename, origin) = match command {
            DeviceCommand::Print { filename, origin } => {
                (MessageType::Print, Some(filename.clone()), Some(*origin))
            }
            DeviceCommand::Pause => (MessageType::Pause, None, None),
            DeviceCommand::Resume => (MessageType::Resume, None, None),
            DeviceCommand::Cancel => (MessageType::Cancel, None, None),
        };
        Self {
            msg_type,
            device_id: device_id.to_string(),
            job_id: job_id.to_string(),
            filename,
            origin,
        }
    }
}

// ---------------------------------------------------------------------------
// Controller to client: replies
// ---------------------------------------------------------------------------

/// Final outcome of an upload, published after the commit was processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub transfer_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Intermediate receive/validation progress reported by a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgressReport {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub transfer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

/// Final outcome of a device command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub job_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Intermediate progress of a long-running command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandProgress {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

/// Any message a controller publishes on its result topic.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceReply {
    UploadResult(UploadResult),
    UploadProgress(UploadProgressReport),
    CommandResult(CommandResult),
    CommandProgress(CommandProgress),
}

#[derive(Deserialize)]
struct TypePeek {
    #[serde(rename = "type", default = "unknown_type")]
    msg_type: MessageType,
}

fn unknown_type() -> MessageType {
    MessageType::Unknown
}

impl DeviceReply {
    /// Decodes a result-topic payload.
    ///
    /// Peeks at `type` first, then decodes the matching struct. Non-reply
    /// types produce [`ProtocolError::UnexpectedType`].
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let peek: TypePeek = serde_json::from_slice(payload)?;
        match peek.msg_type {
            MessageType::UploadResult => Ok(Self::UploadResult(serde_json::from_slice(payload)?)),
            MessageType::UploadProgress => {
                Ok(Self::UploadProgress(serde_json::from_slice(payload)?))
            }
            MessageType::CommandResult => {
                Ok(Self::CommandResult(serde_json::from_slice(payload)?))
            }
            MessageType::CommandProgress => {
                Ok(Self::CommandProgress(serde_json::from_slice(payload)?))
            }
            other => Err(ProtocolError::UnexpectedType(other)),
        }
    }

    pub fn msg_type(&self) -> MessageType {
        match self {
            Self::UploadResult(_) => MessageType::UploadResult,
            Self::UploadProgress(_) => MessageType::UploadProgress,
            Self::CommandResult(_) => MessageType::CommandResult,
            Self::CommandProgress(_) => MessageType::CommandProgress,
        }
    }

    /// The transfer or job this reply belongs to.
    pub fn correlation(&self) -> Correlation {
        match self {
            Self::UploadResult(r) => Correlation::Transfer(r.transfer_id.clone()),
            Self::UploadProgress(p) => Correlation::Transfer(p.transfer_id.clone()),
            Self::CommandResult(r) => Correlation::Job(r.job_id.clone()),
            Self::CommandProgress(p) => Correlation::Job(p.job_id.clone()),
        }
    }

    /// Device id embedded in the payload, if the controller sent one.
    pub fn device_id(&self) -> Option<&str> {
        let id = match self {
            Self::UploadResult(r) => r.device_id.as_deref(),
            Self::UploadProgress(p) => p.device_id.as_deref(),
            Self::CommandResult(r) => r.device_id.as_deref(),
            Self::CommandProgress(p) => p.device_id.as_deref(),
        };
        id.filter(|s| !s.is_empty())
    }

    /// Returns `true` if this reply completes its pending wait.
    pub fn is_final(&self) -> bool {
        self.msg_type().is_final_reply()
    }
}

// ---------------------------------------------------------------------------
// Controller to client: status
// ---------------------------------------------------------------------------

/// Nested printer state inside a status heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrinterStatus {
    #[serde(default, deserialize_with = "null_as_false")]
    pub printing: bool,
}

/// Controllers report an unknown flag as `null`; it reads as `false`.
fn null_as_false<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(d)?.unwrap_or(false))
}

/// Periodic status heartbeat.
///
/// Controllers publish many more fields; only the ones this layer derives
/// aggregates from are decoded, the rest are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub connected: bool,
    #[serde(rename = "printer_status", default, skip_serializing_if = "Option::is_none")]
    pub printer_status: Option<PrinterStatus>,
}

impl DeviceStatusMessage {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// `printer_status.printing`, `false` when the nested object is absent.
    pub fn printing(&self) -> bool {
        self.printer_status.as_ref().is_some_and(|s| s.printing)
    }
}
