pub mod constants;
pub mod messages;
pub mod topics;
pub mod types;

// Re-export primary types for convenience.
pub use constants::MessageType;
pub use messages::{
    ChunkEnvelope, CommandMessage, CommandProgress, CommandResult, CommitMessage, DeviceReply,
    DeviceStatusMessage, PrinterStatus, UploadProgressReport, UploadResult,
};
pub use topics::Topics;
pub use types::{Correlation, Destination, DeviceCommand};

/// Errors produced while decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected message type: {0:?}")]
    UnexpectedType(MessageType),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}
