//! Hub control error types.

use printlink_protocol::MessageType;

/// Errors produced while driving uploads and commands.
///
/// Controller rejections and missing confirmations are not errors; they are
/// reported through [`UploadOutcome`](crate::UploadOutcome) and
/// [`CommandOutcome`](crate::CommandOutcome).
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("transport error: {0}")]
    Transport(#[from] printlink_transport::TransportError),

    #[error("transfer error: {0}")]
    Transfer(#[from] printlink_transfer::TransferError),

    #[error("correlation error: {0}")]
    Correlator(#[from] printlink_correlator::CorrelatorError),

    #[error("service error: {0}")]
    Service(#[from] printlink_services::ServiceError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("fleet client not started")]
    NotStarted,

    #[error("cancelled")]
    Cancelled,

    #[error("unexpected reply: {0:?}")]
    UnexpectedReply(MessageType),

    #[error("stored file {file_id} does not match its recorded hash")]
    Integrity { file_id: String },
}
