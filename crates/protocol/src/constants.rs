use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Raw bytes carried by one chunk before text encoding (32 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Largest accepted chunk size.
///
/// Base64 inflates a chunk by a third; 512 KiB raw stays well below the
/// 1 MiB message limit common to brokers.
pub const MAX_CHUNK_SIZE: usize = 512 * 1024;

/// How long an upload waits for `upload_result` after the commit.
///
/// Controllers validate and persist the whole file before replying, which
/// can take a while for tens of MiB on slow SD cards.
pub const DEFAULT_UPLOAD_RESULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a device command waits for its `command_result`.
pub const DEFAULT_COMMAND_RESULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Interval of the pending-wait expiry scanner.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(250);

/// Topic prefix used when none is configured.
pub const DEFAULT_TOPIC_PREFIX: &str = "printers";

/// Progress never reaches 100% before the controller confirms the upload.
pub const MAX_UNCONFIRMED_PROGRESS: u8 = 99;

/// Wire message type identifier (the `type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Client to controller: upload
    #[serde(rename = "chunk")]
    Chunk,
    #[serde(rename = "commit")]
    Commit,

    // Client to controller: commands
    #[serde(rename = "print")]
    Print,
    #[serde(rename = "pause")]
    Pause,
    #[serde(rename = "resume")]
    Resume,
    #[serde(rename = "cancel")]
    Cancel,

    // Controller to client
    #[serde(rename = "upload_result")]
    UploadResult,
    #[serde(rename = "upload_progress")]
    UploadProgress,
    #[serde(rename = "command_result")]
    CommandResult,
    #[serde(rename = "command_progress")]
    CommandProgress,

    /// Forward compatibility: unknown message types deserialize here.
    #[serde(other)]
    Unknown,
}

impl MessageType {
    /// Returns `true` for controller replies that complete a pending wait.
    pub fn is_final_reply(self) -> bool {
        matches!(self, MessageType::UploadResult | MessageType::CommandResult)
    }

    /// Returns `true` for controller replies that only report progress.
    pub fn is_progress_reply(self) -> bool {
        matches!(
            self,
            MessageType::UploadProgress | MessageType::CommandProgress
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_serialization() {
        assert_eq!(
            serde_json::to_string(&MessageType::Chunk).unwrap(),
            "\"chunk\""
        );
        assert_eq!(
            serde_json::to_string(&MessageType::UploadResult).unwrap(),
            "\"upload_result\""
        );
        assert_eq!(
            serde_json::to_string(&MessageType::CommandProgress).unwrap(),
            "\"command_progress\""
        );
    }

    #[test]
    fn message_type_deserialization() {
        let mt: MessageType = serde_json::from_str("\"commit\"").unwrap();
        assert_eq!(mt, MessageType::Commit);
    }

    #[test]
    fn unknown_message_type() {
        let mt: MessageType = serde_json::from_str("\"firmware_update\"").unwrap();
        assert_eq!(mt, MessageType::Unknown);
    }

    #[test]
    fn reply_classification() {
        assert!(MessageType::UploadResult.is_final_reply());
        assert!(MessageType::CommandResult.is_final_reply());
        assert!(!MessageType::UploadProgress.is_final_reply());
        assert!(MessageType::UploadProgress.is_progress_reply());
        assert!(!MessageType::Chunk.is_progress_reply());
        assert!(!MessageType::Unknown.is_final_reply());
    }

    #[test]
    fn base64_chunk_fits_under_one_mebibyte() {
        let encoded = MAX_CHUNK_SIZE.div_ceil(3) * 4;
        assert!(encoded < 1024 * 1024);
    }
}
