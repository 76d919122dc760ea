//! WebSocket bridge framing.
//!
//! Control traffic is a text frame holding a JSON [`BridgeHeader`]. Anything
//! carrying a payload is a binary frame:
//! `[4 bytes: header_len (big-endian)][header_len bytes: JSON header][rest: payload]`

use serde::{Deserialize, Serialize};

/// Header of every bridge frame, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum BridgeHeader {
    /// Client publish; binary frame, payload follows.
    Publish { id: String, topic: String },
    /// Client subscription; text frame.
    Subscribe { id: String, topic: String },
    /// Client unsubscription; text frame.
    Unsubscribe { id: String, topic: String },
    /// Broker accepted request `id`.
    Ack { id: String },
    /// Broker refused request `id`.
    Error { id: String, message: String },
    /// Broker delivery; binary frame, payload follows.
    Message { topic: String },
}

impl BridgeHeader {
    /// Request id for replies, `None` for deliveries.
    pub fn reply_id(&self) -> Option<&str> {
        match self {
            Self::Ack { id } | Self::Error { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// Errors from binary frame parsing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("message too short (need at least 4 bytes)")]
    TooShort,

    #[error("header truncated: expected {expected} bytes, got {got}")]
    HeaderTruncated { expected: usize, got: usize },

    #[error("invalid header JSON: {0}")]
    InvalidJson(String),
}

/// Encodes a binary frame.
pub fn encode_binary(header: &BridgeHeader, payload: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let header_json = serde_json::to_vec(header)?;
    let header_len = header_json.len() as u32;

    let mut buf = Vec::with_capacity(4 + header_json.len() + payload.len());
    buf.extend_from_slice(&header_len.to_be_bytes());
    buf.extend_from_slice(&header_json);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Splits a binary frame into its header and payload.
pub fn parse_binary(data: &[u8]) -> Result<(BridgeHeader, &[u8]), FrameError> {
    let Some((len_bytes, rest)) = data.split_first_chunk::<4>() else {
        return Err(FrameError::TooShort);
    };
    let header_len = u32::from_be_bytes(*len_bytes) as usize;

    if rest.len() < header_len {
        return Err(FrameError::HeaderTruncated {
            expected: header_len,
            got: rest.len(),
        });
    }

    let (header_bytes, payload) = rest.split_at(header_len);
    let header: BridgeHeader =
        serde_json::from_slice(header_bytes).map_err(|e| FrameError::InvalidJson(e.to_string()))?;
    Ok((header, payload))
}

/// Decodes a text frame.
pub fn parse_text(text: &str) -> Result<BridgeHeader, FrameError> {
    serde_json::from_str(text).map_err(|e| FrameError::InvalidJson(e.to_string()))
}
