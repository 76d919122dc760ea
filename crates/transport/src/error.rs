use tokio_tungstenite::tungstenite;

use crate::frame::FrameError;

/// Errors from a transport adapter.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("request timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("broker error: {0}")]
    Broker(String),

    #[error("invalid topic filter: {0}")]
    InvalidFilter(String),

    #[error("connect failed after {attempts} attempts: {last}")]
    ConnectFailed { attempts: u32, last: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(TransportError::Timeout.to_string(), "request timed out");
        assert_eq!(TransportError::Closed.to_string(), "connection closed");
        assert_eq!(
            TransportError::Broker("not authorized".into()).to_string(),
            "broker error: not authorized"
        );
        let err = TransportError::ConnectFailed {
            attempts: 3,
            last: "refused".into(),
        };
        assert!(err.to_string().contains("3 attempts"));
    }
}
