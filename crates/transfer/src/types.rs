use std::fmt;

use serde::{Deserialize, Serialize};

use printlink_protocol::Destination;

use crate::{TransferError, progress_percent};

/// Generates a fresh transfer id (UUID v4, simple form).
pub fn new_transfer_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Lifecycle of one transfer, seen from the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferState {
    Sending,
    Committing,
    AwaitingResult,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl TransferState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Committing => "committing",
            Self::AwaitingResult => "awaiting-result",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed-out",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }

    /// Whether `self -> next` is a legal edge of the state machine.
    pub fn can_advance_to(self, next: TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (Sending, Committing | Failed | Cancelled) => true,
            (Committing, AwaitingResult | Failed | Cancelled) => true,
            (AwaitingResult, Succeeded | Failed | TimedOut | Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upload, owned and mutated by a single sender.
#[derive(Debug, Clone)]
pub struct Transfer {
    transfer_id: String,
    device_id: String,
    filename: String,
    total_size: u64,
    destination: Destination,
    chunk_size: usize,
    sent_bytes: u64,
    chunks_sent: u32,
    state: TransferState,
    error: Option<String>,
}

impl Transfer {
    /// Creates a transfer in the `sending` state.
    pub fn new(
        transfer_id: String,
        device_id: &str,
        filename: &str,
        total_size: u64,
        destination: Destination,
        chunk_size: usize,
    ) -> Self {
        Self {
            transfer_id,
            device_id: device_id.to_string(),
            filename: filename.to_string(),
            total_size,
            destination,
            chunk_size,
            sent_bytes: 0,
            chunks_sent: 0,
            state: TransferState::Sending,
            error: None,
        }
    }

    /// Records a published chunk of `len` raw bytes.
    pub fn record_chunk(&mut self, len: u64) -> Result<(), TransferError> {
        if self.state != TransferState::Sending {
            return Err(TransferError::InvalidTransition {
                from: self.state,
                to: TransferState::Sending,
            });
        }
        let sent = self.sent_bytes + len;
        if sent > self.total_size {
            return Err(TransferError::Overflow {
                total: self.total_size,
                received: sent,
            });
        }
        self.sent_bytes = sent;
        self.chunks_sent += 1;
        Ok(())
    }

    /// Moves to `next`, rejecting illegal edges and any exit from a terminal
    /// state.
    pub fn advance(&mut self, next: TransferState) -> Result<(), TransferError> {
        if !self.state.can_advance_to(next) {
            return Err(TransferError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Moves to `failed`, keeping the reason.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransferError> {
        self.advance(TransferState::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Current percentage: 100 only once succeeded.
    pub fn progress(&self) -> u8 {
        match self.state {
            TransferState::Succeeded => 100,
            _ if self.chunks_sent == 0 => 0,
            _ => progress_percent(self.sent_bytes, self.total_size),
        }
    }

    pub fn transfer_id(&self) -> &str {
        &self.transfer_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes
    }

    pub fn chunks_sent(&self) -> u32 {
        self.chunks_sent
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
