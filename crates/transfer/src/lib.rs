//! Chunked file transfer over a message bus.
//!
//! Splits a file into fixed-size slices, wraps each in a text-safe
//! [`ChunkEnvelope`](printlink_protocol::ChunkEnvelope), tracks the sender's
//! [`Transfer`] state machine and reassembles envelopes on the receive side.

mod assembler;
mod chunked;
mod progress;
mod types;
mod validation;

pub use assembler::{Accepted, AssembledFile, ChunkAssembler};
pub use chunked::{ChunkPlan, Envelopes, chunk_count, decode_payload, encode_payload, split};
pub use progress::progress_percent;
pub use types::{Transfer, TransferState, new_transfer_id};
pub use validation::validate_filename;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("chunk size must be between 1 and {max} bytes, got {got}")]
    InvalidChunkSize { got: usize, max: usize },

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("file too large: {0} chunks")]
    TooManyChunks(usize),

    #[error("payload decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition {
        from: TransferState,
        to: TransferState,
    },

    #[error("transfer id mismatch: expected {expected}, got {got}")]
    TransferMismatch { expected: String, got: String },

    #[error("unexpected chunk index: expected {expected}, got {got}")]
    UnexpectedChunk { expected: u32, got: u32 },

    #[error("chunk {index}: payloadLength {declared} but {actual} bytes decoded")]
    LengthMismatch {
        index: u32,
        declared: u64,
        actual: u64,
    },

    #[error("chunk 0 is missing file metadata")]
    MissingMetadata,

    #[error("received {received} bytes, more than the declared {total}")]
    Overflow { total: u64, received: u64 },

    #[error("incomplete transfer: {received} of {total} bytes")]
    Incomplete { total: u64, received: u64 },
}
