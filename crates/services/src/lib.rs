//! Collaborators the hub talks to but does not implement.
//!
//! Each is a trait with an in-memory implementation used by tests and the
//! command-line client, plus the HTTP [`DiagnosisClient`].

use std::future::Future;
use std::pin::Pin;

pub mod diagnosis;
pub mod records;
pub mod session;
pub mod store;

pub use diagnosis::{Diagnosis, DiagnosisClient, DiagnosisRequest};
pub use records::{GcodeFileRecord, MemoryRecordStore, PrinterRecord, RecordStore};
pub use session::{SessionProvider, StaticSession};
pub use store::{MemoryObjectStore, ObjectStore, content_hash};

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors from collaborator calls.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("no signed-in user")]
    Unauthenticated,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid API key")]
    InvalidKey,
}
