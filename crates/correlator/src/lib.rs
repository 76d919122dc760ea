//! Pending-wait table for controller replies.
//!
//! A caller registers a [`WaitKey`] before publishing the message that will
//! provoke a reply, then awaits its [`PendingHandle`]. Replies arriving on
//! the result topics are fed to [`Correlator::on_message`]; a scanner task
//! rejects waits whose deadline passed.

mod correlator;
mod key;

pub use correlator::{Correlator, PendingHandle, ProgressCallback};
pub use key::WaitKey;

/// Errors produced by the correlator.
#[derive(Debug, thiserror::Error)]
pub enum CorrelatorError {
    #[error("a wait for {0} is already registered")]
    Duplicate(WaitKey),

    #[error("no reply for {0} before the deadline")]
    Timeout(WaitKey),

    #[error("wait for {0} was abandoned")]
    Abandoned(WaitKey),

    #[error("timeout {timeout:?} for {key} is out of range")]
    InvalidTimeout {
        key: WaitKey,
        timeout: std::time::Duration,
    },
}
