//! Background tasks of a WebSocket bridge link.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, oneshot};

use crate::frame::BridgeHeader;

pub(crate) mod ping;
pub(crate) mod read;
pub(crate) mod write;

/// Requests awaiting a broker ack, keyed by request id.
pub(crate) type PendingAcks = Arc<Mutex<HashMap<String, oneshot::Sender<BridgeHeader>>>>;
