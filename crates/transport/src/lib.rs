//! Publish/subscribe transport for controller messaging.
//!
//! [`Transport`] is the seam the rest of the workspace talks to. Two
//! adapters ship here: [`MemoryBroker`] (in-process, used by tests and
//! simulations) and [`WsTransport`] (a WebSocket bridge to a broker).

mod broker;
mod error;
pub mod filter;
pub mod frame;
mod pumps;
mod registry;
mod types;
pub mod ws_client;

pub use broker::{MemoryBroker, MemoryTransport, Published};
pub use error::TransportError;
pub use filter::{topic_matches, validate_filter};
pub use registry::Subscriptions;
pub use types::{BoxFuture, MessageHandler, ReconnectConfig, SubscriptionId, Transport, WsConfig};
pub use ws_client::WsTransport;
