use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::TransportError;

/// Boxed future returned by [`Transport`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback invoked with `(topic, payload)` for every delivered message.
///
/// Handlers run on the delivering task and must not block.
pub type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Identifies one handler registration.
pub type SubscriptionId = u64;

/// Publish/subscribe connection to the broker.
///
/// One instance per client process. `connect` is idempotent; the other
/// methods connect lazily when no link is up.
pub trait Transport: Send + Sync {
    /// Establishes the broker link, or reuses the live one.
    fn connect(&self) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Publishes `payload` on `topic`. Resolves once the broker accepted it.
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        payload: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), TransportError>>;

    /// Registers `handler` for every topic matching `filter` (`+`/`#`
    /// wildcards allowed).
    fn subscribe<'a>(
        &'a self,
        filter: &'a str,
        handler: MessageHandler,
    ) -> BoxFuture<'a, Result<SubscriptionId, TransportError>>;

    /// Drops every handler registered for `filter`.
    fn unsubscribe<'a>(&'a self, filter: &'a str) -> BoxFuture<'a, Result<(), TransportError>>;
}

/// Configuration for automatic reconnection with exponential backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
    /// Dial attempts per `connect` before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
            max_attempts: 6,
        }
    }
}

impl ReconnectConfig {
    /// Calculates the delay for a given attempt number (1-based),
    /// with ±25% jitter so a fleet of clients does not redial in lockstep.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        let jitter = capped * 0.25;
        let offset = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / u32::MAX as f64)
            * 2.0
            - 1.0;
        let with_jitter = (capped + jitter * offset).max(0.05);
        Duration::from_secs_f64(with_jitter)
    }
}

/// Timing and size limits of the WebSocket bridge.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Interval between keepalive pings.
    pub ping_period: Duration,
    /// Link is declared dead when nothing arrives for this long.
    pub pong_wait: Duration,
    /// How long a publish/subscribe waits for the broker's ack.
    pub request_timeout: Duration,
    /// Largest accepted inbound frame.
    pub max_message_size: usize,
    pub reconnect: ReconnectConfig,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            ping_period: Duration::from_secs(5),
            pong_wait: Duration::from_secs(20),
            request_timeout: Duration::from_secs(10),
            max_message_size: 4 * 1024 * 1024,
            reconnect: ReconnectConfig::default(),
        }
    }
}
