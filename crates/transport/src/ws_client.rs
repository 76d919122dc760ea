//! WebSocket bridge to a publish/subscribe broker.
//!
//! Publishes and subscriptions are requests correlated by UUID and
//! acknowledged by the broker; deliveries are pushed as binary frames and
//! dispatched to the local [`Subscriptions`]. The link is dialed lazily and
//! redialed with backoff after it dies, re-sending every subscription.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::TransportError;
use crate::filter::validate_filter;
use crate::frame::{BridgeHeader, encode_binary};
use crate::pumps::PendingAcks;
use crate::pumps::read::ReadLimits;
use crate::registry::Subscriptions;
use crate::types::{BoxFuture, MessageHandler, SubscriptionId, Transport, WsConfig};

/// One live WebSocket connection and its pumps.
struct Link {
    write_tx: mpsc::Sender<tungstenite::Message>,
    pending: PendingAcks,
    cancel: CancellationToken,
    handles: [JoinHandle<()>; 3],
}

impl Link {
    fn is_alive(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    fn requester(&self) -> Requester {
        Requester {
            write_tx: self.write_tx.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.cancel.cancel();
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Sends acknowledged requests over a link.
#[derive(Clone)]
struct Requester {
    write_tx: mpsc::Sender<tungstenite::Message>,
    pending: PendingAcks,
}

impl Requester {
    async fn request(
        &self,
        id: String,
        frame: tungstenite::Message,
        timeout: std::time::Duration,
    ) -> Result<(), TransportError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self.write_tx.send(frame).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(TransportError::Closed);
        }

        let result = tokio::time::timeout(timeout, rx).await;

        // Clean up pending entry on any exit path.
        self.pending.lock().await.remove(&id);

        match result {
            Ok(Ok(BridgeHeader::Ack { .. })) => Ok(()),
            Ok(Ok(BridgeHeader::Error { message, .. })) => Err(TransportError::Broker(message)),
            Ok(Ok(other)) => Err(TransportError::Broker(format!(
                "unexpected reply: {other:?}"
            ))),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn control(
        &self,
        header: BridgeHeader,
        id: String,
        timeout: std::time::Duration,
    ) -> Result<(), TransportError> {
        let json = serde_json::to_string(&header)?;
        self.request(id, tungstenite::Message::Text(json.into()), timeout)
            .await
    }
}

fn request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// [`Transport`] over a WebSocket broker bridge.
pub struct WsTransport {
    url: String,
    config: WsConfig,
    subs: Arc<Subscriptions>,
    link: Mutex<Option<Link>>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, config: WsConfig) -> Self {
        Self {
            url: url.into(),
            config,
            subs: Arc::new(Subscriptions::new()),
            link: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns `true` while a link is up.
    pub async fn is_connected(&self) -> bool {
        self.link.lock().await.as_ref().is_some_and(Link::is_alive)
    }

    /// Closes the link. The next operation dials again.
    pub async fn close(&self) {
        if let Some(link) = self.link.lock().await.take() {
            let _ = link.write_tx.send(tungstenite::Message::Close(None)).await;
            info!(url = %self.url, "broker link closed");
        }
    }

    /// Returns a requester for the live link, dialing if needed.
    async fn live(&self) -> Result<Requester, TransportError> {
        let mut guard = self.link.lock().await;
        if let Some(link) = guard.as_ref().filter(|l| l.is_alive()) {
            return Ok(link.requester());
        }
        if guard.take().is_some() {
            info!(url = %self.url, "broker link lost, redialing");
        }

        let link = self.dial().await?;
        let requester = link.requester();
        *guard = Some(link);

        for filter in self.subs.filters() {
            let id = request_id();
            let header = BridgeHeader::Subscribe {
                id: id.clone(),
                topic: filter.clone(),
            };
            if let Err(e) = requester
                .control(header, id, self.config.request_timeout)
                .await
            {
                warn!(%filter, error = %e, "re-subscribe failed");
                guard.take();
                return Err(e);
            }
            debug!(%filter, "re-subscribed");
        }

        Ok(requester)
    }

    /// Dials with exponential backoff.
    async fn dial(&self) -> Result<Link, TransportError> {
        let max_attempts = self.config.reconnect.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.open_link().await {
                Ok(link) => {
                    info!(url = %self.url, attempt, "broker link established");
                    return Ok(link);
                }
                Err(e) if attempt >= max_attempts => {
                    return Err(TransportError::ConnectFailed {
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.config.reconnect.delay_for_attempt(attempt);
                    warn!(
                        url = %self.url,
                        attempt,
                        error = %e,
                        delay_secs = format_args!("{:.1}", delay.as_secs_f64()),
                        "dial failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn open_link(&self) -> Result<Link, TransportError> {
        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);
        ws_config.max_frame_size = Some(self.config.max_message_size);
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(self.url.as_str(), Some(ws_config), false)
                .await?;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(256);
        let pending: PendingAcks = Arc::new(Mutex::new(Default::default()));
        let cancel = CancellationToken::new();

        let write_handle = tokio::spawn(crate::pumps::write::write_pump(
            write,
            write_rx,
            cancel.clone(),
        ));
        let read_handle = tokio::spawn(crate::pumps::read::read_pump(
            read,
            pending.clone(),
            self.subs.clone(),
            write_tx.clone(),
            ReadLimits {
                pong_wait: self.config.pong_wait,
                max_message_size: self.config.max_message_size,
            },
            cancel.clone(),
        ));
        let ping_handle = tokio::spawn(crate::pumps::ping::ping_pump(
            write_tx.clone(),
            self.config.ping_period,
            cancel.clone(),
        ));

        Ok(Link {
            write_tx,
            pending,
            cancel,
            handles: [read_handle, write_handle, ping_handle],
        })
    }
}

impl Transport for WsTransport {
    fn connect(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            self.live().await?;
            Ok(())
        })
    }

    fn publish<'a>(
        &'a self,
        topic: &'a str,
        payload: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            let requester = self.live().await?;
            let id = request_id();
            let header = BridgeHeader::Publish {
                id: id.clone(),
                topic: topic.to_string(),
            };
            let frame = encode_binary(&header, &payload)?;
            requester
                .request(
                    id,
                    tungstenite::Message::Binary(frame.into()),
                    self.config.request_timeout,
                )
                .await
        })
    }

    fn subscribe<'a>(
        &'a self,
        filter: &'a str,
        handler: MessageHandler,
    ) -> BoxFuture<'a, Result<SubscriptionId, TransportError>> {
        Box::pin(async move {
            validate_filter(filter)?;
            let requester = self.live().await?;
            let (sub_id, first) = self.subs.add(filter, handler);
            if first {
                let id = request_id();
                let header = BridgeHeader::Subscribe {
                    id: id.clone(),
                    topic: filter.to_string(),
                };
                if let Err(e) = requester
                    .control(header, id, self.config.request_timeout)
                    .await
                {
                    self.subs.remove(sub_id);
                    return Err(e);
                }
                debug!(%filter, "subscribed");
            }
            Ok(sub_id)
        })
    }

    fn unsubscribe<'a>(&'a self, filter: &'a str) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            if self.subs.remove_filter(filter) == 0 {
                return Ok(());
            }
            let requester = {
                let guard = self.link.lock().await;
                guard.as_ref().filter(|l| l.is_alive()).map(Link::requester)
            };
            // Without a live link there is nothing to tell the broker.
            let Some(requester) = requester else {
                return Ok(());
            };
            let id = request_id();
            let header = BridgeHeader::Unsubscribe {
                id: id.clone(),
                topic: filter.to_string(),
            };
            requester
                .control(header, id, self.config.request_timeout)
                .await
        })
    }
}
