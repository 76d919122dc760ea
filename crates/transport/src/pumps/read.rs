//! WebSocket read pump: routes acks and dispatches deliveries.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::frame::{BridgeHeader, parse_binary, parse_text};
use crate::pumps::PendingAcks;
use crate::registry::Subscriptions;

/// Per-link settings of the read pump.
pub(crate) struct ReadLimits {
    pub(crate) pong_wait: Duration,
    pub(crate) max_message_size: usize,
}

/// Reads frames until the link dies.
///
/// Any inbound frame resets the read deadline; silence for `pong_wait`
/// means the link is dead. On exit the link token is cancelled and every
/// outstanding request is dropped so its waiter sees `Closed`.
pub(crate) async fn read_pump<S>(
    mut read: S,
    pending: PendingAcks,
    subs: Arc<Subscriptions>,
    write_tx: mpsc::Sender<tungstenite::Message>,
    limits: ReadLimits,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::sleep(limits.pong_wait);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut deadline => {
                warn!("no traffic from broker, closing link");
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        deadline.as_mut().reset(tokio::time::Instant::now() + limits.pong_wait);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                handle_text(&text, &pending).await;
                            }
                            tungstenite::Message::Binary(data) => {
                                handle_binary(&data, &subs, limits.max_message_size);
                            }
                            tungstenite::Message::Ping(data) => {
                                trace!("received ping, sending pong");
                                let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Pong(_) => {
                                trace!("received pong");
                            }
                            tungstenite::Message::Close(_) => {
                                debug!("received close frame");
                                break;
                            }
                            tungstenite::Message::Frame(_) => {}
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "bridge read failed");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    cancel.cancel();
    pending.lock().await.clear();
}

/// Routes a broker reply to its waiting request.
async fn handle_text(text: &str, pending: &PendingAcks) {
    let header = match parse_text(text) {
        Ok(h) => h,
        Err(e) => {
            warn!("failed to parse control frame: {e}");
            return;
        }
    };

    let Some(id) = header.reply_id() else {
        debug!(?header, "unexpected control frame");
        return;
    };

    let tx = pending.lock().await.remove(id);
    match tx {
        Some(tx) => {
            let _ = tx.send(header);
        }
        None => debug!(id, "reply for unknown request"),
    }
}

/// Hands a delivery to the local subscriptions.
fn handle_binary(data: &[u8], subs: &Subscriptions, max_message_size: usize) {
    if data.len() > max_message_size {
        warn!("frame too large ({} bytes), dropping", data.len());
        return;
    }

    match parse_binary(data) {
        Ok((BridgeHeader::Message { topic }, payload)) => {
            if subs.dispatch(&topic, payload) == 0 {
                debug!(%topic, "delivery without local subscriber");
            }
        }
        Ok((header, _)) => debug!(?header, "unexpected binary frame"),
        Err(e) => warn!("failed to parse binary frame: {e}"),
    }
}
