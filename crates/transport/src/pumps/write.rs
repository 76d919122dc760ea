//! WebSocket write pump: serialises outbound frames.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Drains `write_rx` into the socket. Any write failure or a closed channel
/// tears the link down through `cancel`.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = write_rx.recv() => frame,
        };
        let Some(frame) = frame else { break };
        if let Err(e) = write.send(frame).await {
            warn!(error = %e, "bridge write failed");
            break;
        }
    }

    cancel.cancel();
    let _ = write.send(tungstenite::Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::sink;

    fn channel_sink(
        tx: mpsc::Sender<tungstenite::Message>,
    ) -> impl futures_util::Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin {
        Box::pin(sink::unfold(tx, |tx, msg: tungstenite::Message| async move {
            let _ = tx.send(msg).await;
            Ok::<_, tungstenite::Error>(tx)
        }))
    }

    #[tokio::test]
    async fn write_pump_forwards_then_closes_on_cancel() {
        let (sink_tx, mut sink_rx) = mpsc::channel::<tungstenite::Message>(16);
        let cancel = CancellationToken::new();
        let (write_tx, write_rx) = mpsc::channel(16);

        let c = cancel.clone();
        let handle = tokio::spawn(async move {
            write_pump(channel_sink(sink_tx), write_rx, c).await;
        });

        write_tx
            .send(tungstenite::Message::Text("hello".into()))
            .await
            .unwrap();
        let first = sink_rx.recv().await.unwrap();
        assert!(matches!(first, tungstenite::Message::Text(_)));

        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");

        let close_msg = sink_rx.recv().await;
        assert!(matches!(close_msg, Some(tungstenite::Message::Close(_))));
    }

    #[tokio::test]
    async fn write_pump_cancels_link_when_channel_closes() {
        let (sink_tx, _sink_rx) = mpsc::channel::<tungstenite::Message>(16);
        let cancel = CancellationToken::new();
        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(16);
        drop(write_tx);

        write_pump(channel_sink(sink_tx), write_rx, cancel.clone()).await;
        assert!(cancel.is_cancelled());
    }
}
