//! Per-socket task: reader loop into the broker, writer task out of it.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use mmbridge_broker::{Broker, BrokerError, Peer, PeerHandle, Routed};
use mmbridge_core::ids::ConnectionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::connection::ClientConnection;
use super::heartbeat::{HeartbeatResult, run_heartbeat};

/// Heartbeat timing for one connection.
#[derive(Clone, Copy, Debug)]
pub struct Liveness {
    /// Ping interval.
    pub interval: Duration,
    /// Silence allowed before the connection is closed.
    pub timeout: Duration,
}

/// Drive one upgraded socket until either side closes it.
///
/// `closer` closes this connection alone; pass a child of the server's
/// shutdown token so shutdown closes it too.
pub async fn serve_connection(
    socket: WebSocket,
    broker: Arc<Broker>,
    liveness: Liveness,
    closer: CancellationToken,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<String>>();
    let connection = Arc::new(ClientConnection::new(ConnectionId::new(), tx, closer.clone()));
    let peer: PeerHandle = connection.clone();
    let conn_id = peer.id().clone();

    broker.on_connect(peer.clone());
    info!(%conn_id, "websocket connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: queued frames, pings, then a close frame once `closer` fires.
    let writer_closer = closer.clone();
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(liveness.interval);
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                biased;
                frame = rx.recv() => {
                    let Some(text) = frame else { break };
                    if ws_tx.send(text_frame(text)).await.is_err() {
                        break;
                    }
                }
                () = writer_closer.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        writer_closer.cancel();
    });

    let heartbeat = tokio::spawn({
        let connection = connection.clone();
        let cancel = closer.clone();
        async move {
            if run_heartbeat(connection.clone(), liveness.interval, liveness.timeout, cancel).await
                == HeartbeatResult::TimedOut
            {
                warn!(
                    conn_id = %connection.id(),
                    silent_ms = u64::try_from(connection.last_pong_elapsed().as_millis()).unwrap_or(u64::MAX),
                    "heartbeat timed out, closing"
                );
                connection.closer().cancel();
            }
        }
    });

    loop {
        tokio::select! {
            () = closer.cancelled() => break,
            next = ws_rx.next() => {
                let text = match next {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            debug!(%conn_id, "ignoring non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    // axum answers pings itself
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        connection.mark_alive();
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(%conn_id, error = %e, "websocket read error");
                        break;
                    }
                };
                connection.mark_alive();
                route(&broker, &peer, &text);
            }
        }
    }

    closer.cancel();
    broker.on_disconnect(&conn_id);
    let _ = writer.await;
    let _ = heartbeat.await;
    info!(%conn_id, age_ms = u64::try_from(connection.age().as_millis()).unwrap_or(u64::MAX), "websocket disconnected");
}

/// Wrap an outbound frame, copying only if the text is still shared.
fn text_frame(text: Arc<String>) -> Message {
    let owned = Arc::try_unwrap(text).unwrap_or_else(|shared| (*shared).clone());
    Message::Text(owned.into())
}

fn route(broker: &Broker, peer: &PeerHandle, text: &str) {
    match broker.on_message(peer, text) {
        Ok(Routed::Ignored) => debug!(conn_id = %peer.id(), "ignored signer frame"),
        Ok(routed) => trace!(conn_id = %peer.id(), ?routed, "routed"),
        Err(BrokerError::ConnectionClosed(_)) => {}
        Err(e) => warn!(conn_id = %peer.id(), error = %e, "dropped frame"),
    }
}
