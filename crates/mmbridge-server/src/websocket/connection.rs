//! One bridge `WebSocket` connection as seen by the broker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mmbridge_broker::Peer;
use mmbridge_core::ids::ConnectionId;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A connected `WebSocket` client.
///
/// Outbound frames go through an unbounded channel to the socket's writer
/// task. Closing cancels `closer`, which the writer turns into a close frame.
pub struct ClientConnection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Arc<String>>,
    closer: CancellationToken,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has shown activity since the last heartbeat check.
    pub is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
}

impl ClientConnection {
    /// Create a connection around the writer channel and its close token.
    pub fn new(
        id: ConnectionId,
        tx: mpsc::UnboundedSender<Arc<String>>,
        closer: CancellationToken,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            closer,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
        }
    }

    /// Token cancelled once the connection is closing.
    pub fn closer(&self) -> &CancellationToken {
        &self.closer
    }

    /// Mark the connection as alive (pong or any frame received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Read and reset the alive flag.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl Peer for ClientConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn send(&self, frame: Arc<String>) -> bool {
        !self.closer.is_cancelled() && self.tx.send(frame).is_ok()
    }

    fn close(&self) {
        self.closer.cancel();
    }

    fn is_open(&self) -> bool {
        !self.closer.is_cancelled() && !self.tx.is_closed()
    }
}
