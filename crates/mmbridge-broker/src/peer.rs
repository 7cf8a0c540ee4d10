//! The transport seam.
//!
//! The broker never touches sockets. Each connection is handed to it as a
//! [`Peer`]; identity is the [`ConnectionId`], not the handle.

use std::sync::Arc;

use mmbridge_core::ids::ConnectionId;

/// One bidirectional text-frame channel owned by the transport.
pub trait Peer: Send + Sync {
    /// Stable identity of this connection.
    fn id(&self) -> &ConnectionId;

    /// Queue a text frame for delivery. Returns `false` if the channel is gone.
    ///
    /// Must not block; the broker calls it while holding its state lock.
    fn send(&self, frame: Arc<String>) -> bool;

    /// Ask the transport to close this connection.
    fn close(&self);

    /// Whether frames can still be delivered.
    fn is_open(&self) -> bool;
}

/// Shared handle to a peer.
pub type PeerHandle = Arc<dyn Peer>;
