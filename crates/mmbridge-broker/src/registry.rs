//! Connection registry: ordinary clients plus the single signer slot.

use std::collections::HashMap;

use mmbridge_core::ids::ConnectionId;
use mmbridge_core::protocol::ConnectionState;
use tracing::debug;

use crate::peer::PeerHandle;

/// Outcome of a signer handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Promotion {
    /// The connection is now the signer.
    Accepted,
    /// The connection already was the live signer; nothing changed.
    AlreadySigner,
    /// Another live signer holds the slot. The caller must close the connection.
    Rejected,
}

struct ClientEntry {
    peer: PeerHandle,
    state: ConnectionState,
}

/// Tracks every open connection and which one, if any, is the signer.
///
/// A connection is either in the client map (unclassified or ordinary) or in
/// the signer slot, never both.
#[derive(Default)]
pub struct ConnectionRegistry {
    clients: HashMap<ConnectionId, ClientEntry>,
    signer: Option<PeerHandle>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly connected, not yet classified connection.
    pub fn track(&mut self, peer: PeerHandle) {
        let _ = self.clients.insert(
            peer.id().clone(),
            ClientEntry {
                peer,
                state: ConnectionState::Unclassified,
            },
        );
    }

    /// Add `peer` to the ordinary client set.
    ///
    /// An already tracked connection moves from unclassified to ordinary.
    pub fn register_ordinary(&mut self, peer: &PeerHandle) {
        let _ = self
            .clients
            .entry(peer.id().clone())
            .and_modify(|entry| entry.state = ConnectionState::Ordinary)
            .or_insert_with(|| ClientEntry {
                peer: peer.clone(),
                state: ConnectionState::Ordinary,
            });
    }

    /// Make `peer` the signer unless a live signer already exists.
    ///
    /// A signer whose channel has closed does not block promotion.
    pub fn try_promote_to_signer(&mut self, peer: &PeerHandle) -> Promotion {
        if let Some(current) = self.signer.as_ref().filter(|s| s.is_open()) {
            return if current.id() == peer.id() {
                Promotion::AlreadySigner
            } else {
                Promotion::Rejected
            };
        }
        if let Some(stale) = self.signer.take() {
            debug!(conn_id = %stale.id(), "replacing closed signer");
        }
        let _ = self.clients.remove(peer.id());
        self.signer = Some(peer.clone());
        Promotion::Accepted
    }

    /// Whether `id` is the current signer.
    pub fn is_signer(&self, id: &ConnectionId) -> bool {
        self.signer.as_ref().is_some_and(|s| s.id() == id)
    }

    /// Whether a signer is set and its channel is open.
    pub fn signer_ready(&self) -> bool {
        self.ready_signer().is_some()
    }

    /// The signer handle, if it is set and open.
    pub fn ready_signer(&self) -> Option<PeerHandle> {
        self.signer.as_ref().filter(|s| s.is_open()).cloned()
    }

    /// State of a registered connection, `None` once removed.
    pub fn state_of(&self, id: &ConnectionId) -> Option<ConnectionState> {
        if self.is_signer(id) {
            return Some(ConnectionState::Signer);
        }
        self.clients.get(id).map(|entry| entry.state)
    }

    /// Forget `id`. Clears the signer slot if `id` held it.
    ///
    /// Returns `true` if the connection was registered.
    pub fn remove(&mut self, id: &ConnectionId) -> bool {
        if self.is_signer(id) {
            self.signer = None;
            return true;
        }
        self.clients.remove(id).is_some()
    }

    /// Number of non-signer connections.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Forget every connection without closing any.
    pub fn clear(&mut self) {
        self.clients.clear();
        self.signer = None;
    }

    /// Handles of every registered connection, signer included.
    pub fn all_peers(&self) -> Vec<PeerHandle> {
        self.clients
            .values()
            .map(|entry| entry.peer.clone())
            .chain(self.signer.clone())
            .collect()
    }
}
