//! Requests held while no signer is attached.

use std::collections::VecDeque;

use mmbridge_core::ids::ConnectionId;

use crate::peer::PeerHandle;

/// A raw request and the connection that sent it.
pub struct PendingRequest {
    /// Request text exactly as received.
    pub raw: String,
    /// Sender.
    pub origin: PeerHandle,
}

/// FIFO of [`PendingRequest`]s.
///
/// Unbounded. The broker's state lock makes [`drain_in_order`] atomic with
/// respect to [`enqueue`].
///
/// [`drain_in_order`]: PendingQueue::drain_in_order
/// [`enqueue`]: PendingQueue::enqueue
#[derive(Default)]
pub struct PendingQueue {
    items: VecDeque<PendingRequest>,
}

impl PendingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request.
    pub fn enqueue(&mut self, raw: String, origin: PeerHandle) {
        self.items.push_back(PendingRequest { raw, origin });
    }

    /// Take every queued request in arrival order, leaving the queue empty.
    pub fn drain_in_order(&mut self) -> Vec<PendingRequest> {
        std::mem::take(&mut self.items).into()
    }

    /// Drop every request queued by `id`. Returns how many were dropped.
    pub fn remove_from(&mut self, id: &ConnectionId) -> usize {
        let before = self.items.len();
        self.items.retain(|pending| pending.origin.id() != id);
        before - self.items.len()
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Discard everything.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
