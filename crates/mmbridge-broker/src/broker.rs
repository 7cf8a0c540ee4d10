//! Message routing between ordinary clients and the signer.
//!
//! Routing per inbound frame:
//!
//! 1. Handshake literal → promote the sender to signer (or close it if a live
//!    signer exists), then drain the pending queue in arrival order.
//! 2. Frame from the signer → parse as a reply, look up and remove the
//!    correlation entry, answer the original caller with its own `jsonrpc`/`id`.
//! 3. Anything else → a client request. Buffer it while no signer is ready,
//!    otherwise forward it as an `execute` command under a fresh correlation id.
//!
//! All three structures sit behind one lock so that promote-then-drain cannot
//! interleave with an enqueue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mmbridge_core::ids::{ConnectionId, CorrelationId};
use mmbridge_core::protocol::{
    ConnectionState, ExecuteCommand, Inbound, JsonRpcRequest, SignerReply, classify,
};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::correlator::RequestCorrelator;
use crate::errors::BrokerError;
use crate::peer::PeerHandle;
use crate::queue::PendingQueue;
use crate::registry::{ConnectionRegistry, Promotion};

/// What the broker did with an inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Routed {
    /// Sender became the signer; `flushed` queued requests were forwarded.
    Promoted {
        /// Requests forwarded from the pending queue.
        flushed: usize,
    },
    /// Sender tried to become a second signer and was closed.
    SignerRejected,
    /// No signer ready; the request waits in the queue.
    Buffered,
    /// Request sent to the signer.
    Forwarded {
        /// Correlation id the signer will echo.
        request_id: CorrelationId,
    },
    /// Signer reply delivered to the original caller.
    Answered {
        /// Correlation id that was consumed.
        request_id: CorrelationId,
    },
    /// Signer frame with an action the bridge does not handle.
    Ignored,
}

/// Point-in-time counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    /// Non-signer connections.
    pub clients: usize,
    /// Whether a signer is attached and open.
    pub signer_connected: bool,
    /// Requests waiting for a signer.
    pub pending_requests: usize,
    /// Requests forwarded and not yet answered.
    pub outstanding_requests: usize,
}

#[derive(Default)]
struct BrokerState {
    registry: ConnectionRegistry,
    queue: PendingQueue,
    correlator: RequestCorrelator,
}

/// Single-signer request broker.
///
/// Owns the connection registry, the pending queue, and the correlator. The
/// transport calls [`on_connect`], [`on_message`], and [`on_disconnect`].
///
/// [`on_connect`]: Broker::on_connect
/// [`on_message`]: Broker::on_message
/// [`on_disconnect`]: Broker::on_disconnect
#[derive(Default)]
pub struct Broker {
    state: Mutex<BrokerState>,
}

impl Broker {
    /// Create a broker with no connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport connection opened.
    pub fn on_connect(&self, peer: PeerHandle) {
        debug!(conn_id = %peer.id(), "connection opened");
        self.state.lock().registry.track(peer);
    }

    /// A transport connection closed.
    ///
    /// Its queued requests are discarded. Correlation entries it was waiting
    /// on stay until the signer answers (the answer is then discarded) or they
    /// expire.
    pub fn on_disconnect(&self, id: &ConnectionId) {
        let mut state = self.state.lock();
        let was_signer = state.registry.is_signer(id);
        let purged = state.queue.remove_from(id);
        if state.registry.remove(id) {
            if was_signer {
                info!(conn_id = %id, "signer disconnected");
            } else {
                debug!(conn_id = %id, purged, "connection closed");
            }
        }
    }

    /// Route one inbound text frame from `peer`.
    pub fn on_message(&self, peer: &PeerHandle, message: &str) -> Result<Routed, BrokerError> {
        if !peer.is_open() {
            return Err(BrokerError::ConnectionClosed(peer.id().clone()));
        }
        let mut state = self.state.lock();
        let current = state
            .registry
            .state_of(peer.id())
            .unwrap_or(ConnectionState::Unclassified);

        match classify(message, current) {
            Inbound::SignerHandshake => Ok(state.promote(peer)),
            Inbound::SignerReply => state.answer(message),
            Inbound::ClientRequest => {
                state.registry.register_ordinary(peer);
                state.forward_or_buffer(message.to_owned(), peer.clone())
            }
        }
    }

    /// Drop outstanding requests forwarded at least `ttl` ago.
    ///
    /// Callers get no response for expired requests. Returns how many were
    /// dropped.
    pub fn expire_outstanding(&self, ttl: Duration) -> usize {
        let expired = self
            .state
            .lock()
            .correlator
            .expire_older_than(ttl, Instant::now());
        for (request_id, entry) in &expired {
            info!(
                %request_id,
                conn_id = %entry.client.id(),
                method = %entry.origin.method,
                "expired unanswered signer request"
            );
        }
        expired.len()
    }

    /// Current counters.
    pub fn stats(&self) -> BrokerStats {
        let state = self.state.lock();
        BrokerStats {
            clients: state.registry.client_count(),
            signer_connected: state.registry.signer_ready(),
            pending_requests: state.queue.len(),
            outstanding_requests: state.correlator.len(),
        }
    }

    /// Close every connection and discard all queued and outstanding requests.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        for peer in state.registry.all_peers() {
            peer.close();
        }
        let discarded = state.queue.len() + state.correlator.len();
        state.registry.clear();
        state.queue.clear();
        state.correlator.clear();
        debug!(discarded, "broker state reset");
    }
}

impl BrokerState {
    fn promote(&mut self, peer: &PeerHandle) -> Routed {
        match self.registry.try_promote_to_signer(peer) {
            Promotion::Rejected => {
                warn!(conn_id = %peer.id(), "signer already connected, closing second signer");
                peer.close();
                let _ = self.registry.remove(peer.id());
                Routed::SignerRejected
            }
            Promotion::AlreadySigner => {
                debug!(conn_id = %peer.id(), "repeated signer handshake");
                Routed::Promoted {
                    flushed: self.flush_pending(),
                }
            }
            Promotion::Accepted => {
                info!(conn_id = %peer.id(), pending = self.queue.len(), "signer connected");
                Routed::Promoted {
                    flushed: self.flush_pending(),
                }
            }
        }
    }

    fn flush_pending(&mut self) -> usize {
        let mut flushed = 0;
        for pending in self.queue.drain_in_order() {
            if !pending.origin.is_open() {
                debug!(conn_id = %pending.origin.id(), "caller gone, skipping queued request");
                continue;
            }
            match self.forward_or_buffer(pending.raw, pending.origin) {
                Ok(Routed::Forwarded { .. }) => flushed += 1,
                Ok(_) => {}
                Err(err) => warn!(error = %err, "dropping queued request"),
            }
        }
        flushed
    }

    fn forward_or_buffer(&mut self, raw: String, origin: PeerHandle) -> Result<Routed, BrokerError> {
        let Some(signer) = self.registry.ready_signer() else {
            debug!(conn_id = %origin.id(), "no signer yet, queueing request");
            self.queue.enqueue(raw, origin);
            return Ok(Routed::Buffered);
        };

        let request = JsonRpcRequest::parse(&raw).map_err(|source| BrokerError::MalformedRequest {
            conn_id: origin.id().clone(),
            source,
        })?;
        let request_id = CorrelationId::new();
        let request_origin = request.origin();
        let frame = ExecuteCommand::new(request_id.clone(), request)
            .to_frame()
            .map_err(BrokerError::Encode)?;

        debug!(
            conn_id = %origin.id(),
            %request_id,
            method = %request_origin.method,
            "forwarding request to signer"
        );
        self.correlator
            .put(request_id.clone(), request_origin, origin.clone());

        if signer.send(Arc::new(frame)) {
            Ok(Routed::Forwarded { request_id })
        } else {
            warn!(%request_id, "signer channel closed while forwarding, requeueing");
            let _ = self.correlator.take_and_remove(&request_id);
            self.queue.enqueue(raw, origin);
            Ok(Routed::Buffered)
        }
    }

    fn answer(&mut self, message: &str) -> Result<Routed, BrokerError> {
        let reply = SignerReply::parse(message).map_err(BrokerError::MalformedReply)?;
        if !reply.is_executed() {
            debug!(action = ?reply.action, "ignoring signer frame");
            return Ok(Routed::Ignored);
        }

        let entry = self
            .correlator
            .take_and_remove(&reply.request_id)
            .ok_or_else(|| BrokerError::UnknownCorrelationId(reply.request_id.clone()))?;
        let is_error = reply.is_error();
        let frame = entry
            .origin
            .respond(reply.payload)
            .to_frame()
            .map_err(BrokerError::Encode)?;

        if entry.client.send(Arc::new(frame)) {
            debug!(
                conn_id = %entry.client.id(),
                request_id = %reply.request_id,
                method = %entry.origin.method,
                is_error,
                "delivered signer result"
            );
        } else {
            warn!(
                conn_id = %entry.client.id(),
                request_id = %reply.request_id,
                "caller gone before signer answered"
            );
        }
        Ok(Routed::Answered {
            request_id: reply.request_id,
        })
    }
}
