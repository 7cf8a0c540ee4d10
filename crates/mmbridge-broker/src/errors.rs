//! Broker error types.
//!
//! Every variant describes a frame that was dropped. None of them is fatal:
//! the transport logs them and keeps serving.

use mmbridge_core::errors::ProtocolError;
use mmbridge_core::ids::{ConnectionId, CorrelationId};
use thiserror::Error;

/// Why an inbound frame produced no delivery.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// An ordinary client sent something that is not a JSON-RPC request.
    #[error("dropping request from {conn_id}: {source}")]
    MalformedRequest {
        /// Sender.
        conn_id: ConnectionId,
        /// Decode failure.
        #[source]
        source: ProtocolError,
    },

    /// The signer sent something that is not a reply frame.
    #[error("dropping signer frame: {0}")]
    MalformedReply(#[source] ProtocolError),

    /// The signer answered a request that is not outstanding.
    #[error("no outstanding request for requestId {0}")]
    UnknownCorrelationId(CorrelationId),

    /// A frame arrived on a connection that is already closed.
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    /// An outbound frame could not be serialized.
    #[error(transparent)]
    Encode(ProtocolError),
}
