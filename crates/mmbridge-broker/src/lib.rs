//! # mmbridge-broker
//!
//! Routes JSON-RPC requests from any number of ordinary clients to the one
//! connected signer and routes the signer's replies back.
//!
//! - [`ConnectionRegistry`]: ordinary clients plus the single signer slot
//! - [`PendingQueue`]: requests held until a signer attaches
//! - [`RequestCorrelator`]: correlation id → original caller and envelope
//! - [`Broker`]: owns the three behind one lock and implements routing
//!
//! The transport is abstracted as [`Peer`]; this crate does no I/O.

#![deny(unsafe_code)]

pub mod broker;
pub mod correlator;
pub mod errors;
pub mod peer;
pub mod queue;
pub mod registry;

#[cfg(test)]
mod test_peer;

pub use broker::{Broker, BrokerStats, Routed};
pub use correlator::{CorrelationEntry, RequestCorrelator};
pub use errors::BrokerError;
pub use peer::{Peer, PeerHandle};
pub use queue::{PendingQueue, PendingRequest};
pub use registry::{ConnectionRegistry, Promotion};
