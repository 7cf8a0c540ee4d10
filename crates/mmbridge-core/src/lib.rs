//! # mmbridge-core
//!
//! Foundation types shared by every mmbridge crate.
//!
//! - **Branded IDs**: `ConnectionId`, `CorrelationId` as newtypes for type safety
//! - **Protocol**: JSON-RPC envelopes, signer `execute`/`executed` frames, and the
//!   pure message classifier
//! - **Errors**: `ProtocolError` via `thiserror`
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod protocol;

pub use errors::ProtocolError;
pub use ids::{ConnectionId, CorrelationId};
