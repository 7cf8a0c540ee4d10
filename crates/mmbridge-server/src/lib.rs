//! # mmbridge-server
//!
//! Axum HTTP + `WebSocket` transport for the signer bridge.
//!
//! - `GET /` (or `/ws`) with an upgrade header: a bridge connection, handed to
//!   the [`Broker`](mmbridge_broker::Broker)
//! - `GET /` without one: the bundled signer page
//! - `GET /health`: liveness and broker counters
//! - Heartbeat pings close connections that stop answering
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod expiry;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod signer_page;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::BridgeServer;
