//! Bridge `WebSocket` connections.

pub mod connection;
pub mod handler;
pub mod heartbeat;
