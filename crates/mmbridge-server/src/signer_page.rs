//! The browser page that acts as the signer.
//!
//! Opened in a browser with a wallet extension, it connects back to this
//! server, sends the signer handshake, runs each `execute` command against
//! the wallet with at most two params, and replies `executed` with the result
//! or `{"error": message}`. It reconnects every 2s after a disconnect.

/// Page body served at `GET /`.
pub const SIGNER_PAGE: &str = include_str!("../assets/signer.html");
