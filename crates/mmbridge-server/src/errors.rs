//! Server error types.

use std::net::SocketAddr;

use thiserror::Error;

/// Fatal transport errors. None of these are retried.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be created.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// OS error (address in use, permission denied, ...).
        #[source]
        source: std::io::Error,
    },

    /// The configured host is not a loopback address.
    #[error("refusing to listen on non-loopback host {0}")]
    NonLoopbackHost(String),

    /// The configured host is neither an IP address nor `localhost`.
    #[error("invalid bind host {0:?}")]
    InvalidHost(String),

    /// Other socket error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
