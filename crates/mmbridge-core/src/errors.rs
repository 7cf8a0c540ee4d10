//! Wire protocol errors.

use thiserror::Error;

/// A frame could not be decoded or encoded.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An inbound frame was not the JSON shape expected for its role.
    #[error("malformed {frame}: {source}")]
    Decode {
        /// Which frame kind was being decoded (e.g. `"JSON-RPC request"`).
        frame: &'static str,
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },

    /// An outbound frame failed to serialize.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ProtocolError {
    pub(crate) fn decode(frame: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { frame, source }
    }
}
