//! Wire formats spoken by ordinary clients and by the signer page.
//!
//! Ordinary clients speak plain JSON-RPC 2.0. The signer page speaks a small
//! tagged protocol:
//!
//! - signer → bridge: the literal text [`SIGNER_HANDSHAKE`], then
//!   `{"action":"executed","requestId":..,"payload":..}` replies
//! - bridge → signer: `{"action":"execute","requestId":..,"payload":<request>}`
//!
//! [`classify`] decides which of these an inbound frame is, given what the
//! bridge already knows about the sending connection.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::errors::ProtocolError;
use crate::ids::CorrelationId;

/// Text the signer page sends once its socket opens. Not JSON.
pub const SIGNER_HANDSHAKE: &str = "MetaMask client connected";

/// Positional params beyond this count are not forwarded to the signer.
pub const MAX_FORWARDED_PARAMS: usize = 2;

/// Action tag of bridge → signer commands.
pub const ACTION_EXECUTE: &str = "execute";

/// Action tag of signer → bridge replies.
pub const ACTION_EXECUTED: &str = "executed";

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of a connection as seen by the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected, nothing received yet.
    Unclassified,
    /// Has sent at least one request; never the signer.
    Ordinary,
    /// Completed the signer handshake.
    Signer,
}

/// What an inbound frame means for routing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// The signer handshake literal.
    SignerHandshake,
    /// A reply from the current signer.
    SignerReply,
    /// A JSON-RPC request from an ordinary client.
    ClientRequest,
}

/// Classify an inbound text frame.
///
/// The handshake literal wins regardless of sender. Otherwise frames from the
/// signer are replies and everything else is a client request.
pub fn classify(message: &str, state: ConnectionState) -> Inbound {
    if message == SIGNER_HANDSHAKE {
        Inbound::SignerHandshake
    } else if state == ConnectionState::Signer {
        Inbound::SignerReply
    } else {
        Inbound::ClientRequest
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON-RPC
// ─────────────────────────────────────────────────────────────────────────────

/// JSON-RPC request as sent by an ordinary client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, passed through unchecked.
    pub jsonrpc: String,
    /// Caller-chosen numeric id.
    pub id: Number,
    /// Method name, e.g. `eth_accounts`.
    pub method: String,
    /// Positional parameters.
    #[serde(default)]
    pub params: Vec<Value>,
}

impl JsonRpcRequest {
    /// Parse a raw text frame.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|e| ProtocolError::decode("JSON-RPC request", e))
    }

    /// The parts of this request needed to answer it later.
    pub fn origin(&self) -> RequestOrigin {
        RequestOrigin {
            jsonrpc: self.jsonrpc.clone(),
            id: self.id.clone(),
            method: self.method.clone(),
        }
    }

    /// Drop positional params past [`MAX_FORWARDED_PARAMS`].
    #[must_use]
    pub fn truncated(mut self) -> Self {
        self.params.truncate(MAX_FORWARDED_PARAMS);
        self
    }
}

/// Envelope fields of a forwarded request, kept until the signer answers.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestOrigin {
    /// Protocol version of the original request.
    pub jsonrpc: String,
    /// Numeric id of the original request.
    pub id: Number,
    /// Method of the original request (for logs).
    pub method: String,
}

impl RequestOrigin {
    /// Build the response to the original request carrying `result`.
    pub fn respond(&self, result: Value) -> JsonRpcResponse {
        JsonRpcResponse {
            jsonrpc: self.jsonrpc.clone(),
            id: self.id.clone(),
            result,
        }
    }
}

/// JSON-RPC response delivered to an ordinary client.
///
/// Signer-side failures arrive here too, as an `{"error": ..}` object inside
/// `result`; the bridge never emits a JSON-RPC error member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Echoed protocol version.
    pub jsonrpc: String,
    /// Echoed numeric id.
    pub id: Number,
    /// Whatever the signer returned.
    pub result: Value,
}

impl JsonRpcResponse {
    /// Serialize into a text frame.
    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Signer frames
// ─────────────────────────────────────────────────────────────────────────────

/// Bridge → signer command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteCommand {
    /// Always [`ACTION_EXECUTE`].
    pub action: String,
    /// Token the signer must echo back.
    pub request_id: CorrelationId,
    /// The client's request with params truncated.
    pub payload: JsonRpcRequest,
}

impl ExecuteCommand {
    /// Wrap `request` for the signer, truncating its params.
    pub fn new(request_id: CorrelationId, request: JsonRpcRequest) -> Self {
        Self {
            action: ACTION_EXECUTE.to_owned(),
            request_id,
            payload: request.truncated(),
        }
    }

    /// Serialize into a text frame.
    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

/// Signer → bridge reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerReply {
    /// Normally [`ACTION_EXECUTED`]. Absent is read as `executed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Token from the matching [`ExecuteCommand`].
    pub request_id: CorrelationId,
    /// Wallet result, or `{"error": "..."}` when the wallet call failed.
    #[serde(default)]
    pub payload: Value,
}

impl SignerReply {
    /// Parse a raw text frame from the signer.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|e| ProtocolError::decode("signer reply", e))
    }

    /// Whether this reply answers an `execute` command.
    pub fn is_executed(&self) -> bool {
        self.action.as_deref().is_none_or(|a| a == ACTION_EXECUTED)
    }

    /// Whether the payload is the error shape produced by the signer page.
    pub fn is_error(&self) -> bool {
        self.payload.get("error").is_some()
    }
}
