//! Branded ID newtypes.
//!
//! Connection handles and correlation tokens are both strings on the wire or
//! in logs, but they must never be confused for one another, so each gets its
//! own newtype.
//!
//! Fresh values come from UUID v4 (122 random bits), which keeps correlation
//! ids collision-free for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID.
            #[must_use]
            pub fn new() -> Self {
                Self(format!("{}{}", $prefix, Uuid::new_v4()))
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

branded_id!(
    /// Identity of one transport-level connection (ordinary client or signer).
    ConnectionId,
    "conn_"
);

branded_id!(
    /// Token pairing an `execute` command with the signer's `executed` reply.
    ///
    /// Opaque to the signer page, which only echoes it back.
    CorrelationId,
    ""
);
