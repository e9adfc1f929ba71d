//! Bluetooth device addresses and transport socket handles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport-level handle for an open connection.
///
/// Distinct from [`Address`]: the same device may be reached through
/// different sockets over its lifetime.
pub type SocketId = u32;

/// Opaque hardware address of a Bluetooth device (e.g. `"68:86:E7:00:00:01"`).
///
/// Compared as written; the transport is responsible for normalising case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wraps a raw address string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the address as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}
