//! Core types shared by connections, controllers and the coordinator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key prefix marking documents written by the data store itself.
pub const DEFAULT_RESERVED_PREFIX: &str = "_";

/// Identity of one server connection: where it lives and which dataset it serves.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Server address (URL or host:port, opaque to the core).
    pub address: String,

    /// Logical dataset / namespace name on that server.
    pub dataset: String,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            dataset: dataset.into(),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint({}/{})", self.address, self.dataset)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.dataset)
    }
}

/// Level-valued connectivity of a server connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl From<bool> for ConnectionStatus {
    fn from(connected: bool) -> Self {
        if connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }
}

/// What happened to a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Created or updated.
    Put,
    /// Removed.
    Delete,
}

/// A single change notification from a server's feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,

    /// Document identity.
    pub id: String,

    /// Opaque revision token assigned by the server.
    pub version: String,
}

impl ChangeEvent {
    pub fn put(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Put,
            id: id.into(),
            version: version.into(),
        }
    }

    pub fn delete(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            id: id.into(),
            version: version.into(),
        }
    }

    /// Whether this change was produced by the store itself rather than an application write.
    pub fn is_internal(&self, reserved_prefix: &str) -> bool {
        !reserved_prefix.is_empty() && self.id.starts_with(reserved_prefix)
    }
}
