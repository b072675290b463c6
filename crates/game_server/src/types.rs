//! # Core Type Definitions
//!
//! Identifiers and addresses shared by the transport, the gateway and the
//! script runtime.
//!
//! - [`ClientId`] - process-unique logical client identifier
//! - [`SessionId`] - transport-assigned identity of one network session
//! - [`Address`] - logical route a session or script worker is bound to

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a logical client for the lifetime of its connection.
///
/// Assigned monotonically starting at 1 when a session is registered and never
/// reused while the process runs. A reconnecting client gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic [`ClientId`] allocator.
#[derive(Debug)]
pub struct ClientIdGenerator {
    next: AtomicU64,
}

impl ClientIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns the next unused id.
    pub fn next_id(&self) -> ClientId {
        ClientId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ClientIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of one transport session, assigned by the transport layer.
///
/// The core compares sessions by this id only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Logical route a session or script worker is bound to, e.g. `/chat`.
///
/// For WebSocket sessions this is the request path of the upgrade request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Creates an address, normalizing it to start with exactly one `/`.
    pub fn new(path: impl AsRef<str>) -> Self {
        let trimmed = path.as_ref().trim_start_matches('/');
        Self(format!("/{trimmed}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}
