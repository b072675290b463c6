//! Error types and handling for the game server.
//!
//! This module defines the error types that can occur during server operations,
//! grouped by the component that raises them.

use crate::types::{Address, ClientId, SessionId};

/// Enumeration of possible server errors.
///
/// Categorizes errors into network-related, bus and internal server errors
/// to help with debugging and error handling.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or connection issues
    #[error("Network error: {0}")]
    Network(String),

    /// Publishing to an event bus failed
    #[error("Event bus error: {0}")]
    Bus(#[from] event_bus::BusError),

    /// Internal server errors including handler failures
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Client registry consistency errors.
///
/// These indicate a bug in the transport layer, never a client mistake.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The session was opened twice without being closed in between
    #[error("{session} is already registered as client {client}")]
    DuplicateSession { session: SessionId, client: ClientId },
}

/// Errors converting between wire text and script values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The message exceeds the configured size limit
    #[error("Message too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },

    /// The message is not valid JSON
    #[error("Invalid message format: {0}")]
    InvalidFormat(#[from] serde_json::Error),

    /// The message nests deeper than allowed
    #[error("Message nesting too deep (limit {limit})")]
    TooDeep { limit: usize },
}

/// Errors raised by the script runtime host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    /// No built-in worker exists for the requested script
    #[error("Unknown script '{0}'")]
    UnknownScript(String),

    /// A worker is already bound to the address
    #[error("Address {0} already has a worker")]
    AddressInUse(Address),
}
