//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and customize the game server behavior.

use crate::messaging::CodecLimits;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Configuration structure for the game server.
///
/// Contains the network settings, queue capacities and the script workers
/// started at boot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Queue capacity of each plain bus subscription, such as the ones taken
    /// with `GameServer::subscribe_runtime`. Handler mailboxes use
    /// `handler_mailbox_capacity` instead.
    pub bus_queue_capacity: usize,

    /// Mailbox capacity of each handler
    pub handler_mailbox_capacity: usize,

    /// Outbound frames buffered per session before sends are dropped
    pub outbound_queue_capacity: usize,

    /// Message size and nesting limits applied by the codec and the transport
    pub codec: CodecLimits,

    /// Script workers started when the server starts
    pub workers: Vec<WorkerSpec>,
}

/// One script worker to start at boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSpec {
    /// Built-in script name
    pub script: String,

    /// Address the worker is bound to, e.g. `/chat`
    pub address: String,
}

impl WorkerSpec {
    pub fn new(script: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            address: address.into(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 1000,
            bus_queue_capacity: event_bus::DEFAULT_MAILBOX_CAPACITY,
            handler_mailbox_capacity: event_bus::DEFAULT_MAILBOX_CAPACITY,
            outbound_queue_capacity: 256,
            codec: CodecLimits::default(),
            workers: vec![WorkerSpec::new("echo", "/echo"), WorkerSpec::new("chat", "/chat")],
        }
    }
}
