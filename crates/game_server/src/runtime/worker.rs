//! Script worker contract.
//!
//! A worker is the unit of game logic bound to one [`Address`]. It sees the
//! client events of its address and answers with commands; it never touches
//! sessions or buses directly.

use crate::error::WorkerError;
use crate::messaging::ScriptValue;
use crate::types::{Address, ClientId};

/// Event id delivered when a client connects.
pub const CLIENT_CREATED: &str = "client_created";
/// Event id delivered when a client disconnects.
pub const CLIENT_REMOVED: &str = "client_removed";
/// Event id delivered for each decoded client message.
pub const MESSAGE_RECEIVED: &str = "message_received";

/// An event as seen by a script worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    ClientCreated { client_id: ClientId },
    ClientRemoved { client_id: ClientId },
    MessageReceived { client_id: ClientId, message: ScriptValue },
}

impl WorkerEvent {
    /// The event id string scripts dispatch on.
    pub fn id(&self) -> &'static str {
        match self {
            Self::ClientCreated { .. } => CLIENT_CREATED,
            Self::ClientRemoved { .. } => CLIENT_REMOVED,
            Self::MessageReceived { .. } => MESSAGE_RECEIVED,
        }
    }

    pub fn client_id(&self) -> ClientId {
        match self {
            Self::ClientCreated { client_id }
            | Self::ClientRemoved { client_id }
            | Self::MessageReceived { client_id, .. } => *client_id,
        }
    }
}

/// What a worker asks the host to do after handling an event.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    /// Deliver `value` to one client
    Send { client_id: ClientId, value: ScriptValue },
    /// Deliver `value` to every client currently connected on the worker's address
    Broadcast { value: ScriptValue },
}

/// Game logic bound to one address.
///
/// `handle` runs on the runtime host's worker, one event at a time, and must
/// not block.
pub trait ScriptWorker: Send + std::fmt::Debug {
    /// Name of the script this worker runs.
    fn script(&self) -> &str;

    fn handle(&mut self, event: WorkerEvent) -> Result<Vec<WorkerCommand>, WorkerError>;
}

/// Creates workers for `RunWorker` requests.
pub trait WorkerFactory: Send + Sync + std::fmt::Debug {
    fn create(&self, script: &str, address: &Address) -> Result<Box<dyn ScriptWorker>, WorkerError>;
}
