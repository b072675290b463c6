//! Built-in workers usable without a script interpreter.

use super::worker::{ScriptWorker, WorkerCommand, WorkerEvent, WorkerFactory};
use crate::error::WorkerError;
use crate::messaging::ScriptValue;
use crate::types::Address;
use serde_json::json;
use tracing::debug;

/// Script name of [`EchoWorker`].
pub const ECHO_SCRIPT: &str = "echo";
/// Script name of [`ChatWorker`].
pub const CHAT_SCRIPT: &str = "chat";

/// Sends every message back to the client that sent it.
#[derive(Debug, Default)]
pub struct EchoWorker;

impl ScriptWorker for EchoWorker {
    fn script(&self) -> &str {
        ECHO_SCRIPT
    }

    fn handle(&mut self, event: WorkerEvent) -> Result<Vec<WorkerCommand>, WorkerError> {
        match event {
            WorkerEvent::MessageReceived { client_id, message } => Ok(vec![WorkerCommand::Send {
                client_id,
                value: message,
            }]),
            _ => Ok(Vec::new()),
        }
    }
}

/// Relays messages to every client on the address and announces arrivals and
/// departures.
///
/// Outbound values are tables of the form `{"event": ..., "client_id": ...}`,
/// with a `message` field for relayed messages.
#[derive(Debug, Default)]
pub struct ChatWorker {
    relayed: u64,
}

impl ChatWorker {
    /// Number of messages relayed so far.
    pub fn relayed(&self) -> u64 {
        self.relayed
    }
}

impl ScriptWorker for ChatWorker {
    fn script(&self) -> &str {
        CHAT_SCRIPT
    }

    fn handle(&mut self, event: WorkerEvent) -> Result<Vec<WorkerCommand>, WorkerError> {
        let value = match event {
            WorkerEvent::ClientCreated { client_id } => json!({ "event": "joined", "client_id": client_id }),
            WorkerEvent::ClientRemoved { client_id } => json!({ "event": "left", "client_id": client_id }),
            WorkerEvent::MessageReceived { client_id, message } => {
                self.relayed += 1;
                json!({ "event": "message", "client_id": client_id, "message": message })
            }
        };
        Ok(vec![WorkerCommand::Broadcast {
            value: ScriptValue::new(value),
        }])
    }
}

/// Factory resolving the built-in script names.
#[derive(Debug, Default, Clone)]
pub struct BuiltinWorkers;

impl WorkerFactory for BuiltinWorkers {
    fn create(&self, script: &str, address: &Address) -> Result<Box<dyn ScriptWorker>, WorkerError> {
        debug!("Creating built-in worker '{}' for {}", script, address);
        match script.trim() {
            ECHO_SCRIPT => Ok(Box::new(EchoWorker)),
            CHAT_SCRIPT => Ok(Box::new(ChatWorker::default())),
            other => Err(WorkerError::UnknownScript(other.to_string())),
        }
    }
}
