//! Script runtime hosting.
//!
//! The [`RuntimeHost`] consumes client events from the runtime bus, hands
//! them to the [`ScriptWorker`] bound to the client's address and publishes
//! the resulting `Send` events back onto the bus.

pub mod builtin;
pub mod host;
pub mod worker;

pub use builtin::{BuiltinWorkers, ChatWorker, EchoWorker};
pub use host::RuntimeHost;
pub use worker::{ScriptWorker, WorkerCommand, WorkerEvent, WorkerFactory};
