//! Runtime host: binds script workers to addresses and routes client events to them.

use super::worker::{ScriptWorker, WorkerCommand, WorkerEvent, WorkerFactory};
use crate::error::WorkerError;
use crate::events::{RuntimeEvent, RuntimeEventKind};
use crate::messaging::ScriptValue;
use crate::types::{Address, ClientId};
use event_bus::{BusError, EventBus, Handler, HandlerError, KindFilter};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handler state hosting one script worker per address.
///
/// The host also tracks which clients are connected on each address so that
/// [`WorkerCommand::Broadcast`] can fan out without asking the registry.
#[derive(Debug)]
pub struct RuntimeHost {
    factory: Arc<dyn WorkerFactory>,
    runtime_bus: Arc<EventBus<RuntimeEvent>>,
    workers: HashMap<Address, Box<dyn ScriptWorker>>,
    clients: HashMap<Address, BTreeSet<ClientId>>,
}

impl RuntimeHost {
    /// Handler name used in logs and bus subscriber names.
    pub const NAME: &'static str = "runtime";

    pub fn new(factory: Arc<dyn WorkerFactory>, runtime_bus: Arc<EventBus<RuntimeEvent>>) -> Self {
        Self {
            factory,
            runtime_bus,
            workers: HashMap::new(),
            clients: HashMap::new(),
        }
    }

    /// Builds the serialized handler for this host.
    pub fn into_handler(self, mailbox_capacity: usize) -> Handler<Self> {
        let runtime_bus = Arc::clone(&self.runtime_bus);
        Handler::with_capacity(Self::NAME, self, mailbox_capacity).on(
            &runtime_bus,
            KindFilter::one_of([
                RuntimeEventKind::RunWorker,
                RuntimeEventKind::ClientCreated,
                RuntimeEventKind::ClientRemoved,
                RuntimeEventKind::MessageReceived,
            ]),
            |host: &mut Self, event: RuntimeEvent| host.handle_runtime_event(event),
        )
    }

    /// Addresses that currently have a worker, sorted.
    pub fn bound_addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.workers.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// Clients known to be connected on `address`, in id order.
    pub fn clients_at(&self, address: &Address) -> Vec<ClientId> {
        self.clients
            .get(address)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn handle_runtime_event(&mut self, event: RuntimeEvent) -> Result<(), HandlerError> {
        match event {
            RuntimeEvent::RunWorker { script, address } => self.run_worker(&script, address),
            RuntimeEvent::ClientCreated { client_id, address } => {
                self.clients.entry(address.clone()).or_default().insert(client_id);
                self.dispatch(&address, WorkerEvent::ClientCreated { client_id })
            }
            RuntimeEvent::ClientRemoved { client_id, address } => {
                if let Some(set) = self.clients.get_mut(&address) {
                    set.remove(&client_id);
                    if set.is_empty() {
                        self.clients.remove(&address);
                    }
                }
                self.dispatch(&address, WorkerEvent::ClientRemoved { client_id })
            }
            RuntimeEvent::MessageReceived {
                client_id,
                address,
                value,
            } => self.dispatch(
                &address,
                WorkerEvent::MessageReceived {
                    client_id,
                    message: value,
                },
            ),
            RuntimeEvent::Send { .. } => Ok(()),
        }
    }

    fn run_worker(&mut self, script: &str, address: Address) -> Result<(), HandlerError> {
        if self.workers.contains_key(&address) {
            let err = WorkerError::AddressInUse(address);
            warn!("❌ RunWorker '{}' rejected: {}", script, err);
            return Err(HandlerError::Callback(err.to_string()));
        }

        match self.factory.create(script, &address) {
            Ok(worker) => {
                info!("🚀 Worker '{}' running on {}", worker.script(), address);
                self.workers.insert(address, worker);
                Ok(())
            }
            Err(err) => {
                warn!("❌ RunWorker '{}' on {} failed: {}", script, address, err);
                Err(HandlerError::Callback(err.to_string()))
            }
        }
    }

    fn dispatch(&mut self, address: &Address, event: WorkerEvent) -> Result<(), HandlerError> {
        let Some(worker) = self.workers.get_mut(address) else {
            debug!("No worker on {}, '{}' for client {} dropped", address, event.id(), event.client_id());
            return Ok(());
        };

        let id = event.id();
        let commands = worker
            .handle(event)
            .map_err(|e| HandlerError::Callback(format!("worker on {} failed on '{}': {}", address, id, e)))?;

        for command in commands {
            match command {
                WorkerCommand::Send { client_id, value } => self.publish_send(client_id, value)?,
                WorkerCommand::Broadcast { value } => {
                    for client_id in self.clients_at(address) {
                        self.publish_send(client_id, value.clone())?;
                    }
                }
            }
        }
        Ok(())
    }

    fn publish_send(&self, client_id: ClientId, value: ScriptValue) -> Result<(), HandlerError> {
        match self.runtime_bus.publish(RuntimeEvent::Send { client_id, value }) {
            Ok(_) => Ok(()),
            Err(BusError::Closed { bus }) => {
                debug!("Runtime bus '{}' closed, send to client {} discarded", bus, client_id);
                Ok(())
            }
            Err(e) => Err(HandlerError::Bus(e)),
        }
    }
}
