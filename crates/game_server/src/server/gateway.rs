//! The gateway handler: transport sessions in, client-identified runtime events out.
//!
//! Per client the gateway walks a three-state machine:
//!
//! ```text
//! UNREGISTERED ──SessionOpened──► REGISTERED ──SessionFailed | SessionClosed──► REMOVED
//! ```
//!
//! `REMOVED` is terminal: a second terminal event for the same session finds
//! nothing in the registry and is ignored, so one disconnect yields exactly one
//! `ClientRemoved` no matter how many terminal events the transport reports.

use crate::connection::{ClientRegistry, SessionRef};
use crate::events::{RuntimeEvent, RuntimeEventKind, TransportEvent, TransportEventKind};
use crate::messaging::{MessageCodec, ScriptValue};
use crate::types::{Address, ClientId};
use event_bus::{BusError, EventBus, Handler, HandlerError, KindFilter};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Boundary actor translating between the transport and runtime buses.
///
/// Owns write access to the [`ClientRegistry`]; every mutation happens on the
/// gateway's single worker.
#[derive(Debug)]
pub struct GatewayHandler {
    registry: Arc<ClientRegistry>,
    runtime_bus: Arc<EventBus<RuntimeEvent>>,
    codec: Arc<dyn MessageCodec>,
}

impl GatewayHandler {
    /// Handler name used in logs and bus subscriber names.
    pub const NAME: &'static str = "gateway";

    pub fn new(
        registry: Arc<ClientRegistry>,
        runtime_bus: Arc<EventBus<RuntimeEvent>>,
        codec: Arc<dyn MessageCodec>,
    ) -> Self {
        Self {
            registry,
            runtime_bus,
            codec,
        }
    }

    /// Builds the serialized handler subscribed to every transport event and
    /// to runtime `Send` events.
    pub fn into_handler(self, transport_bus: &EventBus<TransportEvent>, mailbox_capacity: usize) -> Handler<Self> {
        let runtime_bus = Arc::clone(&self.runtime_bus);
        Handler::with_capacity(Self::NAME, self, mailbox_capacity)
            .on(
                transport_bus,
                KindFilter::one_of([
                    TransportEventKind::SessionOpened,
                    TransportEventKind::MessageReceived,
                    TransportEventKind::SessionFailed,
                    TransportEventKind::SessionClosed,
                ]),
                |gateway: &mut Self, event: TransportEvent| gateway.handle_transport_event(event),
            )
            .on(
                &runtime_bus,
                KindFilter::only(RuntimeEventKind::Send),
                |gateway: &mut Self, event: RuntimeEvent| gateway.handle_runtime_event(event),
            )
    }

    /// Applies one transport event to the client state machine.
    pub fn handle_transport_event(&mut self, event: TransportEvent) -> Result<(), HandlerError> {
        match event {
            TransportEvent::SessionOpened { session, address } => self.session_opened(session, address),
            TransportEvent::MessageReceived {
                session,
                address,
                text,
            } => self.message_received(&session, address, &text),
            TransportEvent::SessionFailed {
                session,
                address,
                reason,
            } => {
                debug!("⚠️ {} failed: {}", session.id(), reason);
                self.session_ended(&session, address)
            }
            TransportEvent::SessionClosed { session, address } => self.session_ended(&session, address),
        }
    }

    /// Delivers runtime `Send` events; every other kind is ignored.
    pub fn handle_runtime_event(&mut self, event: RuntimeEvent) -> Result<(), HandlerError> {
        match event {
            RuntimeEvent::Send { client_id, value } => {
                self.send(client_id, &value);
                Ok(())
            }
            other => {
                trace!("Gateway ignores runtime event {:?}", other);
                Ok(())
            }
        }
    }

    fn session_opened(&mut self, session: SessionRef, address: Address) -> Result<(), HandlerError> {
        let session_id = session.id();
        match self.registry.create(session, address.clone()) {
            Ok(client_id) => {
                info!("👤 Client {} created on {}", client_id, address);
                self.publish(RuntimeEvent::ClientCreated { client_id, address })
            }
            // Reported once, by the handler worker's callback-error log.
            Err(e) => Err(HandlerError::Callback(format!(
                "Registry consistency error for {session_id}: {e}"
            ))),
        }
    }

    fn message_received(&mut self, session: &SessionRef, address: Address, text: &str) -> Result<(), HandlerError> {
        let Some(client_id) = self.registry.lookup_by_session(session.id()) else {
            info!("Client not found for {}, message dropped", session.id());
            return Ok(());
        };
        match self.codec.decode(text) {
            Ok(value) => self.publish(RuntimeEvent::MessageReceived {
                client_id,
                address,
                value,
            }),
            Err(e) => {
                debug!("Wrong message from client {}, dropped: {}", client_id, e);
                Ok(())
            }
        }
    }

    fn session_ended(&mut self, session: &SessionRef, address: Address) -> Result<(), HandlerError> {
        // Absent when the other terminal event of the pair already removed it.
        let Some(entry) = self.registry.remove_by_session(session.id()) else {
            return Ok(());
        };
        info!("👋 Client {} removed from {}", entry.client_id, address);
        self.publish(RuntimeEvent::ClientRemoved {
            client_id: entry.client_id,
            address,
        })
    }

    fn send(&self, client_id: ClientId, value: &ScriptValue) {
        // The client may have disconnected after the send was queued.
        let Some(entry) = self.registry.lookup_by_id(client_id) else {
            trace!("Send to departed client {} dropped", client_id);
            return;
        };
        match self.codec.encode(value) {
            Ok(text) => entry.session.send_async(text),
            Err(e) => info!("Message encoding for client {} failed: {}", client_id, e),
        }
    }

    fn publish(&self, event: RuntimeEvent) -> Result<(), HandlerError> {
        match self.runtime_bus.publish(event) {
            Ok(_) => Ok(()),
            Err(BusError::Closed { bus }) => {
                debug!("Runtime bus '{}' closed, event discarded during shutdown", bus);
                Ok(())
            }
            Err(e) => Err(HandlerError::Bus(e)),
        }
    }
}

