//! Core game server implementation.
//!
//! This module contains the main `GameServer` struct, the composition root
//! that wires the event buses, the client registry, the handlers and the
//! WebSocket transport together.

use crate::{
    config::ServerConfig,
    connection::ClientRegistry,
    error::ServerError,
    events::{RuntimeEvent, RuntimeEventKind, TransportEvent},
    messaging::{JsonCodec, MessageCodec},
    runtime::{BuiltinWorkers, RuntimeHost, WorkerFactory},
    server::gateway::GatewayHandler,
    server::handlers::{handle_connection, TransportContext},
    types::{Address, SessionId},
};
use event_bus::{BusStats, EventBus, HandlerHandle, KindFilter, ShutdownState, Subscription};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Name of the bus carrying [`TransportEvent`]s.
pub const TRANSPORT_BUS: &str = "transport";
/// Name of the bus carrying [`RuntimeEvent`]s.
pub const RUNTIME_BUS: &str = "runtime";

/// How long open sessions get to publish `SessionClosed` once shutdown starts.
const SESSION_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// The core game server structure.
///
/// `GameServer` owns both event buses and the client registry, and starts
/// the two handlers that give them meaning:
///
/// * **Gateway**: maps transport sessions to client ids and back
/// * **Runtime host**: runs script workers bound to addresses
///
/// Network sessions are served by one task each; they only ever publish to
/// the transport bus, so the handlers never share state with them.
pub struct GameServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Session lifecycle and inbound frames from the network
    transport_bus: Arc<EventBus<TransportEvent>>,

    /// Client events and outbound sends exchanged with the script runtime
    runtime_bus: Arc<EventBus<RuntimeEvent>>,

    /// Session <-> client id mapping, written by the gateway only
    registry: Arc<ClientRegistry>,

    /// Wire codec used by the gateway
    codec: Arc<dyn MessageCodec>,

    /// Creates script workers for `RunWorker` events
    worker_factory: Arc<dyn WorkerFactory>,
}

/// Point-in-time counters for monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStats {
    pub transport: BusStats,
    pub runtime: BusStats,
    pub connected_clients: usize,
}

impl GameServer {
    /// Creates a new game server with the JSON codec and the built-in workers.
    pub fn new(config: ServerConfig) -> Self {
        let codec = Arc::new(JsonCodec::new(config.codec));
        Self::with_components(config, codec, Arc::new(BuiltinWorkers))
    }

    /// Creates a server with a custom codec and worker factory.
    pub fn with_components(
        config: ServerConfig,
        codec: Arc<dyn MessageCodec>,
        worker_factory: Arc<dyn WorkerFactory>,
    ) -> Self {
        let transport_bus = Arc::new(EventBus::new(TRANSPORT_BUS, config.bus_queue_capacity));
        let runtime_bus = Arc::new(EventBus::new(RUNTIME_BUS, config.bus_queue_capacity));

        Self {
            config,
            transport_bus,
            runtime_bus,
            registry: Arc::new(ClientRegistry::new()),
            codec,
            worker_factory,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The client registry, for read-only inspection.
    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn transport_bus(&self) -> Arc<EventBus<TransportEvent>> {
        Arc::clone(&self.transport_bus)
    }

    pub fn runtime_bus(&self) -> Arc<EventBus<RuntimeEvent>> {
        Arc::clone(&self.runtime_bus)
    }

    /// Subscribes an external runtime consumer to the runtime bus.
    ///
    /// The subscription's queue holds `bus_queue_capacity` events. A consumer
    /// that falls that far behind saturates the bus, which is fatal for the
    /// handler publishing at that moment.
    pub fn subscribe_runtime(
        &self,
        name: impl Into<String>,
        filter: KindFilter<RuntimeEventKind>,
    ) -> Subscription<RuntimeEvent> {
        self.runtime_bus.subscribe(name, filter)
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            transport: self.transport_bus.stats(),
            runtime: self.runtime_bus.stats(),
            connected_clients: self.registry.len(),
        }
    }

    /// Starts the server and runs until a handler fails fatally.
    pub async fn start(&self) -> Result<(), ServerError> {
        self.start_with_shutdown_state(ShutdownState::new()).await
    }

    /// Binds the configured address and serves until `shutdown_state` is initiated.
    pub async fn start_with_shutdown_state(&self, shutdown_state: ShutdownState) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Failed to bind {}: {e}", self.config.bind_address)))?;
        self.serve(listener, shutdown_state).await
    }

    /// Serves connections from an already bound listener.
    ///
    /// # Startup Sequence
    ///
    /// 1. Start the gateway and runtime host handlers
    /// 2. Publish `RunWorker` for every configured worker
    /// 3. Accept connections until shutdown is initiated
    ///
    /// # Teardown
    ///
    /// Stop accepting and give open sessions a short grace period to publish
    /// `SessionClosed`, so their clients are removed. Then stop both handlers
    /// (draining their mailboxes), close both buses, and abort whatever session
    /// tasks remain.
    pub async fn serve(&self, listener: TcpListener, shutdown_state: ShutdownState) -> Result<(), ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Listener has no local address: {e}")))?;
        info!("🚀 Starting game server on {}", local_addr);

        let gateway = GatewayHandler::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.runtime_bus),
            Arc::clone(&self.codec),
        )
        .into_handler(&self.transport_bus, self.config.handler_mailbox_capacity)
        .with_shutdown(shutdown_state.clone())
        .start();
        let runtime = RuntimeHost::new(Arc::clone(&self.worker_factory), Arc::clone(&self.runtime_bus))
            .into_handler(self.config.handler_mailbox_capacity)
            .with_shutdown(shutdown_state.clone())
            .start();

        for worker in &self.config.workers {
            self.runtime_bus.publish(RuntimeEvent::RunWorker {
                script: worker.script.clone(),
                address: Address::new(&worker.address),
            })?;
        }
        info!("📜 Requested {} script worker(s)", self.config.workers.len());

        let context = TransportContext {
            transport_bus: Arc::clone(&self.transport_bus),
            shutdown: shutdown_state.clone(),
            max_message_size: self.config.codec.max_message_size,
            outbound_queue_capacity: self.config.outbound_queue_capacity,
        };
        let mut sessions = JoinSet::new();
        let mut next_session = 1u64;

        loop {
            tokio::select! {
                _ = shutdown_state.wait_for_shutdown() => {
                    info!("🛑 Accept loop stopping - shutdown initiated");
                    break;
                }
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    match joined {
                        Ok(Err(e)) => debug!("Connection ended with error: {}", e),
                        Err(e) if e.is_panic() => error!("Connection task panicked: {}", e),
                        _ => {}
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        if sessions.len() >= self.config.max_connections {
                            warn!("🚫 Refusing {}: {} connections already open", peer_addr, sessions.len());
                            drop(stream);
                            continue;
                        }
                        let session_id = SessionId(next_session);
                        next_session += 1;
                        sessions.spawn(handle_connection(stream, peer_addr, session_id, context.clone()));
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
            }
        }

        info!("🧹 Performing server cleanup...");
        let closing = tokio::time::timeout(SESSION_CLOSE_GRACE, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;
        if closing.is_err() {
            warn!(
                "⏰ {} session(s) still open after {:?}, their clients stay registered",
                sessions.len(),
                SESSION_CLOSE_GRACE
            );
        }
        stop_handler(gateway).await;
        stop_handler(runtime).await;
        self.transport_bus.close();
        self.runtime_bus.close();
        sessions.abort_all();
        while sessions.join_next().await.is_some() {}
        info!("✅ Server cleanup completed");
        Ok(())
    }
}

async fn stop_handler<S>(handle: HandlerHandle<S>) {
    let name = handle.name().to_string();
    let processed = handle.processed();
    match handle.stop().await {
        Ok(_) => info!("⏹️ Handler '{}' stopped after {} event(s)", name, processed),
        Err(e) => error!("Handler '{}' did not stop cleanly: {}", name, e),
    }
}
