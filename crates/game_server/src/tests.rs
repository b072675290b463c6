use crate::connection::{ClientRegistry, SessionRef, TransportSession};
use crate::messaging::{JsonCodec, ScriptValue};
use crate::runtime::{BuiltinWorkers, RuntimeHost};
use crate::*;
use event_bus::{EventBus, HandlerError, KindFilter, ShutdownState, Subscription};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

/// Session double that records every frame handed to it.
#[derive(Debug)]
struct RecordingSession {
    id: SessionId,
    sent: Mutex<Vec<String>>,
}

impl RecordingSession {
    fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId(id),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl TransportSession for RecordingSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    fn send_async(&self, text: String) {
        self.sent.lock().unwrap().push(text);
    }
}

struct GatewayFixture {
    gateway: GatewayHandler,
    registry: Arc<ClientRegistry>,
    client_events: Subscription<RuntimeEvent>,
}

fn gateway_fixture() -> GatewayFixture {
    let registry = Arc::new(ClientRegistry::new());
    let runtime_bus = Arc::new(EventBus::new("runtime", 64));
    let client_events = runtime_bus.subscribe(
        "observer",
        KindFilter::one_of([
            RuntimeEventKind::ClientCreated,
            RuntimeEventKind::ClientRemoved,
            RuntimeEventKind::MessageReceived,
        ]),
    );
    let gateway = GatewayHandler::new(Arc::clone(&registry), runtime_bus, Arc::new(JsonCodec::default()));
    GatewayFixture {
        gateway,
        registry,
        client_events,
    }
}

fn opened(session: &Arc<RecordingSession>, path: &str) -> TransportEvent {
    let session: SessionRef = session.clone();
    TransportEvent::SessionOpened {
        session,
        address: Address::new(path),
    }
}

fn message(session: &Arc<RecordingSession>, path: &str, text: &str) -> TransportEvent {
    let session: SessionRef = session.clone();
    TransportEvent::MessageReceived {
        session,
        address: Address::new(path),
        text: text.to_string(),
    }
}

fn failed(session: &Arc<RecordingSession>, path: &str) -> TransportEvent {
    let session: SessionRef = session.clone();
    TransportEvent::SessionFailed {
        session,
        address: Address::new(path),
        reason: "connection reset".to_string(),
    }
}

fn closed(session: &Arc<RecordingSession>, path: &str) -> TransportEvent {
    let session: SessionRef = session.clone();
    TransportEvent::SessionClosed {
        session,
        address: Address::new(path),
    }
}

fn drain(subscription: &mut Subscription<RuntimeEvent>) -> Vec<RuntimeEvent> {
    std::iter::from_fn(|| subscription.try_recv()).collect()
}

#[test]
fn test_session_lifecycle_scenario() {
    let mut fx = gateway_fixture();
    let session = RecordingSession::new(1);
    let echo = Address::new("/echo");

    fx.gateway.handle_transport_event(opened(&session, "/echo")).unwrap();
    fx.gateway
        .handle_transport_event(message(&session, "/echo", r#"{"a":1}"#))
        .unwrap();
    fx.gateway
        .handle_runtime_event(RuntimeEvent::Send {
            client_id: ClientId(1),
            value: ScriptValue::new(json!({"a": 1})),
        })
        .unwrap();
    fx.gateway.handle_transport_event(closed(&session, "/echo")).unwrap();

    // Sends after removal reach nobody.
    fx.gateway
        .handle_runtime_event(RuntimeEvent::Send {
            client_id: ClientId(1),
            value: ScriptValue::new(json!("late")),
        })
        .unwrap();

    assert_eq!(
        drain(&mut fx.client_events),
        vec![
            RuntimeEvent::ClientCreated {
                client_id: ClientId(1),
                address: echo.clone()
            },
            RuntimeEvent::MessageReceived {
                client_id: ClientId(1),
                address: echo.clone(),
                value: ScriptValue::new(json!({"a": 1}))
            },
            RuntimeEvent::ClientRemoved {
                client_id: ClientId(1),
                address: echo
            },
        ]
    );
    assert_eq!(session.sent(), vec![r#"{"a":1}"#.to_string()]);
    assert!(fx.registry.is_empty());
}

#[test]
fn test_duplicate_terminal_events_remove_once() {
    let mut fx = gateway_fixture();
    let session = RecordingSession::new(9);

    fx.gateway.handle_transport_event(opened(&session, "/chat")).unwrap();
    fx.gateway.handle_transport_event(failed(&session, "/chat")).unwrap();
    fx.gateway.handle_transport_event(closed(&session, "/chat")).unwrap();

    let removed = drain(&mut fx.client_events)
        .into_iter()
        .filter(|event| matches!(event, RuntimeEvent::ClientRemoved { .. }))
        .count();
    assert_eq!(removed, 1);
}

#[test]
fn test_terminal_event_without_open_is_silent() {
    let mut fx = gateway_fixture();
    let session = RecordingSession::new(3);

    fx.gateway.handle_transport_event(closed(&session, "/chat")).unwrap();
    fx.gateway.handle_transport_event(failed(&session, "/chat")).unwrap();
    fx.gateway
        .handle_transport_event(message(&session, "/chat", "{}"))
        .unwrap();

    assert!(drain(&mut fx.client_events).is_empty());
    assert!(fx.registry.is_empty());
}

#[test]
fn test_undecodable_message_is_dropped() {
    let mut fx = gateway_fixture();
    let session = RecordingSession::new(4);

    fx.gateway.handle_transport_event(opened(&session, "/echo")).unwrap();
    fx.gateway
        .handle_transport_event(message(&session, "/echo", "not valid payload"))
        .unwrap();

    let events = drain(&mut fx.client_events);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], RuntimeEvent::ClientCreated { .. }));
    assert_eq!(fx.registry.lookup_by_session(SessionId(4)), Some(ClientId(1)));
}

#[test]
fn test_duplicate_open_is_reported_not_fatal() {
    let mut fx = gateway_fixture();
    let session = RecordingSession::new(5);

    fx.gateway.handle_transport_event(opened(&session, "/echo")).unwrap();
    let err = fx
        .gateway
        .handle_transport_event(opened(&session, "/echo"))
        .unwrap_err();

    assert!(matches!(err, HandlerError::Callback(_)));
    assert!(err.to_string().contains("Registry consistency error for"));
    assert!(!err.is_fatal());
    assert_eq!(drain(&mut fx.client_events).len(), 1);
    assert_eq!(fx.registry.len(), 1);
}

#[test]
fn test_each_session_gets_its_own_client() {
    let mut fx = gateway_fixture();
    let sessions: Vec<_> = (10..13).map(RecordingSession::new).collect();

    for session in &sessions {
        fx.gateway.handle_transport_event(opened(session, "/lobby")).unwrap();
    }

    let created: Vec<ClientId> = drain(&mut fx.client_events)
        .into_iter()
        .filter_map(|event| match event {
            RuntimeEvent::ClientCreated { client_id, .. } => Some(client_id),
            _ => None,
        })
        .collect();
    assert_eq!(created, vec![ClientId(1), ClientId(2), ClientId(3)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_echo_pipeline_through_handlers() {
    let transport_bus = Arc::new(EventBus::new("transport", 64));
    let runtime_bus = Arc::new(EventBus::new("runtime", 64));
    let registry = Arc::new(ClientRegistry::new());

    let gateway = GatewayHandler::new(
        Arc::clone(&registry),
        Arc::clone(&runtime_bus),
        Arc::new(JsonCodec::default()),
    )
    .into_handler(&transport_bus, 64)
    .start();
    let runtime = RuntimeHost::new(Arc::new(BuiltinWorkers), Arc::clone(&runtime_bus))
        .into_handler(64)
        .start();

    runtime_bus
        .publish(RuntimeEvent::RunWorker {
            script: "echo".to_string(),
            address: Address::new("/echo"),
        })
        .unwrap();

    let session = RecordingSession::new(1);
    transport_bus.publish(opened(&session, "/echo")).unwrap();
    transport_bus
        .publish(message(&session, "/echo", r#"{"ping":true}"#))
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while session.sent().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("echo should arrive");
    assert_eq!(session.sent(), vec![r#"{"ping":true}"#.to_string()]);

    gateway.stop().await.unwrap();
    let host = runtime.stop().await.unwrap();
    assert_eq!(host.clients_at(&Address::new("/echo")), vec![ClientId(1)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_runtime_saturation_initiates_shutdown() {
    let transport_bus = Arc::new(EventBus::new("transport", 64));
    let runtime_bus = Arc::new(EventBus::new("runtime", 1));
    // Never drained, so the second runtime event saturates it.
    let _stalled = runtime_bus.subscribe("stalled", KindFilter::any());
    let shutdown = ShutdownState::new();

    let gateway = GatewayHandler::new(
        Arc::new(ClientRegistry::new()),
        Arc::clone(&runtime_bus),
        Arc::new(JsonCodec::default()),
    )
    .into_handler(&transport_bus, 64)
    .with_shutdown(shutdown.clone())
    .start();

    for id in 1..=2 {
        transport_bus.publish(opened(&RecordingSession::new(id), "/echo")).unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), shutdown.wait_for_shutdown())
        .await
        .expect("saturation should initiate shutdown");
    assert!(shutdown.is_shutdown_initiated());
    let _ = gateway.stop().await;
}

async fn start_test_server(config: ServerConfig) -> (Arc<GameServer>, SocketAddr, ShutdownState, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(create_server_with_config(config));
    let shutdown = ShutdownState::new();

    let task = {
        let server = Arc::clone(&server);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            server.serve(listener, shutdown).await.unwrap();
        })
    };
    (server, addr, shutdown, task)
}

async fn next_text<S>(ws: &mut S) -> String
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame should arrive")
            .expect("stream should stay open")
            .expect("frame should be valid");
        if let Message::Text(text) = frame {
            return text.as_str().to_owned();
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_websocket_echo_round_trip() {
    let (server, addr, shutdown, task) = start_test_server(ServerConfig::default()).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/echo"))
        .await
        .unwrap();
    ws.send(Message::Text(r#"{"hello":"world"}"#.to_string().into()))
        .await
        .unwrap();
    assert_eq!(next_text(&mut ws).await, r#"{"hello":"world"}"#);
    assert_eq!(server.registry().len(), 1);

    ws.close(None).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !server.registry().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("client should be removed after close");

    shutdown.initiate_shutdown();
    task.await.unwrap();
    assert!(server.transport_bus().is_closed());
    assert!(server.runtime_bus().is_closed());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_websocket_chat_broadcast() {
    let (_server, addr, shutdown, task) = start_test_server(ServerConfig::default()).await;

    let (mut alice, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/chat"))
        .await
        .unwrap();
    let joined: serde_json::Value = serde_json::from_str(&next_text(&mut alice).await).unwrap();
    assert_eq!(joined["event"], "joined");

    let (mut bob, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/chat"))
        .await
        .unwrap();
    bob.send(Message::Text(r#""hi""#.to_string().into())).await.unwrap();

    // Alice sees Bob join, then his message.
    let relayed = loop {
        let value: serde_json::Value = serde_json::from_str(&next_text(&mut alice).await).unwrap();
        if value["event"] == "message" {
            break value;
        }
    };
    assert_eq!(relayed["message"], "hi");

    shutdown.initiate_shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_connections_over_limit_are_refused() {
    let config = ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    };
    let (_server, addr, shutdown, task) = start_test_server(config).await;

    let (_first, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/echo"))
        .await
        .unwrap();
    assert!(tokio_tungstenite::connect_async(format!("ws://{addr}/echo"))
        .await
        .is_err());

    shutdown.initiate_shutdown();
    task.await.unwrap();
}

fn client_created(id: u64) -> RuntimeEvent {
    RuntimeEvent::ClientCreated {
        client_id: ClientId(id),
        address: Address::new("/observed"),
    }
}

#[test]
fn test_bus_queue_capacity_bounds_runtime_subscriptions() {
    let tight = GameServer::new(ServerConfig {
        bus_queue_capacity: 1,
        ..ServerConfig::default()
    });
    let _slow = tight.subscribe_runtime("slow", KindFilter::only(RuntimeEventKind::ClientCreated));
    tight.runtime_bus().publish(client_created(1)).unwrap();
    let err = tight.runtime_bus().publish(client_created(2)).unwrap_err();
    assert!(err.to_string().contains("'slow'"));

    let roomy = GameServer::new(ServerConfig {
        bus_queue_capacity: 2,
        ..ServerConfig::default()
    });
    let mut observer = roomy.subscribe_runtime("observer", KindFilter::only(RuntimeEventKind::ClientCreated));
    roomy.runtime_bus().publish(client_created(1)).unwrap();
    roomy.runtime_bus().publish(client_created(2)).unwrap();
    assert_eq!(observer.pending(), 2);
    assert!(matches!(
        observer.try_recv(),
        Some(RuntimeEvent::ClientCreated { client_id: ClientId(1), .. })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_removes_connected_clients() {
    let (server, addr, shutdown, task) = start_test_server(ServerConfig::default()).await;
    let mut removals = server.subscribe_runtime("removals", KindFilter::only(RuntimeEventKind::ClientRemoved));

    let (_ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/echo"))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while server.registry().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("client should be registered");

    // The client never closes; shutdown alone must unregister it.
    shutdown.initiate_shutdown();
    task.await.unwrap();

    assert!(server.registry().is_empty());
    let removed = removals.recv().await.expect("ClientRemoved should be published");
    assert!(matches!(removed, RuntimeEvent::ClientRemoved { client_id: ClientId(1), .. }));
    assert!(removals.recv().await.is_none());
}
