//! WebSocket transport: one task per connection.
//!
//! This module owns the network side of a session. It performs the WebSocket
//! handshake, publishes the session's lifecycle onto the transport bus and
//! drains the session's outbound queue into the socket.

use crate::connection::{SessionRef, TransportSession};
use crate::error::ServerError;
use crate::events::TransportEvent;
use crate::types::{Address, SessionId};
use event_bus::{BusError, EventBus, ShutdownState};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

/// Shared settings and handles for every connection task.
#[derive(Debug, Clone)]
pub struct TransportContext {
    pub transport_bus: Arc<EventBus<TransportEvent>>,
    pub shutdown: ShutdownState,
    pub max_message_size: usize,
    pub outbound_queue_capacity: usize,
}

/// Session handle backed by a bounded outbound queue.
///
/// The connection's writer task drains the queue into the socket.
#[derive(Debug)]
pub struct WebSocketSession {
    id: SessionId,
    peer_addr: SocketAddr,
    outbound: mpsc::Sender<String>,
}

impl TransportSession for WebSocketSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    fn send_async(&self, text: String) {
        match self.outbound.try_send(text) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("📪 Outbound queue of {} full, message dropped", self.id);
            }
            Err(TrySendError::Closed(_)) => {
                debug!("{} already closed, message dropped", self.id);
            }
        }
    }
}

/// Why the read loop of a connection ended.
enum ReadOutcome {
    Closed,
    Failed(String),
    Shutdown,
    BusClosed,
}

/// Handles a single client connection from handshake to the final
/// `SessionClosed` event.
///
/// # Connection Flow
///
/// 1. Perform the WebSocket handshake, capturing the request path as the address
/// 2. Publish `SessionOpened`
/// 3. Spawn the writer task draining the outbound queue
/// 4. Publish one `MessageReceived` per text frame until close, error or shutdown
/// 5. Publish `SessionFailed` on a read error, then always `SessionClosed`
///
/// # Errors
///
/// A failed handshake is a [`ServerError::Network`]. A saturated transport
/// bus initiates process shutdown and is returned as [`ServerError::Bus`].
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    session_id: SessionId,
    context: TransportContext,
) -> Result<(), ServerError> {
    let mut path = String::from("/");
    let capture_path = |request: &Request, response: Response| {
        path = request.uri().path().to_string();
        Ok::<Response, ErrorResponse>(response)
    };
    let ws_stream = accept_hdr_async(stream, capture_path)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;
    let address = Address::new(&path);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(context.outbound_queue_capacity.max(1));
    let session: SessionRef = Arc::new(WebSocketSession {
        id: session_id,
        peer_addr,
        outbound: outbound_tx,
    });
    debug!("🔌 {} from {} opened on {}", session_id, peer_addr, address);

    if !publish(
        &context,
        TransportEvent::SessionOpened {
            session: Arc::clone(&session),
            address: address.clone(),
        },
    )? {
        return Ok(());
    }

    let writer = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                debug!("Failed to write to {}: {}", session_id, e);
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let outcome = loop {
        let frame = tokio::select! {
            _ = context.shutdown.wait_for_shutdown() => break ReadOutcome::Shutdown,
            frame = ws_receiver.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                if text.len() > context.max_message_size {
                    warn!(
                        "📏 Frame of {} bytes from {} exceeds limit {}, dropped",
                        text.len(),
                        session_id,
                        context.max_message_size
                    );
                    continue;
                }
                let event = TransportEvent::MessageReceived {
                    session: Arc::clone(&session),
                    address: address.clone(),
                    text: text.as_str().to_owned(),
                };
                if !publish(&context, event)? {
                    break ReadOutcome::BusClosed;
                }
            }
            Some(Ok(Message::Binary(data))) => {
                trace!("Ignoring {} byte binary frame from {}", data.len(), session_id);
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!("🔌 {} requested close", session_id);
                break ReadOutcome::Closed;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!("WebSocket error on {}: {}", session_id, e);
                break ReadOutcome::Failed(e.to_string());
            }
        }
    };

    let result = match outcome {
        ReadOutcome::Failed(reason) => publish(
            &context,
            TransportEvent::SessionFailed {
                session: Arc::clone(&session),
                address: address.clone(),
                reason,
            },
        )
        .map(|_| ()),
        ReadOutcome::Closed | ReadOutcome::Shutdown | ReadOutcome::BusClosed => Ok(()),
    };

    // Always the last event of a session, even after SessionFailed.
    let closed = publish(&context, TransportEvent::SessionClosed { session, address });
    writer.abort();
    result.and(closed.map(|_| ()))
}

/// Publishes onto the transport bus.
///
/// Returns `Ok(false)` once the bus is closed. Saturation initiates process
/// shutdown.
fn publish(context: &TransportContext, event: TransportEvent) -> Result<bool, ServerError> {
    match context.transport_bus.publish(event) {
        Ok(_) => Ok(true),
        Err(BusError::Closed { .. }) => Ok(false),
        Err(e) => {
            error!("💥 Transport bus saturated: {}", e);
            context.shutdown.initiate_shutdown();
            Err(ServerError::Bus(e))
        }
    }
}
