//! # Transport and Runtime Events
//!
//! The two event families routed by the server, one per bus:
//!
//! - [`TransportEvent`] - produced by the network layer, keyed by session
//! - [`RuntimeEvent`] - exchanged with the script runtime, keyed by client id
//!
//! Each family implements [`BusEvent`] with a plain discriminant enum so
//! subscribers select sub-streams without inspecting payloads.

use crate::connection::SessionRef;
use crate::messaging::ScriptValue;
use crate::types::{Address, ClientId};
use event_bus::BusEvent;

// ============================================================================
// Transport Events
// ============================================================================

/// Events emitted by the transport layer for each connection.
///
/// Per session: `SessionOpened` exactly once and first, `MessageReceived` zero or
/// more times, then `SessionFailed` and/or `SessionClosed`. Both terminal events
/// may arrive for one disconnect.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    SessionOpened {
        session: SessionRef,
        address: Address,
    },
    MessageReceived {
        session: SessionRef,
        address: Address,
        text: String,
    },
    SessionFailed {
        session: SessionRef,
        address: Address,
        reason: String,
    },
    SessionClosed {
        session: SessionRef,
        address: Address,
    },
}

/// Discriminant of [`TransportEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportEventKind {
    SessionOpened,
    MessageReceived,
    SessionFailed,
    SessionClosed,
}

impl BusEvent for TransportEvent {
    type Kind = TransportEventKind;

    fn kind(&self) -> TransportEventKind {
        match self {
            Self::SessionOpened { .. } => TransportEventKind::SessionOpened,
            Self::MessageReceived { .. } => TransportEventKind::MessageReceived,
            Self::SessionFailed { .. } => TransportEventKind::SessionFailed,
            Self::SessionClosed { .. } => TransportEventKind::SessionClosed,
        }
    }
}

// ============================================================================
// Runtime Events
// ============================================================================

/// Events exchanged between the gateway and the script runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// A client connected on `address`
    ClientCreated { client_id: ClientId, address: Address },
    /// A client disconnected; its id is dead from now on
    ClientRemoved { client_id: ClientId, address: Address },
    /// A client sent a decoded message
    MessageReceived {
        client_id: ClientId,
        address: Address,
        value: ScriptValue,
    },
    /// Outbound message for a client
    Send { client_id: ClientId, value: ScriptValue },
    /// Start a script worker bound to `address`
    RunWorker { script: String, address: Address },
}

/// Discriminant of [`RuntimeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeEventKind {
    ClientCreated,
    ClientRemoved,
    MessageReceived,
    Send,
    RunWorker,
}

impl BusEvent for RuntimeEvent {
    type Kind = RuntimeEventKind;

    fn kind(&self) -> RuntimeEventKind {
        match self {
            Self::ClientCreated { .. } => RuntimeEventKind::ClientCreated,
            Self::ClientRemoved { .. } => RuntimeEventKind::ClientRemoved,
            Self::MessageReceived { .. } => RuntimeEventKind::MessageReceived,
            Self::Send { .. } => RuntimeEventKind::Send,
            Self::RunWorker { .. } => RuntimeEventKind::RunWorker,
        }
    }
}
