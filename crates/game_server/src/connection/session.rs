//! Transport session handles as seen by the core.
//!
//! The transport owns its sessions; the core only stores the handle, compares
//! it by [`SessionId`] and asks it to deliver text.

use crate::types::SessionId;
use std::net::SocketAddr;
use std::sync::Arc;

/// One live network connection owned by the transport layer.
pub trait TransportSession: Send + Sync + std::fmt::Debug {
    /// Stable identity of this session.
    fn id(&self) -> SessionId;

    /// Remote address of the peer.
    fn peer_addr(&self) -> SocketAddr;

    /// Queues `text` as one frame for asynchronous, best-effort delivery.
    ///
    /// Must not block. Delivery failures are handled (and logged) by the
    /// transport; the caller is never told.
    fn send_async(&self, text: String);
}

/// Shared handle to a transport session.
pub type SessionRef = Arc<dyn TransportSession>;
