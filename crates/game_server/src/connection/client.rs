//! Registered client representation.
//!
//! This module defines the registry entry tracked for each connected client:
//! its logical id, the transport session it arrived on, and connection metadata.

use super::session::SessionRef;
use crate::types::{Address, ClientId, SessionId};
use std::net::SocketAddr;
use std::time::SystemTime;

/// A registered client: the bijection entry between a [`ClientId`] and a
/// transport session.
///
/// # Fields
///
/// * `client_id` - Logical id assigned at registration
/// * `session` - Transport handle used to deliver outbound messages
/// * `address` - Logical route the session was opened on
/// * `peer_addr` - Remote network address of the client
/// * `connected_at` - When the client was registered
#[derive(Debug, Clone)]
pub struct ClientEntry {
    /// The logical client id
    pub client_id: ClientId,

    /// Handle of the transport session this client is bound to
    pub session: SessionRef,

    /// Logical route the session was opened on
    pub address: Address,

    /// The remote network address of the client
    pub peer_addr: SocketAddr,

    /// When this client was registered
    pub connected_at: SystemTime,
}

impl ClientEntry {
    /// Creates an entry for a freshly registered session.
    pub fn new(client_id: ClientId, session: SessionRef, address: Address) -> Self {
        let peer_addr = session.peer_addr();
        Self {
            client_id,
            session,
            address,
            peer_addr,
            connected_at: SystemTime::now(),
        }
    }

    /// Identity of the session this client is bound to.
    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }
}

impl std::fmt::Display for ClientEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "client {} ({} from {} on {})",
            self.client_id,
            self.session_id(),
            self.peer_addr,
            self.address
        )
    }
}
