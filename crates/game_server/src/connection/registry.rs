//! Client registry mapping transport sessions to logical client ids.
//!
//! The registry is the bidirectional index between [`SessionId`]s and
//! [`ClientId`]s. It is written only by the gateway handler's worker; other
//! components may hold an `Arc` to it for read-only lookups (for example
//! monitoring), which is why both directions live in concurrent maps.

use super::client::ClientEntry;
use super::session::SessionRef;
use crate::error::RegistryError;
use crate::types::{Address, ClientId, ClientIdGenerator, SessionId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

/// Bidirectional map between transport sessions and client ids.
///
/// # Invariants
///
/// * At any instant a session maps to at most one client id and vice versa.
/// * After removal both directions report not-found, and the id is never
///   handed out again.
///
/// # Architecture
///
/// * `DashMap` for O(1) lookups in both directions without a global lock
/// * Atomic id generation through [`ClientIdGenerator`]
#[derive(Debug, Default)]
pub struct ClientRegistry {
    by_session: DashMap<SessionId, ClientId>,
    by_id: DashMap<ClientId, ClientEntry>,
    ids: ClientIdGenerator,
}

impl ClientRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `session` under a freshly allocated client id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateSession`] if the session is already
    /// registered. The existing entry is left untouched.
    pub fn create(&self, session: SessionRef, address: Address) -> Result<ClientId, RegistryError> {
        let session_id = session.id();
        match self.by_session.entry(session_id) {
            Entry::Occupied(existing) => Err(RegistryError::DuplicateSession {
                session: session_id,
                client: *existing.get(),
            }),
            Entry::Vacant(slot) => {
                let client_id = self.ids.next_id();
                let entry = ClientEntry::new(client_id, session, address);
                info!("🔗 Registered {}", entry);
                self.by_id.insert(client_id, entry);
                slot.insert(client_id);
                Ok(client_id)
            }
        }
    }

    /// Looks up the client id registered for a session.
    pub fn lookup_by_session(&self, session: SessionId) -> Option<ClientId> {
        self.by_session.get(&session).map(|id| *id)
    }

    /// Looks up the entry registered under a client id.
    pub fn lookup_by_id(&self, client_id: ClientId) -> Option<ClientEntry> {
        self.by_id.get(&client_id).map(|entry| entry.clone())
    }

    /// Removes the client registered for `session`. Unknown sessions are a no-op.
    pub fn remove_by_session(&self, session: SessionId) -> Option<ClientEntry> {
        let (_, client_id) = self.by_session.remove(&session)?;
        let removed = self.by_id.remove(&client_id).map(|(_, entry)| entry);
        if let Some(entry) = &removed {
            debug!("❌ Unregistered {}", entry);
        }
        removed
    }

    /// Removes the client registered under `client_id`. Unknown ids are a no-op.
    pub fn remove_by_id(&self, client_id: ClientId) -> Option<ClientEntry> {
        let (_, entry) = self.by_id.remove(&client_id)?;
        self.by_session.remove(&entry.session_id());
        debug!("❌ Unregistered {}", entry);
        Some(entry)
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Snapshot of the registered client ids, in ascending order.
    pub fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.by_id.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::session::TransportSession;
    use std::net::SocketAddr;
    use std::sync::Arc;

    #[derive(Debug)]
    struct StubSession(u64);

    impl TransportSession for StubSession {
        fn id(&self) -> SessionId {
            SessionId(self.0)
        }

        fn peer_addr(&self) -> SocketAddr {
            "127.0.0.1:40000".parse().unwrap()
        }

        fn send_async(&self, _text: String) {}
    }

    fn session(id: u64) -> SessionRef {
        Arc::new(StubSession(id))
    }

    #[test]
    fn test_create_then_lookup_both_directions() {
        let registry = ClientRegistry::new();
        let id = registry.create(session(10), Address::new("/chat")).unwrap();

        assert_eq!(registry.lookup_by_session(SessionId(10)), Some(id));
        let entry = registry.lookup_by_id(id).expect("entry should exist");
        assert_eq!(entry.session_id(), SessionId(10));
        assert_eq!(entry.address, Address::new("/chat"));
        assert_eq!(entry.peer_addr.port(), 40000);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_session_is_rejected_without_overwrite() {
        let registry = ClientRegistry::new();
        let first = registry.create(session(1), Address::new("/a")).unwrap();

        let err = registry.create(session(1), Address::new("/b")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateSession {
                session: SessionId(1),
                client: first,
            }
        );
        assert_eq!(registry.lookup_by_id(first).unwrap().address, Address::new("/a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent_and_clears_both_directions() {
        let registry = ClientRegistry::new();
        let id = registry.create(session(5), Address::new("/a")).unwrap();

        assert_eq!(registry.remove_by_session(SessionId(5)).map(|e| e.client_id), Some(id));
        assert!(registry.remove_by_session(SessionId(5)).is_none());
        assert!(registry.remove_by_id(id).is_none());

        assert!(registry.lookup_by_session(SessionId(5)).is_none());
        assert!(registry.lookup_by_id(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_by_id_clears_session_mapping() {
        let registry = ClientRegistry::new();
        let id = registry.create(session(9), Address::new("/a")).unwrap();

        assert!(registry.remove_by_id(id).is_some());
        assert!(registry.lookup_by_session(SessionId(9)).is_none());
    }

    #[test]
    fn test_ids_are_never_revived() {
        let registry = ClientRegistry::new();
        let first = registry.create(session(1), Address::new("/a")).unwrap();
        registry.remove_by_session(SessionId(1));

        // Same session id reconnecting gets a brand new client id.
        let second = registry.create(session(1), Address::new("/a")).unwrap();
        assert_ne!(first, second);
        assert!(registry.lookup_by_id(first).is_none());
        assert_eq!(registry.client_ids(), vec![second]);
    }
}
