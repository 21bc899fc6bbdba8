// ============================================
// File: crates/sealtalk-server/src/services/registry.rs
// ============================================
//! # Connection Registry
//!
//! ## Creation Reason
//! Tracks every client that completed the handshake so the operator can
//! address it by name and closed connections can be swept away.
//!
//! ## Main Functionality
//! - `ConnectionRegistry`: concurrent map of live clients
//! - `ClientEntry`: peer key, name, liveness handle and outbox of one client
//! - `RegistrationGuard`: removes its entry when the session ends
//!
//! ## Entry Lifecycle
//! ```text
//! handshake ok ──► register ──► (session runs) ──► guard drop ──► unregister
//!                                     │
//!                                     └─ liveness closed ──► reap_closed
//! ```
//! An entry is added once and removed once; whichever of `unregister` and
//! `reap_closed` gets there first wins, the other is a no-op.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The registry never owns a socket; it holds the session's stop signal
//!   as its liveness handle and a sender into the session's send loop
//! - Removal is atomic per key (`DashMap::remove_if`), so reaping and
//!   unregistering can race safely
//!
//! ## Last Modified
//! v0.1.0 - Initial connection registry

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

use sealtalk_common::{ConnectionId, DisplayName};
use sealtalk_core::{Fingerprint, PublicKey};
use sealtalk_transport::StopSignal;

use crate::error::{Result, ServerError};

// ============================================
// ClientEntry
// ============================================

/// A registered client.
#[derive(Debug)]
pub struct ClientEntry {
    id: ConnectionId,
    name: DisplayName,
    peer_key: PublicKey,
    fingerprint: Fingerprint,
    liveness: StopSignal,
    outbox: mpsc::Sender<String>,
    registered_at: Instant,
}

impl ClientEntry {
    /// Returns the connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &DisplayName {
        &self.name
    }

    /// Returns the verified client key.
    #[must_use]
    pub fn peer_key(&self) -> &PublicKey {
        &self.peer_key
    }

    /// Returns the client key fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Returns how long the client has been registered.
    #[must_use]
    pub fn connected_for(&self) -> Duration {
        self.registered_at.elapsed()
    }

    /// Returns `true` once the session has stopped or dropped its outbox.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.liveness.is_triggered() || self.outbox.is_closed()
    }
}

// ============================================
// ConnectionRegistry
// ============================================

/// Concurrent registry of established client connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: DashMap<ConnectionId, Arc<ClientEntry>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client after a successful handshake.
    ///
    /// # Errors
    /// Returns `AlreadyRegistered` if `id` is present.
    pub fn register(
        &self,
        id: ConnectionId,
        name: DisplayName,
        peer_key: PublicKey,
        liveness: StopSignal,
        outbox: mpsc::Sender<String>,
    ) -> Result<()> {
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(ServerError::AlreadyRegistered(id)),
            Entry::Vacant(slot) => {
                let fingerprint = peer_key.fingerprint();
                info!(id = %id, name = %name, fingerprint = %fingerprint, "Client registered");
                slot.insert(Arc::new(ClientEntry {
                    id,
                    name,
                    peer_key,
                    fingerprint,
                    liveness,
                    outbox,
                    registered_at: Instant::now(),
                }));
                Ok(())
            }
        }
    }

    /// Removes a client. Returns `true` if it was present.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        match self.entries.remove(&id) {
            Some((_, entry)) => {
                info!(
                    id = %id,
                    name = %entry.name,
                    connected_secs = entry.connected_for().as_secs(),
                    "Client unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Removes every entry whose liveness handle reports closed.
    ///
    /// Returns the ids that this call removed.
    pub fn reap_closed(&self) -> Vec<ConnectionId> {
        let candidates: Vec<ConnectionId> = self
            .entries
            .iter()
            .filter(|e| e.value().is_closed())
            .map(|e| *e.key())
            .collect();

        let reaped: Vec<ConnectionId> = candidates
            .into_iter()
            .filter(|id| self.entries.remove_if(id, |_, entry| entry.is_closed()).is_some())
            .collect();

        if !reaped.is_empty() {
            debug!(count = reaped.len(), "Reaped closed connections");
        }
        reaped
    }

    /// Returns a client by id.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Arc<ClientEntry>> {
        self.entries.get(&id).map(|e| Arc::clone(e.value()))
    }

    /// Returns a client by display name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<Arc<ClientEntry>> {
        self.entries
            .iter()
            .find(|e| e.value().name.as_str() == name)
            .map(|e| Arc::clone(e.value()))
    }

    /// Queues `text` for delivery to the client named `name`.
    ///
    /// # Errors
    /// - `ClientNotFound` if nobody has that name
    /// - `ClientUnavailable` if the client's outbox is full or closed
    pub fn send_to(&self, name: &str, text: impl Into<String>) -> Result<()> {
        let entry = self
            .find_by_name(name)
            .ok_or_else(|| ServerError::ClientNotFound { name: name.to_string() })?;

        entry.outbox.try_send(text.into()).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "outbox full",
                TrySendError::Closed(_) => "session closed",
            };
            ServerError::ClientUnavailable {
                name: name.to_string(),
                reason: reason.to_string(),
            }
        })
    }

    /// Returns the names of all registered clients, oldest first.
    #[must_use]
    pub fn names(&self) -> Vec<DisplayName> {
        let mut entries: Vec<(ConnectionId, DisplayName)> = self
            .entries
            .iter()
            .map(|e| (*e.key(), e.value().name.clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, name)| name).collect()
    }

    /// Triggers the stop signal of every registered session.
    pub fn stop_all(&self) {
        for entry in &self.entries {
            entry.value().liveness.trigger();
        }
    }

    /// Returns the number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no client is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================
// RegistrationGuard
// ============================================

/// Unregisters its connection when dropped.
#[derive(Debug)]
#[must_use = "the entry is removed as soon as the guard is dropped"]
pub struct RegistrationGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl RegistrationGuard {
    /// Guards the entry `id` of `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>, id: ConnectionId) -> Self {
        Self { registry, id }
    }

    /// Returns the guarded id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::thread;

    use sealtalk_core::crypto::keys::test_support::{alice, bob};

    use super::*;

    fn add(registry: &ConnectionRegistry, raw: u64) -> (StopSignal, mpsc::Receiver<String>) {
        let stop = StopSignal::new();
        let (tx, rx) = mpsc::channel(4);
        let id = ConnectionId::new(raw);
        registry
            .register(id, DisplayName::sequential(id), alice().public_key().clone(), stop.clone(), tx)
            .unwrap();
        (stop, rx)
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ConnectionRegistry::new();
        let _handles = add(&registry, 0);

        let entry = registry.get(ConnectionId::new(0)).unwrap();
        assert_eq!(entry.name().as_str(), "Client-0");
        assert_eq!(entry.fingerprint(), alice().fingerprint());
        assert!(!entry.is_closed());
        assert!(entry.connected_for() < Duration::from_secs(60));
        assert_eq!(registry.find_by_name("Client-0").unwrap().id(), ConnectionId::new(0));
        assert!(registry.find_by_name("Client-1").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registry = ConnectionRegistry::new();
        let _handles = add(&registry, 5);

        let (tx, _rx) = mpsc::channel(1);
        let err = registry
            .register(
                ConnectionId::new(5),
                DisplayName::new("Other").unwrap(),
                bob().public_key().clone(),
                StopSignal::new(),
                tx,
            )
            .unwrap_err();
        assert!(matches!(err, ServerError::AlreadyRegistered(id) if id == ConnectionId::new(5)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(ConnectionId::new(5)).unwrap().name().as_str(), "Client-5");
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let _handles = add(&registry, 1);

        assert!(registry.unregister(ConnectionId::new(1)));
        assert!(!registry.unregister(ConnectionId::new(1)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_register_unregister() {
        const N: u64 = 64;
        const M: u64 = 24;

        let registry = Arc::new(ConnectionRegistry::new());
        let workers: Vec<_> = (0..N)
            .map(|raw| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let handles = add(&registry, raw);
                    if raw < M {
                        assert!(registry.unregister(ConnectionId::new(raw)));
                    }
                    handles
                })
            })
            .collect();

        let _handles: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert_eq!(registry.len(), usize::try_from(N - M).unwrap());
    }

    #[test]
    fn test_reap_leaves_open_connections() {
        let registry = ConnectionRegistry::new();
        let _handles: Vec<_> = (0..5).map(|raw| add(&registry, raw)).collect();

        assert!(registry.reap_closed().is_empty());
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_reap_removes_closed_connections() {
        let registry = ConnectionRegistry::new();
        let (stop_a, _rx_a) = add(&registry, 0);
        let (_stop_b, rx_b) = add(&registry, 1);
        let _open = add(&registry, 2);

        stop_a.trigger();
        drop(rx_b);

        let mut reaped = registry.reap_closed();
        reaped.sort();
        assert_eq!(reaped, vec![ConnectionId::new(0), ConnectionId::new(1)]);
        assert_eq!(registry.len(), 1);

        // Already gone: neither a second reap nor unregister finds them
        assert!(registry.reap_closed().is_empty());
        assert!(!registry.unregister(ConnectionId::new(0)));
    }

    #[tokio::test]
    async fn test_send_to_routes_to_outbox() {
        let registry = ConnectionRegistry::new();
        let (_stop, mut rx) = add(&registry, 3);

        registry.send_to("Client-3", "hello").unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));

        assert!(matches!(
            registry.send_to("Client-4", "nobody"),
            Err(ServerError::ClientNotFound { .. })
        ));

        drop(rx);
        assert!(matches!(
            registry.send_to("Client-3", "late"),
            Err(ServerError::ClientUnavailable { .. })
        ));
    }

    #[test]
    fn test_names_in_connection_order() {
        let registry = ConnectionRegistry::new();
        let _handles: Vec<_> = [2, 0, 1].into_iter().map(|raw| add(&registry, raw)).collect();

        let names: Vec<String> = registry.names().into_iter().map(String::from).collect();
        assert_eq!(names, vec!["Client-0", "Client-1", "Client-2"]);
    }

    #[test]
    fn test_stop_all_marks_everything_closed() {
        let registry = ConnectionRegistry::new();
        let (stop, _rx) = add(&registry, 0);
        registry.stop_all();
        assert!(stop.is_triggered());
        assert_eq!(registry.reap_closed().len(), 1);
    }

    #[test]
    fn test_guard_unregisters_on_drop() {
        let registry = Arc::new(ConnectionRegistry::new());
        let _handles = add(&registry, 9);

        let guard = RegistrationGuard::new(Arc::clone(&registry), ConnectionId::new(9));
        assert_eq!(guard.id(), ConnectionId::new(9));
        drop(guard);
        assert!(registry.is_empty());
    }
}
