// ============================================
// File: crates/sealtalk-server/src/server.rs
// ============================================
//! # Server Orchestrator
//!
//! ## Creation Reason
//! Accepts client connections, runs the handshake and an encrypted session
//! for each, and keeps the connection registry tidy.
//!
//! ## Main Functionality
//! - `Server`: listener, dispatcher and lifecycle management
//! - Bounded worker pool: at most `max_clients` sessions run at once,
//!   later connections wait for a slot
//! - Reaper task sweeping closed registry entries
//! - Graceful shutdown handling
//!
//! ## Server Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Server                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   name Client-N   ┌────────────────────┐  │
//! │  │ Accept Loop  │ ────────────────► │ Connection Task    │  │
//! │  └──────────────┘                   │  wait for permit   │  │
//! │                                     │  handshake         │  │
//! │  ┌──────────────┐                   │  register          │  │
//! │  │ Reaper Task  │ ── reap_closed ─► │  session loops     │  │
//! │  └──────────────┘        │          │  unregister (drop) │  │
//! │                          ▼          └────────────────────┘  │
//! │                 ┌────────────────────┐                      │
//! │                 │ ConnectionRegistry │ ◄── operator @name   │
//! │                 └────────────────────┘                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A saturated pool queues connections; nothing is sent to a queued
//!   client until it gets a permit
//! - Security failures during the handshake are logged as alerts and the
//!   connection is dropped without a reply
//! - Graceful shutdown waits up to 5 seconds for tasks to complete
//!
//! ## Last Modified
//! v0.1.0 - Initial server implementation

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use sealtalk_common::{ConnectionId, ConnectionIdGenerator, DisplayName};
use sealtalk_core::{CoreError, KeyPair, SecureChannel};
use sealtalk_transport::{
    run_responder, tcp, ChannelSource, LineReader, LineWriter, MessageSink, Session,
    SessionOutcome, StopSignal,
};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::services::{ConnectionRegistry, RegistrationGuard};

/// Time allowed for tasks to finish after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Operator messages buffered per client.
const OUTBOX_CAPACITY: usize = 32;

// ============================================
// Server
// ============================================

/// Main SealTalk server.
///
/// # Lifecycle
/// 1. Create with `Server::new(config, identity)`
/// 2. Start with `server.run().await` (binds and handles Ctrl+C) or
///    `server.serve(listener).await`
/// 3. Shutdown via Ctrl+C or `server.shutdown()`
pub struct Server {
    /// Server configuration.
    config: ServerConfig,
    /// Server RSA identity.
    identity: Arc<KeyPair>,
    /// Live connections.
    registry: Arc<ConnectionRegistry>,
    /// Shutdown flag.
    shutdown: Arc<AtomicBool>,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Creates a new server instance.
    pub fn new(config: ServerConfig, identity: Arc<KeyPair>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            identity,
            registry: Arc::new(ConnectionRegistry::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Returns the connection registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Subscribes to the shutdown signal.
    #[must_use]
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Binds the configured address and serves until Ctrl+C.
    ///
    /// # Errors
    /// Returns `Transport(AddressInUse | BindFailed)` if the listener cannot
    /// be bound.
    pub async fn run(&self) -> Result<()> {
        info!("Starting SealTalk server v{}", env!("CARGO_PKG_VERSION"));

        let listener = tcp::bind_listener(self.config.listen_addr())?;

        let serve = self.serve(listener);
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => return result,
            () = wait_for_ctrl_c() => self.shutdown(),
        }
        serve.await
    }

    /// Serves connections from `listener` until shutdown.
    ///
    /// # Errors
    /// Currently infallible once the listener is bound.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(
            fingerprint = %self.identity.fingerprint(),
            max_clients = self.config.max_clients(),
            "Listening on {}",
            local_addr
        );

        let reaper = self.spawn_reaper_task();
        let permits = Arc::new(Semaphore::new(self.config.max_clients()));
        let ids = ConnectionIdGenerator::new();
        let mut tasks = JoinSet::new();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Accept loop received shutdown signal");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        let id = ids.next_id();
                        let name = DisplayName::sequential(id);
                        info!(peer = %peer_addr, name = %name, "Accepted connection");

                        let handler = ConnectionHandler {
                            identity: Arc::clone(&self.identity),
                            registry: Arc::clone(&self.registry),
                            read_timeout: self.config.read_timeout(),
                        };
                        let permits = Arc::clone(&permits);
                        tasks.spawn(async move {
                            if permits.available_permits() == 0 {
                                info!(name = %name, "All worker slots busy, connection queued");
                            }
                            let Ok(_permit) = permits.acquire_owned().await else {
                                debug!(name = %name, "Dropped queued connection on shutdown");
                                return;
                            };
                            handler.handle(stream, peer_addr, id, name).await;
                        });
                    }
                    Err(e) => {
                        warn!("Accept failed: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Connection task failed: {}", e);
                    }
                }
            }
        }

        // Stop accepting, close the queue and wake running sessions
        info!("Shutting down server...");
        drop(listener);
        permits.close();
        self.registry.stop_all();

        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    debug!("Connection task ended with error: {}", e);
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!("Connection tasks timed out during shutdown, aborting");
            tasks.shutdown().await;
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, reaper).await {
            Ok(Ok(())) => debug!("Reaper task completed"),
            Ok(Err(e)) => warn!("Reaper task failed: {}", e),
            Err(_) => warn!("Reaper task timed out during shutdown"),
        }

        info!("Server shutdown complete");
        Ok(())
    }

    /// Spawns the registry reaper task.
    fn spawn_reaper_task(&self) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let shutdown = Arc::clone(&self.shutdown);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = self.config.reap_interval();

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            // The first tick completes immediately
            interval_timer.tick().await;

            while !shutdown.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Reaper task received shutdown signal");
                        break;
                    }
                    _ = interval_timer.tick() => {
                        let reaped = registry.reap_closed();
                        for id in &reaped {
                            debug!(id = %id, "Reaped closed connection");
                        }
                        debug!(
                            reaped = reaped.len(),
                            connected = registry.len(),
                            "Reap cycle complete"
                        );
                    }
                }
            }

            debug!("Reaper task exiting");
        })
    }

    /// Triggers server shutdown programmatically.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listen_addr", &self.config.listen_addr())
            .field("fingerprint", &self.identity.fingerprint())
            .field("clients", &self.registry.len())
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C.
async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

// ============================================
// ConnectionHandler
// ============================================

/// Per-connection work: handshake, registration and session.
struct ConnectionHandler {
    identity: Arc<KeyPair>,
    registry: Arc<ConnectionRegistry>,
    read_timeout: Duration,
}

impl ConnectionHandler {
    async fn handle(
        self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        id: ConnectionId,
        name: DisplayName,
    ) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer_addr, "Failed to set TCP_NODELAY: {}", e);
        }
        let (read_half, write_half) = stream.into_split();
        let mut reader = LineReader::new(read_half);
        let mut writer = LineWriter::new(write_half);

        let peer = match run_responder(
            &mut reader,
            &mut writer,
            Arc::clone(&self.identity),
            name.clone(),
            self.read_timeout,
        )
        .await
        {
            Ok(peer) => peer,
            Err(e) if e.is_security_alert() => {
                error!(
                    peer = %peer_addr,
                    name = %name,
                    error = %e,
                    "SECURITY ALERT: client key verification failed, connection dropped"
                );
                return;
            }
            Err(e) => {
                warn!(peer = %peer_addr, name = %name, error = %e, "Handshake failed");
                return;
            }
        };

        let stop = StopSignal::new();
        let (outbox, source) = ChannelSource::channel(OUTBOX_CAPACITY);
        if let Err(e) = self.registry.register(
            id,
            name.clone(),
            peer.public_key.clone(),
            stop.clone(),
            outbox,
        ) {
            error!(name = %name, error = %e, "Registration failed");
            return;
        }
        let _guard = RegistrationGuard::new(Arc::clone(&self.registry), id);

        let channel = SecureChannel::new(Arc::clone(&self.identity), peer.public_key);
        let sink = ClientSink { name: name.clone() };
        let outcome = Session::new(reader, writer, channel, stop, self.read_timeout)
            .run(source, &sink)
            .await;

        match outcome {
            SessionOutcome::Failed(e) => warn!(name = %name, error = %e, "Session failed"),
            SessionOutcome::TimedOut => warn!(name = %name, "Client timed out"),
            other => info!(name = %name, outcome = ?other, "Client disconnected"),
        }
    }
}

// ============================================
// ClientSink
// ============================================

/// Logs what a client sends to the operator.
struct ClientSink {
    name: DisplayName,
}

#[async_trait]
impl MessageSink for ClientSink {
    async fn on_message(&self, text: &str) {
        info!(from = %self.name, "{}", text);
    }

    async fn on_rejected(&self, error: &CoreError) {
        warn!(client = %self.name, error = %error, "Message rejected");
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::sync::mpsc;

    use sealtalk_core::crypto::keys::test_support::{alice, bob, mallory};
    use sealtalk_core::protocol::KeyAnnouncement;
    use sealtalk_core::TrustAnchor;
    use sealtalk_transport::{run_initiator, TransportError};

    use super::*;
    use crate::error::ServerError;

    const TIMEOUT: Duration = Duration::from_secs(10);

    type Client = (LineReader<OwnedReadHalf>, LineWriter<OwnedWriteHalf>);

    async fn start(config: ServerConfig) -> (Arc<Server>, u16, JoinHandle<Result<()>>) {
        let listener = tcp::bind_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = Arc::new(Server::new(config, alice()));
        let task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.serve(listener).await })
        };
        (server, port, task)
    }

    async fn connect(port: u16) -> Client {
        let stream = tcp::connect("127.0.0.1", port, TIMEOUT).await.unwrap();
        let (r, w) = stream.into_split();
        (LineReader::new(r), LineWriter::new(w))
    }

    async fn wait_until(condition: impl FnMut() -> bool) {
        wait_within(TIMEOUT, condition).await;
    }

    async fn wait_within(limit: Duration, mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(limit, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_pinned_client_exchanges_messages() {
        let (server, port, task) = start(ServerConfig::default()).await;
        let (mut reader, mut writer) = connect(port).await;

        let peer = run_initiator(
            &mut reader,
            &mut writer,
            bob(),
            TrustAnchor::Pinned(alice().fingerprint()),
            TIMEOUT,
        )
        .await
        .unwrap();
        assert_eq!(peer.display_name.as_str(), "Client-0");

        wait_until(|| server.registry().len() == 1).await;

        // Client to server
        let to_server = SecureChannel::new(bob(), alice().public_key().clone());
        writer.write_line(&to_server.seal("hi server").unwrap()).await.unwrap();

        // Server to client through the operator route
        server.registry().send_to("Client-0", "hi client").unwrap();
        let line = reader.read_line().await.unwrap().unwrap();
        assert_eq!(to_server.open(&line).unwrap(), "hi client");

        // Client leaves; its entry disappears
        drop((reader, writer));
        wait_until(|| server.registry().is_empty()).await;

        server.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_tampered_client_key_gets_no_name() {
        let (server, port, task) = start(ServerConfig::default()).await;
        let (mut reader, mut writer) = connect(port).await;

        reader.read_line().await.unwrap().unwrap();
        reader.read_line().await.unwrap().unwrap();

        let key = KeyAnnouncement::for_key(bob().public_key());
        let other = KeyAnnouncement::for_key(mallory().public_key());
        writer.write_line(&key.key_line).await.unwrap();
        writer.write_line(&other.fingerprint_line).await.unwrap();

        // Server drops the connection without assigning a name
        assert_eq!(reader.read_line().await.unwrap(), None);
        assert!(server.registry().is_empty());

        server.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_saturated_pool_queues_connections() {
        let mut config = ServerConfig::default();
        config.limits.max_clients = 1;
        let (server, port, task) = start(config).await;

        let (mut r1, mut w1) = connect(port).await;
        run_initiator(&mut r1, &mut w1, bob(), TrustAnchor::TrustOnFirstUse, TIMEOUT)
            .await
            .unwrap();

        // Second client is accepted but hears nothing while the slot is taken
        let (mut r2, mut w2) = connect(port).await;
        let waiting = tokio::time::timeout(Duration::from_millis(200), r2.read_line()).await;
        assert!(waiting.is_err());

        // Freeing the slot lets the queued client proceed
        drop((r1, w1));
        let peer = run_initiator(&mut r2, &mut w2, mallory(), TrustAnchor::TrustOnFirstUse, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(peer.display_name.as_str(), "Client-1");

        server.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_sessions() {
        let (server, port, task) = start(ServerConfig::default()).await;
        let (mut reader, mut writer) = connect(port).await;
        run_initiator(&mut reader, &mut writer, bob(), TrustAnchor::TrustOnFirstUse, TIMEOUT)
            .await
            .unwrap();
        wait_until(|| server.registry().len() == 1).await;

        server.shutdown();
        task.await.unwrap().unwrap();

        // Session closed its side of the stream
        assert_eq!(reader.read_line().await.unwrap(), None);
        assert!(server.registry().is_empty());
    }

    #[tokio::test]
    async fn test_reaper_removes_orphaned_entries() {
        let mut config = ServerConfig::default();
        config.limits.reap_interval_secs = 1;
        let (server, _port, task) = start(config).await;
        let registry = server.registry();

        // Sessions that ended without unregistering: one dropped its
        // outbox, one tripped its stop signal
        let orphan = ConnectionId::new(100);
        let (tx, rx) = mpsc::channel(1);
        registry
            .register(orphan, DisplayName::sequential(orphan), bob().public_key().clone(), StopSignal::new(), tx)
            .unwrap();
        drop(rx);

        let stalled = ConnectionId::new(101);
        let stop = StopSignal::new();
        let (tx, _rx) = mpsc::channel(1);
        registry
            .register(stalled, DisplayName::sequential(stalled), mallory().public_key().clone(), stop.clone(), tx)
            .unwrap();
        assert_eq!(registry.len(), 2);

        wait_within(Duration::from_millis(2500), || registry.get(orphan).is_none()).await;
        assert!(registry.get(stalled).is_some());

        stop.trigger();
        wait_within(Duration::from_millis(2500), || registry.is_empty()).await;

        server.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = ServerConfig::default();
        config.network.listen_addr = taken.local_addr().unwrap();

        let err = Server::new(config, alice()).run().await.unwrap_err();
        assert!(matches!(err, ServerError::Transport(TransportError::AddressInUse { .. })));
        assert!(err.is_fatal());
    }
}
