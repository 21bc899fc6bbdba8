// ============================================
// File: crates/sealtalk-transport/src/tcp.rs
// ============================================
//! # TCP Sockets
//!
//! ## Creation Reason
//! Binds the server's listening socket and opens the client's outbound
//! connection, mapping socket failures onto `TransportError`.
//!
//! ## Main Functionality
//! - `bind_listener`: `SO_REUSEADDR` listener built with socket2
//! - `connect`: outbound connect with a deadline and `TCP_NODELAY`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Lines are small and interactive; Nagle is disabled on both ends
//!
//! ## Last Modified
//! v0.1.0 - Initial TCP helpers

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Pending-connection backlog for the listening socket.
const LISTEN_BACKLOG: i32 = 128;

/// Binds a TCP listener on `addr`.
///
/// # Socket Options
/// - `SO_REUSEADDR`: quick rebinding after restart
/// - Non-blocking: required by Tokio
///
/// # Errors
/// - `AddressInUse` if the port is taken
/// - `BindFailed` / `Io` for other failures
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    info!("Binding TCP listener to {}", addr);

    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| TransportError::io("creating TCP socket", e))?;

    socket
        .set_reuse_address(true)
        .map_err(|e| TransportError::io("setting SO_REUSEADDR", e))?;

    socket
        .set_nonblocking(true)
        .map_err(|e| TransportError::io("setting non-blocking", e))?;

    socket.bind(&addr.into()).map_err(|e| {
        if e.kind() == io::ErrorKind::AddrInUse {
            TransportError::AddressInUse { addr }
        } else {
            TransportError::bind_failed(addr, e.to_string())
        }
    })?;

    socket
        .listen(LISTEN_BACKLOG)
        .map_err(|e| TransportError::bind_failed(addr, e.to_string()))?;

    let std_listener: std::net::TcpListener = socket.into();
    let listener = TcpListener::from_std(std_listener)
        .map_err(|e| TransportError::io("converting to Tokio listener", e))?;

    info!("TCP listener bound to {}", listener.local_addr().unwrap_or(addr));
    Ok(listener)
}

/// Connects to `host:port` within `timeout`.
///
/// # Errors
/// - `ConnectionRefused` if the peer refuses
/// - `Timeout` if the deadline passes
/// - `ConnectFailed` for unresolvable hosts and other failures
pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let target = format!("{host}:{port}");
    debug!(target = %target, "Connecting");

    let stream = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Err(_) => return Err(TransportError::timeout(format!("connecting to {target}"))),
        Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
            return Err(TransportError::ConnectionRefused { target });
        }
        Ok(Err(e)) => {
            return Err(TransportError::ConnectFailed {
                target,
                reason: e.to_string(),
            });
        }
        Ok(Ok(stream)) => stream,
    };

    stream
        .set_nodelay(true)
        .map_err(|e| TransportError::io("setting TCP_NODELAY", e))?;

    info!(target = %target, "Connected");
    Ok(stream)
}
