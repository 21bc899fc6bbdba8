// ============================================
// File: crates/sealtalk-transport/src/exchange.rs
// ============================================
//! # Handshake Drivers
//!
//! ## Creation Reason
//! Runs the `Handshake` state machine over a line stream for each role,
//! applying the read timeout to every handshake read.
//!
//! ## Wire Sequence
//! ```text
//! Responder                                Initiator
//!   │── public key ─────────────────────────►│
//!   │── fingerprint ────────────────────────►│ verify integrity (+ pin)
//!   │◄──────────────────────── public key ───│
//!   │◄─────────────────────── fingerprint ───│
//!   │ verify integrity                       │
//!   │── display name ───────────────────────►│
//!   ▼ Established                            ▼ Established
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - On any failure the driver returns immediately without writing
//!   another line; the caller drops the stream
//! - Security failures come back as `TransportError::Security`
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake drivers

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use sealtalk_common::DisplayName;
use sealtalk_core::{EstablishedPeer, Handshake, KeyPair, TrustAnchor};

use crate::error::{Result, TransportError};
use crate::line::{LineReader, LineWriter};

/// Reads one handshake line within `timeout`.
async fn read_step<R>(reader: &mut LineReader<R>, timeout: Duration, stage: &str) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(timeout, reader.read_line()).await {
        Err(_) => Err(TransportError::timeout(stage)),
        Ok(Ok(Some(line))) => Ok(line),
        Ok(Ok(None)) => Err(TransportError::peer_closed(stage)),
        Ok(Err(e)) => Err(e),
    }
}

// ============================================
// Responder
// ============================================

/// Runs the accepting side of the handshake.
///
/// Sends the local key first, verifies the initiator's key in TOFU mode,
/// then assigns `name`.
///
/// # Errors
/// - `Security` if the initiator's key fails verification
/// - `Timeout` / `PeerClosed` / `Io` on stream failures
pub async fn run_responder<R, W>(
    reader: &mut LineReader<R>,
    writer: &mut LineWriter<W>,
    local: Arc<KeyPair>,
    name: DisplayName,
    read_timeout: Duration,
) -> Result<EstablishedPeer>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut handshake = Handshake::responder(local);
    let result = drive_responder(&mut handshake, reader, writer, name, read_timeout).await;
    if result.is_err() {
        handshake.fail();
    }
    result
}

async fn drive_responder<R, W>(
    handshake: &mut Handshake,
    reader: &mut LineReader<R>,
    writer: &mut LineWriter<W>,
    name: DisplayName,
    read_timeout: Duration,
) -> Result<EstablishedPeer>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let hello = handshake.local_announcement()?;
    for line in hello.lines() {
        writer.write_line(line).await?;
    }
    debug!("Sent server key and fingerprint");

    let key_line = read_step(reader, read_timeout, "reading client key").await?;
    let fingerprint_line = read_step(reader, read_timeout, "reading client fingerprint").await?;
    let fingerprint = handshake.receive_peer_announcement(&key_line, &fingerprint_line)?;

    let name_line = handshake.assign_name(name)?;
    writer.write_line(&name_line).await?;

    let peer = handshake.establish()?;
    info!(
        name = %peer.display_name,
        fingerprint = %fingerprint,
        "Client handshake complete"
    );
    Ok(peer)
}

// ============================================
// Initiator
// ============================================

/// Runs the connecting side of the handshake.
///
/// Verifies the responder's key against `anchor` before sending anything.
///
/// # Errors
/// - `Security` if the responder's key fails integrity or pin checks
/// - `Protocol` if the assigned name is invalid
/// - `Timeout` / `PeerClosed` / `Io` on stream failures
pub async fn run_initiator<R, W>(
    reader: &mut LineReader<R>,
    writer: &mut LineWriter<W>,
    local: Arc<KeyPair>,
    anchor: TrustAnchor,
    read_timeout: Duration,
) -> Result<EstablishedPeer>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut handshake = Handshake::initiator(local, anchor);
    let result = drive_initiator(&mut handshake, reader, writer, read_timeout).await;
    if result.is_err() {
        handshake.fail();
    }
    result
}

async fn drive_initiator<R, W>(
    handshake: &mut Handshake,
    reader: &mut LineReader<R>,
    writer: &mut LineWriter<W>,
    read_timeout: Duration,
) -> Result<EstablishedPeer>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let pinned = handshake.anchor().is_pinned();

    let key_line = read_step(reader, read_timeout, "reading server key").await?;
    let fingerprint_line = read_step(reader, read_timeout, "reading server fingerprint").await?;
    let fingerprint = handshake.receive_peer_announcement(&key_line, &fingerprint_line)?;
    info!(fingerprint = %fingerprint, pinned, "Server key verified");

    let hello = handshake.local_announcement()?;
    for line in hello.lines() {
        writer.write_line(line).await?;
    }
    debug!("Sent client key and fingerprint");

    let name_line = read_step(reader, read_timeout, "reading display name").await?;
    let name = handshake.accept_name(&name_line)?;

    let peer = handshake.establish()?;
    info!(name = %name, "Handshake complete");
    Ok(peer)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, split, DuplexStream, ReadHalf, WriteHalf};

    use sealtalk_core::crypto::keys::test_support::{alice, bob, mallory};
    use sealtalk_core::protocol::KeyAnnouncement;
    use sealtalk_core::CoreError;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    type Reader = LineReader<ReadHalf<DuplexStream>>;
    type Writer = LineWriter<WriteHalf<DuplexStream>>;

    fn endpoint(stream: DuplexStream) -> (Reader, Writer) {
        let (r, w) = split(stream);
        (LineReader::new(r), LineWriter::new(w))
    }

    fn pair() -> ((Reader, Writer), (Reader, Writer)) {
        let (a, b) = duplex(64 * 1024);
        (endpoint(a), endpoint(b))
    }

    #[tokio::test]
    async fn test_pinned_handshake_succeeds() {
        let ((mut sr, mut sw), (mut cr, mut cw)) = pair();
        let server = alice();
        let anchor = TrustAnchor::Pinned(server.fingerprint());

        let (server_side, client_side) = tokio::join!(
            run_responder(&mut sr, &mut sw, server, DisplayName::new("Client-0").unwrap(), TIMEOUT),
            run_initiator(&mut cr, &mut cw, bob(), anchor, TIMEOUT),
        );
        let server_side = server_side.unwrap();
        let client_side = client_side.unwrap();

        assert_eq!(&server_side.public_key, bob().public_key());
        assert_eq!(&client_side.public_key, alice().public_key());
        assert_eq!(client_side.display_name.as_str(), "Client-0");
    }

    #[tokio::test]
    async fn test_tofu_handshake_succeeds() {
        let ((mut sr, mut sw), (mut cr, mut cw)) = pair();
        let (server_side, client_side) = tokio::join!(
            run_responder(&mut sr, &mut sw, mallory(), DisplayName::new("Client-7").unwrap(), TIMEOUT),
            run_initiator(&mut cr, &mut cw, bob(), TrustAnchor::TrustOnFirstUse, TIMEOUT),
        );
        assert!(server_side.is_ok());
        assert_eq!(client_side.unwrap().fingerprint, mallory().fingerprint());
    }

    #[tokio::test]
    async fn test_pin_mismatch_aborts_before_client_writes() {
        // Interceptor holds a different key than the one pinned
        let ((mut fake_r, mut fake_w), (mut cr, mut cw)) = pair();
        let anchor = TrustAnchor::Pinned(alice().fingerprint());

        let hello = KeyAnnouncement::for_key(mallory().public_key());
        for line in hello.lines() {
            fake_w.write_line(line).await.unwrap();
        }

        let err = run_initiator(&mut cr, &mut cw, bob(), anchor, TIMEOUT)
            .await
            .unwrap_err();
        assert!(err.is_security_alert());
        assert!(matches!(
            err,
            TransportError::Security(CoreError::TrustAnchorMismatch { .. })
        ));

        // The client closes without having written a single line
        drop((cr, cw));
        assert_eq!(fake_r.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_integrity_mismatch_from_server_aborts() {
        let ((mut fake_r, mut fake_w), (mut cr, mut cw)) = pair();

        let key = KeyAnnouncement::for_key(alice().public_key());
        let other = KeyAnnouncement::for_key(mallory().public_key());
        fake_w.write_line(&key.key_line).await.unwrap();
        fake_w.write_line(&other.fingerprint_line).await.unwrap();

        let err = run_initiator(&mut cr, &mut cw, bob(), TrustAnchor::TrustOnFirstUse, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Security(CoreError::IntegrityMismatch { .. })
        ));

        drop((cr, cw));
        assert_eq!(fake_r.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_integrity_mismatch_from_client_gets_no_name() {
        let ((mut sr, mut sw), (mut fake_r, mut fake_w)) = pair();

        let server = tokio::spawn(async move {
            let result = run_responder(
                &mut sr,
                &mut sw,
                alice(),
                DisplayName::new("Client-1").unwrap(),
                TIMEOUT,
            )
            .await;
            drop((sr, sw));
            result
        });

        // Read the server hello, then answer with a tampered fingerprint
        fake_r.read_line().await.unwrap().unwrap();
        fake_r.read_line().await.unwrap().unwrap();
        let key = KeyAnnouncement::for_key(bob().public_key());
        fake_w.write_line(&key.key_line).await.unwrap();
        fake_w.write_line("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=").await.unwrap();

        let err = server.await.unwrap().unwrap_err();
        assert!(err.is_security_alert());
        assert_eq!(fake_r.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_client_key_is_security_failure() {
        let ((mut sr, mut sw), (mut fake_r, mut fake_w)) = pair();

        let server = tokio::spawn(async move {
            run_responder(&mut sr, &mut sw, alice(), DisplayName::new("Client-2").unwrap(), TIMEOUT)
                .await
        });

        fake_r.read_line().await.unwrap().unwrap();
        fake_r.read_line().await.unwrap().unwrap();
        fake_w.write_line("!!! not base64 !!!").await.unwrap();
        fake_w.write_line("irrelevant").await.unwrap();

        let err = server.await.unwrap().unwrap_err();
        assert!(matches!(err, TransportError::Security(CoreError::MalformedKey { .. })));
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let ((_sr, _sw), (mut cr, mut cw)) = pair();
        let err = run_initiator(
            &mut cr,
            &mut cw,
            bob(),
            TrustAnchor::TrustOnFirstUse,
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_peer_closing_mid_handshake() {
        let ((sr, sw), (mut cr, mut cw)) = pair();
        drop((sr, sw));
        let err = run_initiator(&mut cr, &mut cw, bob(), TrustAnchor::TrustOnFirstUse, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::PeerClosed { .. }));
    }
}
