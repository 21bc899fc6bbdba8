// ============================================
// File: crates/sealtalk-client/src/main.rs
// ============================================
//! # SealTalk Client Entry Point
//!
//! ## Creation Reason
//! Main entry point for the SealTalk client binary.
//!
//! ## Usage
//! ```bash
//! sealtalk-client --pin <FINGERPRINT>          # localhost:1234, pinned
//! sealtalk-client --host chat.example --tofu   # trust on first use
//! ```
//! Type a line to send it; `exit` (any case) quits.
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sealtalk_client::{generate_identity, Client, ClientArgs, ClientConfig, ClientError, ConsoleSink, LineSource};
use sealtalk_transport::SessionOutcome;

#[tokio::main]
async fn main() {
    let args = ClientArgs::parse();
    init_logging(&args.log_level);

    let code = match run(&args).await {
        Ok(()) => 0,
        Err(e) => {
            report(&e);
            1
        }
    };

    println!("Disconnecting...");
    // A blocked stdin read would otherwise keep the runtime alive
    std::process::exit(code);
}

/// Connects and runs one session.
async fn run(args: &ClientArgs) -> sealtalk_client::Result<()> {
    let config = ClientConfig::try_from(args)?;

    let identity = generate_identity().await?;
    println!("Generated client key pair. Fingerprint: {}", identity.fingerprint());

    println!("Connecting to {}...", config.target());
    let connected = Client::new(config, identity).connect().await?;

    println!("Server fingerprint: {}", connected.server_fingerprint());
    println!("Connected as: {}", connected.display_name());
    println!("Secure channel established. Type 'exit' to quit.");

    match connected.run(LineSource::stdin(), &ConsoleSink).await {
        SessionOutcome::Failed(e) => Err(e.into()),
        SessionOutcome::PeerDisconnected => {
            eprintln!("Server disconnected");
            Ok(())
        }
        SessionOutcome::TimedOut => {
            eprintln!("No message from server within the read timeout");
            Ok(())
        }
        SessionOutcome::LocalExit | SessionOutcome::Stopped => Ok(()),
    }
}

/// Prints a failure the way the user needs to see it.
fn report(e: &ClientError) {
    if e.is_security_alert() {
        error!("SECURITY ALERT: {}", e);
        eprintln!("SECURITY ALERT: {e}");
    } else if e.is_connection_error() {
        eprintln!("Connection error: {e}");
    } else {
        eprintln!("Error: {e}");
    }
}

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}
