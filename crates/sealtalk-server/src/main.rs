// ============================================
// File: crates/sealtalk-server/src/main.rs
// ============================================
//! # SealTalk Server Entry Point
//!
//! ## Creation Reason
//! Main entry point for the SealTalk server binary.
//! Handles CLI parsing, logging setup, key loading and server startup.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading with command-line overrides
//! - Operator console on stdin
//! - Server execution
//!
//! ## Usage
//! ```bash
//! sealtalk-server                          # start with defaults
//! sealtalk-server --listen 0.0.0.0:4000    # override listen address
//! sealtalk-server fingerprint              # print fingerprint for pinning
//! sealtalk-server validate                 # validate config file
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `RUST_LOG` overrides the configured log level
//! - The first start generates the key file; clients pin its fingerprint
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sealtalk_server::{keystore, operator, Server, ServerConfig};

// ============================================
// CLI Definition
// ============================================

/// SealTalk encrypted messaging server
#[derive(Parser, Debug)]
#[command(name = "sealtalk-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "SEALTALK_CONFIG", default_value = "sealtalk-server.toml")]
    config: PathBuf,

    /// Listen address, overrides the config file
    #[arg(short, long, global = true, env = "SEALTALK_LISTEN")]
    listen: Option<SocketAddr>,

    /// Server key file, overrides the config file
    #[arg(short, long, global = true, env = "SEALTALK_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Subcommand to execute (defaults to `start`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the server
    Start,

    /// Print the server key fingerprint for clients to pin
    ///
    /// Generates the key file if it does not exist yet.
    Fingerprint,

    /// Validate configuration file
    Validate,
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        None | Some(Commands::Start) => cmd_start(&cli).await,
        Some(Commands::Fingerprint) => cmd_fingerprint(&cli).await,
        Some(Commands::Validate) => cmd_validate(&cli).await,
    };

    if let Err(e) = result {
        init_logging("info");
        error!("{:#}", e);
        std::process::exit(1);
    }

    // A blocked stdin read would otherwise keep the runtime alive
    std::process::exit(0);
}

// ============================================
// Commands
// ============================================

/// Starts the server.
async fn cmd_start(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli).await?;
    init_logging(&config.logging.level);

    let (identity, created) = keystore::load_or_generate(config.key_file()).await?;
    if created {
        info!("Generated new server key at {}", config.key_file().display());
    }

    info!("════════════════════════════════════════");
    info!("Listen:       {}", config.listen_addr());
    info!("Fingerprint:  {}", identity.fingerprint());
    info!("Max clients:  {}", config.max_clients());
    info!("════════════════════════════════════════");
    info!("Send to a client with: @Client-N <message>   (/list shows clients)");

    let server = Server::new(config, identity);
    let console = tokio::spawn(operator::run_console(
        tokio::io::stdin(),
        std::sync::Arc::clone(server.registry()),
        server.subscribe_shutdown(),
    ));

    let result = server.run().await;
    console.abort();
    result?;

    Ok(())
}

/// Prints the server key fingerprint.
async fn cmd_fingerprint(cli: &Cli) -> anyhow::Result<()> {
    init_logging("warn");
    let config = load_config(cli).await?;
    let (identity, created) = keystore::load_or_generate(config.key_file()).await?;
    let fingerprint = identity.fingerprint();

    if created {
        println!("Generated new key: {}", config.key_file().display());
    }
    println!("Fingerprint (base64): {}", fingerprint.to_base64());
    println!("Fingerprint (hex):    {}", fingerprint.to_hex());
    println!();
    println!("Connect with: sealtalk-client --pin {}", fingerprint.to_base64());

    Ok(())
}

/// Validates configuration file.
async fn cmd_validate(cli: &Cli) -> anyhow::Result<()> {
    init_logging("warn");
    if !tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
        println!("⚠️  Config file not found: {}", cli.config.display());
        println!("   Server will use default values.");
        return Ok(());
    }

    let config = load_config(cli).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("Network:");
    println!("   Listen:           {}", config.listen_addr());
    println!();
    println!("Server Key:");
    println!("   Key File:         {}", config.key_file().display());
    println!();
    println!("Limits:");
    println!("   Max Clients:      {}", config.max_clients());
    println!("   Read Timeout:     {}s", config.read_timeout().as_secs());
    println!("   Reap Interval:    {}s", config.reap_interval().as_secs());
    println!();

    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber. Later calls are no-ops.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

/// Loads the config file and applies command-line overrides.
async fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = ServerConfig::load_or_default(&cli.config).await?;

    if let Some(listen) = cli.listen {
        config.network.listen_addr = listen;
    }
    if let Some(key_file) = &cli.key_file {
        config.server_key.key_file.clone_from(key_file);
    }
    config.validate()?;

    Ok(config)
}
