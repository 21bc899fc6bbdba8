// ============================================
// File: crates/sealtalk-server/src/operator.rs
// ============================================
//! # Operator Console
//!
//! ## Creation Reason
//! The server operator talks to connected clients from the terminal.
//! Lines of the form `@Client-N message` are routed to that client's
//! session through the registry.
//!
//! ## Commands
//! | Input                 | Effect                              |
//! |-----------------------|-------------------------------------|
//! | `@<name> <message>`   | send `<message>` to client `<name>` |
//! | `/list`               | log the connected client names      |
//!
//! ## Last Modified
//! v0.1.0 - Initial operator console

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::services::ConnectionRegistry;

/// Prefix that addresses a client.
const ADDRESS_PREFIX: char = '@';

/// Command that lists connected clients.
const LIST_COMMAND: &str = "/list";

/// A parsed operator input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Send `text` to the client named `to`.
    Send {
        /// Target display name
        to: String,
        /// Message body
        text: String,
    },
    /// List connected clients.
    List,
}

/// Parses one operator line. Blank lines yield `Ok(None)`.
///
/// # Errors
/// Returns a usage message for unrecognized input.
pub fn parse(line: &str) -> std::result::Result<Option<OperatorCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line.eq_ignore_ascii_case(LIST_COMMAND) {
        return Ok(Some(OperatorCommand::List));
    }

    let Some(rest) = line.strip_prefix(ADDRESS_PREFIX) else {
        return Err(format!("expected '{ADDRESS_PREFIX}<name> <message>' or '{LIST_COMMAND}'"));
    };
    match rest.split_once(char::is_whitespace) {
        Some((to, text)) if !to.is_empty() && !text.trim().is_empty() => {
            Ok(Some(OperatorCommand::Send {
                to: to.to_string(),
                text: text.trim().to_string(),
            }))
        }
        _ => Err(format!("missing name or message after '{ADDRESS_PREFIX}'")),
    }
}

/// Applies a command to the registry.
///
/// # Errors
/// Returns the registry error if a message cannot be queued.
pub fn execute(command: OperatorCommand, registry: &ConnectionRegistry) -> Result<()> {
    match command {
        OperatorCommand::Send { to, text } => {
            registry.send_to(&to, text)?;
            debug!(to = %to, "Operator message queued");
        }
        OperatorCommand::List => {
            let names: Vec<String> = registry.names().into_iter().map(String::from).collect();
            info!(count = names.len(), "Connected clients: [{}]", names.join(", "));
        }
    }
    Ok(())
}

/// Reads operator lines from `input` until EOF or shutdown.
pub async fn run_console<R>(
    input: R,
    registry: Arc<ConnectionRegistry>,
    mut shutdown_rx: broadcast::Receiver<()>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Operator console received shutdown signal");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse(&line) {
                    Ok(Some(command)) => {
                        if let Err(e) = execute(command, &registry) {
                            warn!("{}", e);
                        }
                    }
                    Ok(None) => {}
                    Err(usage) => warn!("{}", usage),
                },
                Ok(None) => {
                    debug!("Operator input closed");
                    break;
                }
                Err(e) => {
                    warn!("Operator input error: {}", e);
                    break;
                }
            }
        }
    }
}
