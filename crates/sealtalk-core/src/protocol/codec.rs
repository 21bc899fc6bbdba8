// ============================================
// File: crates/sealtalk-core/src/protocol/codec.rs
// ============================================
//! # Line Codec
//!
//! ## Creation Reason
//! Everything on the wire is one line of text. This module owns the rules
//! for turning binary values into lines and back.
//!
//! ## Format
//! - Keys and fingerprints: standard base64 with padding
//! - Ciphertext: standard base64 of the raw RSA block
//! - Terminator: `\n`; a trailing `\r` is tolerated on input
//!
//! ## ⚠️ Important Note for Next Developer
//! - There is no escaping. A payload containing `\n` or `\r` would be
//!   split into two frames, so it is rejected before encryption.
//!
//! ## Last Modified
//! v0.1.0 - Initial codec

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::{CoreError, Result};

/// Line terminator written after every frame.
pub const LINE_TERMINATOR: char = '\n';

/// Maximum accepted line length in bytes, terminator excluded.
///
/// An RSA-3072 key line is about 560 characters and a ciphertext line 512.
pub const MAX_LINE_LEN: usize = 16 * 1024;

/// Outgoing message that ends the local session (case-insensitive).
pub const EXIT_COMMAND: &str = "exit";

/// Column width used when ciphertext is rendered for logs.
pub const DISPLAY_WRAP_WIDTH: usize = 64;

/// Returns an error if `text` contains a line break.
///
/// # Errors
/// Returns `EmbeddedNewline` if `\n` or `\r` is present.
pub fn ensure_single_line(text: &str) -> Result<()> {
    if text.contains(['\n', '\r']) {
        return Err(CoreError::EmbeddedNewline);
    }
    Ok(())
}

/// Removes the line terminator (`\n` or `\r\n`) from a raw frame.
#[must_use]
pub fn strip_line_ending(raw: &str) -> &str {
    let line = raw.strip_suffix('\n').unwrap_or(raw);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Encodes a ciphertext block as a line payload.
#[must_use]
pub fn ciphertext_to_line(ciphertext: &[u8]) -> String {
    BASE64.encode(ciphertext)
}

/// Decodes a ciphertext line payload.
///
/// # Errors
/// Returns `MalformedMessage` on empty input or invalid base64.
pub fn ciphertext_from_line(line: &str) -> Result<Vec<u8>> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CoreError::malformed("empty ciphertext line"));
    }
    BASE64
        .decode(line)
        .map_err(|e| CoreError::malformed(format!("ciphertext is not base64: {e}")))
}

/// Returns `true` if an outgoing message is the exit command.
#[must_use]
pub fn is_exit_command(message: &str) -> bool {
    message.eq_ignore_ascii_case(EXIT_COMMAND)
}

/// Splits long text into rows of at most `width` characters for display.
#[must_use]
pub fn wrap_for_display(text: &str, width: usize) -> String {
    let width = width.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width)
        .map(|row| row.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
