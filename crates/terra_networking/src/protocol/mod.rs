//! # Network Protocol
//!
//! Newline-delimited JSON over TCP, one message per line.
//!
//! ## Decoding
//!
//! Every inbound line goes through two stages:
//!
//! 1. **Structural**: serde decodes the tagged enum. Unknown tags, missing
//!    fields and unknown item names fail here.
//! 2. **Range**: [`validate_client`] / [`validate_server`] bound every
//!    numeric field and string length.
//!
//! Either failure yields `None` from [`parse_client`] / [`parse_server`].
//! Nothing in this module panics on hostile input.

mod codec;
mod messages;
mod validation;

pub use codec::{decode_chunk_blocks, encode_chunk_blocks};
pub use messages::{
    BlockChange, ClientMessage, ErrorCode, EventKind, InputFrame, MobState, PlayerState,
    ServerMessage, Snapshot,
};
pub use validation::{
    validate_client, validate_server, MAX_INPUT_DT, MAX_NICKNAME_CHARS, MAX_RECIPE_ID_CHARS,
    MAX_ROOM_CODE_CHARS, MAX_VIEW_DISTANCE,
};

use serde::Serialize;
use thiserror::Error;

/// Longest accepted inbound line, in bytes.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Why an inbound message was rejected.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Line longer than [`MAX_MESSAGE_BYTES`].
    #[error("message of {0} bytes exceeds the limit")]
    TooLarge(usize),
    /// Not valid JSON for any variant.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Decoded, but a field is out of range.
    #[error("field out of range: {0}")]
    OutOfRange(&'static str),
}

/// Decodes and validates a client message, keeping the failure reason.
///
/// # Errors
///
/// Returns the first structural or range violation.
pub fn decode_client(raw: &str) -> Result<ClientMessage, ProtocolError> {
    if raw.len() > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::TooLarge(raw.len()));
    }
    let message: ClientMessage = serde_json::from_str(raw)?;
    validate_client(&message)?;
    Ok(message)
}

/// Decodes and validates a server message, keeping the failure reason.
///
/// # Errors
///
/// Returns the first structural or range violation.
pub fn decode_server(raw: &str) -> Result<ServerMessage, ProtocolError> {
    let message: ServerMessage = serde_json::from_str(raw)?;
    validate_server(&message)?;
    Ok(message)
}

/// Parses a client message. `None` on any violation.
#[must_use]
pub fn parse_client(raw: &str) -> Option<ClientMessage> {
    decode_client(raw).ok()
}

/// Parses a server message. `None` on any violation.
#[must_use]
pub fn parse_server(raw: &str) -> Option<ServerMessage> {
    decode_server(raw).ok()
}

/// Serializes a message to a single JSON line (without the newline).
#[must_use]
pub fn encode<T: Serialize>(message: &T) -> String {
    // Message types contain no maps with non-string keys, so this cannot fail.
    serde_json::to_string(message).unwrap_or_default()
}
