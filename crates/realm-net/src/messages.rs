//! Network message types and serialization.
//!
//! All messages are serialized with [`postcard`] and prefixed with a protocol
//! version byte. Use [`serialize_message`] and [`deserialize_message`] for
//! encoding/decoding.

use serde::{Deserialize, Serialize};

/// Current wire-protocol version. Prepended to every serialized message.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Top-level enum
// ---------------------------------------------------------------------------

/// Top-level network message. The enum discriminant is the message kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    // --- Handshake ---
    /// Client announces itself after the transport connection is up.
    Enter(Enter),
    /// Client is intentionally leaving the session.
    Leave(Leave),

    // --- Session ---
    /// Gameplay traffic. The payload schema belongs to the gameplay layer.
    Game(GamePacket),
}

/// Kind identifier for a [`Message`], usable as a map key or log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgId {
    /// [`Message::Enter`].
    Enter,
    /// [`Message::Leave`].
    Leave,
    /// [`Message::Game`] with its gameplay kind.
    Game(u16),
}

impl Message {
    /// Return the kind of this message without consuming it.
    pub fn id(&self) -> MsgId {
        match self {
            Message::Enter(_) => MsgId::Enter,
            Message::Leave(_) => MsgId::Leave,
            Message::Game(packet) => MsgId::Game(packet.kind),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// ENTER handshake payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Enter {
    /// Client identifier derived from the caller's identity token.
    pub client_id: String,
}

/// LEAVE handshake payload. Carries no data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Leave;

/// Opaque gameplay envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GamePacket {
    /// Gameplay-defined message kind.
    pub kind: u16,
    /// Encoded gameplay payload.
    pub payload: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during message deserialization.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload was empty (no version byte).
    #[error("empty payload, no version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard deserialization failed.
    #[error("deserialization error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Serialize a [`Message`] into a versioned binary payload.
///
/// Wire format: `[version: u8] [postcard-encoded Message]`
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>, postcard::Error> {
    let body = postcard::to_allocvec(msg)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserialize a versioned binary payload into a [`Message`].
pub fn deserialize_message(data: &[u8]) -> Result<Message, MessageError> {
    let (&version, body) = data.split_first().ok_or(MessageError::EmptyPayload)?;
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(body)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
