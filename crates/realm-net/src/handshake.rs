//! Session handshake messages.
//!
//! ENTER is sent once the transport is connected and carries the client
//! identifier; LEAVE is sent on an intentional disconnect and carries nothing.
//! Neither is acknowledged by the server.

use crate::messages::{Enter, Leave, Message};

/// Prefix prepended to the identity token to form the client identifier.
pub const CLIENT_ID_PREFIX: &str = "Main";

/// Client identifier announced in ENTER for `identity`.
pub fn client_id(identity: &str) -> String {
    format!("{CLIENT_ID_PREFIX}{identity}")
}

/// Build the ENTER message for `identity`.
pub fn enter(identity: &str) -> Message {
    Message::Enter(Enter {
        client_id: client_id(identity),
    })
}

/// Build the LEAVE message.
pub fn leave() -> Message {
    Message::Leave(Leave)
}
