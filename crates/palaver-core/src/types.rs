//! Identifier and message types shared across the client.
//!
//! Room identifiers and nicknames are validated at construction, so the rest
//! of the crate never has to re-check for empty names.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when constructing an identifier from invalid input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{what} must not be empty")]
pub struct InvalidName {
    /// Which identifier was rejected.
    pub what: &'static str,
}

/// Identifier of a named multi-party room.
///
/// Guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Create a room identifier.
    ///
    /// # Errors
    ///
    /// - [`InvalidName`] if the identifier is empty
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidName> {
        let id = id.into();
        if id.is_empty() {
            return Err(InvalidName { what: "room id" });
        }
        Ok(Self(id))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomId {
    type Err = InvalidName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Nickname a client occupies a room under.
///
/// Guaranteed non-empty. Membership is per (room, nickname).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nickname(String);

impl Nickname {
    /// Create a nickname.
    ///
    /// # Errors
    ///
    /// - [`InvalidName`] if the nickname is empty
    pub fn new(nick: impl Into<String>) -> Result<Self, InvalidName> {
        let nick = nick.into();
        if nick.is_empty() {
            return Err(InvalidName { what: "nickname" });
        }
        Ok(Self(nick))
    }

    /// The nickname as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Nickname {
    type Err = InvalidName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Kind tag carried by chat messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Message addressed to all occupants of a room.
    #[default]
    GroupChat,
    /// Direct message between two parties.
    Chat,
    /// One-off message outside a conversation thread.
    Normal,
}

impl MessageKind {
    /// The kind as its wire tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GroupChat => "groupchat",
            Self::Chat => "chat",
            Self::Normal => "normal",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier stamped on each outbound message.
///
/// Generated from the environment's RNG; lets callers and transports
/// correlate a message with any later server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier value.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// One chat message addressed to a room.
///
/// Transient: exists only for the duration of the send; the client retains
/// nothing after the transport accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Destination room.
    pub room: RoomId,
    /// Message kind tag.
    pub kind: MessageKind,
    /// Body text. May be empty.
    pub body: String,
}

/// One chat message delivered from a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Room the message came from.
    pub room: RoomId,
    /// Room nickname of the sender.
    pub sender: Nickname,
    /// Message kind tag.
    pub kind: MessageKind,
    /// Body text. May be empty.
    pub body: String,
    /// Message identifier. `None` if the sender did not stamp one.
    pub id: Option<MessageId>,
}
