//! Lifecycle events delivered to observers.
//!
//! A typed discriminated union replaces loosely-typed handler signatures:
//! each variant is one event category, and observers register per category.

use crate::{error::SignalingError, types::ChatMessage};

/// Observer category tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Session reached connected.
    Connected,
    /// Session left connected (caller-initiated or network loss).
    Disconnected,
    /// An unsolicited failure observers should learn about.
    Error,
    /// A chat message arrived from a joined room.
    MessageReceived,
}

/// Lifecycle and message notifications.
///
/// Delivered on the driver task in registration order; observers must not
/// block delivery - hand long-running work off to another task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingEvent {
    /// Session reached connected.
    Connected,

    /// Session left connected.
    Disconnected {
        /// Why the connection went away. `None` for a caller-initiated
        /// disconnect.
        reason: Option<String>,
    },

    /// An unsolicited failure (connection loss, idle timeout).
    ///
    /// Failures of awaited operations are reported through the operation's
    /// result instead.
    Error(SignalingError),

    /// A chat message arrived from a joined room.
    MessageReceived(ChatMessage),
}

impl SignalingEvent {
    /// The category this event belongs to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::Error(_) => EventKind::Error,
            Self::MessageReceived(_) => EventKind::MessageReceived,
        }
    }
}
