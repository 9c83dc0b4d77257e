//! Error types for the signaling client.
//!
//! Strongly-typed errors along the contract's fault lines: precondition
//! violations (`NotConnected`, `NotJoined`) are reported synchronously and
//! never retried; network-originated failures (`Connection`, `Join`, `Send`,
//! `Timeout`) surface through the failed operation's result and, for
//! unsolicited disconnects, through lifecycle events as well.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{session::SessionState, types::RoomId};

/// Why a join request did not produce a membership.
///
/// Serializable because transports carry server-side rejections in this
/// vocabulary; the `Pending` and `Cancelled` variants originate locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinReject {
    /// The room does not exist on the server.
    RoomNotFound,
    /// The nickname is taken in that room, or the room is already held
    /// locally under a different nickname.
    NicknameConflict,
    /// A join for this room is already in flight.
    Pending,
    /// The pending join was abandoned by leave, disconnect, or connection
    /// loss.
    Cancelled,
    /// Rejected for a server-specific reason.
    Denied(String),
}

impl fmt::Display for JoinReject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoomNotFound => f.write_str("room not found"),
            Self::NicknameConflict => f.write_str("nickname conflict"),
            Self::Pending => f.write_str("join already in progress"),
            Self::Cancelled => f.write_str("join cancelled"),
            Self::Denied(reason) => write!(f, "denied: {reason}"),
        }
    }
}

/// Errors surfaced by signaling client operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    /// Connection failed, was lost, or cancelled pending work
    #[error("connection error: {reason}")]
    Connection {
        /// What went wrong.
        reason: String,
    },

    /// Operation attempted without an active connection
    #[error("not connected: cannot {operation} while {state:?}")]
    NotConnected {
        /// Operation that was attempted.
        operation: &'static str,
        /// Session state at the time of the attempt.
        state: SessionState,
    },

    /// Join request rejected
    #[error("cannot join {room}: {reason}")]
    Join {
        /// Room the join was addressed to.
        room: RoomId,
        /// Why the join was rejected.
        reason: JoinReject,
    },

    /// Send or leave on a room without an active membership
    #[error("not joined to {room}")]
    NotJoined {
        /// Room without a membership.
        room: RoomId,
    },

    /// Message rejected by the transport
    #[error("send to {room} failed: {reason}")]
    Send {
        /// Destination room.
        room: RoomId,
        /// What the transport reported.
        reason: String,
    },

    /// Operation exceeded its bound
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// How long we waited.
        elapsed: Duration,
    },
}

impl SignalingError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Timeouts and lost connections are transient. Precondition violations
    /// and rejections are not - retrying without changing state or input
    /// will fail the same way.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection { .. })
    }
}

/// Convert structural configuration failures at the connect boundary.
impl From<crate::config::ConfigError> for SignalingError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Connection { reason: err.to_string() }
    }
}
