//! Vocabulary exchanged with the messaging transport.
//!
//! The transport is a black box that delivers [`Command`]s to the server and
//! reports [`TransportEvent`]s back. No wire format is defined here; a
//! transport implementation maps this vocabulary onto whatever protocol it
//! speaks.

use serde::{Deserialize, Serialize};

use crate::{
    error::JoinReject,
    types::{ChatMessage, Nickname, OutboundMessage, RoomId},
};

/// Commands the client hands to the transport for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Join a room under a nickname.
    Join {
        /// Room to join.
        room: RoomId,
        /// Nickname to occupy the room under.
        nickname: Nickname,
    },

    /// Leave a room.
    Leave {
        /// Room to leave.
        room: RoomId,
    },

    /// Publish a chat message to a room.
    ///
    /// Fire-and-forget: accepted by the transport, not acknowledged
    /// end-to-end.
    Publish(OutboundMessage),

    /// Heartbeat probe.
    Ping,

    /// Graceful teardown notice, sent best-effort before disconnect.
    Bye,
}

/// Events the transport reports back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportEvent {
    /// Link established and authenticated; the server accepted us.
    Ready,

    /// Connection attempt failed (authentication rejection or network
    /// failure).
    ConnectFailed {
        /// What the transport reported.
        reason: String,
    },

    /// Server acknowledged a join request.
    JoinAck {
        /// Room the acknowledgment is for.
        room: RoomId,
    },

    /// Server rejected a join request.
    JoinRejected {
        /// Room the rejection is for.
        room: RoomId,
        /// Why the join was rejected.
        reason: JoinReject,
    },

    /// Inbound chat message.
    Message(ChatMessage),

    /// Heartbeat answer.
    Pong,

    /// Connection closed by the peer or the network.
    Closed {
        /// Why the connection closed.
        reason: String,
    },
}
