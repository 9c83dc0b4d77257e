//! Core
//!
//! Sans-IO session state machine for the Palaver room signaling client.
//! Manages connection lifecycle, room memberships, and message delivery
//! preconditions.
//!
//! # Architecture
//!
//! The session follows the action pattern: operations and transport events
//! go in, pure state transitions happen, and [`SessionAction`]s come out for
//! the driver to execute. No I/O, no clock - time is passed in, effects are
//! returned.
//!
//! # Components
//!
//! - [`Session`]: the connection + membership state machine
//! - [`Command`] / [`TransportEvent`]: the vocabulary exchanged with the
//!   transport black box
//! - [`SignalingEvent`]: typed lifecycle events dispatched to observers
//! - [`Environment`]: time and randomness abstraction for deterministic
//!   testing

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod env;
mod error;
mod event;
mod session;
mod transport;
mod types;

pub use config::{ClientConfig, ConfigError, Credentials, SessionConfig};
pub use env::Environment;
pub use error::{JoinReject, SignalingError};
pub use event::{EventKind, SignalingEvent};
pub use session::{MembershipState, OpKey, Session, SessionAction, SessionState};
pub use transport::{Command, TransportEvent};
pub use types::{
    ChatMessage, InvalidName, MessageId, MessageKind, Nickname, OutboundMessage, RoomId,
};
