//! Client
//!
//! Async room signaling client: one persistent connection to a messaging
//! server, named room memberships under a nickname, chat message
//! send/receive, and typed lifecycle events dispatched to registered
//! observers.
//!
//! # Architecture
//!
//! Protocol state lives in the Sans-IO [`Session`] state machine from
//! [`palaver_core`]; this crate adds the async surface around it - a
//! [`Transport`] black box for the network, a driver task that feeds
//! transport events and maintenance ticks into the session, and a
//! pending-operation table that turns session completions into resolved
//! futures.
//!
//! # Components
//!
//! - [`SignalingClient`]: the caller-facing async client
//! - [`Transport`] / [`TransportLink`]: the pluggable messaging transport
//! - [`ObserverRegistry`]: per-category observer lists
//! - [`SystemEnv`]: production time and randomness
//!
//! # Example
//!
//! ```no_run
//! use palaver_client::{SignalingClient, Transport};
//! use palaver_core::{ClientConfig, Credentials, MessageKind, Nickname, RoomId};
//!
//! async fn run(transport: impl Transport) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new(
//!         "wss://meet.example.org/signaling",
//!         "alice@example.org",
//!         Credentials::new("s3cret"),
//!     );
//!     let client = SignalingClient::new(transport, config);
//!
//!     client.on_message(|message| println!("{}: {}", message.sender, message.body));
//!
//!     client.connect().await?;
//!     let room = RoomId::new("room1")?;
//!     client.join_room(room.clone(), Nickname::new("alice")?).await?;
//!     client.send_message(room, MessageKind::GroupChat, "hi").await?;
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod observer;
mod system_env;
mod transport;

pub use client::SignalingClient;
pub use observer::ObserverRegistry;
pub use palaver_core::{
    ChatMessage, ClientConfig, Command, ConfigError, Credentials, Environment, EventKind,
    JoinReject, MembershipState, MessageId, MessageKind, Nickname, OutboundMessage, RoomId,
    SessionConfig, SessionState, SignalingError, SignalingEvent, TransportEvent,
};
pub use system_env::SystemEnv;
pub use transport::{LINK_CAPACITY, Transport, TransportError, TransportLink};
