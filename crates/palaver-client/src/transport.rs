//! Transport abstraction.
//!
//! The messaging transport is a black box: it knows how to reach a server,
//! authenticate, and move [`Command`]s and [`TransportEvent`]s across the
//! network. This crate never looks inside - protocol framing, handshakes,
//! and federation belong to the implementation.

use std::future::Future;

use palaver_core::{ClientConfig, Command, TransportEvent};
use thiserror::Error;
use tokio::sync::mpsc;

/// Channel capacity for a transport link.
pub const LINK_CAPACITY: usize = 32;

/// Errors surfaced by transport implementations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Dial failed before a link existed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// An established link broke.
    #[error("link error: {0}")]
    Link(String),
}

/// Channel pair for an established transport link.
///
/// The client sends commands into `commands`; the transport reports inbound
/// traffic and lifecycle changes on `events`. Dropping `commands` tells the
/// transport to tear the link down.
#[derive(Debug)]
pub struct TransportLink {
    /// Commands for the transport to deliver.
    pub commands: mpsc::Sender<Command>,
    /// Events the transport reports back.
    pub events: mpsc::Receiver<TransportEvent>,
}

/// A messaging transport the client can open links through.
///
/// `open` performs the dial. The authentication outcome arrives on the
/// event channel afterwards, as [`TransportEvent::Ready`] or
/// [`TransportEvent::ConnectFailed`] - servers answer in their own time,
/// and the session's connect bound covers the whole exchange.
///
/// Implementations must be cancellation-safe: an `open` future dropped
/// mid-dial must not leak a half-open connection.
pub trait Transport: Send + 'static {
    /// Establish a link to the server named by the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if no link could be established at all;
    /// authentication rejections are reported through the event channel
    /// instead.
    fn open(
        &mut self,
        config: &ClientConfig,
    ) -> impl Future<Output = Result<TransportLink, TransportError>> + Send;
}
