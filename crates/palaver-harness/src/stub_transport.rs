//! Scripted in-process transport.
//!
//! `StubTransport` implements the client's [`Transport`] trait against a
//! [`ServerScript`] describing how the far side behaves: whether
//! authentication succeeds, how each room answers joins, and whether pings
//! are answered. Tests drive the server side explicitly through a
//! [`StubHandle`] - pushing unsolicited messages, dropping the connection,
//! and inspecting the commands the client handed over.

use std::{collections::HashMap, future::Future, sync::Arc};

use palaver_client::{LINK_CAPACITY, Transport, TransportError, TransportLink};
use palaver_core::{ChatMessage, ClientConfig, Command, JoinReject, RoomId, TransportEvent};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// How the scripted server answers a connection attempt.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// Accept immediately.
    Accept,
    /// Reject with this reason.
    Reject(String),
    /// Accept only if the client's credentials match this secret.
    Password(String),
    /// Never answer. For connect-timeout tests.
    Silent,
}

/// How the scripted server answers a join request.
#[derive(Debug, Clone)]
pub enum JoinOutcome {
    /// Acknowledge the join.
    Accept,
    /// Reject with this reason.
    Reject(JoinReject),
    /// Never answer. For join-timeout tests.
    Silent,
}

/// Scripted behavior of the far side.
#[derive(Debug, Clone)]
pub struct ServerScript {
    /// Auth outcome per connection attempt; the last entry repeats.
    auth: Vec<AuthOutcome>,
    /// Join outcomes for specific rooms.
    joins: HashMap<RoomId, JoinOutcome>,
    /// Join outcome for rooms not listed in `joins`.
    default_join: JoinOutcome,
    /// Whether pings are answered with pongs.
    answer_pings: bool,
}

impl ServerScript {
    /// A server that accepts everything and answers pings.
    #[must_use]
    pub fn accepting() -> Self {
        Self {
            auth: vec![AuthOutcome::Accept],
            joins: HashMap::new(),
            default_join: JoinOutcome::Accept,
            answer_pings: true,
        }
    }

    /// Replace the auth outcome for every attempt.
    #[must_use]
    pub fn with_auth(mut self, outcome: AuthOutcome) -> Self {
        self.auth = vec![outcome];
        self
    }

    /// Script auth outcomes per attempt; the last entry repeats.
    #[must_use]
    pub fn with_auth_sequence(mut self, outcomes: Vec<AuthOutcome>) -> Self {
        self.auth = outcomes;
        self
    }

    /// Script the outcome for joins of one room.
    #[must_use]
    pub fn with_join(mut self, room: RoomId, outcome: JoinOutcome) -> Self {
        self.joins.insert(room, outcome);
        self
    }

    /// Script the outcome for joins of unlisted rooms.
    #[must_use]
    pub fn with_default_join(mut self, outcome: JoinOutcome) -> Self {
        self.default_join = outcome;
        self
    }

    /// Leave pings unanswered. For idle-loss tests.
    #[must_use]
    pub fn without_pongs(mut self) -> Self {
        self.answer_pings = false;
        self
    }
}

/// Test-side handle to the scripted server.
///
/// Valid across reconnects: each `open` re-points the handle at the fresh
/// link.
#[derive(Clone, Default)]
pub struct StubHandle {
    inner: Arc<HandleInner>,
}

#[derive(Default)]
struct HandleInner {
    sent: Mutex<Vec<Command>>,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    opens: Mutex<usize>,
}

impl StubHandle {
    /// Every command the client handed to the transport, in order.
    #[must_use]
    pub fn sent_commands(&self) -> Vec<Command> {
        self.inner.sent.lock().clone()
    }

    /// Number of connection attempts the client dialed.
    #[must_use]
    pub fn opens(&self) -> usize {
        *self.inner.opens.lock()
    }

    /// Number of join requests the client transmitted.
    #[must_use]
    pub fn join_requests(&self) -> usize {
        self.inner.sent.lock().iter().filter(|c| matches!(c, Command::Join { .. })).count()
    }

    /// Push an arbitrary event to the client.
    ///
    /// Returns false if no link is open.
    pub async fn push_event(&self, event: TransportEvent) -> bool {
        let sender = self.inner.events.lock().clone();
        match sender {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Deliver an inbound chat message.
    pub async fn push_message(&self, message: ChatMessage) -> bool {
        self.push_event(TransportEvent::Message(message)).await
    }

    /// Drop the connection from the server side.
    pub async fn drop_connection(&self, reason: &str) -> bool {
        self.push_event(TransportEvent::Closed { reason: reason.to_string() }).await
    }
}

impl std::fmt::Debug for StubHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubHandle").field("sent", &self.inner.sent.lock().len()).finish()
    }
}

/// Scripted transport for driving the client in tests.
#[derive(Debug)]
pub struct StubTransport {
    script: ServerScript,
    handle: StubHandle,
    attempts: usize,
}

impl StubTransport {
    /// Create a transport following the script.
    #[must_use]
    pub fn new(script: ServerScript) -> Self {
        Self { script, handle: StubHandle::default(), attempts: 0 }
    }

    /// The test-side handle to the scripted server.
    #[must_use]
    pub fn handle(&self) -> StubHandle {
        self.handle.clone()
    }
}

impl Transport for StubTransport {
    fn open(
        &mut self,
        config: &ClientConfig,
    ) -> impl Future<Output = Result<TransportLink, TransportError>> + Send {
        let outcome = self
            .script
            .auth
            .get(self.attempts)
            .or_else(|| self.script.auth.last())
            .cloned()
            .unwrap_or(AuthOutcome::Accept);
        self.attempts += 1;

        let script = self.script.clone();
        let handle = self.handle.clone();
        let credentials = config.credentials.clone();

        async move {
            let (command_tx, command_rx) = mpsc::channel(LINK_CAPACITY);
            let (event_tx, event_rx) = mpsc::channel(LINK_CAPACITY);

            *handle.inner.opens.lock() += 1;
            *handle.inner.events.lock() = Some(event_tx.clone());

            let greeting = match outcome {
                AuthOutcome::Accept => Some(TransportEvent::Ready),
                AuthOutcome::Password(expected) => {
                    if credentials.expose() == expected {
                        Some(TransportEvent::Ready)
                    } else {
                        Some(TransportEvent::ConnectFailed {
                            reason: "not authorized".to_string(),
                        })
                    }
                },
                AuthOutcome::Reject(reason) => Some(TransportEvent::ConnectFailed { reason }),
                AuthOutcome::Silent => None,
            };
            if let Some(greeting) = greeting {
                let _ = event_tx.send(greeting).await;
            }

            tokio::spawn(serve(script, handle, command_rx, event_tx));
            Ok(TransportLink { commands: command_tx, events: event_rx })
        }
    }
}

/// Server side of one link: record commands, answer per the script.
async fn serve(
    script: ServerScript,
    handle: StubHandle,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<TransportEvent>,
) {
    while let Some(command) = commands.recv().await {
        tracing::trace!(?command, "stub server received");
        handle.inner.sent.lock().push(command.clone());

        match command {
            Command::Join { room, .. } => {
                let outcome = script.joins.get(&room).unwrap_or(&script.default_join);
                let answer = match outcome {
                    JoinOutcome::Accept => Some(TransportEvent::JoinAck { room }),
                    JoinOutcome::Reject(reason) => {
                        Some(TransportEvent::JoinRejected { room, reason: reason.clone() })
                    },
                    JoinOutcome::Silent => None,
                };
                if let Some(answer) = answer {
                    let _ = events.send(answer).await;
                }
            },
            Command::Ping => {
                if script.answer_pings {
                    let _ = events.send(TransportEvent::Pong).await;
                }
            },
            Command::Leave { .. } | Command::Publish(_) | Command::Bye => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use palaver_core::{Credentials, Nickname};

    use super::*;

    fn config(secret: &str) -> ClientConfig {
        ClientConfig::new("wss://stub", "alice@example.org", Credentials::new(secret))
    }

    #[tokio::test]
    async fn accepting_script_greets_with_ready() {
        let mut transport = StubTransport::new(ServerScript::accepting());
        let mut link = transport.open(&config("pw")).await.unwrap();
        assert_eq!(link.events.recv().await, Some(TransportEvent::Ready));
    }

    #[tokio::test]
    async fn password_script_checks_credentials() {
        let script = ServerScript::accepting().with_auth(AuthOutcome::Password("s3cret".into()));
        let mut transport = StubTransport::new(script);

        let mut link = transport.open(&config("wrong")).await.unwrap();
        assert!(matches!(
            link.events.recv().await,
            Some(TransportEvent::ConnectFailed { .. })
        ));

        let mut link = transport.open(&config("s3cret")).await.unwrap();
        assert_eq!(link.events.recv().await, Some(TransportEvent::Ready));
    }

    #[tokio::test]
    async fn joins_answered_per_script() {
        let room = RoomId::new("room1").unwrap();
        let script = ServerScript::accepting()
            .with_join(room.clone(), JoinOutcome::Reject(JoinReject::RoomNotFound));
        let mut transport = StubTransport::new(script);
        let handle = transport.handle();

        let mut link = transport.open(&config("pw")).await.unwrap();
        assert_eq!(link.events.recv().await, Some(TransportEvent::Ready));

        let nickname = Nickname::new("alice").unwrap();
        link.commands.send(Command::Join { room: room.clone(), nickname }).await.unwrap();

        assert_eq!(
            link.events.recv().await,
            Some(TransportEvent::JoinRejected { room, reason: JoinReject::RoomNotFound })
        );
        assert_eq!(handle.join_requests(), 1);
    }
}
