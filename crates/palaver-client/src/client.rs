//! Async signaling client.
//!
//! [`SignalingClient`] wraps the pure [`Session`] state machine with a
//! transport link and a driver task. Operations check preconditions
//! synchronously under the session lock, then await completion through a
//! pending-operation table the driver resolves as transport events and
//! tick timeouts arrive.
//!
//! The session lock is a plain (non-async) mutex held only for state
//! transitions; effects execute after release, so no lock is ever held
//! across an await point.

use std::{collections::HashMap, sync::Arc, time::Duration};

use palaver_core::{
    ChatMessage, ClientConfig, Command, Environment, EventKind, MembershipState, MessageId,
    MessageKind, Nickname, OpKey, OutboundMessage, RoomId, Session, SessionAction, SessionConfig,
    SessionState, SignalingError, SignalingEvent, TransportEvent,
};
use parking_lot::Mutex;
use tokio::{sync::oneshot, task::AbortHandle};

use crate::{
    observer::ObserverRegistry,
    system_env::SystemEnv,
    transport::{Transport, TransportLink},
};

/// Cadence of the driver's maintenance ticks.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Session state plus the table of operations awaiting completion.
///
/// One lock guards both so a transition and its pending-table bookkeeping
/// are atomic; otherwise a completion could race its registration.
struct ClientState<I>
where
    I: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>,
{
    session: Session<I>,
    pending: HashMap<OpKey, oneshot::Sender<Result<(), SignalingError>>>,
}

impl<I> ClientState<I>
where
    I: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>,
{
    /// Fire `Complete` actions against the pending table, returning the
    /// remaining effects for execution outside the lock.
    fn resolve(&mut self, actions: Vec<SessionAction>) -> Vec<SessionAction> {
        let mut effects = Vec::new();
        for action in actions {
            if let SessionAction::Complete { op, result } = action {
                if let Some(tx) = self.pending.remove(&op) {
                    let _ = tx.send(result);
                }
            } else {
                effects.push(action);
            }
        }
        effects
    }
}

/// State shared between the client surface and its driver task.
struct Shared<E: Environment> {
    env: E,
    state: Mutex<ClientState<E::Instant>>,
    observers: ObserverRegistry,
    commands: Mutex<Option<tokio::sync::mpsc::Sender<Command>>>,
    driver: Mutex<Option<AbortHandle>>,
}

impl<E: Environment> Shared<E> {
    /// Execute effects produced by a session transition.
    ///
    /// Returns true if the transport link was closed.
    fn execute(&self, effects: Vec<SessionAction>) -> bool {
        let mut closed = false;
        for effect in effects {
            match effect {
                SessionAction::Transmit(command) => self.transmit_best_effort(command),
                SessionAction::Notify(event) => self.observers.dispatch(&event),
                SessionAction::Complete { op, result } => {
                    // Completions normally resolve under the state lock;
                    // this arm only fires for effects routed around it.
                    if let Some(tx) = self.state.lock().pending.remove(&op) {
                        let _ = tx.send(result);
                    }
                },
                SessionAction::CloseTransport => {
                    *self.commands.lock() = None;
                    closed = true;
                },
            }
        }
        closed
    }

    /// Hand a command to the transport without waiting.
    ///
    /// A full or closed link drops the command; the session's timeout and
    /// loss handling owns the fallout.
    fn transmit_best_effort(&self, command: Command) {
        let sender = self.commands.lock().clone();
        match sender {
            Some(sender) => {
                if let Err(err) = sender.try_send(command) {
                    tracing::debug!("transport did not accept command: {err}");
                }
            },
            None => tracing::debug!("dropping command: no transport link"),
        }
    }

    fn abort_driver(&self) {
        if let Some(handle) = self.driver.lock().take() {
            handle.abort();
        }
    }
}

/// Room signaling client.
///
/// Owns one connection to a messaging server, manages room memberships and
/// message delivery, and dispatches lifecycle events to registered
/// observers. One instance, one connection; independent clients in the same
/// process do not share state.
pub struct SignalingClient<T: Transport, E: Environment = SystemEnv> {
    transport: tokio::sync::Mutex<T>,
    config: ClientConfig,
    session_config: SessionConfig,
    shared: Arc<Shared<E>>,
}

impl<T: Transport> SignalingClient<T, SystemEnv> {
    /// Create a client with the production environment and default timing
    /// bounds.
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self::with_env(transport, config, SessionConfig::default(), SystemEnv::new())
    }
}

impl<T: Transport, E: Environment> SignalingClient<T, E> {
    /// Create a client with explicit timing bounds and environment.
    pub fn with_env(
        transport: T,
        config: ClientConfig,
        session_config: SessionConfig,
        env: E,
    ) -> Self {
        let session = Session::new(env.now(), session_config.clone());
        Self {
            transport: tokio::sync::Mutex::new(transport),
            config,
            session_config,
            shared: Arc::new(Shared {
                env,
                state: Mutex::new(ClientState { session, pending: HashMap::new() }),
                observers: ObserverRegistry::new(),
                commands: Mutex::new(None),
                driver: Mutex::new(None),
            }),
        }
    }

    /// Current session lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state.lock().session.state()
    }

    /// Whether the session is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Membership state for a room. `None` if absent.
    #[must_use]
    pub fn membership_state(&self, room: &RoomId) -> Option<MembershipState> {
        self.shared.state.lock().session.membership_state(room)
    }

    /// Rooms with an acknowledged membership.
    #[must_use]
    pub fn joined_rooms(&self) -> Vec<RoomId> {
        self.shared.state.lock().session.joined_rooms()
    }

    /// Register an observer for one event category.
    ///
    /// Any number of observers may be registered per category; they are
    /// invoked in registration order on the driver task.
    pub fn observe(
        &self,
        kind: EventKind,
        observer: impl Fn(&SignalingEvent) + Send + Sync + 'static,
    ) {
        self.shared.observers.register(kind, observer);
    }

    /// Observe connection establishment.
    pub fn on_connected(&self, observer: impl Fn() + Send + Sync + 'static) {
        self.observe(EventKind::Connected, move |_| observer());
    }

    /// Observe disconnection. The reason is `None` for a caller-initiated
    /// disconnect.
    pub fn on_disconnected(&self, observer: impl Fn(Option<&str>) + Send + Sync + 'static) {
        self.observe(EventKind::Disconnected, move |event| {
            if let SignalingEvent::Disconnected { reason } = event {
                observer(reason.as_deref());
            }
        });
    }

    /// Observe unsolicited failures.
    pub fn on_error(&self, observer: impl Fn(&SignalingError) + Send + Sync + 'static) {
        self.observe(EventKind::Error, move |event| {
            if let SignalingEvent::Error(error) = event {
                observer(error);
            }
        });
    }

    /// Observe inbound chat messages.
    pub fn on_message(&self, observer: impl Fn(&ChatMessage) + Send + Sync + 'static) {
        self.observe(EventKind::MessageReceived, move |event| {
            if let SignalingEvent::MessageReceived(message) = event {
                observer(message);
            }
        });
    }

    /// Connect to the server.
    ///
    /// Resolves once the transport reports ready. Calling while already
    /// connected resolves immediately; there is never more than one live
    /// connection per client.
    ///
    /// # Errors
    ///
    /// - [`SignalingError::Connection`] on invalid configuration,
    ///   authentication rejection, network failure, or a connect already in
    ///   flight
    /// - [`SignalingError::Timeout`] if the server does not answer within
    ///   the connect bound
    pub async fn connect(&self) -> Result<(), SignalingError> {
        self.config.validate()?;

        let (effects, rx, dialing) = {
            let mut state = self.shared.state.lock();
            let actions = state.session.connect(self.shared.env.now())?;
            let (tx, rx) = oneshot::channel();
            state.pending.insert(OpKey::Connect, tx);
            let effects = state.resolve(actions);
            let dialing = state.session.state() == SessionState::Connecting;
            (effects, rx, dialing)
        };
        self.shared.execute(effects);

        if dialing {
            tracing::info!(endpoint = %self.config.endpoint, "connecting");
            self.dial().await;
        }

        await_completion(rx).await
    }

    /// Dial the transport and install the resulting link.
    ///
    /// Every outcome routes through the session so the pending connect
    /// resolves exactly once: ready/failed via the driver, dial errors via
    /// `ConnectFailed`, dial hangs via the tick timeout.
    async fn dial(&self) {
        let dialed = {
            let mut transport = self.transport.lock().await;
            tokio::select! {
                result = transport.open(&self.config) => Some(result),
                () = self.shared.env.sleep(self.session_config.connect_timeout) => None,
            }
        };

        match dialed {
            Some(Ok(link)) => self.install_link(link),
            Some(Err(err)) => {
                tracing::warn!("dial failed: {err}");
                let effects = {
                    let mut state = self.shared.state.lock();
                    let actions = state.session.handle_event(
                        TransportEvent::ConnectFailed { reason: err.to_string() },
                        self.shared.env.now(),
                    );
                    state.resolve(actions)
                };
                self.shared.execute(effects);
            },
            None => {
                let effects = {
                    let mut state = self.shared.state.lock();
                    let actions = state.session.tick(self.shared.env.now());
                    state.resolve(actions)
                };
                self.shared.execute(effects);
            },
        }
    }

    /// Install a freshly dialed link and start the driver task.
    fn install_link(&self, link: TransportLink) {
        let TransportLink { commands, events } = link;

        // A disconnect may have raced the dial; the pending connect is
        // already resolved in that case and the link is refused.
        if self.shared.state.lock().session.state() != SessionState::Connecting {
            tracing::debug!("discarding link: session no longer connecting");
            return;
        }

        *self.shared.commands.lock() = Some(commands);
        let handle = tokio::spawn(drive(Arc::clone(&self.shared), events));
        let previous = self.shared.driver.lock().replace(handle.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Join a room under a nickname.
    ///
    /// Resolves once the server acknowledges the join. Re-joining a room
    /// already held under the same nickname resolves immediately without a
    /// second join request.
    ///
    /// # Errors
    ///
    /// - [`SignalingError::NotConnected`] if the session is not connected
    /// - [`SignalingError::Join`] on rejection, nickname conflict, or a
    ///   join already in flight
    /// - [`SignalingError::Timeout`] if the server does not answer within
    ///   the join bound
    pub async fn join_room(&self, room: RoomId, nickname: Nickname) -> Result<(), SignalingError> {
        let (effects, rx) = {
            let mut state = self.shared.state.lock();
            let actions = state.session.join(room.clone(), nickname, self.shared.env.now())?;
            let (tx, rx) = oneshot::channel();
            state.pending.insert(OpKey::Join(room), tx);
            (state.resolve(actions), rx)
        };
        self.shared.execute(effects);

        await_completion(rx).await
    }

    /// Send a chat message to a room.
    ///
    /// Resolves once the transport accepts the message for delivery; the
    /// underlying protocol is fire-and-forget at this layer, so there is no
    /// end-to-end confirmation to wait for.
    ///
    /// # Errors
    ///
    /// - [`SignalingError::NotConnected`] if the session is not connected
    /// - [`SignalingError::NotJoined`] if the room has no acknowledged
    ///   membership
    /// - [`SignalingError::Send`] if the transport rejects the message
    /// - [`SignalingError::Timeout`] if the transport does not accept it
    ///   within the send bound
    pub async fn send_message(
        &self,
        room: RoomId,
        kind: MessageKind,
        body: impl Into<String>,
    ) -> Result<(), SignalingError> {
        let message = OutboundMessage {
            id: MessageId::new(self.shared.env.random_u64()),
            room: room.clone(),
            kind,
            body: body.into(),
        };

        let actions = self.shared.state.lock().session.send(message)?;
        for action in actions {
            match action {
                // The publish honors the send bound and surfaces rejection,
                // so it skips the best-effort path.
                SessionAction::Transmit(command) => self.send_command(&room, command).await?,
                other => {
                    self.shared.execute(vec![other]);
                },
            }
        }
        Ok(())
    }

    /// Hand one command to the transport, bounded by the send timeout.
    async fn send_command(&self, room: &RoomId, command: Command) -> Result<(), SignalingError> {
        let sender = self.shared.commands.lock().clone();
        let Some(sender) = sender else {
            return Err(SignalingError::Send {
                room: room.clone(),
                reason: "no transport link".to_string(),
            });
        };

        tokio::select! {
            result = sender.send(command) => result.map_err(|_| SignalingError::Send {
                room: room.clone(),
                reason: "transport closed".to_string(),
            }),
            () = self.shared.env.sleep(self.session_config.send_timeout) => {
                Err(SignalingError::Timeout {
                    operation: "send",
                    elapsed: self.session_config.send_timeout,
                })
            },
        }
    }

    /// Leave a room. No-op if the room is not held.
    ///
    /// Leaving a room whose join is still in flight cancels the pending
    /// join.
    pub async fn leave_room(&self, room: &RoomId) {
        let effects = {
            let mut state = self.shared.state.lock();
            let actions = state.session.leave(room);
            state.resolve(actions)
        };
        self.shared.execute(effects);
    }

    /// Disconnect from the server.
    ///
    /// Always succeeds locally: memberships are cleared, pending operations
    /// resolve with errors, and the session ends `Disconnected` regardless
    /// of what the network does. Safe to call at any point, including
    /// mid-connect and mid-join. Idempotent.
    pub async fn disconnect(&self) {
        let effects = {
            let mut state = self.shared.state.lock();
            let actions = state.session.disconnect();
            state.resolve(actions)
        };
        if !effects.is_empty() {
            tracing::info!("disconnecting");
        }
        self.shared.execute(effects);
        self.shared.abort_driver();
    }
}

impl<T: Transport, E: Environment> Drop for SignalingClient<T, E> {
    fn drop(&mut self) {
        self.shared.abort_driver();
    }
}

impl<T: Transport, E: Environment> std::fmt::Debug for SignalingClient<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingClient")
            .field("endpoint", &self.config.endpoint)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Await a pending operation's completion.
async fn await_completion(
    rx: oneshot::Receiver<Result<(), SignalingError>>,
) -> Result<(), SignalingError> {
    match rx.await {
        Ok(result) => result,
        // The sender only disappears if the client itself went away.
        Err(_) => Err(SignalingError::Connection { reason: "operation abandoned".to_string() }),
    }
}

/// Driver task: feeds transport events and maintenance ticks into the
/// session and executes the resulting effects.
///
/// Observers are invoked from here, so they must not block; the tick also
/// stalls while an observer runs.
async fn drive<E: Environment>(
    shared: Arc<Shared<E>>,
    mut events: tokio::sync::mpsc::Receiver<TransportEvent>,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    tracing::trace!(?event, "transport event");
                    let effects = {
                        let mut state = shared.state.lock();
                        let actions = state.session.handle_event(event, shared.env.now());
                        state.resolve(actions)
                    };
                    if shared.execute(effects) {
                        break;
                    }
                },
                None => {
                    // Transport dropped its side without a Closed event.
                    let effects = {
                        let mut state = shared.state.lock();
                        let actions = state.session.handle_event(
                            TransportEvent::Closed { reason: "transport closed".to_string() },
                            shared.env.now(),
                        );
                        state.resolve(actions)
                    };
                    shared.execute(effects);
                    break;
                },
            },
            () = shared.env.sleep(TICK_INTERVAL) => {
                let effects = {
                    let mut state = shared.state.lock();
                    let actions = state.session.tick(shared.env.now());
                    state.resolve(actions)
                };
                if shared.execute(effects) {
                    break;
                }
            },
        }
    }
}
