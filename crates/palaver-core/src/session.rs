//! Session layer state machine.
//!
//! Manages connection lifecycle, room memberships, heartbeats, timeouts, and
//! teardown. Uses the action pattern: methods take time as input and return
//! actions for the driver to execute. This keeps the state machine pure (no
//! I/O) and makes testing straightforward.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐  connect  ┌────────────┐    Ready     ┌───────────┐
//! │ Disconnected │──────────>│ Connecting │─────────────>│ Connected │
//! └──────────────┘           └────────────┘              └───────────┘
//!        ↑                         │                           │
//!        │   ConnectFailed/Timeout │      Closed/idle loss/    │
//!        └─────────────────────────┴──────── disconnect ───────┘
//! ```
//!
//! Per room, under a connected session:
//!
//! ```text
//! absent ── join ──> joining ── JoinAck ──> joined
//!                       │                      │
//!          JoinRejected/Timeout/leave     leave/loss
//!                       ↓                      ↓
//!                     absent                 absent
//! ```

use std::{
    collections::HashMap,
    ops::Sub,
    time::{Duration, Instant},
};

use crate::{
    config::SessionConfig,
    error::{JoinReject, SignalingError},
    event::SignalingEvent,
    transport::{Command, TransportEvent},
    types::{Nickname, OutboundMessage, RoomId},
};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection. Initial and terminal state.
    Disconnected,
    /// Connection attempt in flight, waiting for the transport to report
    /// ready.
    Connecting,
    /// Connection established and authenticated.
    Connected,
}

/// Membership lifecycle state for one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipState {
    /// Join request in flight, waiting for the server acknowledgment.
    Joining,
    /// Server acknowledged the join; messages may be sent.
    Joined,
}

/// Pending asynchronous operations tracked by the session.
///
/// Used to route completion results back to the caller awaiting them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpKey {
    /// The connect operation. At most one at a time.
    Connect,
    /// A join operation for one room. At most one per room.
    Join(RoomId),
}

/// Actions returned by the session state machine.
///
/// The driver executes these:
/// - `Transmit`: hand the command to the transport
/// - `Notify`: dispatch the event to registered observers
/// - `Complete`: resolve the pending operation with the result
/// - `CloseTransport`: tear down the transport link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Hand this command to the transport.
    Transmit(Command),

    /// Dispatch this event to registered observers.
    Notify(SignalingEvent),

    /// Resolve a pending operation with this result.
    Complete {
        /// Which pending operation to resolve.
        op: OpKey,
        /// Outcome delivered to the awaiting caller.
        result: Result<(), SignalingError>,
    },

    /// Tear down the transport link.
    CloseTransport,
}

/// One room membership.
#[derive(Debug, Clone)]
struct Membership<I> {
    /// Nickname the room is held under.
    nickname: Nickname,
    /// Current membership state.
    state: MembershipState,
    /// When the join was issued. Only meaningful while `Joining`.
    since: I,
}

/// Session state machine.
///
/// Pure state machine - no I/O, no clock. Time is passed as parameters to
/// methods that need it, generic over `Instant` to support both real time
/// and virtual time for deterministic testing.
#[derive(Debug, Clone)]
pub struct Session<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Current lifecycle state.
    state: SessionState,
    /// Timing bounds.
    config: SessionConfig,
    /// Memberships by room.
    rooms: HashMap<RoomId, Membership<I>>,
    /// When the connect was issued. `Some` exactly while `Connecting`.
    connect_since: Option<I>,
    /// Last inbound activity timestamp.
    last_activity: I,
    /// Last heartbeat sent timestamp.
    last_heartbeat: Option<I>,
}

impl<I> Session<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a new session in [`SessionState::Disconnected`].
    pub fn new(now: I, config: SessionConfig) -> Self {
        Self {
            state: SessionState::Disconnected,
            config,
            rooms: HashMap::new(),
            connect_since: None,
            last_activity: now,
            last_heartbeat: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Membership state for a room. `None` if absent.
    #[must_use]
    pub fn membership_state(&self, room: &RoomId) -> Option<MembershipState> {
        self.rooms.get(room).map(|m| m.state)
    }

    /// Nickname a room is held under. `None` if absent.
    #[must_use]
    pub fn nickname(&self, room: &RoomId) -> Option<&Nickname> {
        self.rooms.get(room).map(|m| &m.nickname)
    }

    /// Number of memberships, joined or joining.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Rooms with an acknowledged membership.
    #[must_use]
    pub fn joined_rooms(&self) -> Vec<RoomId> {
        self.rooms
            .iter()
            .filter(|(_, m)| m.state == MembershipState::Joined)
            .map(|(room, _)| room.clone())
            .collect()
    }

    /// Begin a connection attempt.
    ///
    /// `Disconnected → Connecting`. The driver dials the transport after
    /// this returns; the attempt resolves via [`TransportEvent::Ready`],
    /// [`TransportEvent::ConnectFailed`], or a tick timeout.
    ///
    /// Calling while already connected resolves immediately - there is
    /// never more than one live connection.
    ///
    /// # Errors
    ///
    /// - [`SignalingError::Connection`] if an attempt is already in flight
    pub fn connect(&mut self, now: I) -> Result<Vec<SessionAction>, SignalingError> {
        match self.state {
            SessionState::Connected => {
                Ok(vec![SessionAction::Complete { op: OpKey::Connect, result: Ok(()) }])
            },
            SessionState::Connecting => Err(SignalingError::Connection {
                reason: "connect already in progress".to_string(),
            }),
            SessionState::Disconnected => {
                self.state = SessionState::Connecting;
                self.connect_since = Some(now);
                self.last_activity = now;
                Ok(Vec::new())
            },
        }
    }

    /// Begin joining a room under a nickname.
    ///
    /// Re-joining a room already held under the same nickname resolves
    /// immediately without re-transmitting.
    ///
    /// # Errors
    ///
    /// - [`SignalingError::NotConnected`] if the session is not connected
    /// - [`SignalingError::Join`] with [`JoinReject::NicknameConflict`] if
    ///   the room is held under a different nickname
    /// - [`SignalingError::Join`] with [`JoinReject::Pending`] if a join for
    ///   this room is already in flight
    pub fn join(
        &mut self,
        room: RoomId,
        nickname: Nickname,
        now: I,
    ) -> Result<Vec<SessionAction>, SignalingError> {
        if self.state != SessionState::Connected {
            return Err(SignalingError::NotConnected { operation: "join", state: self.state });
        }

        if let Some(membership) = self.rooms.get(&room) {
            return match membership.state {
                MembershipState::Joined if membership.nickname == nickname => {
                    Ok(vec![SessionAction::Complete { op: OpKey::Join(room), result: Ok(()) }])
                },
                MembershipState::Joined => {
                    Err(SignalingError::Join { room, reason: JoinReject::NicknameConflict })
                },
                MembershipState::Joining => {
                    Err(SignalingError::Join { room, reason: JoinReject::Pending })
                },
            };
        }

        self.rooms.insert(room.clone(), Membership {
            nickname: nickname.clone(),
            state: MembershipState::Joining,
            since: now,
        });

        Ok(vec![SessionAction::Transmit(Command::Join { room, nickname })])
    }

    /// Hand a message to the transport for delivery.
    ///
    /// Preconditions are checked synchronously; nothing is ever queued for
    /// a later connection.
    ///
    /// # Errors
    ///
    /// - [`SignalingError::NotConnected`] if the session is not connected
    /// - [`SignalingError::NotJoined`] if the destination room has no
    ///   acknowledged membership
    pub fn send(&mut self, message: OutboundMessage) -> Result<Vec<SessionAction>, SignalingError> {
        if self.state != SessionState::Connected {
            return Err(SignalingError::NotConnected { operation: "send", state: self.state });
        }

        match self.rooms.get(&message.room).map(|m| m.state) {
            Some(MembershipState::Joined) => {
                Ok(vec![SessionAction::Transmit(Command::Publish(message))])
            },
            _ => Err(SignalingError::NotJoined { room: message.room }),
        }
    }

    /// Leave a room. No-op if absent.
    ///
    /// Leaving a room whose join is still in flight cancels the pending
    /// join.
    pub fn leave(&mut self, room: &RoomId) -> Vec<SessionAction> {
        let Some(membership) = self.rooms.remove(room) else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        if membership.state == MembershipState::Joining {
            actions.push(SessionAction::Complete {
                op: OpKey::Join(room.clone()),
                result: Err(SignalingError::Join {
                    room: room.clone(),
                    reason: JoinReject::Cancelled,
                }),
            });
        }
        actions.push(SessionAction::Transmit(Command::Leave { room: room.clone() }));
        actions
    }

    /// Tear down the session.
    ///
    /// Total and idempotent: clears all memberships, cancels pending
    /// operations, and always leaves the session `Disconnected`. Safe to
    /// call at any point, including mid-connect and mid-join.
    pub fn disconnect(&mut self) -> Vec<SessionAction> {
        if self.state == SessionState::Disconnected {
            return Vec::new();
        }

        let mut actions = Vec::new();

        if self.connect_since.is_some() {
            actions.push(SessionAction::Complete {
                op: OpKey::Connect,
                result: Err(SignalingError::Connection {
                    reason: "cancelled: client disconnected".to_string(),
                }),
            });
        }

        for (room, membership) in self.rooms.drain() {
            if membership.state == MembershipState::Joining {
                actions.push(SessionAction::Complete {
                    op: OpKey::Join(room.clone()),
                    result: Err(SignalingError::Join { room, reason: JoinReject::Cancelled }),
                });
            }
        }

        if self.state == SessionState::Connected {
            actions.push(SessionAction::Transmit(Command::Bye));
        }

        self.state = SessionState::Disconnected;
        self.connect_since = None;
        self.last_heartbeat = None;

        actions.push(SessionAction::Notify(SignalingEvent::Disconnected { reason: None }));
        actions.push(SessionAction::CloseTransport);
        actions
    }

    /// Process an event reported by the transport.
    ///
    /// Total: events that do not fit the current state (stale
    /// acknowledgments after a disconnect, duplicate ready reports) are
    /// dropped rather than faulted, since the transport and the caller race
    /// by construction.
    pub fn handle_event(&mut self, event: TransportEvent, now: I) -> Vec<SessionAction> {
        self.last_activity = now;

        match event {
            TransportEvent::Ready => {
                if self.state != SessionState::Connecting {
                    return Vec::new();
                }
                self.state = SessionState::Connected;
                self.connect_since = None;
                self.last_heartbeat = None;
                vec![
                    SessionAction::Notify(SignalingEvent::Connected),
                    SessionAction::Complete { op: OpKey::Connect, result: Ok(()) },
                ]
            },

            TransportEvent::ConnectFailed { reason } => {
                if self.state != SessionState::Connecting {
                    return Vec::new();
                }
                self.state = SessionState::Disconnected;
                self.connect_since = None;
                vec![
                    SessionAction::Complete {
                        op: OpKey::Connect,
                        result: Err(SignalingError::Connection { reason }),
                    },
                    SessionAction::CloseTransport,
                ]
            },

            TransportEvent::JoinAck { room } => {
                let joining = self
                    .rooms
                    .get_mut(&room)
                    .filter(|m| m.state == MembershipState::Joining);
                let Some(membership) = joining else {
                    return Vec::new();
                };
                membership.state = MembershipState::Joined;
                vec![SessionAction::Complete { op: OpKey::Join(room), result: Ok(()) }]
            },

            TransportEvent::JoinRejected { room, reason } => {
                let was_joining = self
                    .rooms
                    .get(&room)
                    .is_some_and(|m| m.state == MembershipState::Joining);
                if !was_joining {
                    return Vec::new();
                }
                self.rooms.remove(&room);
                vec![SessionAction::Complete {
                    op: OpKey::Join(room.clone()),
                    result: Err(SignalingError::Join { room, reason }),
                }]
            },

            TransportEvent::Message(message) => {
                let joined = self.state == SessionState::Connected
                    && self
                        .rooms
                        .get(&message.room)
                        .is_some_and(|m| m.state == MembershipState::Joined);
                if !joined {
                    // Message for a room we do not hold; the driver logs it.
                    return Vec::new();
                }
                vec![SessionAction::Notify(SignalingEvent::MessageReceived(message))]
            },

            TransportEvent::Pong => Vec::new(),

            TransportEvent::Closed { reason } => {
                if self.state == SessionState::Disconnected {
                    return Vec::new();
                }
                self.lose_connection(&reason)
            },
        }
    }

    /// Process periodic maintenance (timeouts and heartbeats).
    ///
    /// Call this periodically to trigger connect/join timeout detection,
    /// idle-loss detection, and heartbeat sending.
    pub fn tick(&mut self, now: I) -> Vec<SessionAction> {
        match self.state {
            SessionState::Disconnected => Vec::new(),
            SessionState::Connecting => self.tick_connecting(now),
            SessionState::Connected => self.tick_connected(now),
        }
    }

    fn tick_connecting(&mut self, now: I) -> Vec<SessionAction> {
        let Some(since) = self.connect_since else {
            return Vec::new();
        };
        let elapsed = now - since;
        if elapsed < self.config.connect_timeout {
            return Vec::new();
        }

        self.state = SessionState::Disconnected;
        self.connect_since = None;
        vec![
            SessionAction::Complete {
                op: OpKey::Connect,
                result: Err(SignalingError::Timeout { operation: "connect", elapsed }),
            },
            SessionAction::CloseTransport,
        ]
    }

    fn tick_connected(&mut self, now: I) -> Vec<SessionAction> {
        // A dead peer stops answering pings; inbound activity is the only
        // thing that refreshes the idle clock.
        let idle = now - self.last_activity;
        if idle > self.config.idle_timeout {
            return self.lose_connection(&format!("idle timeout after {idle:?}"));
        }

        let mut actions = Vec::new();

        let timed_out: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, m)| {
                m.state == MembershipState::Joining && now - m.since >= self.config.join_timeout
            })
            .map(|(room, _)| room.clone())
            .collect();
        for room in timed_out {
            if let Some(membership) = self.rooms.remove(&room) {
                actions.push(SessionAction::Complete {
                    op: OpKey::Join(room),
                    result: Err(SignalingError::Timeout {
                        operation: "join",
                        elapsed: now - membership.since,
                    }),
                });
            }
        }

        let should_ping = match self.last_heartbeat {
            None => true,
            Some(last) => now - last >= self.config.heartbeat_interval,
        };
        if should_ping {
            actions.push(SessionAction::Transmit(Command::Ping));
            self.last_heartbeat = Some(now);
        }

        actions
    }

    /// Unsolicited connection loss: cancel pending work, notify observers,
    /// clear all memberships.
    fn lose_connection(&mut self, reason: &str) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        if self.connect_since.is_some() {
            actions.push(SessionAction::Complete {
                op: OpKey::Connect,
                result: Err(SignalingError::Connection { reason: reason.to_string() }),
            });
        }

        for (room, membership) in self.rooms.drain() {
            if membership.state == MembershipState::Joining {
                actions.push(SessionAction::Complete {
                    op: OpKey::Join(room),
                    result: Err(SignalingError::Connection { reason: reason.to_string() }),
                });
            }
        }

        self.state = SessionState::Disconnected;
        self.connect_since = None;
        self.last_heartbeat = None;

        actions.push(SessionAction::Notify(SignalingEvent::Error(SignalingError::Connection {
            reason: reason.to_string(),
        })));
        actions.push(SessionAction::Notify(SignalingEvent::Disconnected {
            reason: Some(reason.to_string()),
        }));
        actions.push(SessionAction::CloseTransport);
        actions
    }
}
