//! Property-based tests for the session state machine.
//!
//! Applies arbitrary operation sequences and checks that the structural
//! invariants hold on every intermediate state, not just in hand-picked
//! scenarios.

use std::time::{Duration, Instant};

use palaver_core::{
    Command, JoinReject, MessageId, MessageKind, Nickname, OutboundMessage, RoomId, Session,
    SessionAction, SessionConfig, SessionState, TransportEvent,
};
use proptest::prelude::*;

/// Operations a caller or the transport can throw at the session.
#[derive(Debug, Clone)]
enum Op {
    Connect,
    Ready,
    ConnectFailed,
    Join(u8, u8),
    JoinAck(u8),
    JoinRejected(u8),
    Send(u8),
    Leave(u8),
    Disconnect,
    Closed,
    Advance(u16),
}

fn room(index: u8) -> RoomId {
    RoomId::new(format!("room{}", index % 3)).unwrap()
}

fn nick(index: u8) -> Nickname {
    Nickname::new(if index % 2 == 0 { "alice" } else { "bob" }).unwrap()
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Connect),
        2 => Just(Op::Ready),
        1 => Just(Op::ConnectFailed),
        3 => (any::<u8>(), any::<u8>()).prop_map(|(r, n)| Op::Join(r, n)),
        3 => any::<u8>().prop_map(Op::JoinAck),
        1 => any::<u8>().prop_map(Op::JoinRejected),
        3 => any::<u8>().prop_map(Op::Send),
        1 => any::<u8>().prop_map(Op::Leave),
        1 => Just(Op::Disconnect),
        1 => Just(Op::Closed),
        2 => (0u16..120).prop_map(Op::Advance),
    ]
}

fn apply(session: &mut Session<Instant>, op: &Op, now: &mut Instant) -> Vec<SessionAction> {
    match op {
        Op::Connect => session.connect(*now).unwrap_or_default(),
        Op::Ready => session.handle_event(TransportEvent::Ready, *now),
        Op::ConnectFailed => session
            .handle_event(TransportEvent::ConnectFailed { reason: "refused".into() }, *now),
        Op::Join(r, n) => session.join(room(*r), nick(*n), *now).unwrap_or_default(),
        Op::JoinAck(r) => session.handle_event(TransportEvent::JoinAck { room: room(*r) }, *now),
        Op::JoinRejected(r) => session.handle_event(
            TransportEvent::JoinRejected { room: room(*r), reason: JoinReject::RoomNotFound },
            *now,
        ),
        Op::Send(r) => {
            let message = OutboundMessage {
                id: MessageId::new(u64::from(*r)),
                room: room(*r),
                kind: MessageKind::GroupChat,
                body: "x".to_string(),
            };
            session.send(message).unwrap_or_default()
        },
        Op::Leave(r) => session.leave(&room(*r)),
        Op::Disconnect => session.disconnect(),
        Op::Closed => session.handle_event(TransportEvent::Closed { reason: "loss".into() }, *now),
        Op::Advance(secs) => {
            *now += Duration::from_secs(u64::from(*secs));
            session.tick(*now)
        },
    }
}

proptest! {
    /// Memberships only exist under a connected session.
    #[test]
    fn prop_no_membership_without_connection(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut now = Instant::now();
        let mut session = Session::new(now, SessionConfig::default());

        for op in &ops {
            apply(&mut session, op, &mut now);
            if session.state() != SessionState::Connected {
                prop_assert_eq!(session.room_count(), 0);
            }
        }
    }

    /// Disconnect is total and idempotent from any reachable state.
    #[test]
    fn prop_disconnect_is_total(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut now = Instant::now();
        let mut session = Session::new(now, SessionConfig::default());

        for op in &ops {
            apply(&mut session, op, &mut now);
        }

        session.disconnect();
        prop_assert_eq!(session.state(), SessionState::Disconnected);
        prop_assert_eq!(session.room_count(), 0);
        prop_assert!(session.disconnect().is_empty());
    }

    /// Nothing is ever transmitted from a disconnected session, and a
    /// publish is only ever transmitted for a joined room.
    #[test]
    fn prop_transmit_respects_state(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut now = Instant::now();
        let mut session = Session::new(now, SessionConfig::default());

        for op in &ops {
            let joined_before = session.joined_rooms();
            let state_before = session.state();
            let actions = apply(&mut session, op, &mut now);

            for action in &actions {
                if let SessionAction::Transmit(command) = action {
                    match command {
                        Command::Publish(message) => {
                            prop_assert!(joined_before.contains(&message.room));
                        },
                        Command::Ping => {
                            prop_assert_eq!(state_before, SessionState::Connected);
                        },
                        Command::Join { .. } | Command::Leave { .. } | Command::Bye => {
                            prop_assert_eq!(state_before, SessionState::Connected);
                        },
                    }
                }
            }
        }
    }

    /// Every pending operation eventually resolves: after a disconnect, no
    /// join or connect is left dangling (all completes were emitted).
    #[test]
    fn prop_pending_ops_resolved_on_disconnect(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut now = Instant::now();
        let mut session = Session::new(now, SessionConfig::default());

        let mut opened: Vec<palaver_core::OpKey> = Vec::new();
        let mut resolved: Vec<palaver_core::OpKey> = Vec::new();

        let track = |actions: &[SessionAction], resolved: &mut Vec<palaver_core::OpKey>| {
            for action in actions {
                if let SessionAction::Complete { op, .. } = action {
                    resolved.push(op.clone());
                }
            }
        };

        for op in &ops {
            match op {
                Op::Connect => {
                    if session.state() == SessionState::Disconnected {
                        opened.push(palaver_core::OpKey::Connect);
                    }
                },
                Op::Join(r, _) => {
                    if session.state() == SessionState::Connected
                        && session.membership_state(&room(*r)).is_none()
                    {
                        opened.push(palaver_core::OpKey::Join(room(*r)));
                    }
                },
                _ => {},
            }
            let actions = apply(&mut session, op, &mut now);
            track(&actions, &mut resolved);
        }

        let actions = session.disconnect();
        track(&actions, &mut resolved);

        for key in opened {
            prop_assert!(resolved.contains(&key), "pending {key:?} never resolved");
        }
    }
}
