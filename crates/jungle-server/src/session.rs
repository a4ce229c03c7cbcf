//! Connection-to-room bindings and intent dispatch.
//!
//! The handler is transport-agnostic: every entry point returns the
//! messages to deliver, and the server loop hands them to renet.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jungle_core::{AbilityOutcome, ConnectionId, GameError, MoveOutcome};
use jungle_protocol::{
    wire::deserialize_client_message, AbilityRequest, ClientMessage, Coord, ErrorKind,
    MatchSnapshot, PieceId, RoomCode, ServerMessage, Side, WinReason,
};
use tracing::{debug, info, warn};

use crate::registry::{JoinError, RoomRegistry};
use crate::ServerConfig;

/// Rejections raised by the session layer before an intent reaches a room.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Room does not exist")]
    RoomNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("Room is closed")]
    RoomClosed,
    #[error("You are not in this room")]
    NotInRoom,
    #[error("Already in a room")]
    AlreadyInRoom,
    #[error("Malformed room code")]
    MalformedRoomCode,
    #[error("Malformed message: {0}")]
    Malformed(String),
}

/// A message addressed to one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    pub client_id: ConnectionId,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn to(client_id: ConnectionId, message: ServerMessage) -> Self {
        Self { client_id, message }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Binding {
    room: RoomCode,
    side: Side,
}

struct RateWindow {
    message_count: u32,
    window_start: Instant,
}

/// State returned from a successful room mutation for fan-out.
struct Applied<T> {
    outcome: T,
    state: MatchSnapshot,
    seated: Vec<ConnectionId>,
}

pub struct SessionHandler {
    registry: Arc<RoomRegistry>,
    bindings: HashMap<ConnectionId, Binding>,
    rate_windows: HashMap<ConnectionId, RateWindow>,
    rate_limit_messages: u32,
    rate_limit_window: Duration,
}

impl SessionHandler {
    pub fn new(registry: Arc<RoomRegistry>, rate_limit_messages: u32, rate_limit_window: Duration) -> Self {
        Self {
            registry,
            bindings: HashMap::new(),
            rate_windows: HashMap::new(),
            rate_limit_messages,
            rate_limit_window,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let registry = RoomRegistry::new(
            config.rules.clone(),
            config.room_code_len,
            config.finished_room_grace,
        );
        Self::new(
            Arc::new(registry),
            config.rate_limit_messages,
            config.rate_limit_window,
        )
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Room and side a connection is bound to.
    pub fn binding(&self, client_id: ConnectionId) -> Option<(&RoomCode, Side)> {
        self.bindings.get(&client_id).map(|b| (&b.room, b.side))
    }

    pub fn bound_connections(&self) -> usize {
        self.bindings.len()
    }

    // ------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------

    pub fn on_connect(&mut self, client_id: ConnectionId) {
        self.rate_windows.insert(
            client_id,
            RateWindow {
                message_count: 0,
                window_start: Instant::now(),
            },
        );
        debug!(client_id, "Session opened");
    }

    pub fn on_disconnect(&mut self, client_id: ConnectionId) -> Vec<Outbound> {
        self.rate_windows.remove(&client_id);
        self.depart(client_id)
    }

    /// Decode and dispatch one raw payload.
    pub fn handle_message(&mut self, client_id: ConnectionId, data: &[u8]) -> Vec<Outbound> {
        if !self.check_rate_limit(client_id) {
            warn!(client_id, "Rate limit exceeded, message dropped");
            return Vec::new();
        }

        match deserialize_client_message(data) {
            Ok(message) => self.handle(client_id, message),
            Err(err) => {
                warn!(client_id, error = %err, "Failed to decode client message");
                self.protocol_error(client_id, ProtocolError::Malformed(err.to_string()))
            }
        }
    }

    pub fn handle(&mut self, client_id: ConnectionId, message: ClientMessage) -> Vec<Outbound> {
        match message {
            ClientMessage::CreateRoom => self.handle_create(client_id),
            ClientMessage::JoinRoom { room_code } => self.handle_join(client_id, room_code),
            ClientMessage::StartGame { room_code } => self.handle_start(client_id, room_code),
            ClientMessage::MovePiece { piece_id, target } => {
                self.handle_move(client_id, piece_id, target)
            }
            ClientMessage::UseAbility { request } => self.handle_ability(client_id, request),
            ClientMessage::LeaveRoom => self.handle_leave(client_id),
            ClientMessage::RequestState => self.handle_state_request(client_id),
            ClientMessage::Ping { timestamp } => self.handle_ping(client_id, timestamp),
        }
    }

    /// Evict rooms past their grace period and tell whoever is still seated.
    pub fn on_tick(&mut self, now: Instant) -> Vec<Outbound> {
        let mut out = Vec::new();
        for evicted in self.registry.sweep(now) {
            for client_id in evicted.occupants {
                if self
                    .bindings
                    .get(&client_id)
                    .is_some_and(|b| b.room == evicted.code)
                {
                    self.bindings.remove(&client_id);
                }
                out.push(Outbound::to(
                    client_id,
                    ServerMessage::RoomClosed {
                        room_code: evicted.code.clone(),
                    },
                ));
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Intent handlers
    // ------------------------------------------------------------------

    fn handle_create(&mut self, client_id: ConnectionId) -> Vec<Outbound> {
        if self.bindings.contains_key(&client_id) {
            return self.protocol_error(client_id, ProtocolError::AlreadyInRoom);
        }

        let (room_code, side) = self.registry.create(client_id);
        self.bindings.insert(
            client_id,
            Binding {
                room: room_code.clone(),
                side,
            },
        );
        vec![Outbound::to(
            client_id,
            ServerMessage::RoomCreated { room_code, side },
        )]
    }

    fn handle_join(&mut self, client_id: ConnectionId, room_code: RoomCode) -> Vec<Outbound> {
        if !room_code.is_well_formed() {
            return self.protocol_error(client_id, ProtocolError::MalformedRoomCode);
        }
        if self.bindings.contains_key(&client_id) {
            return self.protocol_error(client_id, ProtocolError::AlreadyInRoom);
        }

        let side = match self.registry.join(&room_code, client_id) {
            Ok(side) => side,
            Err(JoinError::NotFound) => {
                debug!(client_id, room = %room_code, "Join for unknown room");
                return vec![Outbound::to(
                    client_id,
                    ServerMessage::RoomNotFound { room_code },
                )];
            }
            Err(JoinError::Full) => {
                return vec![Outbound::to(client_id, ServerMessage::RoomFull { room_code })];
            }
            Err(JoinError::Closed) | Err(JoinError::AlreadySeated) => {
                return self.protocol_error(client_id, ProtocolError::RoomClosed);
            }
        };

        self.bindings.insert(
            client_id,
            Binding {
                room: room_code.clone(),
                side,
            },
        );

        let opponent = self
            .registry
            .with_room(&room_code, |room| room.connection_of(side.opponent()))
            .flatten();

        let mut out = vec![Outbound::to(
            client_id,
            ServerMessage::RoomJoined { room_code, side },
        )];
        if let Some(opponent) = opponent {
            out.push(Outbound::to(opponent, ServerMessage::OpponentJoined { side }));
        }
        out
    }

    fn handle_start(&mut self, client_id: ConnectionId, room_code: RoomCode) -> Vec<Outbound> {
        if !room_code.is_well_formed() {
            return self.protocol_error(client_id, ProtocolError::MalformedRoomCode);
        }
        let Some(binding) = self.bindings.get(&client_id).cloned() else {
            return self.protocol_error(client_id, ProtocolError::NotInRoom);
        };
        if binding.room != room_code {
            return self.protocol_error(client_id, ProtocolError::NotInRoom);
        }

        let result = self.registry.with_room(&binding.room, |room| {
            room.start().map(|()| Applied {
                outcome: (),
                state: room.snapshot(),
                seated: room.connections().map(|(conn, _)| conn).collect(),
            })
        });

        match result {
            None => self.room_gone(client_id, &binding.room),
            Some(Err(err)) => self.game_error(client_id, err),
            Some(Ok(applied)) => {
                info!(room = %binding.room, "Match started");
                broadcast(&applied.seated, ServerMessage::GameStarted { state: applied.state })
            }
        }
    }

    fn handle_move(&mut self, client_id: ConnectionId, piece_id: PieceId, target: Coord) -> Vec<Outbound> {
        let Some(binding) = self.bindings.get(&client_id).cloned() else {
            return self.protocol_error(client_id, ProtocolError::NotInRoom);
        };

        let result = self.registry.with_room(&binding.room, |room| {
            room.move_piece(binding.side, piece_id, target)
                .map(|outcome| Applied {
                    outcome,
                    state: room.snapshot(),
                    seated: room.connections().map(|(conn, _)| conn).collect(),
                })
        });

        match result {
            None => self.room_gone(client_id, &binding.room),
            Some(Err(err)) => self.game_error(client_id, err),
            Some(Ok(applied)) => {
                debug!(room = %binding.room, side = %binding.side, piece = %piece_id, %target, "Move applied");
                let won = match applied.outcome {
                    MoveOutcome::Won { winner, reason } => Some((winner, reason)),
                    MoveOutcome::TurnContinues | MoveOutcome::TurnPassed { .. } => None,
                };
                self.state_fan_out(&binding.room, applied.state, &applied.seated, won)
            }
        }
    }

    fn handle_ability(&mut self, client_id: ConnectionId, request: AbilityRequest) -> Vec<Outbound> {
        let Some(binding) = self.bindings.get(&client_id).cloned() else {
            return self.protocol_error(client_id, ProtocolError::NotInRoom);
        };

        let result = self.registry.with_room(&binding.room, |room| {
            room.use_ability(binding.side, request)
                .map(|outcome| Applied {
                    outcome,
                    state: room.snapshot(),
                    seated: room.connections().map(|(conn, _)| conn).collect(),
                })
        });

        match result {
            None => self.room_gone(client_id, &binding.room),
            Some(Err(err)) => self.game_error(client_id, err),
            Some(Ok(applied)) => {
                debug!(room = %binding.room, side = %binding.side, kind = %request.kind(), "Ability used");
                let won = match applied.outcome {
                    AbilityOutcome::Won { winner, reason } => Some((winner, reason)),
                    AbilityOutcome::Applied(_) => None,
                };
                self.state_fan_out(&binding.room, applied.state, &applied.seated, won)
            }
        }
    }

    fn handle_leave(&mut self, client_id: ConnectionId) -> Vec<Outbound> {
        if !self.bindings.contains_key(&client_id) {
            return self.protocol_error(client_id, ProtocolError::NotInRoom);
        }
        self.depart(client_id)
    }

    fn handle_state_request(&mut self, client_id: ConnectionId) -> Vec<Outbound> {
        let Some(binding) = self.bindings.get(&client_id).cloned() else {
            return self.protocol_error(client_id, ProtocolError::NotInRoom);
        };

        match self.registry.with_room(&binding.room, |room| room.snapshot()) {
            Some(state) => vec![Outbound::to(client_id, ServerMessage::StateUpdate { state })],
            None => self.room_gone(client_id, &binding.room),
        }
    }

    fn handle_ping(&mut self, client_id: ConnectionId, client_timestamp: u64) -> Vec<Outbound> {
        let server_timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        vec![Outbound::to(
            client_id,
            ServerMessage::Pong {
                client_timestamp,
                server_timestamp,
            },
        )]
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Unbind and free the seat; tell the other seat if it is still there.
    fn depart(&mut self, client_id: ConnectionId) -> Vec<Outbound> {
        let Some(binding) = self.bindings.remove(&client_id) else {
            return Vec::new();
        };
        let Some(outcome) = self.registry.leave(&binding.room, client_id) else {
            return Vec::new();
        };

        info!(client_id, room = %binding.room, side = %outcome.side, "Player left room");
        match outcome.remaining {
            Some(other) => vec![Outbound::to(
                other,
                ServerMessage::OpponentLeft { side: outcome.side },
            )],
            None => Vec::new(),
        }
    }

    fn state_fan_out(
        &self,
        room_code: &RoomCode,
        state: MatchSnapshot,
        seated: &[ConnectionId],
        won: Option<(Side, WinReason)>,
    ) -> Vec<Outbound> {
        let pieces = state.pieces.clone();
        let mut out = broadcast(seated, ServerMessage::StateUpdate { state });
        if let Some((winner, reason)) = won {
            info!(room = %room_code, %winner, ?reason, "Match finished");
            out.extend(broadcast(
                seated,
                ServerMessage::GameOver {
                    winner,
                    reason,
                    pieces,
                },
            ));
        }
        out
    }

    /// The bound room was evicted underneath this connection.
    fn room_gone(&mut self, client_id: ConnectionId, room_code: &RoomCode) -> Vec<Outbound> {
        self.bindings.remove(&client_id);
        vec![Outbound::to(
            client_id,
            ServerMessage::RoomClosed {
                room_code: room_code.clone(),
            },
        )]
    }

    fn game_error(&self, client_id: ConnectionId, err: GameError) -> Vec<Outbound> {
        debug!(client_id, error = %err, "Intent rejected");
        vec![Outbound::to(client_id, ServerMessage::error(err.kind(), err.to_string()))]
    }

    fn protocol_error(&self, client_id: ConnectionId, err: ProtocolError) -> Vec<Outbound> {
        debug!(client_id, error = %err, "Protocol rejection");
        vec![Outbound::to(
            client_id,
            ServerMessage::error(ErrorKind::Protocol, err.to_string()),
        )]
    }

    /// Returns true if the message is allowed.
    fn check_rate_limit(&mut self, client_id: ConnectionId) -> bool {
        let now = Instant::now();
        let window = self.rate_windows.entry(client_id).or_insert(RateWindow {
            message_count: 0,
            window_start: now,
        });

        if now.duration_since(window.window_start) >= self.rate_limit_window {
            window.window_start = now;
            window.message_count = 0;
        }

        window.message_count += 1;
        window.message_count <= self.rate_limit_messages
    }
}

fn broadcast(seated: &[ConnectionId], message: ServerMessage) -> Vec<Outbound> {
    seated
        .iter()
        .map(|&client_id| Outbound::to(client_id, message.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use jungle_core::GameRules;
    use jungle_protocol::wire::serialize_client_message;
    use jungle_protocol::MatchStatus;

    use super::*;

    const ALICE: ConnectionId = 1;
    const BOB: ConnectionId = 2;

    fn handler() -> SessionHandler {
        let registry = RoomRegistry::new(GameRules::default(), 6, Duration::from_secs(60));
        SessionHandler::new(Arc::new(registry), 30, Duration::from_secs(1))
    }

    fn created_code(out: &[Outbound]) -> RoomCode {
        match &out[0].message {
            ServerMessage::RoomCreated { room_code, .. } => room_code.clone(),
            other => panic!("expected RoomCreated, got {other:?}"),
        }
    }

    fn error_reason(out: &[Outbound]) -> (ErrorKind, String) {
        assert_eq!(out.len(), 1);
        match &out[0].message {
            ServerMessage::Error { kind, reason } => (*kind, reason.clone()),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn create_then_join_notifies_both() {
        let mut sessions = handler();
        let out = sessions.handle(ALICE, ClientMessage::CreateRoom);
        let code = created_code(&out);
        assert_eq!(out[0].client_id, ALICE);

        let out = sessions.handle(BOB, ClientMessage::JoinRoom { room_code: code.clone() });
        assert_eq!(
            out,
            vec![
                Outbound::to(
                    BOB,
                    ServerMessage::RoomJoined {
                        room_code: code.clone(),
                        side: Side::Fox
                    }
                ),
                Outbound::to(ALICE, ServerMessage::OpponentJoined { side: Side::Fox }),
            ]
        );
        assert_eq!(sessions.binding(BOB), Some((&code, Side::Fox)));
    }

    #[test]
    fn join_unknown_and_full_rooms() {
        let mut sessions = handler();
        let missing = RoomCode::new("NOPE00");
        assert_eq!(
            sessions.handle(BOB, ClientMessage::JoinRoom { room_code: missing.clone() }),
            vec![Outbound::to(BOB, ServerMessage::RoomNotFound { room_code: missing })]
        );

        let code = created_code(&sessions.handle(ALICE, ClientMessage::CreateRoom));
        sessions.handle(BOB, ClientMessage::JoinRoom { room_code: code.clone() });
        assert_eq!(
            sessions.handle(3, ClientMessage::JoinRoom { room_code: code.clone() }),
            vec![Outbound::to(3, ServerMessage::RoomFull { room_code: code })]
        );
        assert_eq!(sessions.binding(3), None);
    }

    #[test]
    fn malformed_room_codes_are_rejected() {
        let mut sessions = handler();
        let code = created_code(&sessions.handle(ALICE, ClientMessage::CreateRoom));

        for bad in ["", "   ", "AB-12!", "ROOM 1"] {
            let out = sessions.handle(BOB, ClientMessage::JoinRoom { room_code: RoomCode::new(bad) });
            let (kind, reason) = error_reason(&out);
            assert_eq!(kind, ErrorKind::Protocol);
            assert_eq!(reason, "Malformed room code");

            let out = sessions.handle(ALICE, ClientMessage::StartGame { room_code: RoomCode::new(bad) });
            assert_eq!(error_reason(&out).1, "Malformed room code");
        }
        assert_eq!(sessions.binding(BOB), None);
        assert_eq!(
            sessions.registry().with_room(&code, |room| room.status()),
            Some(MatchStatus::AwaitingOpponent)
        );
    }

    #[test]
    fn bound_connections_cannot_create_or_join_again() {
        let mut sessions = handler();
        let code = created_code(&sessions.handle(ALICE, ClientMessage::CreateRoom));

        let (kind, reason) = error_reason(&sessions.handle(ALICE, ClientMessage::CreateRoom));
        assert_eq!(kind, ErrorKind::Protocol);
        assert_eq!(reason, "Already in a room");

        let out = sessions.handle(ALICE, ClientMessage::JoinRoom { room_code: code });
        assert_eq!(error_reason(&out).1, "Already in a room");
        assert_eq!(sessions.registry().len(), 1);
    }

    #[test]
    fn unbound_gameplay_is_rejected() {
        let mut sessions = handler();
        for message in [
            ClientMessage::MovePiece {
                piece_id: PieceId(8),
                target: Coord::new(0, 3),
            },
            ClientMessage::UseAbility {
                request: AbilityRequest::ExtraMove,
            },
            ClientMessage::RequestState,
            ClientMessage::LeaveRoom,
            ClientMessage::StartGame {
                room_code: RoomCode::new("ABCDEF"),
            },
        ] {
            let (kind, reason) = error_reason(&sessions.handle(ALICE, message));
            assert_eq!(kind, ErrorKind::Protocol);
            assert_eq!(reason, "You are not in this room");
        }
    }

    #[test]
    fn start_must_name_the_bound_room() {
        let mut sessions = handler();
        let code = created_code(&sessions.handle(ALICE, ClientMessage::CreateRoom));
        sessions.handle(BOB, ClientMessage::JoinRoom { room_code: code.clone() });

        let out = sessions.handle(
            ALICE,
            ClientMessage::StartGame {
                room_code: RoomCode::new("OTHER1"),
            },
        );
        assert_eq!(error_reason(&out).1, "You are not in this room");

        let out = sessions.handle(ALICE, ClientMessage::StartGame { room_code: code });
        assert_eq!(out.len(), 2);
        for outbound in &out {
            match &outbound.message {
                ServerMessage::GameStarted { state } => {
                    assert_eq!(state.status, MatchStatus::InProgress);
                    assert_eq!(state.current_side, Side::Monkey);
                }
                other => panic!("expected GameStarted, got {other:?}"),
            }
        }
    }

    #[test]
    fn start_before_opponent_is_a_lifecycle_error() {
        let mut sessions = handler();
        let code = created_code(&sessions.handle(ALICE, ClientMessage::CreateRoom));
        let (kind, _) = error_reason(&sessions.handle(ALICE, ClientMessage::StartGame { room_code: code }));
        assert_eq!(kind, ErrorKind::Lifecycle);
    }

    #[test]
    fn malformed_payload_gets_protocol_error() {
        let mut sessions = handler();
        sessions.on_connect(ALICE);
        let out = sessions.handle_message(ALICE, &[0xc1, 0xff, 0x00]);
        let (kind, reason) = error_reason(&out);
        assert_eq!(kind, ErrorKind::Protocol);
        assert!(reason.starts_with("Malformed message"));
        assert_eq!(sessions.registry().len(), 0);
    }

    #[test]
    fn encoded_payload_is_dispatched() {
        let mut sessions = handler();
        sessions.on_connect(ALICE);
        let data = serialize_client_message(&ClientMessage::Ping { timestamp: 42 }).unwrap();
        let out = sessions.handle_message(ALICE, &data);
        assert!(matches!(
            out[0].message,
            ServerMessage::Pong {
                client_timestamp: 42,
                ..
            }
        ));
    }

    #[test]
    fn excess_messages_are_dropped() {
        let registry = RoomRegistry::new(GameRules::default(), 6, Duration::from_secs(60));
        let mut sessions = SessionHandler::new(Arc::new(registry), 3, Duration::from_secs(60));
        sessions.on_connect(ALICE);
        let data = serialize_client_message(&ClientMessage::Ping { timestamp: 1 }).unwrap();

        for _ in 0..3 {
            assert_eq!(sessions.handle_message(ALICE, &data).len(), 1);
        }
        assert!(sessions.handle_message(ALICE, &data).is_empty());
    }

    #[test]
    fn leave_room_frees_the_binding() {
        let mut sessions = handler();
        let code = created_code(&sessions.handle(ALICE, ClientMessage::CreateRoom));
        sessions.handle(BOB, ClientMessage::JoinRoom { room_code: code.clone() });

        let out = sessions.handle(BOB, ClientMessage::LeaveRoom);
        assert_eq!(
            out,
            vec![Outbound::to(ALICE, ServerMessage::OpponentLeft { side: Side::Fox })]
        );
        assert_eq!(sessions.binding(BOB), None);

        // The seat is free again and BOB may create a room of their own.
        let out = sessions.handle(BOB, ClientMessage::CreateRoom);
        assert!(matches!(out[0].message, ServerMessage::RoomCreated { .. }));
        assert_eq!(sessions.registry().len(), 2);
    }

    #[test]
    fn request_state_unicasts_snapshot() {
        let mut sessions = handler();
        created_code(&sessions.handle(ALICE, ClientMessage::CreateRoom));
        let out = sessions.handle(ALICE, ClientMessage::RequestState);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].client_id, ALICE);
        match &out[0].message {
            ServerMessage::StateUpdate { state } => {
                assert_eq!(state.status, MatchStatus::AwaitingOpponent);
            }
            other => panic!("expected StateUpdate, got {other:?}"),
        }
    }
}
