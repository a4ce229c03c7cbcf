//! Closed message unions exchanged over a persistent connection.
//!
//! Every variant carries its required fields; a payload that does not decode
//! into one of these variants is rejected at the protocol boundary.

use serde::{Deserialize, Serialize};

use crate::{AbilityRequest, Coord, MatchSnapshot, PieceId, PieceSnapshot, RoomCode, Side, WinReason};

/// Client-to-server messages
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Allocate a fresh room and take its first seat
    CreateRoom,
    /// Take the free seat of an existing room
    JoinRoom { room_code: RoomCode },
    /// Move the room from ready to in-progress
    StartGame { room_code: RoomCode },
    /// Move one of the caller's pieces
    MovePiece { piece_id: PieceId, target: Coord },
    /// Spend an ability
    UseAbility { request: AbilityRequest },
    /// Give up the seat without dropping the connection
    LeaveRoom,
    /// Ask for the current match state (e.g. after a client reload)
    RequestState,
    /// Ping for latency measurement
    Ping { timestamp: u64 },
}

/// Server-to-client messages
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Room allocated, caller seated
    RoomCreated { room_code: RoomCode, side: Side },
    /// Caller seated in an existing room
    RoomJoined { room_code: RoomCode, side: Side },
    /// Both seats are taken
    RoomFull { room_code: RoomCode },
    /// No live room with this code
    RoomNotFound { room_code: RoomCode },
    /// Sent to the seated player when the other seat fills
    OpponentJoined { side: Side },
    /// Match started; full initial state
    GameStarted { state: MatchSnapshot },
    /// Full state after any successful move or ability
    StateUpdate { state: MatchSnapshot },
    /// Match finished; room is scheduled for eviction
    GameOver {
        winner: Side,
        reason: WinReason,
        pieces: Vec<PieceSnapshot>,
    },
    /// The other seat's connection left
    OpponentLeft { side: Side },
    /// The room this connection was bound to no longer exists
    RoomClosed { room_code: RoomCode },
    /// Rejection, sent only to the originating connection
    Error { kind: ErrorKind, reason: String },
    /// Pong response
    Pong {
        client_timestamp: u64,
        server_timestamp: u64,
    },
}

/// Coarse classification of a rejected intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Room lookup, seat binding or payload shape
    Protocol,
    /// Turn, ownership, geometry, blocking or cooldown
    Rule,
    /// Acting in a room that is not in a state that allows it
    Lifecycle,
}

impl ServerMessage {
    pub fn error(kind: ErrorKind, reason: impl Into<String>) -> Self {
        ServerMessage::Error {
            kind,
            reason: reason.into(),
        }
    }
}
