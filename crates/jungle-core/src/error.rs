//! Rejection reasons for room operations.
//!
//! A rejected operation never mutates the match; the caller reports the
//! error to the originating connection and waits for a corrected intent.

use jungle_protocol::{AbilityKind, Coord, ErrorKind, PieceId};
use thiserror::Error;

use crate::AbilityBlocked;

/// An intent that breaks a game rule.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("It is not your turn")]
    NotYourTurn,
    #[error("Not your piece")]
    NotYourPiece,
    #[error("Piece {0} not found")]
    PieceNotFound(PieceId),
    #[error("Invalid move to {0}")]
    IllegalMove(Coord),
    #[error("Tile {0} is blocked")]
    TileBlocked(Coord),
    #[error("{kind} is on cooldown ({remaining} turns remaining)")]
    OnCooldown { kind: AbilityKind, remaining: u32 },
    #[error("Cannot swap: {0}")]
    InvalidSwap(&'static str),
    #[error("Cannot block {tile}: {reason}")]
    InvalidBlockTarget { tile: Coord, reason: &'static str },
    #[error("An extra move is already pending")]
    ExtraMoveAlreadyPending,
}

impl From<AbilityBlocked> for RuleViolation {
    fn from(blocked: AbilityBlocked) -> Self {
        match blocked {
            AbilityBlocked::NotYourTurn => RuleViolation::NotYourTurn,
            AbilityBlocked::OnCooldown { kind, remaining } => {
                RuleViolation::OnCooldown { kind, remaining }
            }
        }
    }
}

/// An intent that does not fit the room's lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Waiting for an opponent to join")]
    AwaitingOpponent,
    #[error("Game has already started")]
    AlreadyStarted,
    #[error("Game has not started")]
    NotStarted,
    #[error("Game is over")]
    MatchFinished,
    #[error("Game was abandoned")]
    Abandoned,
}

/// Errors from [`crate::GameRoom`] match operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GameError {
    #[error(transparent)]
    Rule(#[from] RuleViolation),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::Rule(_) => ErrorKind::Rule,
            GameError::Lifecycle(_) => ErrorKind::Lifecycle,
        }
    }
}

/// Errors when taking a seat in a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SeatError {
    #[error("Room is full")]
    RoomFull,
    #[error("Room is closed")]
    RoomClosed,
    #[error("Already seated in this room")]
    AlreadySeated,
}
