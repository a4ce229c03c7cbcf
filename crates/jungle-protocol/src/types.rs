use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PieceId;

/// One of the two players in a match. Movement direction is mirrored between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    /// Moves first, advances toward increasing `y`.
    Monkey,
    /// Advances toward decreasing `y`.
    Fox,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Monkey, Side::Fox];

    #[inline]
    pub const fn opponent(self) -> Side {
        match self {
            Side::Monkey => Side::Fox,
            Side::Fox => Side::Monkey,
        }
    }

    /// Sign of a legal `dy` for this side.
    #[inline]
    pub const fn forward(self) -> i32 {
        match self {
            Side::Monkey => 1,
            Side::Fox => -1,
        }
    }

    /// Row a piece of this side must reach to win by advancement.
    #[inline]
    pub const fn far_row(self, board_size: u8) -> i32 {
        match self {
            Side::Monkey => board_size as i32 - 1,
            Side::Fox => 0,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Side::Monkey => 0,
            Side::Fox => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Monkey => f.write_str("monkey"),
            Side::Fox => f.write_str("fox"),
        }
    }
}

/// Board coordinate. Signed so that out-of-range client intents decode fine
/// and are rejected by move legality instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Grants one extra move before the turn passes.
    ExtraMove,
    /// Exchanges the positions of two friendly pieces.
    Swap,
    /// Blocks an empty tile for a number of turns.
    Block,
}

impl AbilityKind {
    pub const ALL: [AbilityKind; 3] = [AbilityKind::ExtraMove, AbilityKind::Swap, AbilityKind::Block];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            AbilityKind::ExtraMove => 0,
            AbilityKind::Swap => 1,
            AbilityKind::Block => 2,
        }
    }
}

impl fmt::Display for AbilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbilityKind::ExtraMove => f.write_str("extra move"),
            AbilityKind::Swap => f.write_str("swap"),
            AbilityKind::Block => f.write_str("block"),
        }
    }
}

/// A use-ability intent together with the targets its effect needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AbilityRequest {
    ExtraMove,
    Swap { first: PieceId, second: PieceId },
    Block { tile: Coord },
}

impl AbilityRequest {
    pub const fn kind(&self) -> AbilityKind {
        match self {
            AbilityRequest::ExtraMove => AbilityKind::ExtraMove,
            AbilityRequest::Swap { .. } => AbilityKind::Swap,
            AbilityRequest::Block { .. } => AbilityKind::Block,
        }
    }
}

/// Lifecycle of one match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    AwaitingOpponent,
    Ready,
    InProgress,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WinReason {
    /// A piece reached its side's far row.
    Advancement,
    /// The losing side has no pieces left.
    Attrition,
}
