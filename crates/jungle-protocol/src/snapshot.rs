use serde::{Deserialize, Serialize};

use crate::{AbilityKind, Coord, MatchStatus, PieceId, Side, WinReason};

/// Full match state for broadcast after every successful mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub status: MatchStatus,
    pub board_size: u8,
    pub current_side: Side,
    pub pieces: Vec<PieceSnapshot>,
    pub cooldowns: Vec<SideCooldowns>,
    pub blocked_tiles: Vec<BlockedTileSnapshot>,
    #[serde(default)]
    pub pending_extra_move: Option<Side>,
    #[serde(default)]
    pub winner: Option<Side>,
    #[serde(default)]
    pub win_reason: Option<WinReason>,
    /// A player left mid-match; no further intents are accepted.
    #[serde(default)]
    pub abandoned: bool,
}

impl MatchSnapshot {
    pub fn piece(&self, id: PieceId) -> Option<&PieceSnapshot> {
        self.pieces.iter().find(|p| p.id == id)
    }

    pub fn cooldowns_of(&self, side: Side) -> Option<&SideCooldowns> {
        self.cooldowns.iter().find(|c| c.side == side)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceSnapshot {
    pub id: PieceId,
    pub side: Side,
    pub position: Coord,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideCooldowns {
    pub side: Side,
    pub extra_move: u32,
    pub swap: u32,
    pub block: u32,
}

impl SideCooldowns {
    pub fn get(&self, kind: AbilityKind) -> u32 {
        match kind {
            AbilityKind::ExtraMove => self.extra_move,
            AbilityKind::Swap => self.swap,
            AbilityKind::Block => self.block,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedTileSnapshot {
    pub tile: Coord,
    pub turns_remaining: u32,
}
