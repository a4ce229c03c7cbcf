//! Tunable game constants.
//!
//! Cooldown lengths, block duration and the starting layout are data, not
//! code: the server loads them as part of its config file.

use std::collections::HashSet;

use jungle_protocol::{AbilityKind, Coord, Side};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RulesError {
    #[error("board size must be at least 2, got {0}")]
    BoardTooSmall(u8),
    #[error("block duration must be at least one turn")]
    ZeroBlockDuration,
    #[error("{side} starting tile {tile} is outside the board")]
    TileOutOfBounds { side: Side, tile: Coord },
    #[error("{side} starting tile {tile} is on its winning row")]
    StartsOnFarRow { side: Side, tile: Coord },
    #[error("starting tile {0} is used twice")]
    DuplicateTile(Coord),
}

/// Turns an ability stays unavailable after use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownTable {
    pub extra_move: u32,
    pub swap: u32,
    pub block: u32,
}

impl Default for CooldownTable {
    fn default() -> Self {
        Self {
            extra_move: 3,
            swap: 5,
            block: 4,
        }
    }
}

impl CooldownTable {
    pub fn get(&self, kind: AbilityKind) -> u32 {
        match kind {
            AbilityKind::ExtraMove => self.extra_move,
            AbilityKind::Swap => self.swap,
            AbilityKind::Block => self.block,
        }
    }
}

/// Piece placement at match start. Piece ids are assigned Monkey first, then
/// Fox, each in list order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingLayout {
    pub monkey: Vec<Coord>,
    pub fox: Vec<Coord>,
}

impl StartingLayout {
    pub fn tiles(&self, side: Side) -> &[Coord] {
        match side {
            Side::Monkey => &self.monkey,
            Side::Fox => &self.fox,
        }
    }
}

impl Default for StartingLayout {
    fn default() -> Self {
        let monkey = [
            (1, 0), (3, 0), (5, 0), (7, 0),
            (0, 1), (2, 1), (4, 1), (6, 1),
            (1, 2), (3, 2), (5, 2), (7, 2),
        ];
        let fox = [
            (0, 5), (2, 5), (4, 5), (6, 5),
            (1, 6), (3, 6), (5, 6), (7, 6),
            (0, 7), (2, 7), (4, 7), (6, 7),
        ];
        Self {
            monkey: monkey.iter().map(|&(x, y)| Coord::new(x, y)).collect(),
            fox: fox.iter().map(|&(x, y)| Coord::new(x, y)).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Side length of the square board
    pub board_size: u8,
    pub cooldowns: CooldownTable,
    /// Global turn completions a blocked tile stays blocked.
    /// The default of 4 spans two full turn cycles.
    pub block_turns: u32,
    pub layout: StartingLayout,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            board_size: 8,
            cooldowns: CooldownTable::default(),
            block_turns: 4,
            layout: StartingLayout::default(),
        }
    }
}

impl GameRules {
    /// The side that moves first in every match.
    pub const FIRST_SIDE: Side = Side::Monkey;

    pub fn cooldown(&self, kind: AbilityKind) -> u32 {
        self.cooldowns.get(kind)
    }

    pub fn in_bounds(&self, tile: Coord) -> bool {
        let n = self.board_size as i32;
        (0..n).contains(&tile.x) && (0..n).contains(&tile.y)
    }

    /// Reject rule sets that would break the one-piece-per-tile invariant
    /// or hand a side an advancement win before its first move.
    pub fn validate(&self) -> Result<(), RulesError> {
        if self.board_size < 2 {
            return Err(RulesError::BoardTooSmall(self.board_size));
        }
        if self.block_turns == 0 {
            return Err(RulesError::ZeroBlockDuration);
        }

        let mut seen = HashSet::new();
        for side in Side::ALL {
            for &tile in self.layout.tiles(side) {
                if !self.in_bounds(tile) {
                    return Err(RulesError::TileOutOfBounds { side, tile });
                }
                if tile.y == side.far_row(self.board_size) {
                    return Err(RulesError::StartsOnFarRow { side, tile });
                }
                if !seen.insert(tile) {
                    return Err(RulesError::DuplicateTile(tile));
                }
            }
        }
        Ok(())
    }
}
