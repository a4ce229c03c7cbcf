//! Per-side ability cooldowns.
//!
//! The ledger is pure bookkeeping: [`AbilityLedger::use_ability`] commits a
//! cooldown and hands back an [`AbilityEffect`] that the room applies to the
//! board and blocked-tile state it owns.

use jungle_protocol::{AbilityKind, AbilityRequest, Coord, PieceId, Side, SideCooldowns};
use thiserror::Error;

use crate::{CooldownTable, GameRules};

/// What a successfully used ability asks the room to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbilityEffect {
    /// Next move by this side keeps the turn.
    GrantExtraMove,
    /// Exchange two friendly pieces.
    SwapPieces { first: PieceId, second: PieceId },
    /// Block `tile` for this many global turn completions.
    BlockTile { tile: Coord, turns: u32 },
}

/// Why the ledger refused an ability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum AbilityBlocked {
    #[error("It is not your turn")]
    NotYourTurn,
    #[error("{kind} is on cooldown ({remaining} turns remaining)")]
    OnCooldown { kind: AbilityKind, remaining: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbilityLedger {
    /// Indexed by `Side::index()` then `AbilityKind::index()`.
    cooldowns: [[u32; 3]; 2],
    lengths: CooldownTable,
    block_turns: u32,
}

impl AbilityLedger {
    pub fn new(rules: &GameRules) -> Self {
        Self {
            cooldowns: [[0; 3]; 2],
            lengths: rules.cooldowns,
            block_turns: rules.block_turns,
        }
    }

    pub fn cooldown(&self, side: Side, kind: AbilityKind) -> u32 {
        self.cooldowns[side.index()][kind.index()]
    }

    pub fn is_usable(&self, side: Side, kind: AbilityKind, current: Side) -> bool {
        self.check(side, kind, current).is_ok()
    }

    /// Validate without committing.
    pub fn check(&self, side: Side, kind: AbilityKind, current: Side) -> Result<(), AbilityBlocked> {
        if side != current {
            return Err(AbilityBlocked::NotYourTurn);
        }
        let remaining = self.cooldown(side, kind);
        if remaining > 0 {
            return Err(AbilityBlocked::OnCooldown { kind, remaining });
        }
        Ok(())
    }

    /// Put the requested ability on cooldown and return its effect
    /// descriptor. Targets are passed through unvalidated.
    pub fn use_ability(
        &mut self,
        side: Side,
        request: AbilityRequest,
        current: Side,
    ) -> Result<AbilityEffect, AbilityBlocked> {
        let kind = request.kind();
        self.check(side, kind, current)?;
        self.cooldowns[side.index()][kind.index()] = self.lengths.get(kind);

        Ok(match request {
            AbilityRequest::ExtraMove => AbilityEffect::GrantExtraMove,
            AbilityRequest::Swap { first, second } => AbilityEffect::SwapPieces { first, second },
            AbilityRequest::Block { tile } => AbilityEffect::BlockTile {
                tile,
                turns: self.block_turns,
            },
        })
    }

    /// Called once when `side` completes a turn.
    pub fn tick(&mut self, side: Side) {
        for cooldown in &mut self.cooldowns[side.index()] {
            *cooldown = cooldown.saturating_sub(1);
        }
    }

    pub fn reset(&mut self) {
        self.cooldowns = [[0; 3]; 2];
    }

    pub fn snapshot(&self, side: Side) -> SideCooldowns {
        SideCooldowns {
            side,
            extra_move: self.cooldown(side, AbilityKind::ExtraMove),
            swap: self.cooldown(side, AbilityKind::Swap),
            block: self.cooldown(side, AbilityKind::Block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: AbilityKind) -> AbilityRequest {
        match kind {
            AbilityKind::ExtraMove => AbilityRequest::ExtraMove,
            AbilityKind::Swap => AbilityRequest::Swap {
                first: PieceId(0),
                second: PieceId(1),
            },
            AbilityKind::Block => AbilityRequest::Block {
                tile: Coord::new(3, 3),
            },
        }
    }

    #[test]
    fn fresh_ledger_is_ready() {
        let ledger = AbilityLedger::new(&GameRules::default());
        for side in Side::ALL {
            for kind in AbilityKind::ALL {
                assert_eq!(ledger.cooldown(side, kind), 0);
                assert!(ledger.is_usable(side, kind, side));
                assert!(!ledger.is_usable(side, kind, side.opponent()));
            }
        }
    }

    #[test]
    fn use_sets_exact_cooldown() {
        let rules = GameRules::default();
        let mut ledger = AbilityLedger::new(&rules);

        for kind in AbilityKind::ALL {
            ledger.use_ability(Side::Monkey, request(kind), Side::Monkey).unwrap();
            assert_eq!(ledger.cooldown(Side::Monkey, kind), rules.cooldown(kind));
            assert_eq!(ledger.cooldown(Side::Fox, kind), 0);
        }

        assert_eq!(
            ledger.use_ability(Side::Monkey, request(AbilityKind::Swap), Side::Monkey),
            Err(AbilityBlocked::OnCooldown {
                kind: AbilityKind::Swap,
                remaining: 5
            })
        );
    }

    #[test]
    fn effects_carry_request_targets() {
        let mut ledger = AbilityLedger::new(&GameRules::default());
        assert_eq!(
            ledger.use_ability(Side::Fox, AbilityRequest::ExtraMove, Side::Fox),
            Ok(AbilityEffect::GrantExtraMove)
        );
        assert_eq!(
            ledger.use_ability(Side::Fox, request(AbilityKind::Swap), Side::Fox),
            Ok(AbilityEffect::SwapPieces {
                first: PieceId(0),
                second: PieceId(1)
            })
        );
        assert_eq!(
            ledger.use_ability(Side::Fox, request(AbilityKind::Block), Side::Fox),
            Ok(AbilityEffect::BlockTile {
                tile: Coord::new(3, 3),
                turns: 4
            })
        );
    }

    #[test]
    fn wrong_turn_does_not_commit() {
        let mut ledger = AbilityLedger::new(&GameRules::default());
        assert_eq!(
            ledger.use_ability(Side::Fox, request(AbilityKind::Block), Side::Monkey),
            Err(AbilityBlocked::NotYourTurn)
        );
        assert_eq!(ledger.cooldown(Side::Fox, AbilityKind::Block), 0);
    }

    #[test]
    fn tick_only_touches_one_side_and_floors_at_zero() {
        let mut ledger = AbilityLedger::new(&GameRules::default());
        ledger.use_ability(Side::Monkey, AbilityRequest::ExtraMove, Side::Monkey).unwrap();
        ledger.use_ability(Side::Fox, AbilityRequest::ExtraMove, Side::Fox).unwrap();

        for expected in [2, 1, 0, 0, 0] {
            ledger.tick(Side::Monkey);
            assert_eq!(ledger.cooldown(Side::Monkey, AbilityKind::ExtraMove), expected);
        }
        assert_eq!(ledger.cooldown(Side::Fox, AbilityKind::ExtraMove), 3);
        assert!(ledger.is_usable(Side::Monkey, AbilityKind::ExtraMove, Side::Monkey));
    }

    #[test]
    fn configured_lengths_are_respected() {
        let rules = GameRules {
            cooldowns: CooldownTable {
                extra_move: 1,
                swap: 2,
                block: 7,
            },
            block_turns: 6,
            ..GameRules::default()
        };
        let mut ledger = AbilityLedger::new(&rules);
        assert_eq!(
            ledger.use_ability(Side::Monkey, request(AbilityKind::Block), Side::Monkey),
            Ok(AbilityEffect::BlockTile {
                tile: Coord::new(3, 3),
                turns: 6
            })
        );
        assert_eq!(ledger.cooldown(Side::Monkey, AbilityKind::Block), 7);

        ledger.reset();
        assert_eq!(ledger.snapshot(Side::Monkey).block, 0);
    }
}
