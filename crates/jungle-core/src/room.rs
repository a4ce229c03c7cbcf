//! One match's authoritative state machine.
//!
//! `AwaitingOpponent -> Ready -> InProgress -> Finished`. Every operation
//! validates all of its preconditions before touching state, so a rejected
//! intent leaves the room exactly as it was.

use std::sync::Arc;

use jungle_protocol::{
    AbilityRequest, BlockedTileSnapshot, Coord, MatchSnapshot, MatchStatus, PieceId, RoomCode,
    Side, WinReason,
};

use crate::{
    AbilityEffect, AbilityLedger, Board, ConnectionId, GameError, GameRules, LifecycleError,
    RuleViolation, SeatError,
};

/// A coordinate excluded from move destinations for a number of turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockedTile {
    pub tile: Coord,
    pub turns_remaining: u32,
}

/// Result of a successful move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// An extra move was consumed; the same side moves again.
    TurnContinues,
    /// Turn completed and control flipped.
    TurnPassed { next: Side },
    /// The move ended the match.
    Won { winner: Side, reason: WinReason },
}

/// Result of a successful ability use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbilityOutcome {
    Applied(AbilityEffect),
    Won { winner: Side, reason: WinReason },
}

#[derive(Clone, Debug)]
pub struct GameRoom {
    code: RoomCode,
    rules: Arc<GameRules>,
    status: MatchStatus,
    current_side: Side,
    board: Board,
    abilities: AbilityLedger,
    blocked_tiles: Vec<BlockedTile>,
    pending_extra_move: Option<Side>,
    winner: Option<(Side, WinReason)>,
    /// Connection seated on each side, indexed by `Side::index()`.
    seats: [Option<ConnectionId>; 2],
    abandoned: bool,
}

impl GameRoom {
    pub fn new(code: RoomCode, rules: Arc<GameRules>) -> Self {
        Self {
            code,
            status: MatchStatus::AwaitingOpponent,
            current_side: GameRules::FIRST_SIDE,
            board: Board::empty(rules.board_size),
            abilities: AbilityLedger::new(&rules),
            blocked_tiles: Vec::new(),
            pending_extra_move: None,
            winner: None,
            seats: [None; 2],
            abandoned: false,
            rules,
        }
    }

    /// A room whose creator already holds the first side's seat.
    pub fn with_creator(code: RoomCode, rules: Arc<GameRules>, creator: ConnectionId) -> Self {
        let mut room = Self::new(code, rules);
        room.seats[GameRules::FIRST_SIDE.index()] = Some(creator);
        room
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn current_side(&self) -> Side {
        self.current_side
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn abilities(&self) -> &AbilityLedger {
        &self.abilities
    }

    pub fn blocked_tiles(&self) -> &[BlockedTile] {
        &self.blocked_tiles
    }

    pub fn pending_extra_move(&self) -> Option<Side> {
        self.pending_extra_move
    }

    pub fn winner(&self) -> Option<(Side, WinReason)> {
        self.winner
    }

    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    pub fn is_tile_blocked(&self, tile: Coord) -> bool {
        self.blocked_tiles
            .iter()
            .any(|b| b.tile == tile && b.turns_remaining > 0)
    }

    // ------------------------------------------------------------------
    // Seats
    // ------------------------------------------------------------------

    /// Seat a connection on the first free side (Monkey before Fox).
    pub fn seat(&mut self, conn: ConnectionId) -> Result<Side, SeatError> {
        if self.abandoned || self.is_finished() {
            return Err(SeatError::RoomClosed);
        }
        if self.side_of(conn).is_some() {
            return Err(SeatError::AlreadySeated);
        }

        let side = Side::ALL
            .into_iter()
            .find(|side| self.seats[side.index()].is_none())
            .ok_or(SeatError::RoomFull)?;
        self.seats[side.index()] = Some(conn);

        if self.is_full() && self.status == MatchStatus::AwaitingOpponent {
            self.status = MatchStatus::Ready;
        }
        Ok(side)
    }

    /// Free a connection's seat. Leaving before the match starts reopens the
    /// seat; leaving mid-match abandons the room.
    pub fn unseat(&mut self, conn: ConnectionId) -> Option<Side> {
        let side = self.side_of(conn)?;
        self.seats[side.index()] = None;

        match self.status {
            MatchStatus::Ready => self.status = MatchStatus::AwaitingOpponent,
            MatchStatus::InProgress => {
                self.abandoned = true;
                self.pending_extra_move = None;
            }
            MatchStatus::AwaitingOpponent | MatchStatus::Finished => {}
        }
        Some(side)
    }

    pub fn side_of(&self, conn: ConnectionId) -> Option<Side> {
        Side::ALL
            .into_iter()
            .find(|side| self.seats[side.index()] == Some(conn))
    }

    pub fn connection_of(&self, side: Side) -> Option<ConnectionId> {
        self.seats[side.index()]
    }

    /// Seated connections with their sides.
    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, Side)> + '_ {
        Side::ALL
            .into_iter()
            .filter_map(|side| self.seats[side.index()].map(|conn| (conn, side)))
    }

    pub fn is_full(&self) -> bool {
        self.seats.iter().all(Option::is_some)
    }

    pub fn is_empty(&self) -> bool {
        self.seats.iter().all(Option::is_none)
    }

    // ------------------------------------------------------------------
    // Match operations
    // ------------------------------------------------------------------

    /// `Ready -> InProgress`: lay out a fresh board with the first side to move.
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.abandoned {
            return Err(LifecycleError::Abandoned.into());
        }
        match self.status {
            MatchStatus::AwaitingOpponent => return Err(LifecycleError::AwaitingOpponent.into()),
            MatchStatus::InProgress => return Err(LifecycleError::AlreadyStarted.into()),
            MatchStatus::Finished => return Err(LifecycleError::MatchFinished.into()),
            MatchStatus::Ready => {}
        }

        self.board = Board::from_rules(&self.rules);
        self.current_side = GameRules::FIRST_SIDE;
        self.abilities.reset();
        self.blocked_tiles.clear();
        self.pending_extra_move = None;
        self.winner = None;
        self.status = MatchStatus::InProgress;
        Ok(())
    }

    pub fn move_piece(
        &mut self,
        side: Side,
        piece_id: PieceId,
        target: Coord,
    ) -> Result<MoveOutcome, GameError> {
        self.ensure_in_progress()?;

        let piece = *self
            .board
            .piece(piece_id)
            .ok_or(RuleViolation::PieceNotFound(piece_id))?;
        if piece.side != side {
            return Err(RuleViolation::NotYourPiece.into());
        }
        if side != self.current_side {
            return Err(RuleViolation::NotYourTurn.into());
        }
        if !self.board.is_legal_move(&piece, target) {
            return Err(RuleViolation::IllegalMove(target).into());
        }
        if self.is_tile_blocked(target) {
            return Err(RuleViolation::TileBlocked(target).into());
        }

        self.board.apply_move(piece_id, target);

        if let Some(outcome) = self.resolve_win() {
            return Ok(outcome);
        }

        if self.pending_extra_move == Some(side) {
            self.pending_extra_move = None;
            return Ok(MoveOutcome::TurnContinues);
        }

        self.complete_turn(side);
        Ok(MoveOutcome::TurnPassed {
            next: self.current_side,
        })
    }

    pub fn use_ability(
        &mut self,
        side: Side,
        request: AbilityRequest,
    ) -> Result<AbilityOutcome, GameError> {
        self.ensure_in_progress()?;
        self.abilities
            .check(side, request.kind(), self.current_side)
            .map_err(RuleViolation::from)?;
        self.validate_ability_target(side, &request)?;

        let effect = self
            .abilities
            .use_ability(side, request, self.current_side)
            .map_err(RuleViolation::from)?;

        match effect {
            AbilityEffect::GrantExtraMove => {
                self.pending_extra_move = Some(side);
            }
            AbilityEffect::SwapPieces { first, second } => {
                self.board.swap(first, second);
                if let Some(MoveOutcome::Won { winner, reason }) = self.resolve_win() {
                    return Ok(AbilityOutcome::Won { winner, reason });
                }
            }
            AbilityEffect::BlockTile { tile, turns } => {
                self.blocked_tiles.push(BlockedTile {
                    tile,
                    turns_remaining: turns,
                });
            }
        }

        Ok(AbilityOutcome::Applied(effect))
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            status: self.status,
            board_size: self.board.size(),
            current_side: self.current_side,
            pieces: self.board.snapshot(),
            cooldowns: Side::ALL
                .into_iter()
                .map(|side| self.abilities.snapshot(side))
                .collect(),
            blocked_tiles: self
                .blocked_tiles
                .iter()
                .map(|b| BlockedTileSnapshot {
                    tile: b.tile,
                    turns_remaining: b.turns_remaining,
                })
                .collect(),
            pending_extra_move: self.pending_extra_move,
            winner: self.winner.map(|(side, _)| side),
            win_reason: self.winner.map(|(_, reason)| reason),
            abandoned: self.abandoned,
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_in_progress(&self) -> Result<(), LifecycleError> {
        if self.abandoned {
            return Err(LifecycleError::Abandoned);
        }
        match self.status {
            MatchStatus::InProgress => Ok(()),
            MatchStatus::AwaitingOpponent | MatchStatus::Ready => Err(LifecycleError::NotStarted),
            MatchStatus::Finished => Err(LifecycleError::MatchFinished),
        }
    }

    fn validate_ability_target(
        &self,
        side: Side,
        request: &AbilityRequest,
    ) -> Result<(), RuleViolation> {
        match *request {
            AbilityRequest::ExtraMove => {
                if self.pending_extra_move.is_some() {
                    return Err(RuleViolation::ExtraMoveAlreadyPending);
                }
            }
            AbilityRequest::Swap { first, second } => {
                if first == second {
                    return Err(RuleViolation::InvalidSwap("pieces must be distinct"));
                }
                for id in [first, second] {
                    let piece = self
                        .board
                        .piece(id)
                        .ok_or(RuleViolation::InvalidSwap("piece not found"))?;
                    if piece.side != side {
                        return Err(RuleViolation::InvalidSwap("both pieces must be yours"));
                    }
                }
            }
            AbilityRequest::Block { tile } => {
                let reason = if !self.board.in_bounds(tile) {
                    Some("tile is outside the board")
                } else if self.board.is_occupied(tile) {
                    Some("tile is occupied")
                } else if self.is_tile_blocked(tile) {
                    Some("tile is already blocked")
                } else {
                    None
                };
                if let Some(reason) = reason {
                    return Err(RuleViolation::InvalidBlockTarget { tile, reason });
                }
            }
        }
        Ok(())
    }

    fn resolve_win(&mut self) -> Option<MoveOutcome> {
        let (winner, reason) = self.board.check_win()?;
        self.status = MatchStatus::Finished;
        self.winner = Some((winner, reason));
        self.pending_extra_move = None;
        Some(MoveOutcome::Won { winner, reason })
    }

    /// Tick the mover's cooldowns, decay blocked tiles, flip the turn.
    fn complete_turn(&mut self, side: Side) {
        self.abilities.tick(side);

        for blocked in &mut self.blocked_tiles {
            blocked.turns_remaining = blocked.turns_remaining.saturating_sub(1);
        }
        self.blocked_tiles.retain(|b| b.turns_remaining > 0);

        self.current_side = side.opponent();
    }
}
