//! Static board rules: move geometry and win detection.
//!
//! The board knows nothing about turns, abilities or blocked tiles. Callers
//! validate those before asking whether a step is geometrically legal.

use jungle_protocol::{Coord, PieceId, PieceSnapshot, Side, WinReason};

use crate::GameRules;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Piece {
    pub id: PieceId,
    pub side: Side,
    pub position: Coord,
}

/// Active pieces on a square grid. At most one piece occupies a tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    size: u8,
    pieces: Vec<Piece>,
}

impl Board {
    pub fn empty(size: u8) -> Self {
        Self {
            size,
            pieces: Vec::new(),
        }
    }

    /// Populate a board from the rules' starting layout. The rules are
    /// expected to have passed [`GameRules::validate`].
    pub fn from_rules(rules: &GameRules) -> Self {
        let mut pieces = Vec::with_capacity(rules.layout.monkey.len() + rules.layout.fox.len());
        for side in Side::ALL {
            for &position in rules.layout.tiles(side) {
                pieces.push(Piece {
                    id: PieceId(pieces.len() as u16),
                    side,
                    position,
                });
            }
        }
        Self {
            size: rules.board_size,
            pieces,
        }
    }

    pub fn size(&self) -> u8 {
        self.size
    }

    pub fn in_bounds(&self, tile: Coord) -> bool {
        let n = self.size as i32;
        (0..n).contains(&tile.x) && (0..n).contains(&tile.y)
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.id == id)
    }

    pub fn piece_at(&self, tile: Coord) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.position == tile)
    }

    pub fn is_occupied(&self, tile: Coord) -> bool {
        self.piece_at(tile).is_some()
    }

    pub fn pieces_of(&self, side: Side) -> impl Iterator<Item = &Piece> + '_ {
        self.pieces.iter().filter(move |p| p.side == side)
    }

    /// True if `piece` may step onto `target`: in bounds, unoccupied, exactly
    /// one diagonal step, in the piece's forward direction.
    pub fn is_legal_move(&self, piece: &Piece, target: Coord) -> bool {
        if !self.in_bounds(target) || self.is_occupied(target) {
            return false;
        }

        let dx = target.x - piece.position.x;
        let dy = target.y - piece.position.y;
        dx.abs() == 1 && dy == piece.side.forward()
    }

    /// Move a piece. Returns its previous position, or `None` if no piece has
    /// that id. Legality is the caller's responsibility.
    pub fn apply_move(&mut self, id: PieceId, target: Coord) -> Option<Coord> {
        let piece = self.pieces.iter_mut().find(|p| p.id == id)?;
        let from = piece.position;
        piece.position = target;
        Some(from)
    }

    /// Exchange the positions of two pieces. Occupancy is unchanged.
    pub fn swap(&mut self, first: PieceId, second: PieceId) -> bool {
        let Some(a) = self.pieces.iter().position(|p| p.id == first) else {
            return false;
        };
        let Some(b) = self.pieces.iter().position(|p| p.id == second) else {
            return false;
        };
        let pos_a = self.pieces[a].position;
        self.pieces[a].position = self.pieces[b].position;
        self.pieces[b].position = pos_a;
        true
    }

    /// Advancement is checked before attrition. Within attrition a side with
    /// no pieces loses; if both are empty, Fox wins because Monkey is checked first.
    pub fn check_win(&self) -> Option<(Side, WinReason)> {
        if let Some(piece) = self
            .pieces
            .iter()
            .find(|p| p.position.y == p.side.far_row(self.size))
        {
            return Some((piece.side, WinReason::Advancement));
        }

        for side in Side::ALL {
            if self.pieces_of(side).next().is_none() {
                return Some((side.opponent(), WinReason::Attrition));
            }
        }

        None
    }

    pub fn snapshot(&self) -> Vec<PieceSnapshot> {
        self.pieces
            .iter()
            .map(|p| PieceSnapshot {
                id: p.id,
                side: p.side,
                position: p.position,
            })
            .collect()
    }
}
