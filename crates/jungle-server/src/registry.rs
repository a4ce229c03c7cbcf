//! Live rooms keyed by room code.
//!
//! The registry is a plain value owned by the server, backed by a sharded
//! concurrent map. Every mutation of a room happens under its shard lock:
//! creation inserts through a vacant entry, and join/leave/sweep all hold
//! the same lock, so a join can never bind to a room that is being removed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jungle_core::{ConnectionId, GameRoom, GameRules, SeatError};
use jungle_protocol::{RoomCode, Side};
use rand::Rng;
use tracing::{debug, info};

/// Why a join was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Room does not exist")]
    NotFound,
    #[error("Room is full")]
    Full,
    #[error("Room is closed")]
    Closed,
    #[error("Already seated in this room")]
    AlreadySeated,
}

impl From<SeatError> for JoinError {
    fn from(err: SeatError) -> Self {
        match err {
            SeatError::RoomFull => JoinError::Full,
            SeatError::RoomClosed => JoinError::Closed,
            SeatError::AlreadySeated => JoinError::AlreadySeated,
        }
    }
}

/// What happened when a connection gave up its seat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Side the leaver held
    pub side: Side,
    /// Connection still seated, if any
    pub remaining: Option<ConnectionId>,
    /// The match was in progress and is now abandoned
    pub abandoned: bool,
    /// The room was empty and has been removed
    pub evicted: bool,
}

/// A room removed by [`RoomRegistry::sweep`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvictedRoom {
    pub code: RoomCode,
    pub occupants: Vec<ConnectionId>,
}

struct RoomEntry {
    room: GameRoom,
    /// Set once the match finishes or is abandoned.
    closed_at: Option<Instant>,
}

impl RoomEntry {
    fn mark_closed_if_done(&mut self, now: Instant) {
        if self.closed_at.is_none() && (self.room.is_finished() || self.room.is_abandoned()) {
            self.closed_at = Some(now);
        }
    }
}

pub struct RoomRegistry {
    rooms: DashMap<RoomCode, RoomEntry>,
    rules: Arc<GameRules>,
    code_len: usize,
    grace: Duration,
}

impl RoomRegistry {
    pub fn new(rules: GameRules, code_len: usize, grace: Duration) -> Self {
        Self {
            rooms: DashMap::new(),
            rules: Arc::new(rules),
            code_len,
            grace,
        }
    }

    /// Allocate a room under a fresh code and seat the creator on the
    /// first side. Colliding codes are regenerated.
    pub fn create(&self, conn: ConnectionId) -> (RoomCode, Side) {
        loop {
            let code = generate_room_code(self.code_len);
            match self.rooms.entry(code.clone()) {
                Entry::Occupied(_) => {
                    debug!(room = %code, "Room code collision, regenerating");
                }
                Entry::Vacant(vacant) => {
                    let room = GameRoom::with_creator(code.clone(), self.rules.clone(), conn);
                    vacant.insert(RoomEntry {
                        room,
                        closed_at: None,
                    });
                    info!(room = %code, client_id = conn, "Room created");
                    return (code, GameRules::FIRST_SIDE);
                }
            }
        }
    }

    pub fn join(&self, code: &RoomCode, conn: ConnectionId) -> Result<Side, JoinError> {
        let mut entry = self.rooms.get_mut(code).ok_or(JoinError::NotFound)?;
        if entry.closed_at.is_some() {
            return Err(JoinError::Closed);
        }
        let side = entry.room.seat(conn)?;
        info!(room = %code, client_id = conn, %side, "Player joined room");
        Ok(side)
    }

    /// Run `f` against one room while holding its shard lock. Returns `None`
    /// if the room does not exist.
    pub fn with_room<R>(&self, code: &RoomCode, f: impl FnOnce(&mut GameRoom) -> R) -> Option<R> {
        let mut entry = self.rooms.get_mut(code)?;
        let result = f(&mut entry.room);
        entry.mark_closed_if_done(Instant::now());
        Some(result)
    }

    /// Free `conn`'s seat. An empty room is removed immediately; a match in
    /// progress is abandoned and left for [`RoomRegistry::sweep`].
    pub fn leave(&self, code: &RoomCode, conn: ConnectionId) -> Option<LeaveOutcome> {
        let Entry::Occupied(mut occupied) = self.rooms.entry(code.clone()) else {
            return None;
        };

        let entry = occupied.get_mut();
        let was_abandoned = entry.room.is_abandoned();
        let side = entry.room.unseat(conn)?;
        entry.mark_closed_if_done(Instant::now());

        let abandoned = !was_abandoned && entry.room.is_abandoned();
        let remaining = entry.room.connections().next().map(|(other, _)| other);
        let evicted = entry.room.is_empty();
        if evicted {
            occupied.remove();
            info!(room = %code, "Room empty, removed");
        } else if abandoned {
            info!(room = %code, %side, "Match abandoned");
        }

        Some(LeaveOutcome {
            side,
            remaining,
            abandoned,
            evicted,
        })
    }

    pub fn evict(&self, code: &RoomCode) -> Option<GameRoom> {
        self.rooms.remove(code).map(|(_, entry)| entry.room)
    }

    /// Remove every room that has been closed for at least the grace period,
    /// regardless of who is still seated.
    pub fn sweep(&self, now: Instant) -> Vec<EvictedRoom> {
        let mut evicted = Vec::new();
        self.rooms.retain(|code, entry| {
            let expired = entry
                .closed_at
                .is_some_and(|closed| now.saturating_duration_since(closed) >= self.grace);
            if expired {
                evicted.push(EvictedRoom {
                    code: code.clone(),
                    occupants: entry.room.connections().map(|(conn, _)| conn).collect(),
                });
            }
            !expired
        });

        for room in &evicted {
            info!(room = %room.code, "Closed room evicted");
        }
        evicted
    }

    pub fn contains(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

fn generate_room_code(len: usize) -> RoomCode {
    let mut rng = rand::thread_rng();
    let code: String = (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..RoomCode::ALPHABET.len());
            RoomCode::ALPHABET[idx] as char
        })
        .collect();
    RoomCode::new(code)
}

#[cfg(test)]
mod tests {
    use jungle_protocol::{Coord, MatchStatus};

    use super::*;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(GameRules::default(), 6, Duration::from_secs(60))
    }

    #[test]
    fn generated_codes_are_well_formed() {
        for _ in 0..100 {
            let code = generate_room_code(6);
            assert_eq!(code.as_str().len(), 6);
            assert!(code.is_well_formed());
        }
    }

    #[test]
    fn create_seats_creator_as_monkey() {
        let rooms = registry();
        let (code, side) = rooms.create(1);
        assert_eq!(side, Side::Monkey);
        assert!(rooms.contains(&code));
        assert_eq!(
            rooms.with_room(&code, |room| room.side_of(1)),
            Some(Some(Side::Monkey))
        );
    }

    #[test]
    fn join_outcomes() {
        let rooms = registry();
        let (code, _) = rooms.create(1);

        assert_eq!(rooms.join(&RoomCode::new("ZZZZZZ"), 2), Err(JoinError::NotFound));
        assert_eq!(rooms.join(&code, 1), Err(JoinError::AlreadySeated));
        assert_eq!(rooms.join(&code, 2), Ok(Side::Fox));
        assert_eq!(rooms.join(&code, 3), Err(JoinError::Full));
        assert_eq!(
            rooms.with_room(&code, |room| room.status()),
            Some(MatchStatus::Ready)
        );
    }

    #[test]
    fn lowercase_code_finds_the_room() {
        let rooms = registry();
        let (code, _) = rooms.create(1);
        let typed = RoomCode::new(code.as_str().to_ascii_lowercase());
        assert_eq!(rooms.join(&typed, 2), Ok(Side::Fox));
    }

    #[test]
    fn last_leaver_removes_the_room() {
        let rooms = registry();
        let (code, _) = rooms.create(1);
        rooms.join(&code, 2).unwrap();

        let first = rooms.leave(&code, 1).unwrap();
        assert_eq!(first.side, Side::Monkey);
        assert_eq!(first.remaining, Some(2));
        assert!(!first.abandoned);
        assert!(!first.evicted);

        let second = rooms.leave(&code, 2).unwrap();
        assert!(second.evicted);
        assert!(!rooms.contains(&code));
        assert_eq!(rooms.leave(&code, 2), None);
    }

    #[test]
    fn leave_by_stranger_is_ignored() {
        let rooms = registry();
        let (code, _) = rooms.create(1);
        assert_eq!(rooms.leave(&code, 99), None);
        assert!(rooms.contains(&code));
    }

    #[test]
    fn abandoned_room_is_closed_then_swept() {
        let rooms = registry();
        let (code, _) = rooms.create(1);
        rooms.join(&code, 2).unwrap();
        rooms.with_room(&code, |room| room.start()).unwrap().unwrap();

        let outcome = rooms.leave(&code, 2).unwrap();
        assert!(outcome.abandoned);
        assert!(!outcome.evicted);
        assert_eq!(rooms.join(&code, 3), Err(JoinError::Closed));

        // Not yet past the grace period.
        assert!(rooms.sweep(Instant::now()).is_empty());
        assert!(rooms.contains(&code));

        let evicted = rooms.sweep(Instant::now() + Duration::from_secs(61));
        assert_eq!(
            evicted,
            vec![EvictedRoom {
                code: code.clone(),
                occupants: vec![1],
            }]
        );
        assert!(!rooms.contains(&code));
    }

    #[test]
    fn finished_room_is_swept_after_grace() {
        let rules = GameRules {
            layout: jungle_core::StartingLayout {
                monkey: vec![Coord::new(2, 6)],
                fox: vec![Coord::new(5, 5)],
            },
            ..GameRules::default()
        };
        let rooms = RoomRegistry::new(rules, 6, Duration::from_secs(60));
        let (code, _) = rooms.create(1);
        rooms.join(&code, 2).unwrap();

        rooms
            .with_room(&code, |room| {
                room.start()?;
                let piece = room.board().pieces()[0].id;
                room.move_piece(Side::Monkey, piece, Coord::new(3, 7))
            })
            .unwrap()
            .unwrap();

        assert_eq!(rooms.join(&code, 3), Err(JoinError::Closed));
        let evicted = rooms.sweep(Instant::now() + Duration::from_secs(60));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].occupants, vec![1, 2]);
        assert!(rooms.is_empty());
    }

    #[test]
    fn open_rooms_are_never_swept() {
        let rooms = registry();
        let (code, _) = rooms.create(1);
        assert!(rooms
            .sweep(Instant::now() + Duration::from_secs(3600))
            .is_empty());
        assert!(rooms.contains(&code));
    }

    #[test]
    fn evict_removes_immediately() {
        let rooms = registry();
        let (code, _) = rooms.create(1);
        assert!(rooms.evict(&code).is_some());
        assert!(rooms.evict(&code).is_none());
        assert_eq!(rooms.len(), 0);
    }
}
