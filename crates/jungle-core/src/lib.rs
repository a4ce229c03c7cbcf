//! Authoritative rules for Jungle Duel.
//!
//! `jungle-core` has no networking: it owns the board geometry, ability
//! cooldown bookkeeping and the per-room match state machine. All state
//! mutation flows through [`GameRoom`].

mod abilities;
mod board;
mod error;
mod room;
mod rules;

pub use crate::abilities::*;
pub use crate::board::*;
pub use crate::error::*;
pub use crate::room::*;
pub use crate::rules::*;

/// Transport-level identity of one connected client.
pub type ConnectionId = u64;
