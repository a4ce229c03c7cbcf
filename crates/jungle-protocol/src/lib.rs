//! Shared vocabulary between the Jungle Duel server and its clients.
//!
//! Everything that crosses the wire lives here: board coordinates, sides,
//! ability requests, the match snapshot and the closed message unions.

mod ids;
mod message;
mod snapshot;
mod types;
pub mod wire;

pub use crate::ids::*;
pub use crate::message::*;
pub use crate::snapshot::*;
pub use crate::types::*;
