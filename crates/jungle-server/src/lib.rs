//! Jungle Duel multiplayer server
//!
//! Authoritative room server over renet. Rooms live in a [`RoomRegistry`];
//! [`SessionHandler`] binds connections to rooms and turns client intents
//! into room operations.

pub mod channels;
pub mod config;
pub mod registry;
pub mod session;
pub mod transport;

pub use channels::*;
pub use config::{ConfigError, ServerConfig};
pub use registry::{EvictedRoom, JoinError, LeaveOutcome, RoomRegistry};
pub use session::{Outbound, ProtocolError, SessionHandler};
pub use transport::{ServerRunner, TransportConfig, TransportError, PROTOCOL_ID};
