//! Renet channel layout.
//!
//! Channel 0: ReliableOrdered - room, match and state traffic
//! Channel 1: Unreliable - ping/pong

use std::time::Duration;

use jungle_protocol::ServerMessage;
use renet::{ChannelConfig, SendType};

pub mod channel_id {
    /// Every intent and state update; must arrive in order
    pub const COMMANDS: u8 = 0;
    /// Latency probes, can be lost
    pub const HEARTBEAT: u8 = 1;
}

const MAX_CHANNEL_MEMORY: usize = 1024 * 1024; // 1 MB

pub fn create_channel_configs() -> Vec<ChannelConfig> {
    vec![
        ChannelConfig {
            channel_id: channel_id::COMMANDS,
            max_memory_usage_bytes: MAX_CHANNEL_MEMORY,
            send_type: SendType::ReliableOrdered {
                resend_time: Duration::from_millis(200),
            },
        },
        ChannelConfig {
            channel_id: channel_id::HEARTBEAT,
            max_memory_usage_bytes: 64 * 1024,
            send_type: SendType::Unreliable,
        },
    ]
}

/// Channel a server message travels on.
pub fn channel_for(message: &ServerMessage) -> u8 {
    match message {
        ServerMessage::Pong { .. } => channel_id::HEARTBEAT,
        _ => channel_id::COMMANDS,
    }
}

#[cfg(test)]
mod tests {
    use jungle_protocol::{ErrorKind, RoomCode};

    use super::*;

    #[test]
    fn channel_configs_are_valid() {
        let configs = create_channel_configs();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].channel_id, channel_id::COMMANDS);
        assert_eq!(configs[1].channel_id, channel_id::HEARTBEAT);
    }

    #[test]
    fn only_pong_is_unreliable() {
        let pong = ServerMessage::Pong {
            client_timestamp: 1,
            server_timestamp: 2,
        };
        assert_eq!(channel_for(&pong), channel_id::HEARTBEAT);
        assert_eq!(
            channel_for(&ServerMessage::RoomClosed {
                room_code: RoomCode::new("ABCDEF")
            }),
            channel_id::COMMANDS
        );
        assert_eq!(
            channel_for(&ServerMessage::error(ErrorKind::Rule, "Invalid move")),
            channel_id::COMMANDS
        );
    }
}
