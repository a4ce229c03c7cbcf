//! Server configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use jungle_core::{GameRules, RulesError};
use serde::{Deserialize, Serialize};

/// Environment variable naming a YAML config file.
pub const CONFIG_ENV: &str = "JUNGLE_CONFIG";

/// Shortest room code the server will hand out.
const MIN_ROOM_CODE_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid game rules: {0}")]
    Rules(#[from] RulesError),

    #[error("Room code length must be at least {min}, got {0}", min = MIN_ROOM_CODE_LEN)]
    RoomCodeTooShort(usize),

    #[error("{0} must be non-zero")]
    Zero(&'static str),
}

/// Server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the server
    pub bind_address: SocketAddr,
    /// Maximum concurrent connections
    pub max_clients: usize,
    /// Server loop period
    pub tick_interval: Duration,
    /// Characters per generated room code
    pub room_code_len: usize,
    /// How long a finished or abandoned room lingers before eviction
    pub finished_room_grace: Duration,
    /// Messages allowed per connection per window
    pub rate_limit_messages: u32,
    pub rate_limit_window: Duration,
    /// Board size, cooldowns, block duration and starting layout
    pub rules: GameRules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 7777)),
            max_clients: 64,
            tick_interval: Duration::from_millis(16), // ~60 Hz
            room_code_len: 6,
            finished_room_grace: Duration::from_secs(60),
            rate_limit_messages: 30,
            rate_limit_window: Duration::from_secs(1),
            rules: GameRules::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the file named by `JUNGLE_CONFIG`, or fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Self::from_yaml(&text)
    }

    /// Parse and validate. Omitted fields keep their defaults.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room_code_len < MIN_ROOM_CODE_LEN {
            return Err(ConfigError::RoomCodeTooShort(self.room_code_len));
        }
        if self.max_clients == 0 {
            return Err(ConfigError::Zero("max_clients"));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Zero("tick_interval"));
        }
        if self.rate_limit_messages == 0 {
            return Err(ConfigError::Zero("rate_limit_messages"));
        }
        self.rules.validate()?;
        Ok(())
    }
}
