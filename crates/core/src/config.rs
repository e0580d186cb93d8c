//! Configuration management for parley.

use crate::error::Result;
use crate::platform;
use serde::{Deserialize, Serialize};

/// Default connection attempt deadline in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default maximum message size in bytes (64KB of Markdown source).
const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Main configuration struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Deadline for outbound connection attempts, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum size of a single message, in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Display name advertised in the identity file (None = hostname).
    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_MESSAGE_BYTES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            display_name: None,
        }
    }
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if no file exists.
    pub fn load() -> Result<Self> {
        let config_path = platform::config_file_path();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let mut config: Config = serde_json::from_str(&contents)?;
            config.fix_invalid_values();
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<()> {
        let config_path = platform::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;
        Ok(())
    }

    /// Clamp values that would make the client unusable.
    fn fix_invalid_values(&mut self) {
        if self.connect_timeout_secs == 0 {
            self.connect_timeout_secs = DEFAULT_CONNECT_TIMEOUT_SECS;
        }
        if self.max_message_bytes == 0 {
            self.max_message_bytes = DEFAULT_MAX_MESSAGE_BYTES;
        }
    }

    /// Connection attempt deadline as a [`std::time::Duration`].
    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.connect_timeout_secs)
    }
}
