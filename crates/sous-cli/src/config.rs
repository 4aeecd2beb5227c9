//! Configuration file support

use serde::{Deserialize, Serialize};
use sous_chat::{RevealConfig, SessionConfig};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for sous
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the assistant backend
    pub server_url: String,
    /// Milliseconds between reveal ticks
    pub reveal_interval_ms: u64,
    /// Characters revealed per tick
    pub reveal_chars_per_tick: usize,
    /// Seconds to wait for the next chunk before giving up; 0 waits forever
    pub read_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: sous_ai::DEFAULT_BASE_URL.to_string(),
            reveal_interval_ms: 15,
            reveal_chars_per_tick: 1,
            read_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sous")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("SOUS_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    fn parse(content: &str) -> Self {
        match toml::from_str(content) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        Config::default().save()?;
        Ok(path)
    }

    /// Session settings derived from this config
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reveal: RevealConfig {
                interval: Duration::from_millis(self.reveal_interval_ms.max(1)),
                chars_per_tick: self.reveal_chars_per_tick,
            },
            read_timeout: (self.read_timeout_secs > 0)
                .then(|| Duration::from_secs(self.read_timeout_secs)),
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# sous configuration file
# Place at ~/.config/sous/config.toml (Linux/Mac) or %APPDATA%\sous\config.toml (Windows),
# or point SOUS_CONFIG_PATH at another file.

# Base URL of the cooking assistant backend
server_url = "http://localhost:8000"

# Typing effect: milliseconds between ticks and characters shown per tick
reveal_interval_ms = 15
reveal_chars_per_tick = 1

# Give up on an answer when the server sends nothing for this many seconds
# (0 waits forever)
read_timeout_secs = 60
"#
}
