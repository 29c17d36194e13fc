// src/config.rs
//! Bridge configuration with file-backed storage

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub serial_port: String,
    pub baudrate: u32,
    pub mode: String, // "tcp" or "ws"
    pub tcp_target: String,
    pub ws_url: String,
    pub device_id: String,
    pub line_prefix: Option<String>,
    pub ignore_ssl: bool,
    pub idle_delay_ms: u64,
    pub reconnect_delay_secs: u64,
    pub tcp_connect_timeout_secs: u64,
    pub ws_connect_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serial_port: Self::default_serial_port(),
            baudrate: 9600,
            mode: "ws".to_string(),
            tcp_target: "127.0.0.1:22500".to_string(),
            ws_url: "ws://127.0.0.1:3030/nmea".to_string(),
            device_id: "0001".to_string(),
            line_prefix: None,
            ignore_ssl: false,
            idle_delay_ms: 50,
            reconnect_delay_secs: 3,
            tcp_connect_timeout_secs: 5,
            ws_connect_timeout_secs: 10,
        }
    }
}

impl BridgeConfig {
    fn default_serial_port() -> String {
        #[cfg(windows)]
        {
            "COM6".to_string()
        }

        #[cfg(not(windows))]
        {
            "/dev/ttyUSB0".to_string()
        }
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn tcp_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.tcp_connect_timeout_secs)
    }

    pub fn ws_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.ws_connect_timeout_secs)
    }

    /// Load configuration from storage, falling back to defaults when no
    /// file exists yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)
            .map_err(|e| BridgeError::Other(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)?;

        Ok(config)
    }

    /// Save configuration to storage
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BridgeError::Other(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)?;

        std::fs::write(&config_path, contents)
            .map_err(|e| BridgeError::Other(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get config file path
    fn get_config_path() -> Result<std::path::PathBuf> {
        use std::path::PathBuf;

        #[cfg(windows)]
        let home = std::env::var("USERPROFILE")
            .map_err(|_| BridgeError::Other("USERPROFILE environment variable not set".to_string()))?;

        #[cfg(not(windows))]
        let home = std::env::var("HOME")
            .map_err(|_| BridgeError::Other("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("gps-bridge")
            .join("config.json"))
    }
}
