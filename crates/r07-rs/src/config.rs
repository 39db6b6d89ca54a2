// crates/r07-rs/src/config.rs
//! Terminal settings (`configs/default_settings.json`).
//!
//! Loading is tolerant: a missing file or a parse error falls back to the
//! in-code defaults, and unknown keys are ignored.

use log::warn;
use serde::Deserialize;
use std::path::Path;

/// Remote command-server endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub reconnect_ms: u32,
    pub server_host: String,
    pub server_port: u16,
    pub ports: RemotePorts,
    pub prefer_iface: Vec<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            reconnect_ms: 3000,
            server_host: "192.168.6.6".to_string(),
            server_port: 5050,
            ports: RemotePorts::default(),
            prefer_iface: vec![
                "eth0".to_string(),
                "wlan0".to_string(),
                "ppp0".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemotePorts {
    /// Fixed device-side port.
    pub client: u16,
}

impl Default for RemotePorts {
    fn default() -> Self {
        Self { client: 5051 }
    }
}

/// One RS-485 line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Rs485Config {
    pub name: String,
    pub port: String,
    pub baud: u32,
    pub data_bits: u8,
    /// `'O'`, `'E'` or `'N'`.
    pub parity: char,
    pub stop_bits: u8,
}

impl Default for Rs485Config {
    fn default() -> Self {
        Self {
            name: "pump".to_string(),
            port: "/dev/ttyUSB0".to_string(),
            baud: 9600,
            data_bits: 8,
            parity: 'O',
            stop_bits: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub remote: RemoteConfig,
    pub rs485: Vec<Rs485Config>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            rs485: vec![Rs485Config::default()],
        }
    }
}

impl Settings {
    /// Loads settings from the given JSON file; any failure keeps the
    /// defaults.
    pub fn load_from_file(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("settings parse error in {}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Loads `configs/default_settings.json` under the app root.
    pub fn load_default(app_root: &Path) -> Self {
        Self::load_from_file(&app_root.join("configs").join("default_settings.json"))
    }

    /// The RS-485 line named `pump`, or the first configured line.
    pub fn pump_line(&self) -> Option<&Rs485Config> {
        self.rs485
            .iter()
            .find(|c| c.name == "pump")
            .or_else(|| self.rs485.first())
    }
}
