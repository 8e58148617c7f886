//! Bridge configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub display: DisplaySettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default = "BridgeConfig::default_log_level")]
    pub log_level: String,
}

/// Projection geometry announced to the dongle in `Open`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySettings {
    pub width: i32,
    pub height: i32,
    pub fps: i32,
    pub dpi: i32,
}

/// Session flags pushed into the dongle's filesystem during init
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Dark UI theme on the phone side
    pub night_mode: bool,
    /// Right-hand traffic steering position
    pub hand_drive_mode: bool,
    /// Report the head unit as charging the phone
    pub charge_mode: bool,
    /// Name the dongle advertises over Bluetooth/WiFi
    pub box_name: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            dpi: 160,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            night_mode: true,
            hand_drive_mode: true,
            charge_mode: false,
            box_name: "BoxName".to_string(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            display: DisplaySettings::default(),
            session: SessionSettings::default(),
            log_level: Self::default_log_level(),
        }
    }
}

impl BridgeConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    /// Default configuration file location
    ///
    /// `~/.config/carlink/bridge.toml`, falling back to the working
    /// directory when no config dir exists.
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("carlink").join("bridge.toml")
        } else {
            PathBuf::from("bridge.toml")
        }
    }

    /// Load configuration from an explicit path
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load from the default path, or fall back to built-in defaults
    pub fn load_or_default() -> Self {
        let path = Self::default_path();
        if path.exists() {
            match Self::load(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Ignoring invalid config at {}: {:#}", path.display(), e);
                }
            }
        }
        Self::default()
    }

    /// Write this configuration out as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.display.width, 1280);
        assert_eq!(config.display.fps, 30);
        assert_eq!(config.session.box_name, "BoxName");
        assert!(!config.session.charge_mode);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridge.toml");

        let mut config = BridgeConfig::default();
        config.display.width = 1920;
        config.display.height = 1080;
        config.session.night_mode = false;
        config.save(&path).unwrap();

        let loaded = BridgeConfig::load(&path).unwrap();
        assert_eq!(loaded.display.width, 1920);
        assert_eq!(loaded.display.height, 1080);
        assert!(!loaded.session.night_mode);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        fs::write(&path, "[display]\nwidth = 800\nheight = 480\nfps = 25\ndpi = 120\n").unwrap();

        let loaded = BridgeConfig::load(&path).unwrap();
        assert_eq!(loaded.display.width, 800);
        assert_eq!(loaded.session.box_name, "BoxName");
        assert_eq!(loaded.log_level, "info");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempdir().unwrap();
        assert!(BridgeConfig::load(&dir.path().join("absent.toml")).is_err());
    }
}
