//! Configuration management for sotto.
//!
//! Configuration is persisted as JSON at a per-user path. Every field has a
//! default so partially written or older files load cleanly.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::APP_NAME;

/// What happens when a collaborator surface asks to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseBehavior {
    /// Ask the user each time
    #[default]
    Ask,
    /// Keep running in the tray
    Minimize,
    /// Exit the application
    Quit,
}

/// Runtime configuration for the application.
///
/// A single instance lives behind a lock for the whole process; components
/// read the fields they need and the settings controller is the only writer.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Hotkey held while speaking, '+'-joined key names.
    /// Side-specific modifiers use an `_l`/`_r` suffix, e.g. "ctrl_l+alt"
    #[serde(default = "default_hotkey")]
    pub hotkey: String,

    /// Whisper model tier to transcribe with
    #[serde(default = "default_model")]
    pub model: String,

    /// Capture sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Input device index, or None for the system default
    #[serde(default)]
    pub microphone_device: Option<usize>,

    /// Preferred language for transcription (ISO 639-1 code), or None
    /// to let the model auto-detect
    #[serde(default)]
    pub language: Option<String>,

    /// Start the application at login
    #[serde(default)]
    pub auto_start: bool,

    /// Behavior when a collaborator surface is closed
    #[serde(default)]
    pub close_behavior: CloseBehavior,
}

fn default_hotkey() -> String {
    "ctrl+win".to_string()
}

fn default_model() -> String {
    "base".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey: default_hotkey(),
            model: default_model(),
            sample_rate: default_sample_rate(),
            microphone_device: None,
            language: None,
            auto_start: false,
            close_behavior: CloseBehavior::Ask,
        }
    }
}

impl Config {
    /// Get the preferred language
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Human-readable name of the configured input device for messages.
    pub fn device_label(&self) -> String {
        match self.microphone_device {
            Some(index) => format!("device #{index}"),
            None => "default device".to_string(),
        }
    }
}

/// Manages loading and saving configuration files.
pub struct ConfigManager {
    config_path: PathBuf,
    legacy_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the default configuration paths.
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_path: Self::default_config_path()?,
            legacy_path: Self::legacy_config_path()?,
        })
    }

    /// Creates a new ConfigManager with explicit paths, for tests and
    /// portable installs.
    pub fn with_config_paths<P: AsRef<Path>>(config_path: P, legacy_path: P) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            legacy_path: legacy_path.as_ref().to_path_buf(),
        }
    }

    /// Returns the default path to the configuration file.
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to retrieve configuration directory")?;
        Ok(config_dir.join(APP_NAME).join("config.json"))
    }

    /// Returns the configuration path used by older releases, a dot
    /// directory in the user's home.
    fn legacy_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to retrieve home directory")?;
        Ok(home.join(format!(".{APP_NAME}")).join("config.json"))
    }

    /// Loads the configuration.
    ///
    /// Missing file yields defaults. A file at the legacy path is migrated
    /// forward once, with missing fields filled from defaults. A file that
    /// exists but does not parse is an error; the caller must not run with
    /// corrupt configuration.
    pub fn load(&self) -> Result<Config> {
        if self.config_path.exists() {
            return self.read_config(&self.config_path);
        }

        if self.legacy_path.exists() {
            info!(
                from = ?self.legacy_path,
                to = ?self.config_path,
                "Migrating configuration from legacy path"
            );
            let config = self
                .read_config(&self.legacy_path)
                .context("Failed to migrate legacy config")?;
            if let Err(e) = self.save(&config) {
                // Keep running off the legacy values; migration is retried
                // on the next start.
                warn!("Failed to write migrated config: {:#}", e);
            }
            return Ok(config);
        }

        Ok(Config::default())
    }

    fn read_config(&self, path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {:?}", path))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {:?}", path))?;

        Ok(config)
    }

    /// Saves the configuration to the config file.
    pub fn save(&self, config: &Config) -> Result<()> {
        let config_dir = self
            .config_path
            .parent()
            .with_context(|| format!("Failed to get parent directory of {:?}", self.config_path))?;

        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory at {:?}", config_dir))?;

        let serialized =
            serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, serialized)
            .with_context(|| format!("Failed to write config file at {:?}", self.config_path))?;

        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn manager_in(dir: &Path) -> ConfigManager {
        ConfigManager::with_config_paths(dir.join("config.json"), dir.join("legacy.json"))
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.hotkey, "ctrl+win");
        assert_eq!(config.model, "base");
        assert_eq!(config.sample_rate, 16000);
        assert!(config.microphone_device.is_none());
        assert!(config.language.is_none());
        assert!(!config.auto_start);
        assert_eq!(config.close_behavior, CloseBehavior::Ask);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            hotkey: "ctrl_l+shift+x".to_string(),
            microphone_device: Some(2),
            language: Some("es".to_string()),
            close_behavior: CloseBehavior::Quit,
            ..Default::default()
        };

        let serialized = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&serialized).unwrap();

        assert_eq!(config, deserialized);
        // close_behavior is stored in its lowercase wire form
        assert!(serialized.contains("\"quit\""));
    }

    #[test]
    fn test_missing_fields_fill_defaults() {
        let config: Config = serde_json::from_str(r#"{"hotkey": "alt+space"}"#).unwrap();
        assert_eq!(config.hotkey, "alt+space");
        assert_eq!(config.model, "base");
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.close_behavior, CloseBehavior::Ask);
    }

    #[test]
    fn test_load_missing_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());

        let loaded = manager.load().unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_config_manager_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());

        let config = Config {
            model: "small".to_string(),
            sample_rate: 44100,
            ..Default::default()
        };

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(config, loaded);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());

        fs::write(dir.path().join("config.json"), "{not json").unwrap();
        assert!(manager.load().is_err());
    }

    #[test]
    fn test_legacy_config_migrates_once() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());

        fs::write(
            dir.path().join("legacy.json"),
            r#"{"hotkey": "ctrl+alt", "language": "de"}"#,
        )
        .unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded.hotkey, "ctrl+alt");
        assert_eq!(loaded.language(), Some("de"));
        // Missing fields were filled from defaults
        assert_eq!(loaded.model, "base");

        // The migrated file now exists at the new path and wins even if the
        // legacy file changes afterwards.
        assert!(dir.path().join("config.json").exists());
        fs::write(dir.path().join("legacy.json"), r#"{"hotkey": "ignored"}"#).unwrap();
        let again = manager.load().unwrap();
        assert_eq!(again.hotkey, "ctrl+alt");
    }
}
