//! TOML configuration for the hub.
//!
//! Read from the platform-appropriate config file unless a path is given:
//! - Windows:  `%APPDATA%\RoboHub\config.toml`
//! - Linux:    `~/.config/robohub/config.toml`
//! - macOS:    `~/Library/Application Support/RoboHub/config.toml`
//!
//! # Example
//!
//! ```toml
//! [hub]
//! log_level = "debug"
//!
//! [bluetooth]
//! discovery_interval_ms = 2000
//!
//! [sphero]
//! self_test = false
//!
//! [[profiles]]
//! name = "BB-8"
//! family = "sphero"
//! device_class = 7936
//! uuid = "00001101-0000-1000-8000-00805f9b34fb"
//! name_prefix = "BB-"
//! ```
//!
//! Every field has a default, so an empty or missing file yields a working
//! configuration.  Configured profiles are checked after the built-in ones.

use std::path::{Path, PathBuf};
use std::time::Duration;

use robo_core::Profile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::hub::HubConfig;
use crate::application::robot_api::SpheroConfig;
use crate::application::transport::SocketProperties;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A configured profile can never match or would match everything.
    #[error("invalid profile {0:?}: name_prefix must not be empty")]
    InvalidProfile(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub hub: GeneralConfig,
    #[serde(default)]
    pub bluetooth: BluetoothConfig,
    #[serde(default)]
    pub sphero: SpheroSettings,
    /// Extra robot signatures, checked after the built-in table.
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Socket and discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BluetoothConfig {
    #[serde(default = "default_socket_name")]
    pub socket_name: String,
    #[serde(default = "default_buffer_size")]
    pub socket_buffer_size: u32,
    #[serde(default)]
    pub persistent: bool,
    /// Minimum spacing between two discovery refreshes.
    #[serde(default = "default_discovery_interval_ms")]
    pub discovery_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpheroSettings {
    /// Location polling period while monitoring.
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    /// How long an acknowledgement may stay outstanding.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub self_test: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_socket_name() -> String {
    SocketProperties::default().name
}
fn default_buffer_size() -> u32 {
    4096
}
fn default_discovery_interval_ms() -> u64 {
    5000
}
fn default_monitor_interval_ms() -> u64 {
    1000
}
fn default_ack_timeout_ms() -> u64 {
    5000
}
fn default_true() -> bool {
    true
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            socket_name: default_socket_name(),
            socket_buffer_size: default_buffer_size(),
            persistent: false,
            discovery_interval_ms: default_discovery_interval_ms(),
        }
    }
}

impl Default for SpheroSettings {
    fn default() -> Self {
        Self {
            monitor_interval_ms: default_monitor_interval_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            self_test: default_true(),
        }
    }
}

impl AppConfig {
    /// Converts the on-disk settings into the hub's runtime settings.
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            socket: SocketProperties {
                name: self.bluetooth.socket_name.clone(),
                buffer_size: self.bluetooth.socket_buffer_size,
                persistent: self.bluetooth.persistent,
            },
            discovery_interval: Duration::from_millis(self.bluetooth.discovery_interval_ms),
            sphero: SpheroConfig {
                monitor_interval: Duration::from_millis(self.sphero.monitor_interval_ms),
                ack_timeout: Duration::from_millis(self.sphero.ack_timeout_ms),
                self_test: self.sphero.self_test,
            },
        }
    }

    /// Built-in profiles followed by the configured ones.
    pub fn profiles(&self) -> Vec<Profile> {
        let mut profiles = Profile::builtin();
        profiles.extend(self.profiles.iter().cloned());
        profiles
    }

    /// Rejects configured profiles with an empty name prefix.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidProfile`] naming the first offending profile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.profiles.iter().find(|p| p.name_prefix.is_empty()) {
            Some(profile) => Err(ConfigError::InvalidProfile(profile.name.clone())),
            None => Ok(()),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Resolves the default config file path.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(platform_config_dir()
        .ok_or(ConfigError::NoPlatformConfigDir)?
        .join("config.toml"))
}

/// Loads and validates `AppConfig` from `path`, or from the default location
/// when `path` is `None`.
///
/// A missing file at the default location yields `AppConfig::default()`; a
/// missing file at an explicit path is an error.
///
/// # Errors
///
/// [`ConfigError::Io`] for file-system errors, [`ConfigError::Parse`] for
/// malformed TOML, [`ConfigError::InvalidProfile`] for bad profiles.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (config_file_path()?, false),
    };

    let config = match std::fs::read_to_string(&path) {
        Ok(content) => toml::from_str::<AppConfig>(&content)?,
        Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(source) => return Err(ConfigError::Io { path, source }),
    };
    config.validate()?;
    Ok(config)
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("RoboHub"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("robohub"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("RoboHub"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use robo_core::domain::profile::SERIAL_PORT_UUID;
    use robo_core::RobotFamily;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("robohub-{}-{name}", std::process::id()));
        std::fs::write(&path, content).expect("write temp config");
        path
    }

    #[test]
    fn test_default_config_matches_hub_defaults() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.hub_config(), HubConfig::default());
        assert_eq!(cfg.hub.log_level, "info");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("parse");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let cfg: AppConfig = toml::from_str("[sphero]\nself_test = false\n").expect("parse");

        assert!(!cfg.sphero.self_test);
        assert_eq!(cfg.sphero.monitor_interval_ms, 1000);
        assert_eq!(cfg.bluetooth.socket_buffer_size, 4096);
    }

    #[test]
    fn test_configured_profiles_follow_builtins() {
        // Arrange
        let toml_str = r#"
            [[profiles]]
            name = "BB-8"
            family = "sphero"
            device_class = 7936
            uuid = "00001101-0000-1000-8000-00805f9b34fb"
            name_prefix = "BB-"
        "#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("parse");
        let profiles = cfg.profiles();

        // Assert
        assert_eq!(profiles.len(), Profile::builtin().len() + 1);
        let last = profiles.last().expect("configured profile");
        assert_eq!(last.family, RobotFamily::Sphero);
        assert_eq!(last.uuid, SERIAL_PORT_UUID);
    }

    #[test]
    fn test_validate_rejects_empty_prefix() {
        let mut cfg = AppConfig::default();
        cfg.profiles.push(Profile {
            name: "Anything".into(),
            family: RobotFamily::Ev3,
            device_class: 1,
            uuid: SERIAL_PORT_UUID,
            name_prefix: String::new(),
        });

        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidProfile(name)) if name == "Anything"));
    }

    #[test]
    fn test_load_config_reads_explicit_file() {
        let path = temp_file("explicit.toml", "[bluetooth]\ndiscovery_interval_ms = 250\n");

        let cfg = load_config(Some(&path)).expect("load");

        assert_eq!(cfg.hub_config().discovery_interval, Duration::from_millis(250));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_load_config_missing_explicit_file_is_error() {
        let path = std::env::temp_dir().join("robohub-definitely-missing.toml");
        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_config_malformed_toml_is_parse_error() {
        let path = temp_file("broken.toml", "[hub\nlog_level = ");

        let result = load_config(Some(&path));

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_file(path);
    }
}
