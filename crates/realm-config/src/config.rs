//! Client settings with defaults and RON persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Discovery and transport settings.
    pub network: NetworkConfig,
    /// Frame loop and session settings.
    pub client: ClientConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// URL of the discovery service queried on every connect.
    pub discovery_url: String,
    /// Discovery request timeout in milliseconds.
    pub http_timeout_ms: u64,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Largest frame payload accepted or sent, in bytes.
    pub max_frame_bytes: u32,
    /// How long a disconnect keeps flushing LEAVE, in milliseconds.
    pub leave_flush_ms: u64,
}

/// Client session configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Identity token; the server sees it prefixed as the client id.
    pub identity: String,
    /// Frame loop rate in Hz. Zero is treated as one.
    pub frame_rate: u32,
    /// Request a connection as soon as the client starts.
    pub auto_connect: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter (e.g. "debug", "info,realm_net=trace"). Empty uses the
    /// logger's built-in default.
    pub log_level: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            discovery_url: "http://127.0.0.1:8080/status".to_string(),
            http_timeout_ms: 5_000,
            connect_timeout_ms: 5_000,
            max_frame_bytes: 1_048_576,
            leave_flush_ms: 500,
        }
    }
}

impl NetworkConfig {
    /// Discovery request timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// TCP connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// LEAVE flush grace.
    pub fn leave_flush(&self) -> Duration {
        Duration::from_millis(self.leave_flush_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            identity: "player".to_string(),
            frame_rate: 60,
            auto_connect: true,
        }
    }
}

impl ClientConfig {
    /// Time between frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }
}

/// `<platform config dir>/realm-client`, or `./realm-client` if the platform
/// has none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("realm-client")
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(config_dir.join(CONFIG_FILE_NAME), serialized)
            .map_err(ConfigError::WriteError)
    }

    /// Re-read the file: `Some(new_config)` if it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(CONFIG_FILE_NAME))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        ron::from_str(&contents).map_err(ConfigError::ParseError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let ron_str =
            ron::ser::to_string_pretty(&Config::default(), ron::ser::PrettyConfig::new()).unwrap();
        assert!(ron_str.contains("discovery_url: \"http://127.0.0.1:8080/status\""));
        assert!(ron_str.contains("frame_rate: 60"));
    }

    #[test]
    fn test_missing_section_uses_default() {
        let config: Config = ron::from_str("(client: (identity: \"abc123\"))").unwrap();
        assert_eq!(config.client.identity, "abc123");
        assert_eq!(config.client.frame_rate, 60);
        assert_eq!(config.network, NetworkConfig::default());
        assert_eq!(config.debug, DebugConfig::default());
    }

    #[test]
    fn test_unknown_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(render_distance: 16)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_log_level_is_unset() {
        assert!(Config::default().debug.log_level.is_empty());
    }

    #[test]
    fn test_durations_from_millis() {
        let network = NetworkConfig::default();
        assert_eq!(network.http_timeout(), Duration::from_secs(5));
        assert_eq!(network.connect_timeout(), Duration::from_secs(5));
        assert_eq!(network.leave_flush(), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_frame_rate_clamped() {
        let client = ClientConfig {
            frame_rate: 0,
            ..Default::default()
        };
        assert_eq!(client.frame_interval(), Duration::from_secs(1));

        let client = ClientConfig {
            frame_rate: 4,
            ..Default::default()
        };
        assert_eq!(client.frame_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.network.discovery_url = "http://10.0.0.1/status".to_string();
        config.client.identity = "abc123".to_string();

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.network.connect_timeout_ms = 250;
        modified.save(dir.path()).unwrap();

        let reloaded = config.reload(dir.path()).unwrap().unwrap();
        assert_eq!(reloaded.network.connect_timeout_ms, 250);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "(client: (frame_rate: \"fast\"))")
            .unwrap();
        assert!(matches!(
            Config::load_or_create(dir.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_default_config_dir_ends_with_app_name() {
        assert!(default_config_dir().ends_with("realm-client"));
    }
}
