use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::error::FieldcallError;
use crate::models::{Identity, Role};

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigLoadError> for FieldcallError {
    fn from(err: ConfigLoadError) -> Self {
        match err {
            ConfigLoadError::Config(inner) => inner.into(),
            ConfigLoadError::MissingRequired(key) => FieldcallError::MissingEnvVar(key),
            ConfigLoadError::InvalidValue { key, message } => {
                FieldcallError::InvalidConfigValue { key, message }
            }
            ConfigLoadError::Io(inner) => inner.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FieldcallConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Local actor and bearer credential. The core never reads these ad hoc;
/// front ends turn them into an [`Identity`] once at start-up.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdentityConfig {
    #[serde(default)]
    pub user_id: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// What happens to signals that arrive before the peer connection exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarlySignalPolicy {
    #[default]
    Drop,
    Queue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_offer_delay")]
    pub offer_delay_ms: u64,

    #[serde(default)]
    pub early_signal_policy: EarlySignalPolicy,

    #[serde(default = "default_early_signal_capacity")]
    pub early_signal_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_notification_expiry")]
    pub expiry_secs: u64,

    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_video_width")]
    pub video_width: u32,

    #[serde(default = "default_video_height")]
    pub video_height: u32,

    #[serde(default = "default_true")]
    pub audio: bool,

    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_offer_delay() -> u64 {
    500
}

fn default_early_signal_capacity() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    5
}

fn default_notification_expiry() -> u64 {
    8
}

fn default_history_size() -> usize {
    50
}

fn default_video_width() -> u32 {
    1280
}

fn default_video_height() -> u32 {
    720
}

fn default_ice_servers() -> Vec<String> {
    vec![
        "stun:stun.l.google.com:19302".to_string(),
        "stun:stun1.l.google.com:19302".to_string(),
    ]
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: default_ws_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            offer_delay_ms: default_offer_delay(),
            early_signal_policy: EarlySignalPolicy::default(),
            early_signal_capacity: default_early_signal_capacity(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_poll_interval(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            expiry_secs: default_notification_expiry(),
            history_size: default_history_size(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            video_width: default_video_width(),
            video_height: default_video_height(),
            audio: true,
            ice_servers: default_ice_servers(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl SessionConfig {
    pub fn offer_delay(&self) -> Duration {
        Duration::from_millis(self.offer_delay_ms)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl NotificationsConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }
}

impl FieldcallConfig {
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from_paths(get_config_paths())
    }

    pub fn load_from_paths(paths: Vec<PathBuf>) -> Result<Self, ConfigLoadError> {
        load_dotenv_files();

        let mut builder = ConfigBuilder::builder();

        for path in paths {
            if path.exists() {
                builder = builder.add_source(File::from(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("FIELDCALL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;

        let mut fieldcall_config: FieldcallConfig = config.try_deserialize()?;

        if let Ok(token) = std::env::var("FIELDCALL_TOKEN") {
            fieldcall_config.identity.token = Some(token);
        }

        if let Ok(url) = std::env::var("FIELDCALL_API_URL") {
            fieldcall_config.api.base_url = url;
        }

        if let Ok(level) = std::env::var("FIELDCALL_LOG_LEVEL") {
            fieldcall_config.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            fieldcall_config.logging.level = level;
        }

        fieldcall_config.validate()?;

        Ok(fieldcall_config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.api.base_url.is_empty() {
            return Err(ConfigLoadError::MissingRequired("api.base_url".to_string()));
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(ConfigLoadError::InvalidValue {
                key: "api.base_url".to_string(),
                message: "Must start with http:// or https://".to_string(),
            });
        }

        if !self.api.ws_url.starts_with("ws://") && !self.api.ws_url.starts_with("wss://") {
            return Err(ConfigLoadError::InvalidValue {
                key: "api.ws_url".to_string(),
                message: "Must start with ws:// or wss://".to_string(),
            });
        }

        if self.api.request_timeout_secs == 0 {
            return Err(ConfigLoadError::InvalidValue {
                key: "api.request_timeout_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if !self.identity.role.is_empty() && Role::parse(&self.identity.role).is_none() {
            return Err(ConfigLoadError::InvalidValue {
                key: "identity.role".to_string(),
                message: format!(
                    "Unknown role '{}'. Must be farmer or specialist",
                    self.identity.role
                ),
            });
        }

        if self.polling.interval_secs == 0 {
            return Err(ConfigLoadError::InvalidValue {
                key: "polling.interval_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.notifications.expiry_secs == 0 {
            return Err(ConfigLoadError::InvalidValue {
                key: "notifications.expiry_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.session.early_signal_policy == EarlySignalPolicy::Queue
            && self.session.early_signal_capacity == 0
        {
            return Err(ConfigLoadError::InvalidValue {
                key: "session.early_signal_capacity".to_string(),
                message: "Must be greater than 0 when early signals are queued".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level_lower = self.logging.level.to_lowercase();
        if !valid_levels.contains(&level_lower.as_str()) && !level_lower.contains('=') {
            return Err(ConfigLoadError::InvalidValue {
                key: "logging.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Must be one of: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        Ok(())
    }

    /// Builds the local actor from the `identity` section.
    pub fn identity(&self) -> Result<Identity, ConfigLoadError> {
        if self.identity.user_id.is_empty() {
            return Err(ConfigLoadError::MissingRequired(
                "identity.user_id (FIELDCALL_IDENTITY__USER_ID)".to_string(),
            ));
        }

        let role = Role::parse(&self.identity.role).ok_or_else(|| {
            ConfigLoadError::MissingRequired(
                "identity.role (FIELDCALL_IDENTITY__ROLE)".to_string(),
            )
        })?;

        let display_name = if self.identity.display_name.is_empty() {
            self.identity.user_id.clone()
        } else {
            self.identity.display_name.clone()
        };

        Ok(Identity::new(&self.identity.user_id, display_name, role))
    }

    pub fn token(&self) -> Option<&str> {
        self.identity.token.as_deref()
    }

    pub fn log_level(&self) -> &str {
        &self.logging.level
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("config").join("default.toml"));
        paths.push(cwd.join("config").join("local.toml"));
        paths.push(cwd.join("fieldcall.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("fieldcall").join("config.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".fieldcall").join("config.toml"));
    }

    paths
}

fn load_dotenv_files() {
    for path in get_dotenv_paths() {
        if path.exists() {
            let _ = dotenvy::from_path(&path);
        }
    }
}

fn get_dotenv_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".env"));
        paths.push(cwd.join(".env.local"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".fieldcall").join(".env"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("fieldcall").join(".env"));
    }

    paths
}

pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fieldcall"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = FieldcallConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.ws_url, "ws://localhost:8000");
        assert_eq!(config.session.offer_delay_ms, 500);
        assert_eq!(config.session.early_signal_policy, EarlySignalPolicy::Drop);
        assert_eq!(config.polling.interval_secs, 5);
        assert_eq!(config.notifications.expiry_secs, 8);
        assert_eq!(config.media.video_width, 1280);
        assert_eq!(config.media.video_height, 720);
        assert_eq!(config.media.ice_servers.len(), 2);
        assert_eq!(config.log_level(), "warn");
    }

    #[test]
    fn test_validation_valid_config() {
        let config = FieldcallConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_base_url() {
        let mut config = FieldcallConfig::default();
        config.api.base_url = "localhost:8000".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigLoadError::InvalidValue { key, .. }) if key == "api.base_url"
        ));

        config.api.base_url = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigLoadError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_validation_invalid_ws_url() {
        let mut config = FieldcallConfig::default();
        config.api.ws_url = "http://localhost:8000".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_intervals() {
        let mut config = FieldcallConfig::default();
        config.polling.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = FieldcallConfig::default();
        config.notifications.expiry_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_queue_capacity() {
        let mut config = FieldcallConfig::default();
        config.session.early_signal_capacity = 0;
        assert!(config.validate().is_ok());

        config.session.early_signal_policy = EarlySignalPolicy::Queue;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_log_level() {
        let mut config = FieldcallConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "fieldcall_core=debug,warn".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_unknown_role() {
        let mut config = FieldcallConfig::default();
        config.identity.role = "admin".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_identity_from_config() {
        let mut config = FieldcallConfig::default();
        assert!(config.identity().is_err());

        config.identity.user_id = "f-1".to_string();
        config.identity.role = "farmer".to_string();
        let identity = config.identity().unwrap();
        assert_eq!(identity.role, Role::Requester);
        assert_eq!(identity.display_name, "f-1");

        config.identity.display_name = "Ravi".to_string();
        assert_eq!(config.identity().unwrap().display_name, "Ravi");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldcall.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[api]
base_url = "https://consult.example.org"
ws_url = "wss://consult.example.org"

[identity]
user_id = "s-7"
display_name = "Dr. Rao"
role = "specialist"

[session]
early_signal_policy = "queue"
early_signal_capacity = 8

[polling]
interval_secs = 3
"#
        )
        .unwrap();

        let config = FieldcallConfig::load_from_paths(vec![path]).unwrap();
        assert_eq!(config.api.ws_url, "wss://consult.example.org");
        assert_eq!(config.session.early_signal_policy, EarlySignalPolicy::Queue);
        assert_eq!(config.session.early_signal_capacity, 8);
        assert_eq!(config.polling.interval_secs, 3);
        assert_eq!(config.notifications.expiry_secs, 8);
        assert_eq!(config.identity().unwrap().role, Role::Responder);
    }

    #[test]
    fn test_config_load_error_maps_to_fieldcall_error() {
        let err: FieldcallError = ConfigLoadError::InvalidValue {
            key: "polling.interval_secs".to_string(),
            message: "Must be greater than 0".to_string(),
        }
        .into();
        assert!(err.is_config_error());
        assert_eq!(err.error_code(), "E2003");
    }

    #[test]
    fn test_directory_helpers() {
        if let Some(dir) = get_config_dir() {
            assert!(dir.ends_with("fieldcall"));
        }
    }
}
