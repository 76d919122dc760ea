//! Hub configuration.
//!
//! Stored as TOML:
//! - Linux: `~/.config/printlink/hub.toml`
//! - Windows: `%APPDATA%/printlink/hub.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use printlink_hub_control::{FleetOptions, UploadOptions};
use printlink_protocol::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_COMMAND_RESULT_TIMEOUT, DEFAULT_TOPIC_PREFIX,
    DEFAULT_UPLOAD_RESULT_TIMEOUT, MAX_CHUNK_SIZE,
};

/// Longest result wait a config file can ask for.
const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Display name of this hub (hostname by default).
    #[serde(default = "default_name")]
    pub name: String,

    /// WebSocket endpoint of the broker bridge.
    #[serde(default = "default_broker_url")]
    pub broker_url: String,

    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Raw bytes per upload chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Diagnosis service endpoint. Empty disables `diagnose`.
    #[serde(default)]
    pub diagnosis_url: String,

    #[serde(default)]
    pub diagnosis_api_key: String,
}

fn default_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "printlink hub".into())
}

fn default_broker_url() -> String {
    "ws://127.0.0.1:9001/bridge".into()
}

fn default_topic_prefix() -> String {
    DEFAULT_TOPIC_PREFIX.into()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_upload_timeout() -> u64 {
    DEFAULT_UPLOAD_RESULT_TIMEOUT.as_secs()
}

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_RESULT_TIMEOUT.as_secs()
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            broker_url: default_broker_url(),
            topic_prefix: default_topic_prefix(),
            chunk_size: default_chunk_size(),
            upload_timeout_secs: default_upload_timeout(),
            command_timeout_secs: default_command_timeout(),
            diagnosis_url: String::new(),
            diagnosis_api_key: String::new(),
        }
    }
}

impl HubConfig {
    /// Loads the configuration at `path`, or the platform default location.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load_from(p),
            None => Self::load_from(&config_path()),
        }
    }

    /// Reads `path`, writing a default file there if none exists.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: HubConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = HubConfig::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // May contain the diagnosis API key.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Fleet settings derived from this file. The chunk size is clamped to
    /// what controllers accept, timeouts to one day.
    pub fn fleet_options(&self) -> FleetOptions {
        FleetOptions {
            topic_prefix: self.topic_prefix.clone(),
            upload: UploadOptions {
                chunk_size: self.chunk_size.clamp(1, MAX_CHUNK_SIZE),
                result_timeout: Duration::from_secs(self.upload_timeout_secs.min(MAX_TIMEOUT_SECS)),
            },
            command_timeout: Duration::from_secs(self.command_timeout_secs.min(MAX_TIMEOUT_SECS)),
            ..FleetOptions::default()
        }
    }
}

/// Platform-specific configuration file path.
pub fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("printlink").join("hub.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("printlink")
            .join("hub.toml")
    }
}
