//! Recorder configuration.
//!
//! Stored as JSON. Credentials are never part of the configuration; see
//! [`crate::sink::CredentialsProvider`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ble::uuids::{ACCELERATION_CHARACTERISTIC_UUID, BAND_SERVICE_UUID};
use crate::error::{Error, Result};
use crate::session::SessionSettings;

/// Application directory name under the platform config and data dirs.
const APP_DIR: &str = "sensorband";

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Band identifier; the band advertises as `name_prefix` + `device_id`.
    pub device_id: String,

    /// Advertised name prefix.
    pub name_prefix: String,

    /// Discovery window in seconds.
    pub scan_timeout_secs: u64,

    /// Let the transport retry link establishment.
    pub auto_reconnect: bool,

    /// Connection attempts when `auto_reconnect` is set.
    pub connect_attempts: u32,

    /// Delay between connection attempts in milliseconds.
    pub retry_delay_ms: u64,

    /// Directory session logs are written to.
    pub log_dir: PathBuf,

    /// Identifier of the sensor service.
    pub service_uuid: String,

    /// Identifier of the data characteristic.
    pub characteristic_uuid: String,

    /// Remote stream settings; `None` disables forwarding.
    pub remote: Option<RemoteConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            device_id: "00".to_string(),
            name_prefix: "BP".to_string(),
            scan_timeout_secs: 10,
            auto_reconnect: true,
            connect_attempts: 3,
            retry_delay_ms: 1000,
            log_dir: data_dir.join("logs"),
            service_uuid: BAND_SERVICE_UUID.to_string(),
            characteristic_uuid: ACCELERATION_CHARACTERISTIC_UUID.to_string(),
            remote: None,
        }
    }
}

impl Config {
    /// Load configuration from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, or defaults if no file exists.
    pub fn load_default() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the default configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Check values that would make a session impossible.
    pub fn validate(&self) -> Result<()> {
        if self.device_id.trim().is_empty() {
            return Err(Error::Config("device_id must not be empty".to_string()));
        }
        if self.scan_timeout_secs == 0 {
            return Err(Error::Config("scan_timeout_secs must be positive".to_string()));
        }
        if self.connect_attempts == 0 {
            return Err(Error::Config("connect_attempts must be positive".to_string()));
        }
        if let Some(remote) = &self.remote {
            if remote.stream_name.trim().is_empty() {
                return Err(Error::Config("remote.stream_name must not be empty".to_string()));
            }
            if !remote.endpoint.starts_with("http://") && !remote.endpoint.starts_with("https://") {
                return Err(Error::Config(format!(
                    "remote.endpoint is not an http(s) URL: {}",
                    remote.endpoint
                )));
            }
        }
        Ok(())
    }

    /// Name the band advertises.
    pub fn band_name(&self) -> String {
        format!("{}{}", self.name_prefix, self.device_id)
    }

    /// Discovery window.
    pub fn scan_window(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    /// Delay between connection attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Settings for a session with the configured band.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            device_id: self.device_id.clone(),
            display_name: self.band_name(),
            service_uuid: self.service_uuid.clone(),
            characteristic_uuid: self.characteristic_uuid.clone(),
            auto_reconnect: self.auto_reconnect,
        }
    }
}

/// Remote stream configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Logical stream name.
    pub stream_name: String,

    /// Region of the stream.
    pub region: String,

    /// Base URL of the ingestion gateway.
    pub endpoint: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            stream_name: "acceleration".to_string(),
            region: "us-east-1".to_string(),
            endpoint: "https://localhost:8443".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl RemoteConfig {
    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
