// MIT License - Copyright (c) 2026 Peter Wright
// Bridge settings: CLI/env overrides merged over an optional TOML file

use std::path::Path;
use std::time::Duration;

use rumqttc::MqttOptions;
use serde::Deserialize;

use crate::config::{CameraAddress, CameraConfig, Credentials};
use crate::constants::{
    DEFAULT_CLIENT_ID, DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_HEARTBEAT_SECS, DEFAULT_KEEP_ALIVE_SECS,
    DEFAULT_LOG_LEVEL, DEFAULT_MQTT_PORT, DEFAULT_RECONNECT_DELAY_MS, DEFAULT_TOPIC_ROOT,
};
use crate::error::{DahuaError, Result};

// ---------------------------------------------------------------------------
// TOML file
// ---------------------------------------------------------------------------

/// Contents of the optional `--config` TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub mqtt: MqttToml,
    #[serde(default)]
    pub camera: CameraToml,
}

#[derive(Debug, Deserialize)]
pub struct MqttToml {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub topic_root: Option<String>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

impl Default for MqttToml {
    fn default() -> Self {
        Self {
            url: None,
            topic_root: None,
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}
fn default_keep_alive() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}

#[derive(Debug, Deserialize)]
pub struct CameraToml {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub cams: Vec<String>,
    #[serde(default)]
    pub discover: bool,
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,
}

impl Default for CameraToml {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            cams: Vec::new(),
            discover: false,
            discovery_timeout_secs: default_discovery_timeout(),
            reconnect_delay_ms: default_reconnect_delay(),
            heartbeat_secs: default_heartbeat(),
        }
    }
}

fn default_discovery_timeout() -> u64 {
    DEFAULT_DISCOVERY_TIMEOUT.as_secs()
}
fn default_reconnect_delay() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}
fn default_heartbeat() -> u64 {
    DEFAULT_HEARTBEAT_SECS
}

impl FileConfig {
    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_error = |reason: String| DahuaError::ConfigFile {
            path: path.display().to_string(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        Self::parse(&text).map_err(|e| config_error(e.to_string()))
    }

    pub fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

// ---------------------------------------------------------------------------
// CLI / environment overrides
// ---------------------------------------------------------------------------

/// Values supplied on the command line or through environment variables.
/// `None` / empty means "not given" and falls back to the file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub mqtt: Option<String>,
    pub topic_root: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub discover: bool,
    pub cams: Vec<String>,
}

// ---------------------------------------------------------------------------
// MQTT URL
// ---------------------------------------------------------------------------

/// Broker location parsed from `[mqtt|tcp://][user[:pass]@]host[:port][/]`.
///
/// Plain TCP is the only transport; TLS and websocket schemes are rejected
/// here so a misconfigured URL fails at startup rather than at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttUrl {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl MqttUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || DahuaError::InvalidMqttUrl {
            url: url.to_string(),
        };

        let rest = match url.split_once("://") {
            Some((scheme, rest)) => match scheme.to_ascii_lowercase().as_str() {
                "mqtt" | "tcp" => rest,
                _ => return Err(invalid()),
            },
            None => url,
        };

        // Only an empty path is meaningful for a TCP broker
        let authority = match rest.split_once('/') {
            Some((authority, "")) => authority,
            Some(_) => return Err(invalid()),
            None => rest,
        };

        let (userinfo, hostport) = match authority.rsplit_once('@') {
            Some((user, rest)) => (Some(user), rest),
            None => (None, authority),
        };

        let (host, port) = match hostport.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (hostport, DEFAULT_MQTT_PORT),
        };
        if host.is_empty() || host.contains(['?', '#']) {
            return Err(invalid());
        }

        let (username, password) = match userinfo {
            Some(info) => match info.split_once(':') {
                Some((u, p)) => (Some(u.to_string()), Some(p.to_string())),
                None => (Some(info.to_string()), None),
            },
            None => (None, None),
        };

        Ok(Self {
            host: host.to_string(),
            port,
            username,
            password,
        })
    }
}

/// Logging level from the command line, else the file, else the default.
///
/// Resolved separately from [`BridgeSettings::merge`] so logging can start
/// before configuration errors are reported.
pub fn resolve_log_level(cli: Option<&str>, file: Option<&FileConfig>) -> String {
    cli.map(str::to_string)
        .or_else(|| file.and_then(|f| f.log_level.clone()))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

// ---------------------------------------------------------------------------
// Merged settings
// ---------------------------------------------------------------------------

/// Fully resolved bridge settings, validated before any network activity.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// The broker URL as given, for log lines.
    pub mqtt_url: String,
    pub mqtt: MqttUrl,
    pub client_id: String,
    pub keep_alive: Duration,
    pub topic_root: String,
    pub credentials: Credentials,
    pub discover: bool,
    pub cams: Vec<CameraAddress>,
    pub discovery_timeout: Duration,
    pub reconnect_delay_ms: u64,
    pub heartbeat_secs: u64,
}

impl BridgeSettings {
    /// Merge overrides over the file config and validate required values.
    pub fn merge(overrides: SettingsOverrides, file: FileConfig) -> Result<Self> {
        let mqtt_url = overrides
            .mqtt
            .or(file.mqtt.url)
            .ok_or(DahuaError::MissingSetting { name: "mqtt" })?;
        let username = overrides
            .username
            .or(file.camera.username)
            .ok_or(DahuaError::MissingSetting { name: "username" })?;
        let password = overrides
            .password
            .or(file.camera.password)
            .ok_or(DahuaError::MissingSetting { name: "password" })?;

        let cam_strings = if overrides.cams.is_empty() {
            file.camera.cams
        } else {
            overrides.cams
        };
        let cams = cam_strings
            .iter()
            .map(|s| CameraAddress::parse(s))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            mqtt: MqttUrl::parse(&mqtt_url)?,
            mqtt_url,
            client_id: file.mqtt.client_id,
            keep_alive: Duration::from_secs(file.mqtt.keep_alive_secs),
            topic_root: overrides
                .topic_root
                .or(file.mqtt.topic_root)
                .unwrap_or_else(|| DEFAULT_TOPIC_ROOT.to_string()),
            credentials: Credentials::new(username, password),
            discover: overrides.discover || file.camera.discover,
            cams,
            discovery_timeout: Duration::from_secs(file.camera.discovery_timeout_secs),
            reconnect_delay_ms: file.camera.reconnect_delay_ms,
            heartbeat_secs: file.camera.heartbeat_secs,
        })
    }

    /// MQTT client options for the configured broker.
    pub fn mqtt_options(&self) -> MqttOptions {
        let mut opts = MqttOptions::new(&self.client_id, &self.mqtt.host, self.mqtt.port);
        opts.set_keep_alive(self.keep_alive);
        if let Some(username) = &self.mqtt.username {
            opts.set_credentials(username, self.mqtt.password.as_deref().unwrap_or(""));
        }
        opts
    }

    /// Per-camera connection config for one resolved address.
    pub fn camera_config(&self, address: CameraAddress) -> CameraConfig {
        CameraConfig::builder()
            .address(address)
            .credentials(self.credentials.clone())
            .reconnect_delay_ms(self.reconnect_delay_ms)
            .heartbeat_secs(self.heartbeat_secs)
            .build()
    }
}
