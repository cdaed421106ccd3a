// MIT License - Copyright (c) 2026 Peter Wright
// Camera addressing and connection configuration

use std::fmt;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CAMERA_PORT, DEFAULT_HEARTBEAT_SECS, DEFAULT_RECONNECT_DELAY_MS, HEARTBEAT_MISS_LIMIT,
};
use crate::error::{DahuaError, Result};

/// Network location of one camera.
///
/// `port` is `None` when the input omitted it; the camera client then uses
/// [`DEFAULT_CAMERA_PORT`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CameraAddress {
    pub host: String,
    pub port: Option<u16>,
}

impl CameraAddress {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host` or `host:port`. Bracketed IPv6 (`[fe80::1]:80`) is accepted.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let invalid = || DahuaError::InvalidAddress {
            input: input.to_string(),
        };

        let (host, port) = if let Some(rest) = input.strip_prefix('[') {
            let (host, after) = rest.split_once(']').ok_or_else(invalid)?;
            match after.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if after.is_empty() => (host, None),
                None => return Err(invalid()),
            }
        } else {
            match input.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (input, None),
            }
        };

        if host.is_empty() {
            return Err(invalid());
        }
        let port = match port {
            Some(p) => Some(p.parse::<u16>().map_err(|_| invalid())?),
            None => None,
        };
        Ok(Self::new(host, port))
    }

    /// Port to connect to, falling back to the camera default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_CAMERA_PORT)
    }

    /// Base URL of the camera's HTTP API.
    pub fn base_url(&self) -> String {
        if self.host.contains(':') {
            format!("http://[{}]:{}", self.host, self.effective_port())
        } else {
            format!("http://{}:{}", self.host, self.effective_port())
        }
    }
}

impl fmt::Display for CameraAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => write!(f, "{}", self.host),
        }
    }
}

/// Camera login shared by every camera the bridge connects to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for connecting to a single camera.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub address: CameraAddress,
    pub credentials: Credentials,
    /// Delay before re-attaching to the event stream after it drops.
    pub reconnect_delay_ms: u64,
    /// Heartbeat interval requested from the camera, in seconds.
    pub heartbeat_secs: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            address: CameraAddress::new("192.168.1.108", None),
            credentials: Credentials::new("admin", ""),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
        }
    }
}

impl CameraConfig {
    pub fn builder() -> CameraConfigBuilder {
        CameraConfigBuilder::default()
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Longest gap between stream chunks before the stream is considered dead.
    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1) * HEARTBEAT_MISS_LIMIT)
    }
}

/// Builder for CameraConfig.
#[derive(Debug, Clone, Default)]
pub struct CameraConfigBuilder {
    config: CameraConfig,
}

impl CameraConfigBuilder {
    pub fn address(mut self, address: CameraAddress) -> Self {
        self.config.address = address;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.address.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.address.port = Some(port);
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = credentials;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.credentials.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.credentials.password = password.into();
        self
    }

    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.reconnect_delay_ms = ms;
        self
    }

    pub fn heartbeat_secs(mut self, secs: u64) -> Self {
        self.config.heartbeat_secs = secs;
        self
    }

    pub fn build(self) -> CameraConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_and_port() {
        let addr = CameraAddress::parse("10.0.0.5:80").unwrap();
        assert_eq!(addr.host, "10.0.0.5");
        assert_eq!(addr.port, Some(80));
    }

    #[test]
    fn test_parse_host_without_port() {
        let addr = CameraAddress::parse("garage.lan").unwrap();
        assert_eq!(addr.host, "garage.lan");
        assert_eq!(addr.port, None);
        assert_eq!(addr.effective_port(), DEFAULT_CAMERA_PORT);
    }

    #[test]
    fn test_parse_bracketed_ipv6() {
        let addr = CameraAddress::parse("[fe80::1]:8080").unwrap();
        assert_eq!(addr.host, "fe80::1");
        assert_eq!(addr.port, Some(8080));
        assert_eq!(addr.base_url(), "http://[fe80::1]:8080");

        let addr = CameraAddress::parse("[fe80::1]").unwrap();
        assert_eq!(addr.port, None);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(CameraAddress::parse("").is_err());
        assert!(CameraAddress::parse(":80").is_err());
        assert!(CameraAddress::parse("host:http").is_err());
        assert!(CameraAddress::parse("host:70000").is_err());
        assert!(CameraAddress::parse("[fe80::1").is_err());
    }

    #[test]
    fn test_port_is_normalized() {
        // Parsed as a number: leading zeros are dropped and an empty port is rejected
        assert_eq!(CameraAddress::parse("cam:0080").unwrap().to_string(), "cam:80");
        assert!(CameraAddress::parse("cam:").is_err());
    }

    #[test]
    fn test_stream_idle_timeout() {
        let config = CameraConfig::builder().heartbeat_secs(5).build();
        assert_eq!(config.stream_idle_timeout(), Duration::from_secs(15));

        let config = CameraConfig::builder().heartbeat_secs(0).build();
        assert_eq!(config.stream_idle_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_display_round_trips_input() {
        assert_eq!(CameraAddress::parse("10.0.0.5:81").unwrap().to_string(), "10.0.0.5:81");
        assert_eq!(CameraAddress::parse("10.0.0.5").unwrap().to_string(), "10.0.0.5");
    }

    #[test]
    fn test_base_url() {
        assert_eq!(CameraAddress::new("10.0.0.5", None).base_url(), "http://10.0.0.5:80");
        assert_eq!(CameraAddress::new("10.0.0.5", Some(8080)).base_url(), "http://10.0.0.5:8080");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("admin", "hunter2");
        let text = format!("{creds:?}");
        assert!(text.contains("admin"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_config_builder() {
        let config = CameraConfig::builder()
            .host("10.0.0.7")
            .port(8080)
            .username("viewer")
            .password("secret")
            .reconnect_delay_ms(500)
            .build();

        assert_eq!(config.address, CameraAddress::new("10.0.0.7", Some(8080)));
        assert_eq!(config.credentials, Credentials::new("viewer", "secret"));
        assert_eq!(config.reconnect_delay(), Duration::from_millis(500));
        assert_eq!(config.heartbeat_secs, DEFAULT_HEARTBEAT_SECS);
    }
}
