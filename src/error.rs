// MIT License - Copyright (c) 2026 Peter Wright
// Error taxonomy for the camera bridge

/// All errors that can occur in the dahua-lan-bridge library.
#[derive(Debug, thiserror::Error)]
pub enum DahuaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} for {path}")]
    HttpStatus { status: u16, path: String },

    #[error("Camera rejected credentials for {path}")]
    Unauthorized { path: String },

    #[error("Invalid response: {details}")]
    InvalidResponse { details: String },

    #[error("Invalid camera address: {input}")]
    InvalidAddress { input: String },

    #[error("Invalid MQTT URL: {url}")]
    InvalidMqttUrl { url: String },

    #[error("Missing required setting: {name}")]
    MissingSetting { name: &'static str },

    #[error("No cams supplied and discovery disabled")]
    NoCameras,

    #[error("Discovery failed: {reason}")]
    DiscoveryFailed { reason: String },

    #[error("Failed to read config file {path}: {reason}")]
    ConfigFile { path: String, reason: String },

    #[error("No data on event stream for {secs}s")]
    StreamIdle { secs: u64 },

    #[error("Publish failed: {reason}")]
    Publish { reason: String },
}

impl DahuaError {
    /// Whether this error is transient and the connection should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            DahuaError::Io(_) | DahuaError::StreamIdle { .. } => true,
            DahuaError::Http(e) => !e.is_builder(),
            DahuaError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DahuaError>;
