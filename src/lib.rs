// MIT License - Copyright (c) 2026 Peter Wright
//
//! # dahua-lan-bridge
//!
//! Relays alarm events from Dahua IP cameras to MQTT.
//!
//! Cameras are given explicitly as `host[:port]` or found with an ONVIF
//! WS-Discovery probe. Each camera gets its own session: the display name is
//! queried once, then the CGI event stream is attached and every decoded
//! alarm is published as
//! `<root>/name/<name>/code/<code>/action/<action>/index/<index>` with a JSON
//! body of `{host, port, name, code, action, index}`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dahua_lan_bridge::{Bridge, CameraConfig, DahuaCamera, EventRelay};
//! use rumqttc::{AsyncClient, MqttOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (client, mut eventloop) =
//!         AsyncClient::new(MqttOptions::new("dahua2mqtt", "localhost", 1883), 256);
//!     tokio::spawn(async move { while eventloop.poll().await.is_ok() {} });
//!
//!     let mut bridge = Bridge::new(EventRelay::new(client, "cam/dahua"));
//!     let config = CameraConfig::builder()
//!         .host("192.168.1.108")
//!         .username("admin")
//!         .password("secret")
//!         .build();
//!     bridge.add_camera(DahuaCamera::open(config)?);
//!
//!     tokio::signal::ctrl_c().await?;
//!     bridge.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod camera;
pub mod config;
pub mod constants;
pub mod digest;
pub mod discovery;
pub mod error;
pub mod event;
pub mod protocol;
pub mod relay;
pub mod resolver;
pub mod settings;

// Re-exports for convenience
pub use bridge::{run_camera, Bridge};
pub use camera::{CameraSession, DahuaCamera};
pub use config::{CameraAddress, CameraConfig, CameraConfigBuilder, Credentials};
pub use discovery::{Discover, OnvifDiscovery};
pub use error::{DahuaError, Result};
pub use event::{AlarmEvent, CameraEvent, EventReceiver, EventSubscription};
pub use relay::{AlarmPayload, EventRelay, OutboundMessage, Publisher};
pub use resolver::CameraResolver;
pub use settings::{BridgeSettings, FileConfig, MqttUrl, SettingsOverrides};
