// MIT License - Copyright (c) 2026 Peter Wright
// MQTT bridge

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rumqttc::{AsyncClient, Event, Outgoing, Packet};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use dahua_lan_bridge::constants::MQTT_QUEUE_CAPACITY;
use dahua_lan_bridge::{
    Bridge, BridgeSettings, CameraResolver, DahuaCamera, EventRelay, FileConfig, OnvifDiscovery,
    SettingsOverrides,
};
use dahua_lan_bridge::settings::resolve_log_level;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "dahua2mqtt")]
#[command(about = "Bridge between Dahua camera alarm events and MQTT")]
struct Cli {
    /// MQTT URL
    #[arg(short = 'm', long, env = "MQTT")]
    mqtt: Option<String>,

    /// Topic root to post messages to [default: cam/dahua]
    #[arg(short = 'r', long = "mqttTopicRoot", alias = "mqtt-topic-root", env = "MQTT_TOPIC_ROOT")]
    mqtt_topic_root: Option<String>,

    /// Username to connect to cams
    #[arg(short = 'u', long, env = "USERNAME")]
    username: Option<String>,

    /// Password to connect to cams
    #[arg(short = 'p', long, env = "PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Logging level (debug/info/warn/error); RUST_LOG takes precedence [default: info]
    #[arg(short = 'l', long = "logLevel", alias = "log-level", env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Discover local cams with ONVIF
    #[arg(short = 'd', long, env = "DISCOVER")]
    discover: bool,

    /// Cam as <hostname>:<port> (or omit :<port> for default port)
    #[arg(short = 'c', long, env = "CAM", value_delimiter = ',')]
    cam: Vec<String>,

    /// Optional TOML configuration file; flags and environment override it
    #[arg(long, env = "CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            mqtt: self.mqtt.clone(),
            topic_root: self.mqtt_topic_root.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            discover: self.discover,
            cams: self.cam.clone(),
        }
    }
}

fn init_logging(level: &str) {
    // RUST_LOG controls verbosity when set; otherwise the configured level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file = cli.config.as_ref().map(FileConfig::load).transpose();
    let log_level = resolve_log_level(
        cli.log_level.as_deref(),
        file.as_ref().ok().and_then(|f| f.as_ref()),
    );
    init_logging(&log_level);

    // Everything up to here is offline; configuration errors exit before any connection
    let settings = match file.and_then(|f| BridgeSettings::merge(cli.overrides(), f.unwrap_or_default())) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let resolver = CameraResolver::new(settings.cams.clone(), settings.discover);
    if let Err(e) = resolver.check_sources() {
        error!("{e}!");
        std::process::exit(1);
    }

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    // Bus client
    let (client, mut eventloop) = AsyncClient::new(settings.mqtt_options(), MQTT_QUEUE_CAPACITY);
    let mqtt_url = settings.mqtt_url.clone();
    let mqtt_handle = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to mqtt broker at {mqtt_url}");
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    debug!("MQTT: disconnect sent");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    // Polling again reconnects
                    error!("Error from mqtt broker: {e}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    // Cameras
    let discovery = OnvifDiscovery::new(settings.discovery_timeout);
    let cams = resolver
        .resolve(&discovery)
        .await
        .context("Camera discovery failed")?;
    if cams.is_empty() {
        warn!("No cameras found; nothing to relay");
    }

    let mut bridge = Bridge::new(EventRelay::new(client.clone(), settings.topic_root.clone()));
    for address in cams {
        match DahuaCamera::open(settings.camera_config(address.clone())) {
            Ok(camera) => bridge.add_camera(camera),
            Err(e) => error!("Failed to set up camera at {address}: {e}"),
        }
    }

    info!(
        "MQTT bridge running with {} camera(s). Send SIGINT/SIGTERM to stop.",
        bridge.camera_count()
    );
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    bridge.shutdown().await;
    if let Err(e) = client.disconnect().await {
        warn!("Error disconnecting from mqtt broker: {e}");
    }
    if tokio::time::timeout(Duration::from_secs(1), mqtt_handle).await.is_err() {
        debug!("MQTT event loop did not stop in time");
    }

    info!("Shutdown complete");
    Ok(())
}
