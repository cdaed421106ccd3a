// MIT License - Copyright (c) 2026 Peter Wright
// Camera and bus protocol defaults

use std::time::Duration;

/// Default HTTP port of the camera CGI API.
pub const DEFAULT_CAMERA_PORT: u16 = 80;

/// Default MQTT broker port when the URL omits one.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Default prefix for every published topic.
pub const DEFAULT_TOPIC_ROOT: &str = "cam/dahua";

pub const DEFAULT_CLIENT_ID: &str = "dahua2mqtt";

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;

/// How long a discovery probe collects replies.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay before the event listener re-attaches after the stream drops.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 10000;

/// Heartbeat interval requested from the camera on the event stream (seconds).
pub const DEFAULT_HEARTBEAT_SECS: u64 = 5;

/// Missed heartbeats after which a silent event stream is treated as dead.
pub const HEARTBEAT_MISS_LIMIT: u64 = 3;

/// Capacity of the per-camera event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the MQTT client request queue.
pub const MQTT_QUEUE_CAPACITY: usize = 256;

/// WS-Discovery multicast group and port.
pub const WS_DISCOVERY_ADDR: &str = "239.255.255.250:3702";

/// CGI paths.
pub const MACHINE_NAME_PATH: &str = "/cgi-bin/magicBox.cgi?action=getMachineName";
pub const EVENT_ATTACH_PATH: &str = "/cgi-bin/eventManager.cgi?action=attach&codes=[All]";

/// Connect timeout for camera HTTP requests.
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
