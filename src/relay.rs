// MIT License - Copyright (c) 2026 Peter Wright
// Alarm event → MQTT message relay

use std::future::Future;

use rumqttc::{AsyncClient, QoS};
use serde::Serialize;
use tracing::{debug, error};

use crate::config::CameraAddress;
use crate::error::{DahuaError, Result};
use crate::event::AlarmEvent;

/// Message bus the relay publishes to.
pub trait Publisher: Send + Sync + 'static {
    /// Hand one message to the bus. Completion means "queued", not "delivered".
    fn publish(&self, topic: String, payload: String) -> impl Future<Output = Result<()>> + Send;
}

impl Publisher for AsyncClient {
    fn publish(&self, topic: String, payload: String) -> impl Future<Output = Result<()>> + Send {
        async move {
            AsyncClient::publish(self, topic, QoS::AtMostOnce, false, payload)
                .await
                .map_err(|e| DahuaError::Publish {
                    reason: e.to_string(),
                })
        }
    }
}

/// JSON body of a published alarm. `port` is omitted when the camera
/// address had none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlarmPayload {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    pub name: String,
    pub code: String,
    pub action: String,
    pub index: i64,
}

/// Topic and payload derived from one alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: AlarmPayload,
}

impl OutboundMessage {
    /// Build the message for `event` from the camera at `address` named `name`.
    ///
    /// Topic: `<root>/name/<name>/code/<code>/action/<action>/index/<index>`.
    pub fn build(topic_root: &str, address: &CameraAddress, name: &str, event: &AlarmEvent) -> Self {
        let topic = format!(
            "{topic_root}/name/{name}/code/{}/action/{}/index/{}",
            event.code, event.action, event.index
        );
        Self {
            topic,
            payload: AlarmPayload {
                host: address.host.clone(),
                port: address.port.map(|p| p.to_string()),
                name: name.to_string(),
                code: event.code.clone(),
                action: event.action.clone(),
                index: event.index,
            },
        }
    }

    pub fn payload_json(&self) -> Result<String> {
        serde_json::to_string(&self.payload).map_err(|e| DahuaError::Publish {
            reason: format!("Failed to serialize payload: {e}"),
        })
    }
}

/// Publishes alarms from any number of cameras through one shared bus client.
pub struct EventRelay<P> {
    publisher: P,
    topic_root: String,
}

impl<P: Publisher> EventRelay<P> {
    pub fn new(publisher: P, topic_root: impl Into<String>) -> Self {
        Self {
            publisher,
            topic_root: topic_root.into(),
        }
    }

    pub fn message(&self, address: &CameraAddress, name: &str, event: &AlarmEvent) -> OutboundMessage {
        OutboundMessage::build(&self.topic_root, address, name, event)
    }

    /// Publish one alarm. Failures are logged; nothing is retried.
    pub async fn relay(&self, address: &CameraAddress, name: &str, event: &AlarmEvent) {
        let message = self.message(address, name, event);
        debug!(
            "Received alarm {}, {}, {}",
            event.code, event.action, event.index
        );
        debug!("Publishing to {}", message.topic);

        let payload = match message.payload_json() {
            Ok(json) => json,
            Err(e) => {
                error!("{e}");
                return;
            }
        };
        if let Err(e) = self.publisher.publish(message.topic.clone(), payload).await {
            error!("Failed to publish to {}: {e}", message.topic);
        }
    }
}
