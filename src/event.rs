// MIT License - Copyright (c) 2026 Peter Wright
// Camera events and the subscription handle

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// A decoded alarm notification from a camera's event subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmEvent {
    /// Event code, e.g. `VideoMotion`, `CrossLineDetection`.
    pub code: String,
    /// Usually `Start`, `Stop` or `Pulse`.
    pub action: String,
    /// Channel index the event belongs to.
    pub index: i64,
}

impl AlarmEvent {
    pub fn new(code: impl Into<String>, action: impl Into<String>, index: i64) -> Self {
        Self {
            code: code.into(),
            action: action.into(),
            index,
        }
    }
}

/// Everything a camera session emits to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    /// Event stream attached
    Connected,
    /// Event stream lost; the listener re-attaches after its reconnect delay
    Disconnected,
    /// A decoded alarm
    Alarm(AlarmEvent),
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<CameraEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<CameraEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}

/// Handle on a camera's event stream.
///
/// Dropping or closing the handle stops the listener task that feeds it.
pub struct EventSubscription {
    rx: EventReceiver,
    listener: Option<JoinHandle<()>>,
}

impl EventSubscription {
    pub fn new(rx: EventReceiver, listener: JoinHandle<()>) -> Self {
        Self {
            rx,
            listener: Some(listener),
        }
    }

    /// Subscription fed by a sender the caller owns; no listener task.
    pub fn from_receiver(rx: EventReceiver) -> Self {
        Self { rx, listener: None }
    }

    /// Next event, or `None` once the stream is closed for good.
    ///
    /// Lagged receivers skip ahead and keep going.
    pub async fn recv(&mut self) -> Option<CameraEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Event receiver lagged, missed {n} events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Stop the listener and release the camera connection.
    pub fn close(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
