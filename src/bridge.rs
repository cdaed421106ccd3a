// MIT License - Copyright (c) 2026 Peter Wright
// Per-camera wiring: name → subscription → relay

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::camera::CameraSession;
use crate::event::CameraEvent;
use crate::relay::{EventRelay, Publisher};

/// Drive one camera for the life of its event stream.
///
/// Name resolution failures are logged and end this camera's task only.
pub async fn run_camera<S, P>(session: S, relay: Arc<EventRelay<P>>)
where
    S: CameraSession,
    P: Publisher,
{
    let address = session.address().clone();
    info!("Connecting to camera at: {}", address.host);

    let name = match session.resolve_name().await {
        Ok(name) => name,
        Err(e) => {
            error!("Failed to get name of camera at {address}: {e}");
            return;
        }
    };
    info!("Camera at {address} is \"{name}\", listening for events");

    let mut events = session.listen_for_events();
    while let Some(event) = events.recv().await {
        match event {
            CameraEvent::Alarm(alarm) => relay.relay(&address, &name, &alarm).await,
            CameraEvent::Connected => info!("Camera \"{name}\" event stream connected"),
            CameraEvent::Disconnected => warn!("Camera \"{name}\" event stream disconnected"),
        }
    }
    events.close();
    info!("Camera \"{name}\" event stream closed");
}

/// All camera tasks sharing one relay.
pub struct Bridge<P> {
    relay: Arc<EventRelay<P>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<P: Publisher> Bridge<P> {
    pub fn new(relay: EventRelay<P>) -> Self {
        Self {
            relay: Arc::new(relay),
            tasks: Vec::new(),
        }
    }

    /// Start a camera on its own task; it never waits on any other camera.
    pub fn add_camera<S: CameraSession>(&mut self, session: S) {
        let relay = Arc::clone(&self.relay);
        self.tasks.push(tokio::spawn(run_camera(session, relay)));
    }

    pub fn camera_count(&self) -> usize {
        self.tasks.len()
    }

    /// Stop every camera task, closing their event subscriptions.
    pub async fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            let _ = task.await;
        }
    }
}
