// MIT License - Copyright (c) 2026 Peter Wright
// Camera session over the CGI HTTP API

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Response, StatusCode};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, info, warn};

use crate::config::{CameraAddress, CameraConfig, Credentials};
use crate::constants::{EVENT_CHANNEL_CAPACITY, HTTP_CONNECT_TIMEOUT};
use crate::digest::Challenge;
use crate::error::{DahuaError, Result};
use crate::event::{event_channel, CameraEvent, EventSender, EventSubscription};
use crate::protocol::{parse_machine_name, EventStreamDecoder, Request};

/// One camera as seen by the bridge.
///
/// Implementations must not block at construction; all network work happens
/// in [`resolve_name`](CameraSession::resolve_name) and in the listener behind
/// [`listen_for_events`](CameraSession::listen_for_events).
pub trait CameraSession: Send + Sync + 'static {
    fn address(&self) -> &CameraAddress;

    /// Query the camera's display name, trimmed of surrounding whitespace.
    fn resolve_name(&self) -> impl Future<Output = Result<String>> + Send;

    /// Start streaming events. Each call opens its own stream.
    fn listen_for_events(&self) -> EventSubscription;
}

/// Session with a Dahua camera.
///
/// # Example
///
/// ```no_run
/// use dahua_lan_bridge::{CameraConfig, CameraSession, DahuaCamera};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = CameraConfig::builder()
///         .host("192.168.1.108")
///         .username("admin")
///         .password("secret")
///         .build();
///
///     let camera = DahuaCamera::open(config)?;
///     println!("Camera name: {}", camera.resolve_name().await?);
///
///     let mut events = camera.listen_for_events();
///     while let Some(event) = events.recv().await {
///         println!("Event: {:?}", event);
///     }
///     Ok(())
/// }
/// ```
pub struct DahuaCamera {
    config: CameraConfig,
    api: HttpApi,
}

impl DahuaCamera {
    /// Build a session. No network I/O happens here.
    pub fn open(config: CameraConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()?;
        let api = HttpApi {
            client,
            base_url: config.address.base_url(),
            credentials: config.credentials.clone(),
            challenge: Arc::new(Mutex::new(None)),
            nc: Arc::new(AtomicU32::new(0)),
        };
        Ok(Self { config, api })
    }
}

impl CameraSession for DahuaCamera {
    fn address(&self) -> &CameraAddress {
        &self.config.address
    }

    fn resolve_name(&self) -> impl Future<Output = Result<String>> + Send {
        let api = self.api.clone();
        async move {
            let body = api.get(&Request::MachineName.path()).await?.text().await?;
            parse_machine_name(&body)
                .map(|name| name.trim().to_string())
                .ok_or_else(|| DahuaError::InvalidResponse {
                    details: format!("getMachineName returned: {}", body.trim()),
                })
        }
    }

    fn listen_for_events(&self) -> EventSubscription {
        let (tx, rx) = event_channel(EVENT_CHANNEL_CAPACITY);
        let api = self.api.clone();
        let path = Request::AttachEvents {
            heartbeat_secs: self.config.heartbeat_secs,
        }
        .path();
        let delay = self.config.reconnect_delay();
        let idle = self.config.stream_idle_timeout();
        let host = self.config.address.to_string();

        let listener = tokio::spawn(async move {
            loop {
                match stream_events(&api, &path, idle, &tx).await {
                    Ok(()) => warn!("Event stream from {host} ended"),
                    Err(e) if e.is_retryable() => warn!("Event stream from {host} failed: {e}"),
                    Err(e) => {
                        error!("Event stream from {host} stopped: {e}");
                        let _ = tx.send(CameraEvent::Disconnected);
                        break;
                    }
                }
                let _ = tx.send(CameraEvent::Disconnected);
                info!(
                    "Re-attaching to {host} event stream in {:.1}s",
                    delay.as_secs_f64()
                );
                sleep(delay).await;
            }
        });

        EventSubscription::new(rx, listener)
    }
}

/// Attach once and forward decoded alarms until the stream ends.
///
/// The camera writes a heartbeat section every `heartbeat` seconds, so a
/// stream silent for longer than `idle` is dropped and reported as retryable.
async fn stream_events(api: &HttpApi, path: &str, idle: Duration, tx: &EventSender) -> Result<()> {
    let mut response = api.get(path).await?;
    debug!("Attached to event stream {path}");
    let _ = tx.send(CameraEvent::Connected);

    let mut decoder = EventStreamDecoder::new();
    loop {
        let chunk = match timeout(idle, response.chunk()).await {
            Ok(chunk) => chunk?,
            Err(_) => return Err(DahuaError::StreamIdle { secs: idle.as_secs() }),
        };
        let Some(chunk) = chunk else { break };
        for event in decoder.push(&chunk) {
            let _ = tx.send(CameraEvent::Alarm(event));
        }
    }
    Ok(())
}

/// Authenticated GET requests against one camera.
///
/// The last challenge is cached so later requests authenticate up front; a
/// fresh 401 replaces it (stale nonce) and the request is retried once.
#[derive(Clone)]
struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    challenge: Arc<Mutex<Option<Challenge>>>,
    nc: Arc<AtomicU32>,
}

impl HttpApi {
    async fn get(&self, path: &str) -> Result<Response> {
        let cached = self.challenge.lock().ok().and_then(|c| c.clone());
        let mut response = self.send(path, cached.as_ref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let challenge = pick_challenge(&response).ok_or_else(|| DahuaError::Unauthorized {
                path: path.to_string(),
            })?;
            if let Ok(mut slot) = self.challenge.lock() {
                *slot = Some(challenge.clone());
                // Nonce counts restart with each new nonce
                self.nc.store(0, Ordering::Relaxed);
            }
            response = self.send(path, Some(&challenge)).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(DahuaError::Unauthorized {
                    path: path.to_string(),
                });
            }
        }

        if !response.status().is_success() {
            return Err(DahuaError::HttpStatus {
                status: response.status().as_u16(),
                path: path.to_string(),
            });
        }
        Ok(response)
    }

    async fn send(&self, path: &str, challenge: Option<&Challenge>) -> Result<Response> {
        let mut request = self.client.get(format!("{}{}", self.base_url, path));
        match challenge {
            Some(Challenge::Basic) => {
                request = request.basic_auth(
                    &self.credentials.username,
                    Some(&self.credentials.password),
                );
            }
            Some(Challenge::Digest(digest)) => {
                let nc = self.nc.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
                let cnonce = uuid::Uuid::new_v4().simple().to_string();
                request = request.header(
                    AUTHORIZATION,
                    digest.authorization(&self.credentials, "GET", path, nc, &cnonce),
                );
            }
            None => {}
        }
        Ok(request.send().await?)
    }
}

/// Prefer a Digest challenge over Basic when the camera offers both.
fn pick_challenge(response: &Response) -> Option<Challenge> {
    let challenges: Vec<Challenge> = response
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(Challenge::parse)
        .collect();
    challenges
        .iter()
        .find(|c| matches!(c, Challenge::Digest(_)))
        .or_else(|| challenges.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use crate::event::AlarmEvent;

    const CHALLENGE: &str =
        "HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Digest realm=\"Login to cam\", qop=\"auth\", nonce=\"12345\", opaque=\"abc\"\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    async fn read_head(stream: &mut TcpStream) -> String {
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        String::from_utf8_lossy(&head).to_string()
    }

    fn is_authorized(head: &str) -> bool {
        head.to_lowercase().contains("authorization: digest username=\"admin\"")
    }

    fn camera_for(listener: &TcpListener) -> DahuaCamera {
        let port = listener.local_addr().unwrap().port();
        let config = CameraConfig::builder()
            .host("127.0.0.1")
            .port(port)
            .username("admin")
            .password("secret")
            .reconnect_delay_ms(60_000)
            .build();
        DahuaCamera::open(config).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_name_with_digest_auth() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let camera = camera_for(&listener);

        tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                let head = read_head(&mut stream).await;
                assert!(head.starts_with("GET /cgi-bin/magicBox.cgi?action=getMachineName"));
                let reply = if is_authorized(&head) {
                    let body = "name=  Garage \r\n";
                    format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    )
                } else {
                    CHALLENGE.to_string()
                };
                stream.write_all(reply.as_bytes()).await.unwrap();
            }
        });

        assert_eq!(camera.resolve_name().await.unwrap(), "Garage");
    }

    #[tokio::test]
    async fn test_resolve_name_rejected_credentials() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let camera = camera_for(&listener);

        tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                read_head(&mut stream).await;
                stream.write_all(CHALLENGE.as_bytes()).await.unwrap();
            }
        });

        let err = camera.resolve_name().await.unwrap_err();
        assert!(matches!(err, DahuaError::Unauthorized { .. }), "got {err}");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_resolve_name_unexpected_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let camera = camera_for(&listener);

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_head(&mut stream).await;
            let body = "Error\r\n";
            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(reply.as_bytes()).await.unwrap();
        });

        let err = camera.resolve_name().await.unwrap_err();
        assert!(matches!(err, DahuaError::InvalidResponse { .. }), "got {err}");
    }

    #[tokio::test]
    async fn test_event_stream_delivers_alarms_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let camera = camera_for(&listener);

        tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                let head = read_head(&mut stream).await;
                if !is_authorized(&head) {
                    stream.write_all(CHALLENGE.as_bytes()).await.unwrap();
                    continue;
                }
                assert!(head.contains("action=attach&codes=[All]&heartbeat=5"));
                stream
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary=myboundary\r\nConnection: close\r\n\r\n",
                    )
                    .await
                    .unwrap();
                let parts: [&[u8]; 3] = [
                    b"--myboundary\r\nContent-Type: text/plain\r\nContent-Length: 37\r\n\r\nCode=VideoMotion;action=Start;index=0\r\n\r\n",
                    b"--myboundary\r\nContent-Type: text/plain\r\nContent-Length: 9\r\n\r\nHeartbeat\r\n\r\n",
                    b"--myboundary\r\nContent-Type: text/plain\r\nContent-Length: 36\r\n\r\nCode=VideoMotion;action=Stop;index=0\r\n\r\n",
                ];
                for part in parts {
                    stream.write_all(part).await.unwrap();
                    stream.flush().await.unwrap();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                // Closing the connection ends the stream
                break;
            }
        });

        let mut events = camera.listen_for_events();
        let mut received = Vec::new();
        while let Some(event) = events.recv().await {
            let done = event == CameraEvent::Disconnected;
            received.push(event);
            if done {
                break;
            }
        }
        events.close();

        assert_eq!(
            received,
            vec![
                CameraEvent::Connected,
                CameraEvent::Alarm(AlarmEvent::new("VideoMotion", "Start", 0)),
                CameraEvent::Alarm(AlarmEvent::new("VideoMotion", "Stop", 0)),
                CameraEvent::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_silent_event_stream_is_reattached() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = CameraConfig::builder()
            .host("127.0.0.1")
            .port(port)
            .username("admin")
            .password("secret")
            .heartbeat_secs(1)
            .reconnect_delay_ms(100)
            .build();
        let camera = DahuaCamera::open(config).unwrap();

        tokio::spawn(async move {
            // Held open with no heartbeats, like a camera that dropped off the network
            let mut silent = Vec::new();
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                let head = read_head(&mut stream).await;
                if !is_authorized(&head) {
                    stream.write_all(CHALLENGE.as_bytes()).await.unwrap();
                    continue;
                }
                assert!(head.contains("heartbeat=1"));
                stream
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary=myboundary\r\n\r\n\
--myboundary\r\nContent-Type: text/plain\r\n\r\nCode=VideoMotion;action=Start;index=0\r\n\r\n",
                    )
                    .await
                    .unwrap();
                stream.flush().await.unwrap();
                silent.push(stream);
            }
        });

        let mut events = camera.listen_for_events();
        let mut received = Vec::new();
        let collect = async {
            while let Some(event) = events.recv().await {
                received.push(event);
                if received.len() == 4 {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(10), collect)
            .await
            .expect("silent stream was never dropped");
        events.close();

        assert_eq!(
            received,
            vec![
                CameraEvent::Connected,
                CameraEvent::Alarm(AlarmEvent::new("VideoMotion", "Start", 0)),
                CameraEvent::Disconnected,
                CameraEvent::Connected,
            ]
        );
    }

    #[tokio::test]
    async fn test_new_nonce_restarts_nonce_count() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let camera = camera_for(&listener);
        let (heads_tx, mut heads_rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut served = 0;
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                let head = read_head(&mut stream).await;
                heads_tx.send(head.clone()).unwrap();
                let reply = if head.contains("nonce=\"bbb\"") || (served == 0 && head.contains("nonce=\"aaa\"")) {
                    served += 1;
                    let body = "name=Garage\r\n";
                    format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    )
                } else {
                    // First contact gets nonce aaa; once aaa has been used it is stale
                    let nonce = if served == 0 { "aaa" } else { "bbb" };
                    format!(
                        "HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Digest realm=\"cam\", qop=\"auth\", nonce=\"{nonce}\"\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    )
                };
                stream.write_all(reply.as_bytes()).await.unwrap();
            }
        });

        assert_eq!(camera.resolve_name().await.unwrap(), "Garage");
        assert_eq!(camera.resolve_name().await.unwrap(), "Garage");

        let mut heads = Vec::new();
        while let Ok(head) = heads_rx.try_recv() {
            heads.push(head);
        }
        // unauthenticated, aaa/1, aaa/2 (stale), bbb/1
        assert_eq!(heads.len(), 4);
        assert!(heads[1].contains("nonce=\"aaa\"") && heads[1].contains("nc=00000001"));
        assert!(heads[2].contains("nonce=\"aaa\"") && heads[2].contains("nc=00000002"));
        assert!(heads[3].contains("nonce=\"bbb\"") && heads[3].contains("nc=00000001"));
    }

    #[tokio::test]
    async fn test_open_does_no_io() {
        // Nothing listens here; open must still succeed
        let config = CameraConfig::builder().host("127.0.0.1").port(1).build();
        let camera = DahuaCamera::open(config).unwrap();
        assert_eq!(camera.address().port, Some(1));
    }
}
