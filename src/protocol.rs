// MIT License - Copyright (c) 2026 Peter Wright
// Camera CGI requests and event stream decoding

use tracing::debug;

use crate::constants::{EVENT_ATTACH_PATH, MACHINE_NAME_PATH};
use crate::event::AlarmEvent;

/// Requests sent to the camera's CGI API.
///
/// # Event stream
///
/// `eventManager.cgi?action=attach` keeps the HTTP response open and writes
/// one multipart section per event:
///
/// ```text
/// --myboundary
/// Content-Type: text/plain
/// Content-Length: 37
///
/// Code=VideoMotion;action=Start;index=0
/// ```
///
/// Sections may carry a trailing `;data={...}` JSON blob spanning several
/// lines, and the camera interleaves `Heartbeat` sections at the requested
/// interval. Only lines beginning with `Code=` are alarms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `magicBox.cgi?action=getMachineName`, body `name=<value>`
    MachineName,
    /// `eventManager.cgi?action=attach&codes=[All]&heartbeat=<secs>`
    AttachEvents { heartbeat_secs: u64 },
}

impl Request {
    /// Path and query string of the request.
    pub fn path(&self) -> String {
        match self {
            Request::MachineName => MACHINE_NAME_PATH.to_string(),
            Request::AttachEvents { heartbeat_secs } => {
                format!("{EVENT_ATTACH_PATH}&heartbeat={heartbeat_secs}")
            }
        }
    }
}

/// Extract the value from a `key=value` pair, or the whole string if no `=`.
pub fn parse_value_after_eq(s: &str) -> &str {
    match s.split_once('=') {
        Some((_, value)) => value,
        None => s,
    }
}

/// Find the `name=` line of a getMachineName response. The value is returned untrimmed.
pub fn parse_machine_name(body: &str) -> Option<&str> {
    body.lines()
        .find(|line| line.starts_with("name="))
        .map(parse_value_after_eq)
}

/// Decode one `Code=<code>;action=<action>;index=<n>[;...]` line.
pub fn parse_alarm_line(line: &str) -> Option<AlarmEvent> {
    let line = line.trim_end_matches('\r');
    if !line.starts_with("Code=") {
        return None;
    }

    let mut code = None;
    let mut action = None;
    let mut index = None;
    for field in line.split(';') {
        match field.split_once('=') {
            Some(("Code", v)) => code = Some(v),
            Some(("action", v)) => action = Some(v),
            Some(("index", v)) => index = v.trim().parse::<i64>().ok(),
            _ => {}
        }
        if code.is_some() && action.is_some() && index.is_some() {
            break;
        }
    }

    match (code, action, index) {
        (Some(code), Some(action), Some(index)) => Some(AlarmEvent::new(code, action, index)),
        _ => {
            debug!("Ignoring malformed event line: {line}");
            None
        }
    }
}

/// Incremental decoder for the attach stream.
///
/// Chunks arrive at arbitrary byte boundaries; complete lines are decoded
/// and any partial tail is kept for the next chunk.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning alarms from every line it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<AlarmEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(pos) = self.buffer[consumed..].iter().position(|&b| b == b'\n') {
            let line = &self.buffer[consumed..consumed + pos];
            if let Some(event) = parse_alarm_line(&String::from_utf8_lossy(line)) {
                events.push(event);
            }
            consumed += pos + 1;
        }
        self.buffer.drain(..consumed);
        events
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
