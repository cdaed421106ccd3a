// MIT License - Copyright (c) 2026 Peter Wright
// ONVIF WS-Discovery probe

use std::collections::HashSet;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use crate::config::CameraAddress;
use crate::constants::{DEFAULT_DISCOVERY_TIMEOUT, WS_DISCOVERY_ADDR};
use crate::error::{DahuaError, Result};

/// Source of camera addresses found on the network.
#[allow(async_fn_in_trait)]
pub trait Discover {
    /// Probe the network and return every camera that answered.
    async fn probe(&self) -> Result<Vec<CameraAddress>>;
}

/// WS-Discovery client looking for ONVIF network video transmitters.
///
/// Sends one multicast `Probe` and collects `ProbeMatches` replies until the
/// timeout elapses. The probe always runs for the full window.
#[derive(Debug, Clone)]
pub struct OnvifDiscovery {
    timeout: Duration,
    target: String,
}

impl Default for OnvifDiscovery {
    fn default() -> Self {
        Self::new(DEFAULT_DISCOVERY_TIMEOUT)
    }
}

impl OnvifDiscovery {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            target: WS_DISCOVERY_ADDR.to_string(),
        }
    }

    /// Send the probe somewhere other than the multicast group.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }
}

impl Discover for OnvifDiscovery {
    async fn probe(&self) -> Result<Vec<CameraAddress>> {
        let failed = |e: std::io::Error| DahuaError::DiscoveryFailed {
            reason: e.to_string(),
        };

        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(failed)?;
        let message_id = uuid::Uuid::new_v4();
        socket
            .send_to(probe_message(&message_id.to_string()).as_bytes(), &self.target)
            .await
            .map_err(failed)?;
        debug!("Sent WS-Discovery probe {message_id} to {}", self.target);

        let deadline = Instant::now() + self.timeout;
        let mut buf = vec![0u8; 65535];
        let mut seen = HashSet::new();
        let mut cams = Vec::new();

        loop {
            let (len, from) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Err(_) => break,
                Ok(result) => result.map_err(failed)?,
            };
            let reply = String::from_utf8_lossy(&buf[..len]);
            match parse_probe_match(&reply) {
                Some((endpoint, address)) => {
                    if seen.insert(endpoint) {
                        debug!("Discovery reply from {from}: {address}");
                        cams.push(address);
                    }
                }
                None => debug!("Ignoring unrecognised discovery reply from {from}"),
            }
        }

        info!("Discovery found {} camera(s)", cams.len());
        Ok(cams)
    }
}

/// SOAP envelope for a `Probe` of `NetworkVideoTransmitter` devices.
pub fn probe_message(message_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing">
<s:Header>
<a:Action s:mustUnderstand="1">http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe</a:Action>
<a:MessageID>uuid:{message_id}</a:MessageID>
<a:ReplyTo><a:Address>http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous</a:Address></a:ReplyTo>
<a:To s:mustUnderstand="1">urn:schemas-xmlsoap-org:ws:2005:04:discovery</a:To>
</s:Header>
<s:Body>
<Probe xmlns="http://schemas.xmlsoap.org/ws/2005/04/discovery">
<d:Types xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery" xmlns:dp0="http://www.onvif.org/ver10/network/wsdl">dp0:NetworkVideoTransmitter</d:Types>
</Probe>
</s:Body>
</s:Envelope>"#
    )
}

/// Extract `(endpoint id, camera address)` from a `ProbeMatches` reply.
///
/// The endpoint id is the endpoint reference address, falling back to the
/// XAddrs text, so repeated replies from one device collapse.
pub fn parse_probe_match(xml: &str) -> Option<(String, CameraAddress)> {
    if !xml.contains("ProbeMatch") {
        return None;
    }
    let xaddrs = extract_element(xml, "XAddrs")?;
    let address = xaddrs
        .split_whitespace()
        .find_map(address_from_url)?;
    let endpoint = extract_element(xml, "Address")
        .map(|a| a.trim().to_string())
        .unwrap_or_else(|| xaddrs.trim().to_string());
    Some((endpoint, address))
}

/// Host and port of an `http://host[:port]/path` service URL.
pub fn address_from_url(url: &str) -> Option<CameraAddress> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))?;
    let authority = rest.split('/').next()?;
    CameraAddress::parse(authority).ok()
}

/// Text content of the first element with the given local name, any namespace prefix.
fn extract_element<'a>(xml: &'a str, local_name: &str) -> Option<&'a str> {
    let mut search = 0;
    while let Some(pos) = xml[search..].find(local_name) {
        let start = search + pos;
        let name_end = start + local_name.len();
        let before = xml[..start].chars().next_back();
        let after = xml[name_end..].chars().next();

        if matches!(before, Some('<') | Some(':')) && matches!(after, Some('>') | Some(' ')) {
            let tag_open = xml[..start].rfind('<')?;
            if !xml[tag_open + 1..].starts_with('/') {
                let content_start = name_end + xml[name_end..].find('>')? + 1;
                let content_end = content_start + xml[content_start..].find('<')?;
                return Some(&xml[content_start..content_end]);
            }
        }
        search = name_end;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_MATCH: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope" xmlns:wsadis="http://schemas.xmlsoap.org/ws/2004/08/addressing" xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery">
<env:Header>
<wsadis:MessageID>urn:uuid:9a1b2c3d-0000-0000-0000-000000000001</wsadis:MessageID>
<wsadis:RelatesTo>uuid:11111111-2222-3333-4444-555555555555</wsadis:RelatesTo>
<wsadis:Action>http://schemas.xmlsoap.org/ws/2005/04/discovery/ProbeMatches</wsadis:Action>
</env:Header>
<env:Body>
<d:ProbeMatches>
<d:ProbeMatch>
<wsadis:EndpointReference><wsadis:Address>urn:uuid:5f5a69c2-e0ae-504f-829b-00AABBCCDDEE</wsadis:Address></wsadis:EndpointReference>
<d:Types>dn:NetworkVideoTransmitter tds:Device</d:Types>
<d:XAddrs>http://192.168.1.108/onvif/device_service http://[fe80::1]/onvif/device_service</d:XAddrs>
<d:MetadataVersion>1</d:MetadataVersion>
</d:ProbeMatch>
</d:ProbeMatches>
</env:Body>
</env:Envelope>"#;

    #[test]
    fn test_probe_message_carries_id() {
        let msg = probe_message("11111111-2222-3333-4444-555555555555");
        assert!(msg.contains("<a:MessageID>uuid:11111111-2222-3333-4444-555555555555</a:MessageID>"));
        assert!(msg.contains("dp0:NetworkVideoTransmitter"));
    }

    #[test]
    fn test_parse_probe_match() {
        let (endpoint, address) = parse_probe_match(PROBE_MATCH).unwrap();
        assert_eq!(endpoint, "urn:uuid:5f5a69c2-e0ae-504f-829b-00AABBCCDDEE");
        assert_eq!(address, CameraAddress::new("192.168.1.108", None));
    }

    #[test]
    fn test_parse_probe_match_with_port() {
        let xml = "<d:ProbeMatch><d:XAddrs>http://10.0.0.9:8080/onvif/device_service</d:XAddrs></d:ProbeMatch>";
        let (endpoint, address) = parse_probe_match(xml).unwrap();
        assert_eq!(address, CameraAddress::new("10.0.0.9", Some(8080)));
        assert_eq!(endpoint, "http://10.0.0.9:8080/onvif/device_service");
    }

    #[test]
    fn test_parse_rejects_non_matches() {
        assert!(parse_probe_match("<s:Envelope><s:Body><Probe/></s:Body></s:Envelope>").is_none());
        assert!(parse_probe_match("<d:ProbeMatch><d:XAddrs></d:XAddrs></d:ProbeMatch>").is_none());
    }

    #[test]
    fn test_address_from_url() {
        assert_eq!(
            address_from_url("http://[fe80::1]:81/onvif"),
            Some(CameraAddress::new("fe80::1", Some(81)))
        );
        assert_eq!(address_from_url("ftp://host/"), None);
    }

    #[tokio::test]
    async fn test_probe_collects_replies_until_timeout() {
        let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = responder.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];
            let (len, from) = responder.recv_from(&mut buf).await.unwrap();
            assert!(String::from_utf8_lossy(&buf[..len]).contains("Probe"));
            // Same device answers twice
            responder.send_to(PROBE_MATCH.as_bytes(), from).await.unwrap();
            responder.send_to(PROBE_MATCH.as_bytes(), from).await.unwrap();
            responder.send_to(b"garbage", from).await.unwrap();
        });

        let cams = OnvifDiscovery::new(Duration::from_millis(300))
            .with_target(target)
            .probe()
            .await
            .unwrap();
        assert_eq!(cams, vec![CameraAddress::new("192.168.1.108", None)]);
    }
}
