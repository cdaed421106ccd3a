//! Example: Query a camera's display name, optionally discovering cameras first.
//!
//! Usage: `camera_name <user> <password> [host[:port]]` (omit the host to probe the network)

use dahua_lan_bridge::{CameraAddress, CameraConfig, CameraSession, DahuaCamera, Discover, OnvifDiscovery};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let username = args.next().unwrap_or_else(|| "admin".to_string());
    let password = args.next().unwrap_or_default();

    let cams = match args.next() {
        Some(host) => vec![CameraAddress::parse(&host)?],
        None => {
            println!("Probing for cameras...");
            OnvifDiscovery::default().probe().await?
        }
    };

    println!("\n--- Cameras ({}) ---", cams.len());
    for address in cams {
        let config = CameraConfig::builder()
            .address(address.clone())
            .username(&username)
            .password(&password)
            .build();
        let camera = DahuaCamera::open(config)?;
        match camera.resolve_name().await {
            Ok(name) => println!("  {:24} {}", address.to_string(), name),
            Err(e) => println!("  {:24} error: {}", address.to_string(), e),
        }
    }
    Ok(())
}
