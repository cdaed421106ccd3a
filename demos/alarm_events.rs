//! Example: Print alarm events from one camera.

use dahua_lan_bridge::{CameraConfig, CameraEvent, CameraSession, DahuaCamera};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = CameraConfig::builder()
        .host("192.168.1.108")
        .username("admin")
        .password("admin")
        .build();

    let camera = DahuaCamera::open(config)?;
    let name = camera.resolve_name().await?;
    let mut events = camera.listen_for_events();

    println!("Listening for alarms from {} (Ctrl+C to stop)...\n", name);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(CameraEvent::Alarm(alarm)) => {
                        println!("{}: {} {} (channel {})", name, alarm.code, alarm.action, alarm.index);
                    }
                    Some(CameraEvent::Disconnected) => {
                        println!("Event stream dropped, waiting for reconnect...");
                    }
                    Some(event) => {
                        println!("Event: {:?}", event);
                    }
                    None => {
                        println!("Event stream closed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping...");
                break;
            }
        }
    }

    events.close();
    Ok(())
}
