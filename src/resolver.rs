// MIT License - Copyright (c) 2026 Peter Wright
// Final camera list from explicit addresses plus discovery

use tracing::{error, info};

use crate::config::CameraAddress;
use crate::discovery::Discover;
use crate::error::{DahuaError, Result};

/// Decides which cameras the bridge connects to.
#[derive(Debug, Clone)]
pub struct CameraResolver {
    explicit: Vec<CameraAddress>,
    discover: bool,
}

impl CameraResolver {
    pub fn new(explicit: Vec<CameraAddress>, discover: bool) -> Self {
        Self { explicit, discover }
    }

    /// Fail fast when there is no camera source at all.
    ///
    /// Needs no network, so it runs before the bus connection is made.
    pub fn check_sources(&self) -> Result<()> {
        if !self.discover && self.explicit.is_empty() {
            return Err(DahuaError::NoCameras);
        }
        Ok(())
    }

    /// Explicit addresses first, then discovered ones in reply order.
    ///
    /// Discovered addresses are not deduplicated against explicit ones.
    pub async fn resolve<D: Discover>(&self, discovery: &D) -> Result<Vec<CameraAddress>> {
        self.check_sources()?;

        let mut cams = self.explicit.clone();
        if self.discover {
            info!("Discovering cameras...");
            let found = discovery.probe().await.inspect_err(|e| {
                error!("Failed to discover cameras: {e}");
            })?;
            cams.extend(found);
        }
        Ok(cams)
    }
}
