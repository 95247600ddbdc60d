use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{ReferenceData, ReferenceSource};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Reloads reference data from `source` every `interval`.
///
/// The first reload happens one interval after spawning; callers load the
/// initial snapshot themselves. A failed reload keeps the current snapshot.
pub fn spawn_refresh(
    data: Arc<ReferenceData>,
    source: Arc<dyn ReferenceSource>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        loop {
            ticker.tick().await;
            match source.load().await {
                Ok(snapshot) => {
                    let stats = snapshot.stats();
                    data.replace(snapshot);
                    info!(source = %source.describe(), stops = stats.stops, "Reference data refreshed");
                }
                Err(e) => {
                    error!(source = %source.describe(), error = %e, "Reference data refresh failed, keeping previous snapshot");
                }
            }
        }
    })
}
