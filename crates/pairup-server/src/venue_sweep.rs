use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use pairup_engine::Engine;

const BATCH: usize = 50;

/// Background task that retries venue suggestions for live matches that
/// still have none, least recently attempted first.
pub async fn run_venue_sweep(engine: Arc<Engine>, interval: Duration) {
    let mut interval = tokio::time::interval(interval);

    loop {
        interval.tick().await;

        match engine.fill_missing_venues(BATCH).await {
            Ok(count) => {
                if count > 0 {
                    info!("Venue sweep: attached {} suggestions", count);
                }
            }
            Err(e) => {
                warn!("Venue sweep error: {}", e);
            }
        }
    }
}
