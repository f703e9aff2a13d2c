// Recomputes the daily aggregate for every date in the sample CSV (full rebuild).

use std::sync::Arc;

use anyhow::Result;
use steam_player_tracker::aggregation_worker::AggregationService;
use steam_player_tracker::config::AppConfig;
use steam_player_tracker::csv_store::CsvStore;
use steam_player_tracker::mirror::Mirror;
use steam_player_tracker::outbound_queue::{DRAIN_INTERVAL, MAX_ATTEMPTS};
use steam_player_tracker::{logging, version};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    tracing::info!("{} recompute-averages", version::banner());

    let config = AppConfig::load()?;
    anyhow::ensure!(
        config.output.daily_average_enabled,
        "output.daily_average_enabled is false; nothing to recompute"
    );

    let mirror = match config.sheets() {
        Some(sheets) => Some(Mirror::connect(sheets, true).await?),
        None => None,
    };
    let queue = mirror.as_ref().map(|m| Arc::clone(&m.queue));
    let csv = CsvStore::new(
        config.output.csv_file_path.clone(),
        config.output.daily_average_file_path.clone(),
    );
    let service = AggregationService::new(csv, queue.clone());
    let computed = service.recompute_all().await?;
    tracing::info!(days = computed.len(), "All daily averages calculated");

    // Queued Sheets writes are dropped after MAX_ATTEMPTS drains, so this terminates.
    if let Some(queue) = queue {
        for _ in 0..MAX_ATTEMPTS {
            if queue.status().queue_length == 0 {
                break;
            }
            tokio::time::sleep(DRAIN_INTERVAL).await;
            queue.drain_once().await;
        }
    }
    Ok(())
}
