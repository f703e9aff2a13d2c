// Rebuild the Sheets mirror from the local CSV files (the source of truth).

use std::time::Duration;

use tracing::{error, info};

use crate::csv_store::CsvStore;
use crate::mirror::Mirror;
use crate::models::Record;
use crate::sheets::SheetStore;

/// Replaces the sample tab with every CSV sample, sorted and de-duplicated by timestamp.
pub async fn sync_samples(store: &SheetStore, csv: &CsvStore) -> anyhow::Result<usize> {
    let samples = csv.read_samples().await?;
    if samples.is_empty() {
        info!("No player data to sync");
        return Ok(0);
    }
    info!(records = samples.len(), "Syncing player data");
    let records = samples.into_iter().map(Record::from).collect();
    Ok(store.replace_all(records).await?)
}

/// Replaces the aggregate tab with every CSV aggregate; the last row per date wins.
pub async fn sync_aggregates(store: &SheetStore, csv: &CsvStore) -> anyhow::Result<usize> {
    let aggregates = csv.read_aggregates().await?;
    if aggregates.is_empty() {
        info!("No daily average data to sync");
        return Ok(0);
    }
    info!(records = aggregates.len(), "Syncing daily averages");
    let records = aggregates.into_iter().map(Record::from).collect();
    Ok(store.replace_all(records).await?)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub samples: usize,
    pub aggregates: usize,
}

pub async fn sync_all(mirror: &Mirror, csv: &CsvStore) -> anyhow::Result<SyncReport> {
    let samples = sync_samples(&mirror.samples, csv).await?;
    let aggregates = match &mirror.aggregates {
        Some(store) => sync_aggregates(store, csv).await?,
        None => 0,
    };
    info!(samples, aggregates, "Google Sheets sync completed");
    Ok(SyncReport {
        samples,
        aggregates,
    })
}

/// Detached startup sync after `delay`. Shutdown does not wait for it; the sync may be
/// abandoned part way through.
pub fn spawn_startup_sync(
    mirror_samples: std::sync::Arc<SheetStore>,
    mirror_aggregates: Option<std::sync::Arc<SheetStore>>,
    csv: CsvStore,
    delay: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        info!("Starting delayed Google Sheets sync");
        if let Err(e) = sync_samples(&mirror_samples, &csv).await {
            error!(error = %e, "startup sync of player data failed");
        }
        if let Some(store) = mirror_aggregates
            && let Err(e) = sync_aggregates(&store, &csv).await
        {
            error!(error = %e, "startup sync of daily averages failed");
        }
    })
}
