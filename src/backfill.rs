// One-time backfill: aggregate every past day that has samples but no aggregate row.

use chrono::Utc;
use tracing::info;

use crate::aggregation_worker::AggregationService;

/// Runs at startup to repair gaps left by downtime. Returns the dates that were computed.
pub async fn run_backfill(service: &AggregationService) -> anyhow::Result<Vec<String>> {
    let today = Utc::now().date_naive();
    let computed = service.backfill_missing(today).await?;
    info!(days = computed.len(), "backfill complete");
    Ok(computed)
}
