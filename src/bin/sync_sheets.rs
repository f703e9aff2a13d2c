// Rebuilds both Google Sheets tabs from the local CSV files, sorted and de-duplicated.

use anyhow::Result;
use steam_player_tracker::config::AppConfig;
use steam_player_tracker::csv_store::CsvStore;
use steam_player_tracker::mirror::Mirror;
use steam_player_tracker::{logging, sync, version};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    tracing::info!("{} sync-sheets", version::banner());

    let config = AppConfig::load()?;
    let Some(sheets) = config.sheets() else {
        anyhow::bail!("Google Sheets is not enabled; set google_sheets.enabled = true");
    };

    let mirror = Mirror::connect(sheets, config.output.daily_average_enabled).await?;
    let csv = CsvStore::new(
        config.output.csv_file_path.clone(),
        config.output.daily_average_file_path.clone(),
    );
    let report = sync::sync_all(&mirror, &csv).await?;
    tracing::info!(
        samples = report.samples,
        aggregates = report.aggregates,
        "All data synced successfully"
    );
    Ok(())
}
