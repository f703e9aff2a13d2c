use anyhow::Result;
use std::sync::Arc;
use steam_player_tracker::*;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    tracing::info!("{}", version::banner());

    let app_config = config::AppConfig::load()?;
    let tracker = Arc::new(tracker::Tracker::connect(app_config).await?);
    tracker.start().await?;

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("Received shutdown signal. Shutting down gracefully...");
    tracker.shutdown();
    Ok(())
}
