// Collection pipeline: fetch (with retry) → CSV append + Sheets enqueue, on the scheduler.
// Owns startup (validation, initial sample, backfill, schedules) and shutdown.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::aggregation_worker::{AggregationService, previous_day};
use crate::backfill::run_backfill;
use crate::config::AppConfig;
use crate::csv_store::CsvStore;
use crate::mirror::Mirror;
use crate::models::{DailyAggregate, Sample};
use crate::outbound_queue::{DRAIN_INTERVAL, QueueStatus};
use crate::retry::RetryHandler;
use crate::scheduler::Scheduler;
use crate::steam_api::{PlayerCountSource, SteamApiClient};
use crate::sync::spawn_startup_sync;

pub struct Tracker {
    config: AppConfig,
    source: Arc<dyn PlayerCountSource>,
    csv: CsvStore,
    retry: RetryHandler,
    mirror: Option<Mirror>,
    aggregates: Option<AggregationService>,
    scheduler: Scheduler,
    queue_processor: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Tracker {
    /// Wires the tracker from explicit collaborators. `mirror` is `None` when Sheets is disabled.
    pub fn new(config: AppConfig, source: Arc<dyn PlayerCountSource>, mirror: Option<Mirror>) -> Self {
        let csv = CsvStore::new(
            config.output.csv_file_path.clone(),
            config.output.daily_average_file_path.clone(),
        );
        let retry = RetryHandler::new(config.retry.max_retries, config.retry.base_delay_ms);
        let aggregates = config.output.daily_average_enabled.then(|| {
            AggregationService::new(csv.clone(), mirror.as_ref().map(|m| m.queue.clone()))
        });
        Self {
            config,
            source,
            csv,
            retry,
            mirror,
            aggregates,
            scheduler: Scheduler::new(),
            queue_processor: Mutex::new(None),
        }
    }

    /// Production wiring: Steam Web API client plus the Google Sheets mirror when enabled.
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let source: Arc<dyn PlayerCountSource> = Arc::new(SteamApiClient::new()?);
        let mirror = match config.sheets() {
            Some(sheets) => {
                Some(Mirror::connect(sheets, config.output.daily_average_enabled).await?)
            }
            None => None,
        };
        Ok(Self::new(config, source, mirror))
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn csv(&self) -> &CsvStore {
        &self.csv
    }

    pub fn queue_status(&self) -> Option<QueueStatus> {
        self.mirror.as_ref().map(|m| m.queue.status())
    }

    /// Retry-wrapped fetch; a zero count counts as a failed attempt.
    async fn fetch_player_count(&self, label: &str) -> anyhow::Result<u32> {
        let app_id = self.config.steam.app_id;
        let count = self
            .retry
            .execute_with_retry(|| self.source.current_player_count(app_id), label)
            .await?;
        Ok(count)
    }

    /// Fetches one sample and persists it. The CSV append and the Sheets enqueue run
    /// concurrently and both settle; a Sheets failure never fails the tick.
    #[instrument(skip(self), fields(operation = "collect_and_save"))]
    pub async fn collect_and_save(&self) -> anyhow::Result<Sample> {
        info!("Starting data collection...");
        let player_count = match self.fetch_player_count("Steam API data collection").await {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "Data collection failed");
                return Err(e);
            }
        };
        let sample = Sample::at(Utc::now(), player_count);

        let csv_write = async {
            if !self.config.output.csv_enabled {
                return Ok(false);
            }
            self.retry
                .execute_with_retry(|| self.csv.append_sample(&sample), "CSV write")
                .await
                .map(|_| true)
        };
        let mirror_write = async {
            match &self.mirror {
                Some(mirror) => mirror.queue.enqueue_or_write(sample.clone().into()).await.map(|_| true),
                None => Ok(false),
            }
        };
        let (csv_result, mirror_result) = tokio::join!(csv_write, mirror_write);

        let sheets_saved = match mirror_result {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "sample not mirrored");
                false
            }
        };
        let csv_saved = match csv_result {
            Ok(saved) => saved,
            Err(e) => {
                error!(error = %e, timestamp = %sample.timestamp, "Data collection failed");
                return Err(e.into());
            }
        };

        info!(
            timestamp = %sample.timestamp,
            player_count = sample.player_count,
            csv_saved,
            sheets_saved,
            "Data collection completed successfully"
        );
        Ok(sample)
    }

    /// Aggregates the previous UTC day, retry-wrapped. `Ok(None)` when aggregates are
    /// disabled or the day had no valid samples.
    #[instrument(skip(self), fields(operation = "calculate_daily_aggregate"))]
    pub async fn calculate_daily_aggregate(&self) -> anyhow::Result<Option<DailyAggregate>> {
        let Some(service) = &self.aggregates else {
            return Ok(None);
        };
        let yesterday = previous_day(Utc::now().date_naive());
        let aggregate = self
            .retry
            .execute_with_retry(
                || service.calculate_and_save(yesterday),
                "Daily average calculation",
            )
            .await?;
        Ok(aggregate)
    }

    /// Validates the upstream source, collects an initial sample, backfills aggregates,
    /// and starts the schedules. Fails only on startup validation errors.
    pub async fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        info!(
            app_id = self.config.steam.app_id,
            minutes = ?self.config.scheduling.collection_minutes,
            csv_enabled = self.config.output.csv_enabled,
            sheets_enabled = self.mirror.is_some(),
            "Steam Player Tracker starting..."
        );

        let test_count = self
            .fetch_player_count("Steam API test")
            .await
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;
        info!(test_player_count = test_count, "Configuration validated successfully");

        info!("Collecting initial data on startup...");
        // Already logged; startup continues without the initial sample.
        let _ = self.collect_and_save().await;

        if let Some(service) = &self.aggregates {
            run_backfill(service).await?;
        }

        let tracker = Arc::clone(self);
        self.scheduler
            .schedule_hourly(&self.config.scheduling.collection_minutes, move || {
                let tracker = Arc::clone(&tracker);
                async move { tracker.collect_and_save().await.map(|_| ()) }
            })?;

        if self.aggregates.is_some() {
            let tracker = Arc::clone(self);
            self.scheduler
                .schedule_daily(self.config.scheduling.daily_average_hour, move || {
                    let tracker = Arc::clone(&tracker);
                    async move { tracker.calculate_daily_aggregate().await.map(|_| ()) }
                })?;
        }

        if let Some(mirror) = &self.mirror {
            let handle = mirror.queue.spawn_processor(DRAIN_INTERVAL);
            if let Some(previous) = self.lock_processor().replace(handle) {
                previous.abort();
            }

            if let Some(sheets) = self.config.sheets().filter(|s| s.sync_on_startup) {
                // Detached: never awaited or aborted by shutdown.
                let _ = spawn_startup_sync(
                    mirror.samples.clone(),
                    mirror.aggregates.clone(),
                    self.csv.clone(),
                    Duration::from_secs(sheets.sync_delay_secs),
                );
            }
        }

        info!(
            scheduled_minutes = ?self.scheduler.scheduled_minutes(),
            daily_average_hour = self.aggregates.as_ref().map(|_| self.config.scheduling.daily_average_hour),
            "Steam Player Tracker started successfully"
        );
        Ok(())
    }

    fn lock_processor(&self) -> std::sync::MutexGuard<'_, Option<tokio::task::JoinHandle<()>>> {
        self.queue_processor.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stops every schedule and the queue processor. In-flight work is abandoned and any
    /// queued Sheets writes are lost.
    pub fn shutdown(&self) {
        self.scheduler.stop_all();
        if let Some(handle) = self.lock_processor().take() {
            handle.abort();
        }
        if let Some(status) = self.queue_status()
            && status.queue_length > 0
        {
            warn!(queued = status.queue_length, "shutting down with unsent Sheets writes");
        }
        info!("Steam Player Tracker stopped");
    }
}
