// Daily aggregate service: read raw samples from CSV, compute, persist to CSV and Sheets.
// Runs once a day from the scheduler (previous UTC day), at startup via backfill,
// and on demand for a full rebuild.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::{info, instrument, warn};

use crate::aggregation::{self, compute_daily_aggregate, distinct_dates};
use crate::csv_store::CsvStore;
use crate::models::{DailyAggregate, RecordKind};
use crate::outbound_queue::OutboundQueue;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct AggregationService {
    csv: CsvStore,
    queue: Option<Arc<OutboundQueue>>,
}

impl AggregationService {
    /// `queue` is the Sheets mirror; aggregates are mirrored only when it has an aggregate tab.
    pub fn new(csv: CsvStore, queue: Option<Arc<OutboundQueue>>) -> Self {
        let queue = queue.filter(|q| q.has_store_for(RecordKind::DailyAggregate));
        Self { csv, queue }
    }

    pub fn csv(&self) -> &CsvStore {
        &self.csv
    }

    /// Computes and stores the aggregate for `date`. `Ok(None)` when the day has no
    /// non-zero samples; nothing is written in that case.
    #[instrument(skip(self), fields(operation = "calculate_daily_aggregate"))]
    pub async fn calculate_and_save(&self, date: NaiveDate) -> anyhow::Result<Option<DailyAggregate>> {
        let date_str = date.format(DATE_FORMAT).to_string();
        info!("Calculating daily average for {}", date_str);

        let samples = self.csv.read_samples().await?;
        let on_date = samples.iter().filter(|s| s.date() == date_str).count();
        if on_date == 0 {
            warn!("No data found for {}", date_str);
            return Ok(None);
        }

        let Some(aggregate) = compute_daily_aggregate(&date_str, &samples) else {
            warn!("No valid data (non-zero) found for {}", date_str);
            return Ok(None);
        };

        self.save(&aggregate).await?;
        info!(
            date = %aggregate.date,
            average = aggregate.average_player_count,
            sample_count = aggregate.sample_count,
            max = aggregate.extremes.as_ref().map(|e| e.max_player_count),
            min = aggregate.extremes.as_ref().map(|e| e.min_player_count),
            excluded_zeros = on_date - aggregate.sample_count as usize,
            "Daily average calculated"
        );
        Ok(Some(aggregate))
    }

    /// CSV upsert and Sheets enqueue run concurrently; both settle before returning.
    /// A Sheets failure is absorbed by the queue and never fails the CSV write.
    async fn save(&self, aggregate: &DailyAggregate) -> anyhow::Result<()> {
        let csv_write = self.csv.upsert_aggregate(aggregate);
        let mirror = async {
            if let Some(queue) = &self.queue {
                queue.enqueue_or_write(aggregate.clone().into()).await
            } else {
                Ok(())
            }
        };
        let (csv_result, mirror_result) = tokio::join!(csv_write, mirror);
        if let Err(e) = mirror_result {
            warn!(error = %e, "daily aggregate not mirrored");
        }
        csv_result?;
        Ok(())
    }

    /// Computes aggregates for every day before `today` that has samples but no aggregate row.
    /// Returns the dates that produced an aggregate, ascending.
    #[instrument(skip(self), fields(operation = "backfill_missing"))]
    pub async fn backfill_missing(&self, today: NaiveDate) -> anyhow::Result<Vec<String>> {
        info!("Checking for missing daily averages...");
        let samples = self.csv.read_samples().await?;
        if samples.is_empty() {
            info!("No source data to process");
            return Ok(Vec::new());
        }
        let aggregates = self.csv.read_aggregates().await?;
        let today_str = today.format(DATE_FORMAT).to_string();
        let missing = aggregation::missing_dates(&samples, &aggregates, &today_str);
        if missing.is_empty() {
            info!("All daily averages are up to date");
            return Ok(Vec::new());
        }

        info!(missing = missing.len(), "Found missing daily averages");
        let computed = self.calculate_dates(&missing).await?;
        info!(computed = computed.len(), "Calculated missing daily averages");
        Ok(computed)
    }

    /// Recomputes every date present in the sample file, unconditionally.
    #[instrument(skip(self), fields(operation = "recompute_all"))]
    pub async fn recompute_all(&self) -> anyhow::Result<Vec<String>> {
        info!("Updating all daily averages...");
        let samples = self.csv.read_samples().await?;
        if samples.is_empty() {
            warn!("No data to process");
            return Ok(Vec::new());
        }
        let dates: Vec<String> = distinct_dates(&samples).into_iter().collect();
        let computed = self.calculate_dates(&dates).await?;
        info!(days = dates.len(), computed = computed.len(), "Updated daily averages");
        Ok(computed)
    }

    async fn calculate_dates(&self, dates: &[String]) -> anyhow::Result<Vec<String>> {
        let mut computed = Vec::with_capacity(dates.len());
        for date_str in dates {
            let Ok(date) = NaiveDate::parse_from_str(date_str, DATE_FORMAT) else {
                warn!(date = %date_str, "skipping unparseable sample date");
                continue;
            };
            if self.calculate_and_save(date).await?.is_some() {
                computed.push(date_str.clone());
            }
        }
        Ok(computed)
    }
}

/// The UTC day before `today`.
pub fn previous_day(today: NaiveDate) -> NaiveDate {
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}
