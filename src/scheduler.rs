// Cron-driven job timers: collection at fixed minutes of every hour, plus a daily trigger.
// Keys: `minute-<m>` for hourly jobs, `daily-<h>` for daily jobs. Uses local time.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::{debug, error, info};

pub type JobCallback = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid minute {0}: must be between 0 and 59")]
    InvalidMinute(u32),
    #[error("Invalid hour {0}: must be between 0 and 23")]
    InvalidHour(u32),
    #[error("Invalid cron expression {expression:?}: {message}")]
    Cron { expression: String, message: String },
}

struct ScheduledJob {
    schedule: cron::Schedule,
    handle: tokio::task::JoinHandle<()>,
}

#[derive(Default)]
pub struct Scheduler {
    jobs: Mutex<HashMap<String, ScheduledJob>>,
}

/// `sec min hour day-of-month month day-of-week`: second 0 of minute `minute`, every hour.
pub fn hourly_expression(minute: u32) -> String {
    format!("0 {minute} * * * *")
}

/// Second 0 of minute 0 of `hour`, every day.
pub fn daily_expression(hour: u32) -> String {
    format!("0 0 {hour} * * *")
}

fn parse_schedule(expression: String) -> Result<cron::Schedule, ScheduleError> {
    cron::Schedule::from_str(&expression).map_err(|e| ScheduleError::Cron {
        message: e.to_string(),
        expression,
    })
}

fn boxed<F, Fut>(callback: F) -> JobCallback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || callback().boxed())
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ScheduledJob>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces every hourly job with one per distinct minute in `minutes`. All minutes are
    /// validated before any existing job is touched; an invalid minute leaves the scheduler
    /// unchanged.
    pub fn schedule_hourly<F, Fut>(&self, minutes: &[u32], callback: F) -> Result<(), ScheduleError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let distinct: BTreeSet<u32> = minutes.iter().copied().collect();
        let mut schedules = Vec::with_capacity(distinct.len());
        for minute in distinct {
            if minute > 59 {
                return Err(ScheduleError::InvalidMinute(minute));
            }
            schedules.push((minute, parse_schedule(hourly_expression(minute))?));
        }

        let callback = boxed(callback);
        let mut jobs = self.lock();
        jobs.retain(|key, job| {
            let hourly = key.starts_with("minute-");
            if hourly {
                job.handle.abort();
            }
            !hourly
        });
        for (minute, schedule) in schedules {
            let key = format!("minute-{minute}");
            let handle = tokio::spawn(run_job(key.clone(), schedule.clone(), callback.clone()));
            if let Some(previous) = jobs.insert(key, ScheduledJob { schedule, handle }) {
                previous.handle.abort();
            }
        }
        info!(minutes = ?minutes, jobs = jobs.len(), "hourly collection scheduled");
        Ok(())
    }

    /// Adds a job at minute 0 of `hour` every day. Existing jobs are kept; a job for the
    /// same hour is replaced.
    pub fn schedule_daily<F, Fut>(&self, hour: u32, callback: F) -> Result<(), ScheduleError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if hour > 23 {
            return Err(ScheduleError::InvalidHour(hour));
        }
        let schedule = parse_schedule(daily_expression(hour))?;
        let key = format!("daily-{hour}");
        let handle = tokio::spawn(run_job(key.clone(), schedule.clone(), boxed(callback)));
        if let Some(previous) = self.lock().insert(key, ScheduledJob { schedule, handle }) {
            previous.handle.abort();
        }
        info!(hour, "daily job scheduled");
        Ok(())
    }

    /// Cancels every job. In-flight callbacks are detached, not awaited.
    pub fn stop_all(&self) {
        let mut jobs = self.lock();
        for (key, job) in jobs.drain() {
            job.handle.abort();
            debug!(job = %key, "job stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.lock().is_empty()
    }

    /// Registered job keys, sorted.
    pub fn job_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Minutes of the hourly jobs, ascending.
    pub fn scheduled_minutes(&self) -> Vec<u32> {
        let mut minutes: Vec<u32> = self
            .lock()
            .keys()
            .filter_map(|k| k.strip_prefix("minute-")?.parse().ok())
            .collect();
        minutes.sort_unstable();
        minutes
    }

    /// Next firing time of the job registered under `key`.
    pub fn next_run(&self, key: &str) -> Option<DateTime<Local>> {
        let jobs = self.lock();
        let job = jobs.get(key)?;
        job.schedule.after(&Local::now()).next()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Sleeps until each cron time and runs the callback in its own task, so an error or panic
/// in one run never stops the schedule. A cron time fires at most once, even if the wake-up
/// lands slightly early.
async fn run_job(key: String, schedule: cron::Schedule, callback: JobCallback) {
    let mut last_fired: Option<DateTime<Local>> = None;
    loop {
        let now = Local::now();
        let from = last_fired.map_or(now, |fired| fired.max(now));
        let Some(next) = schedule.after(&from).next() else {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            continue;
        };
        let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
        tokio::time::sleep(delay).await;
        last_fired = Some(next);

        debug!(job = %key, "job firing");
        match tokio::spawn(callback()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(job = %key, error = %e, "Scheduled task error"),
            Err(e) => error!(job = %key, error = %e, "Scheduled task panicked"),
        }
    }
}
