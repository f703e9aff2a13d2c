// In-memory retry buffer for Sheets writes.
// A failed immediate write is queued; a periodic tick drains the queue, dropping items
// after MAX_ATTEMPTS failed drains. Nothing is persisted: a dropped item is lost.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::models::{Record, RecordKind};
use crate::sheets::{SheetStore, SheetsError};

/// Failed drain attempts after which a queued write is dropped.
pub const MAX_ATTEMPTS: u32 = 3;
/// Default spacing between drain ticks.
pub const DRAIN_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("no sheet configured for {0:?} records")]
    StoreMissing(RecordKind),
}

#[derive(Debug, Clone)]
pub struct QueuedWrite {
    pub record: Record,
    pub attempt_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// `queue_length` counts waiting items plus those a running drain has not settled yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue_length: usize,
    pub is_processing: bool,
}

/// Outcome counts of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub written: usize,
    pub retained: usize,
    pub dropped: usize,
}

/// Sheet stores are optional per kind (the aggregate tab may be disabled).
pub struct OutboundQueue {
    samples: Option<Arc<SheetStore>>,
    aggregates: Option<Arc<SheetStore>>,
    queue: Mutex<VecDeque<QueuedWrite>>,
    /// Items taken by the running drain and not yet written, dropped, or requeued.
    in_flight: AtomicUsize,
    draining: AtomicBool,
}

impl OutboundQueue {
    pub fn new(samples: Option<Arc<SheetStore>>, aggregates: Option<Arc<SheetStore>>) -> Self {
        Self {
            samples,
            aggregates,
            queue: Mutex::new(VecDeque::new()),
            in_flight: AtomicUsize::new(0),
            draining: AtomicBool::new(false),
        }
    }

    fn store_for(&self, kind: RecordKind) -> Result<&Arc<SheetStore>, QueueError> {
        let store = match kind {
            RecordKind::Sample => self.samples.as_ref(),
            RecordKind::DailyAggregate => self.aggregates.as_ref(),
        };
        store.ok_or(QueueError::StoreMissing(kind))
    }

    pub fn has_store_for(&self, kind: RecordKind) -> bool {
        self.store_for(kind).is_ok()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<QueuedWrite>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn write(&self, record: &Record) -> Result<(), SheetsError> {
        match self.store_for(record.kind()) {
            Ok(store) => store.append(record).await,
            Err(e) => Err(SheetsError::Transport(e.to_string())),
        }
    }

    /// Writes immediately; on failure the record is queued for the drain tick.
    /// Only a missing store for the record kind is reported as an error.
    pub async fn enqueue_or_write(&self, record: Record) -> Result<(), QueueError> {
        self.store_for(record.kind())?;
        match self.write(&record).await {
            Ok(()) => {
                info!(kind = ?record.kind(), key = record.key(), "record written to sheet");
            }
            Err(e) => {
                warn!(
                    kind = ?record.kind(),
                    key = record.key(),
                    error = %e,
                    "Failed to write record immediately, queuing for retry"
                );
                self.lock().push_back(QueuedWrite {
                    record,
                    attempt_count: 0,
                    enqueued_at: Utc::now(),
                });
            }
        }
        Ok(())
    }

    pub fn status(&self) -> QueueStatus {
        let queue = self.lock();
        QueueStatus {
            queue_length: queue.len() + self.in_flight.load(Ordering::SeqCst),
            is_processing: self.draining.load(Ordering::SeqCst),
        }
    }

    /// Retries every item queued when the drain starts. Returns `None` when a drain is
    /// already running. Items enqueued meanwhile wait for the next drain.
    pub async fn drain_once(&self) -> Option<DrainReport> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("Queue processing already in progress");
            return None;
        }

        let batch: Vec<QueuedWrite> = {
            let mut queue = self.lock();
            self.in_flight.store(queue.len(), Ordering::SeqCst);
            queue.drain(..).collect()
        };
        let mut report = DrainReport::default();
        let mut survivors = Vec::new();
        if !batch.is_empty() {
            info!(queued = batch.len(), "Processing queued records");
        }

        for mut item in batch {
            match self.write(&item.record).await {
                Ok(()) => {
                    info!(key = item.record.key(), "queued record written");
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    report.written += 1;
                }
                Err(e) => {
                    item.attempt_count += 1;
                    warn!(
                        key = item.record.key(),
                        attempt = item.attempt_count,
                        max_attempts = MAX_ATTEMPTS,
                        error = %e,
                        "Failed to process queued record"
                    );
                    if item.attempt_count >= MAX_ATTEMPTS {
                        error!(
                            kind = ?item.record.kind(),
                            key = item.record.key(),
                            row = ?item.record.to_row(),
                            enqueued_at = %item.enqueued_at,
                            "Max retries exceeded, dropping record"
                        );
                        self.in_flight.fetch_sub(1, Ordering::SeqCst);
                        report.dropped += 1;
                    } else {
                        survivors.push(item);
                    }
                }
            }
        }

        report.retained = survivors.len();
        {
            let mut queue = self.lock();
            for item in survivors.into_iter().rev() {
                queue.push_front(item);
            }
            self.in_flight.store(0, Ordering::SeqCst);
        }
        self.draining.store(false, Ordering::SeqCst);

        if report.written + report.dropped > 0 {
            info!(
                written = report.written,
                dropped = report.dropped,
                remaining = self.status().queue_length,
                "queue drain complete"
            );
        }
        Some(report)
    }

    /// Drains on a fixed interval until the handle is aborted.
    pub fn spawn_processor(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                if queue.status().queue_length > 0 {
                    queue.drain_once().await;
                }
            }
        })
    }
}
