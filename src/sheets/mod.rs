// Remote tabular mirror (Google Sheets). One SheetStore per record kind / sheet tab.
// Every request goes through a shared RateLimiter.

mod google;
mod rate_limit;

pub use google::{CredentialsSource, GoogleSheetsClient, classify_error, parse_credentials};
pub use rate_limit::{MIN_REQUEST_INTERVAL, RateLimiter};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::models::{Record, RecordKind};

#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    /// The service could not resolve the range, which is how a missing tab is reported.
    #[error("Unable to parse range: {0}")]
    RangeNotFound(String),
    #[error("Sheet already exists: {0}")]
    SheetExists(String),
    #[error("Sheets API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Sheets request failed: {0}")]
    Transport(String),
    #[error("Failed to load Sheets credentials: {0}")]
    Credentials(String),
    #[error("record kind {found:?} does not belong in sheet for {expected:?}")]
    KindMismatch {
        expected: RecordKind,
        found: RecordKind,
    },
    #[error("Failed to {operation} in sheet {sheet}: {source}")]
    Operation {
        operation: &'static str,
        sheet: String,
        #[source]
        source: Box<SheetsError>,
    },
}

/// Minimal value-range API of a spreadsheet service. Ranges use A1 notation (`Sheet!A1:B2`).
#[async_trait]
pub trait TabularClient: Send + Sync {
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError>;
    async fn update_values(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), SheetsError>;
    async fn append_values(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), SheetsError>;
    async fn clear_values(&self, range: &str) -> Result<(), SheetsError>;
    async fn add_sheet(&self, title: &str) -> Result<(), SheetsError>;
}

/// Mirrors one record kind into one sheet tab: header in row 1, natural key in column A.
pub struct SheetStore {
    client: Arc<dyn TabularClient>,
    limiter: Arc<RateLimiter>,
    sheet_name: String,
    kind: RecordKind,
}

impl SheetStore {
    pub fn new(
        client: Arc<dyn TabularClient>,
        limiter: Arc<RateLimiter>,
        sheet_name: impl Into<String>,
        kind: RecordKind,
    ) -> Self {
        Self {
            client,
            limiter,
            sheet_name: sheet_name.into(),
            kind,
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    fn last_column(&self) -> char {
        self.kind.last_column()
    }

    fn wrap(&self, operation: &'static str, source: SheetsError) -> SheetsError {
        SheetsError::Operation {
            operation,
            sheet: self.sheet_name.clone(),
            source: Box::new(source),
        }
    }

    fn check_kind(&self, record: &Record) -> Result<(), SheetsError> {
        if record.kind() == self.kind {
            Ok(())
        } else {
            Err(SheetsError::KindMismatch {
                expected: self.kind,
                found: record.kind(),
            })
        }
    }

    /// Writes the header unless row 1 already starts with the expected first column name.
    /// A missing tab is created and the check retried once.
    pub async fn ensure_header(&self) -> Result<(), SheetsError> {
        match self.write_header_if_missing().await {
            Err(SheetsError::RangeNotFound(range)) => {
                debug!(sheet = %self.sheet_name, range = %range, "sheet missing; creating");
                self.create_sheet().await?;
                self.write_header_if_missing().await
            }
            other => other,
        }
    }

    async fn write_header_if_missing(&self) -> Result<(), SheetsError> {
        let range = format!("{}!A1:{}1", self.sheet_name, self.last_column());
        self.limiter.acquire().await;
        let current = self.client.get_values(&range).await?;
        let header = self.kind.header();
        let present = current
            .first()
            .and_then(|row| row.first())
            .is_some_and(|first| first == header[0]);
        if !present {
            let row = header.iter().map(|h| h.to_string()).collect();
            self.limiter.acquire().await;
            self.client.update_values(&range, vec![row]).await?;
            info!(sheet = %self.sheet_name, "header row written");
        }
        Ok(())
    }

    async fn create_sheet(&self) -> Result<(), SheetsError> {
        self.limiter.acquire().await;
        match self.client.add_sheet(&self.sheet_name).await {
            Ok(()) | Err(SheetsError::SheetExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Overwrites the row whose column A equals the record's key, or appends a new row.
    #[instrument(skip(self, record), fields(sheet = %self.sheet_name, key = record.key()))]
    pub async fn append(&self, record: &Record) -> Result<(), SheetsError> {
        self.check_kind(record)?;
        self.ensure_header()
            .await
            .map_err(|e| self.wrap("ensure header", e))?;

        let existing = self
            .find_row(record.key())
            .await
            .map_err(|e| self.wrap("locate row", e))?;
        let last = self.last_column();
        match existing {
            Some(row_number) => {
                let range = format!("{}!A{row_number}:{last}{row_number}", self.sheet_name);
                self.limiter.acquire().await;
                self.client
                    .update_values(&range, vec![record.to_row()])
                    .await
                    .map_err(|e| self.wrap("update row", e))?;
                debug!(row = row_number, "updated existing row");
            }
            None => {
                let range = format!("{}!A:{last}", self.sheet_name);
                self.limiter.acquire().await;
                self.client
                    .append_values(&range, vec![record.to_row()])
                    .await
                    .map_err(|e| self.wrap("append row", e))?;
            }
        }
        Ok(())
    }

    /// 1-based sheet row holding `key` in column A, skipping the header.
    async fn find_row(&self, key: &str) -> Result<Option<usize>, SheetsError> {
        let range = format!("{}!A2:A", self.sheet_name);
        self.limiter.acquire().await;
        let keys = self.client.get_values(&range).await?;
        Ok(keys
            .iter()
            .position(|row| row.first().is_some_and(|k| k == key))
            .map(|i| i + 2))
    }

    /// Appends all records in one request without checking for duplicates.
    #[instrument(skip(self, records), fields(sheet = %self.sheet_name, records = records.len()))]
    pub async fn batch_append(&self, records: &[Record]) -> Result<(), SheetsError> {
        if records.is_empty() {
            return Ok(());
        }
        for record in records {
            self.check_kind(record)?;
        }
        self.ensure_header()
            .await
            .map_err(|e| self.wrap("ensure header", e))?;
        let rows = records.iter().map(Record::to_row).collect();
        let range = format!("{}!A:{}", self.sheet_name, self.last_column());
        self.limiter.acquire().await;
        self.client
            .append_values(&range, rows)
            .await
            .map_err(|e| self.wrap("batch append", e))
    }

    /// Clears every data row, then writes `records` sorted by key in one request.
    /// Records sharing a key collapse to the last one given.
    #[instrument(skip(self, records), fields(sheet = %self.sheet_name, records = records.len()))]
    pub async fn replace_all(&self, records: Vec<Record>) -> Result<usize, SheetsError> {
        for record in &records {
            self.check_kind(record)?;
        }
        self.ensure_header()
            .await
            .map_err(|e| self.wrap("ensure header", e))?;

        let last = self.last_column();
        let clear_range = format!("{}!A2:{last}", self.sheet_name);
        self.limiter.acquire().await;
        self.client
            .clear_values(&clear_range)
            .await
            .map_err(|e| self.wrap("clear rows", e))?;

        let sorted: BTreeMap<String, Record> = records
            .into_iter()
            .map(|r| (r.key().to_string(), r))
            .collect();
        let count = sorted.len();
        if count == 0 {
            return Ok(0);
        }
        let rows: Vec<Vec<String>> = sorted.values().map(Record::to_row).collect();
        let range = format!("{}!A2:{last}{}", self.sheet_name, count + 1);
        self.limiter.acquire().await;
        self.client
            .update_values(&range, rows)
            .await
            .map_err(|e| self.wrap("write rows", e))?;
        info!(rows = count, "sheet rewritten");
        Ok(count)
    }
}
