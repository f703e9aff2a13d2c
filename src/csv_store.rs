// Local flat-file persistence: comma-delimited rows with a header, append-only.
// No locking: each file has a single writer (collection loop / aggregation service).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::models::{
    DAILY_AGGREGATE_HEADER, DailyAggregate, LEGACY_DAILY_AGGREGATE_HEADER, SAMPLE_HEADER, Sample,
};

#[derive(Debug, thiserror::Error)]
pub enum CsvStoreError {
    #[error("Failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CsvStoreError {
    fn io(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Raw sample file plus the daily aggregate file.
#[derive(Debug, Clone)]
pub struct CsvStore {
    samples_path: PathBuf,
    aggregates_path: PathBuf,
}

impl CsvStore {
    pub fn new(samples_path: impl Into<PathBuf>, aggregates_path: impl Into<PathBuf>) -> Self {
        Self {
            samples_path: samples_path.into(),
            aggregates_path: aggregates_path.into(),
        }
    }

    pub fn samples_path(&self) -> &Path {
        &self.samples_path
    }

    pub fn aggregates_path(&self) -> &Path {
        &self.aggregates_path
    }

    #[instrument(skip(self), fields(store = "csv", operation = "append_sample"))]
    pub async fn append_sample(&self, sample: &Sample) -> Result<(), CsvStoreError> {
        append_row(&self.samples_path, &SAMPLE_HEADER, &sample.to_row()).await
    }

    /// Appends one aggregate row. A file created with the legacy three-column header keeps
    /// receiving three-column rows.
    #[instrument(skip(self), fields(store = "csv", operation = "append_aggregate"))]
    pub async fn append_aggregate(&self, aggregate: &DailyAggregate) -> Result<(), CsvStoreError> {
        let row = match read_header(&self.aggregates_path).await? {
            Some(header) if is_legacy_header(&header) => aggregate.to_legacy_row(),
            _ => aggregate.to_row(),
        };
        append_row(&self.aggregates_path, &DAILY_AGGREGATE_HEADER, &row).await
    }

    /// Replaces the existing row for `aggregate.date` in place, or appends when the date is new.
    /// The header and column layout of an existing file are preserved.
    #[instrument(skip(self), fields(store = "csv", operation = "upsert_aggregate"))]
    pub async fn upsert_aggregate(&self, aggregate: &DailyAggregate) -> Result<(), CsvStoreError> {
        let path = &self.aggregates_path;
        let content = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return self.append_aggregate(aggregate).await,
            Err(e) => return Err(CsvStoreError::io("read", path, e)),
        };

        let mut lines = content.lines();
        let Some(header) = lines.next() else {
            return self.append_aggregate(aggregate).await;
        };
        let legacy = is_legacy_header(&split_line(header));
        let replacement = if legacy {
            aggregate.to_legacy_row().join(",")
        } else {
            aggregate.to_row().join(",")
        };

        let mut replaced = false;
        let mut out = String::with_capacity(content.len() + replacement.len());
        out.push_str(header);
        out.push('\n');
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let date = line.split(',').next().unwrap_or("").trim();
            if date == aggregate.date {
                // Collapse earlier duplicates of the same date into a single row.
                if !replaced {
                    out.push_str(&replacement);
                    out.push('\n');
                    replaced = true;
                }
                continue;
            }
            out.push_str(line);
            out.push('\n');
        }

        if !replaced {
            return self.append_aggregate(aggregate).await;
        }
        fs::write(path, out)
            .await
            .map_err(|e| CsvStoreError::io("rewrite", path, e))?;
        debug!(date = %aggregate.date, "aggregate row replaced");
        Ok(())
    }

    /// All samples in file order. Rows whose count does not parse are dropped.
    pub async fn read_samples(&self) -> Result<Vec<Sample>, CsvStoreError> {
        let rows = read_rows(&self.samples_path).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let timestamp = row.first().filter(|t| !t.is_empty())?;
                let count = row.get(1)?.parse::<u32>().ok()?;
                Some(Sample::new(timestamp.clone(), count))
            })
            .collect())
    }

    /// All aggregates in file order (3- or 7-column rows).
    pub async fn read_aggregates(&self) -> Result<Vec<DailyAggregate>, CsvStoreError> {
        let rows = read_rows(&self.aggregates_path).await?;
        Ok(rows
            .iter()
            .filter_map(|row| DailyAggregate::from_row(row))
            .collect())
    }
}

/// Data rows of a delimited file, header skipped, cells trimmed. Missing file → no rows.
pub async fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, CsvStoreError> {
    let content = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CsvStoreError::io("read", path, e)),
    };
    Ok(content
        .lines()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(split_line)
        .collect())
}

async fn read_header(path: &Path) -> Result<Option<Vec<String>>, CsvStoreError> {
    match fs::read_to_string(path).await {
        Ok(c) => Ok(c.lines().next().map(split_line)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CsvStoreError::io("read", path, e)),
    }
}

fn split_line(line: &str) -> Vec<String> {
    line.split(',').map(|c| c.trim().to_string()).collect()
}

fn is_legacy_header(header: &[String]) -> bool {
    header.len() == LEGACY_DAILY_AGGREGATE_HEADER.len()
}

/// Creates the file with `header` + row when absent, otherwise appends the row.
async fn append_row(path: &Path, header: &[&str], row: &[String]) -> Result<(), CsvStoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| CsvStoreError::io("create directory for", path, e))?;
    }

    let exists = fs::try_exists(path)
        .await
        .map_err(|e| CsvStoreError::io("check", path, e))?;
    let mut line = String::new();
    if !exists {
        line.push_str(&header.join(","));
        line.push('\n');
    }
    line.push_str(&row.join(","));
    line.push('\n');

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| CsvStoreError::io("open", path, e))?;
    file.write_all(line.as_bytes())
        .await
        .map_err(|e| CsvStoreError::io("append to", path, e))?;
    file.flush()
        .await
        .map_err(|e| CsvStoreError::io("flush", path, e))?;
    Ok(())
}
