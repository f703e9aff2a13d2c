// One timestamped observation of the live player count.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Second precision, UTC, no timezone suffix (e.g. `2025-01-31 13:30:00`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const SAMPLE_HEADER: [&str; 2] = ["timestamp", "player_count"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub timestamp: String,
    pub player_count: u32,
}

impl Sample {
    pub fn new(timestamp: impl Into<String>, player_count: u32) -> Self {
        Self {
            timestamp: timestamp.into(),
            player_count,
        }
    }

    /// Sample stamped with `at` truncated to the second.
    pub fn at(at: DateTime<Utc>, player_count: u32) -> Self {
        Self::new(at.format(TIMESTAMP_FORMAT).to_string(), player_count)
    }

    /// Calendar date prefix of the timestamp (`YYYY-MM-DD`).
    pub fn date(&self) -> &str {
        date_of(&self.timestamp)
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![self.timestamp.clone(), self.player_count.to_string()]
    }
}

/// Date part of a stored timestamp. Accepts both `YYYY-MM-DD HH:MM:SS` and ISO `T` separators.
pub fn date_of(timestamp: &str) -> &str {
    let end = timestamp.find([' ', 'T']).unwrap_or(timestamp.len());
    &timestamp[..end]
}
