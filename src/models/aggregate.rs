// Daily aggregate: one row per UTC calendar date, derived from raw samples.

use serde::{Deserialize, Serialize};

pub const DAILY_AGGREGATE_HEADER: [&str; 7] = [
    "date",
    "average_player_count",
    "sample_count",
    "max_player_count",
    "max_timestamp",
    "min_player_count",
    "min_timestamp",
];

/// Header of aggregate files written before max/min tracking existed.
pub const LEGACY_DAILY_AGGREGATE_HEADER: [&str; 3] =
    ["date", "average_player_count", "sample_count"];

/// Peak and trough of a day, with the sample timestamps they came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyExtremes {
    pub max_player_count: u32,
    pub max_timestamp: String,
    pub min_player_count: u32,
    pub min_timestamp: String,
}

/// Summary of one day's valid (non-zero) samples. Keyed by `date`.
/// `extremes` is `None` for rows read from legacy three-column files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    pub date: String,
    pub average_player_count: u32,
    pub sample_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extremes: Option<DailyExtremes>,
}

impl DailyAggregate {
    /// Seven cells, or three when the max/min columns are unknown.
    pub fn to_row(&self) -> Vec<String> {
        let mut row = self.to_legacy_row();
        if let Some(e) = &self.extremes {
            row.extend([
                e.max_player_count.to_string(),
                e.max_timestamp.clone(),
                e.min_player_count.to_string(),
                e.min_timestamp.clone(),
            ]);
        }
        row
    }

    /// First three columns only, for files created with the legacy header.
    pub fn to_legacy_row(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.average_player_count.to_string(),
            self.sample_count.to_string(),
        ]
    }

    /// Parses a 3- or 7-column row. Rows without max/min cells get `extremes: None`.
    /// Returns `None` when a numeric column does not parse.
    pub fn from_row(row: &[String]) -> Option<Self> {
        if row.len() < 3 || row[0].is_empty() {
            return None;
        }
        let average_player_count = row[1].parse().ok()?;
        let sample_count = row[2].parse().ok()?;
        let extremes = if row.len() >= 7 && !row[3].is_empty() && !row[5].is_empty() {
            Some(DailyExtremes {
                max_player_count: row[3].parse().ok()?,
                max_timestamp: row[4].clone(),
                min_player_count: row[5].parse().ok()?,
                min_timestamp: row[6].clone(),
            })
        } else {
            None
        };
        Some(Self {
            date: row[0].clone(),
            average_player_count,
            sample_count,
            extremes,
        })
    }
}
