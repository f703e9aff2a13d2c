// Daily aggregation: pure statistics over one calendar day's raw samples.
// File and Sheets access lives in aggregation_worker.

use std::collections::BTreeSet;

use crate::models::{DailyAggregate, DailyExtremes, Sample, date_of};

/// Aggregates the samples whose timestamp falls on `date` (`YYYY-MM-DD`).
/// Zero counts are failed observations and are excluded from every statistic.
/// Returns `None` when no valid sample remains. Max/min ties keep the first sample seen.
pub fn compute_daily_aggregate(date: &str, samples: &[Sample]) -> Option<DailyAggregate> {
    let mut valid = samples
        .iter()
        .filter(|s| s.date() == date && s.player_count > 0);

    let first = valid.next()?;
    let mut max = first;
    let mut min = first;
    let mut sum = first.player_count as u64;
    let mut count: u64 = 1;

    for s in valid {
        sum += s.player_count as u64;
        count += 1;
        if s.player_count > max.player_count {
            max = s;
        }
        if s.player_count < min.player_count {
            min = s;
        }
    }

    Some(DailyAggregate {
        date: date.to_string(),
        average_player_count: round_half_up(sum, count) as u32,
        sample_count: count as u32,
        extremes: Some(DailyExtremes {
            max_player_count: max.player_count,
            max_timestamp: max.timestamp.clone(),
            min_player_count: min.player_count,
            min_timestamp: min.timestamp.clone(),
        }),
    })
}

/// `sum / count` rounded half-up, in integer arithmetic.
pub fn round_half_up(sum: u64, count: u64) -> u64 {
    (2 * sum + count) / (2 * count)
}

/// Distinct calendar dates present in `samples`, ascending.
pub fn distinct_dates(samples: &[Sample]) -> BTreeSet<String> {
    samples
        .iter()
        .map(|s| date_of(&s.timestamp))
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

/// Dates with samples strictly before `today` and no aggregate yet, ascending.
pub fn missing_dates(
    samples: &[Sample],
    aggregates: &[DailyAggregate],
    today: &str,
) -> Vec<String> {
    let existing: BTreeSet<&str> = aggregates.iter().map(|a| a.date.as_str()).collect();
    distinct_dates(samples)
        .into_iter()
        .filter(|d| d.as_str() < today && !existing.contains(d.as_str()))
        .collect()
}
