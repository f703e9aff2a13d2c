// A row destined for the remote mirror: either a raw sample or a daily aggregate.

use serde::{Deserialize, Serialize};

use super::{DAILY_AGGREGATE_HEADER, DailyAggregate, SAMPLE_HEADER, Sample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    Sample,
    DailyAggregate,
}

impl RecordKind {
    pub fn header(self) -> &'static [&'static str] {
        match self {
            RecordKind::Sample => &SAMPLE_HEADER,
            RecordKind::DailyAggregate => &DAILY_AGGREGATE_HEADER,
        }
    }

    /// Last column letter of the kind's layout (A:B for samples, A:G for aggregates).
    pub fn last_column(self) -> char {
        match self {
            RecordKind::Sample => 'B',
            RecordKind::DailyAggregate => 'G',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum Record {
    Sample(Sample),
    DailyAggregate(DailyAggregate),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Sample(_) => RecordKind::Sample,
            Record::DailyAggregate(_) => RecordKind::DailyAggregate,
        }
    }

    /// Natural key: timestamp for samples, date for aggregates.
    pub fn key(&self) -> &str {
        match self {
            Record::Sample(s) => &s.timestamp,
            Record::DailyAggregate(a) => &a.date,
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        match self {
            Record::Sample(s) => s.to_row(),
            Record::DailyAggregate(a) => a.to_row(),
        }
    }
}

impl From<Sample> for Record {
    fn from(sample: Sample) -> Self {
        Record::Sample(sample)
    }
}

impl From<DailyAggregate> for Record {
    fn from(aggregate: DailyAggregate) -> Self {
        Record::DailyAggregate(aggregate)
    }
}
