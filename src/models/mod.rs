// Domain models: raw samples, daily aggregates, and the record union mirrored to Sheets

mod aggregate;
mod record;
mod sample;

pub use aggregate::{
    DAILY_AGGREGATE_HEADER, DailyAggregate, DailyExtremes, LEGACY_DAILY_AGGREGATE_HEADER,
};
pub use record::{Record, RecordKind};
pub use sample::{SAMPLE_HEADER, Sample, TIMESTAMP_FORMAT, date_of};
