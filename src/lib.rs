// Library for the tracker binaries and integration tests

pub mod aggregation;
pub mod aggregation_worker;
pub mod backfill;
pub mod config;
pub mod csv_store;
pub mod logging;
pub mod mirror;
pub mod models;
pub mod outbound_queue;
pub mod retry;
pub mod scheduler;
pub mod sheets;
pub mod steam_api;
pub mod sync;
pub mod tracker;
pub mod version;
