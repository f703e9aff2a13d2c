// Shared test helpers: scripted player-count source, in-memory Sheets mirror, config

#![allow(dead_code)]

mod memory;

pub use memory::MemoryTabularClient;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use steam_player_tracker::config::AppConfig;
use steam_player_tracker::mirror::Mirror;
use steam_player_tracker::models::Sample;
use steam_player_tracker::steam_api::{PlayerCountSource, SteamApiError, validate_player_count};

/// Replays scripted counts in order, then repeats `fallback`. `None` simulates a timeout;
/// `Some(0)` goes through the zero-player policy like the real client.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Option<u32>>>,
    fallback: Option<u32>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Option<u32>>, fallback: Option<u32>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(count: u32) -> Self {
        Self::new(vec![], Some(count))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_script(&self, script: Vec<Option<u32>>) {
        *self.script.lock().unwrap() = script.into();
    }
}

#[async_trait]
impl PlayerCountSource for ScriptedSource {
    async fn current_player_count(&self, _app_id: u32) -> Result<u32, SteamApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        match next {
            Some(n) => validate_player_count(Some(n)),
            None => Err(SteamApiError::Timeout),
        }
    }
}

pub fn sample(timestamp: &str, player_count: u32) -> Sample {
    Sample::new(timestamp, player_count)
}

/// Config with both CSV outputs under `dir`, fast retries, and Sheets enabled.
pub fn test_config(dir: &Path) -> AppConfig {
    let toml = format!(
        r#"
[steam]
app_id = 730

[output]
csv_enabled = true
csv_file_path = "{samples}"
daily_average_enabled = true
daily_average_file_path = "{aggregates}"

[scheduling]
collection_minutes = [0, 30]
daily_average_hour = 1

[retry]
max_retries = 2
base_delay_ms = 10

[google_sheets]
enabled = true
spreadsheet_id = "test-spreadsheet"
sheet_name = "PlayerData"
daily_average_sheet_name = "DailyAverages"
credentials_path = "unused.json"
"#,
        samples = dir.join("samples.csv").display(),
        aggregates = dir.join("daily.csv").display(),
    );
    AppConfig::load_from_str(&toml).expect("test config")
}

pub fn memory_mirror(config: &AppConfig) -> (Arc<MemoryTabularClient>, Mirror) {
    let client = Arc::new(MemoryTabularClient::new());
    let mirror = Mirror::new(client.clone(), &config.google_sheets, true);
    (client, mirror)
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
