use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub steam: SteamConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub google_sheets: GoogleSheetsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SteamConfig {
    pub app_id: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_true")]
    pub csv_enabled: bool,
    #[serde(default = "default_csv_file_path")]
    pub csv_file_path: PathBuf,
    #[serde(default = "default_true")]
    pub daily_average_enabled: bool,
    #[serde(default = "default_daily_average_file_path")]
    pub daily_average_file_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_enabled: true,
            csv_file_path: default_csv_file_path(),
            daily_average_enabled: true,
            daily_average_file_path: default_daily_average_file_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    /// Minutes of every hour at which a sample is collected (0-59).
    #[serde(default = "default_collection_minutes")]
    pub collection_minutes: Vec<u32>,
    /// Hour of the day (0-23, local time) at which yesterday's aggregate is computed.
    #[serde(default = "default_daily_average_hour")]
    pub daily_average_hour: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            collection_minutes: default_collection_minutes(),
            daily_average_hour: default_daily_average_hour(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSheetsConfig {
    #[serde(default)]
    pub enabled: bool,
    pub spreadsheet_id: Option<String>,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    #[serde(default = "default_daily_average_sheet_name")]
    pub daily_average_sheet_name: String,
    /// Service-account key JSON, or a pre-issued bearer token (raw text or `{"access_token": ...}`).
    pub credentials_path: Option<PathBuf>,
    /// Rebuild both sheets from the local CSV files shortly after startup.
    #[serde(default)]
    pub sync_on_startup: bool,
    #[serde(default = "default_sync_delay_secs")]
    pub sync_delay_secs: u64,
}

impl Default for GoogleSheetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spreadsheet_id: None,
            sheet_name: default_sheet_name(),
            daily_average_sheet_name: default_daily_average_sheet_name(),
            credentials_path: None,
            sync_on_startup: false,
            sync_delay_secs: default_sync_delay_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_csv_file_path() -> PathBuf {
    PathBuf::from("steam_concurrent_players.csv")
}

fn default_daily_average_file_path() -> PathBuf {
    PathBuf::from("steam_daily_averages.csv")
}

fn default_collection_minutes() -> Vec<u32> {
    vec![0, 30]
}

fn default_daily_average_hour() -> u32 {
    1
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_sheet_name() -> String {
    "PlayerData".into()
}

fn default_daily_average_sheet_name() -> String {
    "DailyAverages".into()
}

fn default_sync_delay_secs() -> u64 {
    10
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Sheets settings when mirroring is enabled; `None` otherwise.
    pub fn sheets(&self) -> Option<&GoogleSheetsConfig> {
        self.google_sheets.enabled.then_some(&self.google_sheets)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.steam.app_id > 0,
            "steam.app_id must be > 0, got {}",
            self.steam.app_id
        );
        anyhow::ensure!(
            !self.output.csv_enabled || !self.output.csv_file_path.as_os_str().is_empty(),
            "output.csv_file_path must be non-empty"
        );
        anyhow::ensure!(
            !self.output.daily_average_enabled
                || !self.output.daily_average_file_path.as_os_str().is_empty(),
            "output.daily_average_file_path must be non-empty"
        );
        anyhow::ensure!(
            !self.scheduling.collection_minutes.is_empty(),
            "scheduling.collection_minutes must list at least one minute"
        );
        if let Some(bad) = self
            .scheduling
            .collection_minutes
            .iter()
            .find(|m| **m > 59)
        {
            anyhow::bail!(
                "scheduling.collection_minutes must be between 0 and 59, got {}",
                bad
            );
        }
        let mut seen = std::collections::BTreeSet::new();
        if let Some(dup) = self
            .scheduling
            .collection_minutes
            .iter()
            .find(|m| !seen.insert(**m))
        {
            anyhow::bail!("scheduling.collection_minutes lists minute {} twice", dup);
        }
        anyhow::ensure!(
            self.scheduling.daily_average_hour <= 23,
            "scheduling.daily_average_hour must be between 0 and 23, got {}",
            self.scheduling.daily_average_hour
        );
        if let Some(sheets) = self.sheets() {
            anyhow::ensure!(
                sheets
                    .spreadsheet_id
                    .as_deref()
                    .is_some_and(|id| !id.is_empty()),
                "google_sheets.spreadsheet_id is required when Google Sheets is enabled"
            );
            anyhow::ensure!(
                sheets
                    .credentials_path
                    .as_ref()
                    .is_some_and(|p| !p.as_os_str().is_empty()),
                "google_sheets.credentials_path is required when Google Sheets is enabled"
            );
            anyhow::ensure!(
                !sheets.sheet_name.is_empty(),
                "google_sheets.sheet_name must be non-empty"
            );
            anyhow::ensure!(
                !self.output.daily_average_enabled || !sheets.daily_average_sheet_name.is_empty(),
                "google_sheets.daily_average_sheet_name must be non-empty"
            );
        }
        Ok(())
    }
}
