// Config loading and validation tests

use steam_player_tracker::config::AppConfig;

const VALID_CONFIG: &str = r#"
[steam]
app_id = 730

[output]
csv_enabled = true
csv_file_path = "data/players.csv"
daily_average_enabled = true
daily_average_file_path = "data/daily.csv"

[scheduling]
collection_minutes = [0, 30]
daily_average_hour = 1

[retry]
max_retries = 3
base_delay_ms = 1000

[google_sheets]
enabled = true
spreadsheet_id = "sheet-123"
sheet_name = "PlayerData"
daily_average_sheet_name = "DailyAverages"
credentials_path = "credentials.json"
sync_on_startup = true
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.steam.app_id, 730);
    assert_eq!(config.output.csv_file_path.to_str(), Some("data/players.csv"));
    assert_eq!(config.scheduling.collection_minutes, vec![0, 30]);
    assert_eq!(config.scheduling.daily_average_hour, 1);
    assert_eq!(config.retry.max_retries, 3);
    let sheets = config.sheets().expect("sheets enabled");
    assert_eq!(sheets.spreadsheet_id.as_deref(), Some("sheet-123"));
    assert!(sheets.sync_on_startup);
    assert_eq!(sheets.sync_delay_secs, 10);
}

#[test]
fn test_config_defaults_when_sections_omitted() {
    let config = AppConfig::load_from_str("[steam]\napp_id = 570\n").expect("minimal");
    assert!(config.output.csv_enabled);
    assert_eq!(
        config.output.csv_file_path.to_str(),
        Some("steam_concurrent_players.csv")
    );
    assert_eq!(config.scheduling.collection_minutes, vec![0, 30]);
    assert_eq!(config.retry.base_delay_ms, 1000);
    assert!(config.sheets().is_none());
}

#[test]
fn test_config_validation_rejects_zero_app_id() {
    let bad = VALID_CONFIG.replace("app_id = 730", "app_id = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("steam.app_id"));
}

#[test]
fn test_config_validation_rejects_minute_out_of_range() {
    let bad = VALID_CONFIG.replace("collection_minutes = [0, 30]", "collection_minutes = [0, 60]");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("collection_minutes"));
}

#[test]
fn test_config_validation_rejects_empty_minutes() {
    let bad = VALID_CONFIG.replace("collection_minutes = [0, 30]", "collection_minutes = []");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("collection_minutes"));
}

#[test]
fn test_config_validation_rejects_hour_out_of_range() {
    let bad = VALID_CONFIG.replace("daily_average_hour = 1", "daily_average_hour = 24");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("daily_average_hour"));
}

#[test]
fn test_config_validation_requires_spreadsheet_id_when_enabled() {
    let bad = VALID_CONFIG.replace("spreadsheet_id = \"sheet-123\"\n", "");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("spreadsheet_id"));
}

#[test]
fn test_config_validation_requires_credentials_when_enabled() {
    let bad = VALID_CONFIG.replace("credentials_path = \"credentials.json\"\n", "");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("credentials_path"));
}

#[test]
fn test_config_disabled_sheets_skip_validation() {
    let config = AppConfig::load_from_str(
        "[steam]\napp_id = 570\n\n[google_sheets]\nenabled = false\n",
    )
    .expect("sheets disabled");
    assert!(config.sheets().is_none());
}

#[test]
fn test_config_validation_rejects_invalid_toml() {
    let err = AppConfig::load_from_str("not valid toml [[[").unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_config_load_from_file_via_env() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, VALID_CONFIG).unwrap();
    unsafe { std::env::set_var("CONFIG_FILE", path.to_str().unwrap()) };
    let result = AppConfig::load();
    unsafe { std::env::remove_var("CONFIG_FILE") };
    let config = result.expect("load from CONFIG_FILE");
    assert_eq!(config.steam.app_id, 730);
}

#[test]
fn test_config_validation_rejects_duplicate_minutes() {
    let bad = VALID_CONFIG.replace("collection_minutes = [0, 30]", "collection_minutes = [0, 0]");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("twice"));
}
