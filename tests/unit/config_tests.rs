use std::time::Duration;

use lineup::{config::GlobalConfig, AppError};

fn sample_toml() -> &'static str {
    r#"
db_path = "data/lineup.db"
http_port = 9000
retention_days = 14
shutdown_grace_seconds = 5

[display]
utc_offset_minutes = 120
zone_label = "EET"

[scheduler]
poll_interval_ms = 250
lease_seconds = 30
max_attempts = 4
retry_base_seconds = 2
reconcile_interval_seconds = 15
reconcile_grace_seconds = 10

[wizard]
session_ttl_seconds = 600

[intent]
enabled = false
model = "gpt-4o"
"#
}

#[test]
fn parses_full_config() {
    let config = GlobalConfig::from_toml_str(sample_toml()).expect("valid config");
    assert_eq!(config.http_port, 9000);
    assert_eq!(config.retention_days, 14);
    assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
    assert_eq!(config.display.utc_offset_minutes, 120);
    assert_eq!(config.display.zone_label, "EET");
    assert_eq!(config.scheduler.poll_interval(), Duration::from_millis(250));
    assert_eq!(config.scheduler.lease(), Duration::from_secs(30));
    assert_eq!(config.scheduler.max_attempts, 4);
    assert_eq!(config.wizard_ttl(), Duration::from_secs(600));
    assert!(!config.intent.enabled);
    assert_eq!(config.intent.model, "gpt-4o");
}

#[test]
fn defaults_fill_missing_sections() {
    let config = GlobalConfig::from_toml_str("db_path = \"lineup.db\"").expect("valid config");
    assert_eq!(config.http_port, 8080);
    assert_eq!(config.retention_days, 30);
    assert_eq!(config.display.utc_offset_minutes, 180);
    assert_eq!(config.display.zone_label, "MSK");
    assert_eq!(config.scheduler.max_attempts, 10);
    assert_eq!(config.wizard.session_ttl_seconds, 1800);
    assert!(config.intent.enabled);
}

#[test]
fn tokens_are_never_read_from_toml() {
    let config = GlobalConfig::from_toml_str(
        "db_path = \"lineup.db\"\n[slack]\nbot_token = \"xoxb-leak\"\napp_token = \"xapp-leak\"\n",
    )
    .expect("valid config");
    assert!(config.slack.bot_token.is_empty());
    assert!(config.slack.app_token.is_empty());
}

#[test]
fn rejects_zero_max_attempts() {
    let err = GlobalConfig::from_toml_str("db_path = \"x.db\"\n[scheduler]\nmax_attempts = 0\n")
        .expect_err("zero attempts");
    assert!(matches!(err, AppError::Config(msg) if msg.contains("max_attempts")));
}

#[test]
fn rejects_out_of_range_offset() {
    let err =
        GlobalConfig::from_toml_str("db_path = \"x.db\"\n[display]\nutc_offset_minutes = 900\n")
            .expect_err("offset too large");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn rejects_missing_db_path() {
    let err = GlobalConfig::from_toml_str("http_port = 1").expect_err("db_path required");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, sample_toml()).expect("write config");
    let config = GlobalConfig::load_from_path(&path).expect("load");
    assert_eq!(config.http_port, 9000);

    let missing = GlobalConfig::load_from_path(dir.path().join("nope.toml"));
    assert!(matches!(missing, Err(AppError::Config(_))));
}
