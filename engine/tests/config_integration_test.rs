//! Integration tests for configuration management
//!
//! These tests verify that the Config struct can be properly loaded,
//! validated, and processed with path expansion.

use attendant_engine::config::Config;
use sdk::errors::EngineError;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

fn full_config(data_dir: &Path) -> String {
    format!(
        r#"
[core]
log_level = "debug"
data_dir = "{}"
log_to_file = false

[store]
base_url = "https://attendance-demo.firebaseio.com"
last_key_path = "Last Updated Time"
request_timeout_secs = 8

[backoff]
base_secs = 3
step_secs = 4
max_secs = 20

[watcher]
afk_interval_secs = 45
tick_secs = 1

[controller]
auth_pause_secs = 600
confirm_alert_threshold = 2

[session]
webdriver_url = "http://localhost:4444"
site_url = "https://quiz.example/"
login_url_prefix = "https://sso.example/adfs/ls/"
joined_url = "https://quiz.example/student/joinsession.php"
confirmed_answer_selector = ".answered"
command_timeout_secs = 15
page_wait_secs = 5
headless = true

[notify]
enabled = false
"#,
        data_dir.display()
    )
}

#[test]
fn test_config_toml_parsing() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let path = write_config(dir.path(), &full_config(&data_dir));

    let config = Config::load_from_path(&path).unwrap();

    assert_eq!(config.core.log_level, "debug");
    assert!(!config.core.log_to_file);
    assert_eq!(config.store.base_url, "https://attendance-demo.firebaseio.com");
    assert_eq!(config.store.request_timeout(), Duration::from_secs(8));
    assert_eq!(config.backoff.base(), Duration::from_secs(3));
    assert_eq!(config.backoff.step(), Duration::from_secs(4));
    assert_eq!(config.backoff.max(), Duration::from_secs(20));
    assert_eq!(config.watcher.afk_interval(), Duration::from_secs(45));
    assert_eq!(config.watcher.tick(), Duration::from_secs(1));
    assert_eq!(config.controller.auth_pause_secs, 600);
    assert_eq!(config.controller.confirm_alert_threshold, 2);
    assert_eq!(config.session.webdriver_url, "http://localhost:4444");
    assert!(config.session.headless);
    assert!(!config.notify.enabled);
    assert!(config.notify.command.is_none());

    assert!(config.validate_for_run().is_ok());
}

#[test]
fn test_missing_sections_use_defaults() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let path = write_config(
        dir.path(),
        &format!(
            "[core]\nlog_level = \"info\"\ndata_dir = \"{}\"\n",
            data_dir.display()
        ),
    );

    let config = Config::load_from_path(&path).unwrap();
    let defaults = Config::default_config();

    assert_eq!(config.backoff.base(), defaults.backoff.base());
    assert_eq!(config.watcher.afk_interval(), defaults.watcher.afk_interval());
    assert_eq!(config.session.webdriver_url, defaults.session.webdriver_url);
    assert_eq!(config.store.last_key_path, "Last Updated Time");
    assert!(data_dir.exists(), "data directory is created on load");
}

#[test]
fn test_run_requires_store_url() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let path = write_config(
        dir.path(),
        &format!("[core]\ndata_dir = \"{}\"\n", data_dir.display()),
    );

    let config = Config::load_from_path(&path).unwrap();
    assert!(matches!(
        config.validate_for_run(),
        Err(EngineError::Config(_))
    ));
}

#[test]
fn test_invalid_log_level_rejected() {
    let dir = TempDir::new().unwrap();
    let body = full_config(&dir.path().join("data")).replace("\"debug\"", "\"loud\"");
    let path = write_config(dir.path(), &body);

    let err = Config::load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("Invalid log level"));
}

#[test]
fn test_watch_tick_out_of_range_rejected() {
    let dir = TempDir::new().unwrap();
    let body = full_config(&dir.path().join("data")).replace("tick_secs = 1", "tick_secs = 9");
    let path = write_config(dir.path(), &body);

    let err = Config::load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("tick_secs"));
}

#[test]
fn test_backoff_base_above_max_rejected() {
    let dir = TempDir::new().unwrap();
    let body = full_config(&dir.path().join("data")).replace("base_secs = 3", "base_secs = 60");
    let path = write_config(dir.path(), &body);

    let err = Config::load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("backoff.base_secs"));
}

#[test]
fn test_unparseable_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "[core\nlog_level = ");

    assert!(matches!(
        Config::load_from_path(&path),
        Err(EngineError::Config(_))
    ));
}
