//! Configuration management
//!
//! This module handles loading, validation, and management of the Attendant
//! configuration. Configuration is stored in TOML format at
//! ~/.attendant/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory, log file persistence
//! - **store**: Answer store location and request timeout
//! - **backoff**: Linear backoff between poll cycles
//! - **watcher**: Override watcher interval and cadence
//! - **controller**: Authentication pause and alert thresholds
//! - **session**: WebDriver endpoint, session site URLs and selectors
//! - **notify**: Desktop notification delivery
//!
//! # Path Expansion
//!
//! `~` in `core.data_dir` is expanded to the user's home directory and the
//! directory is created if it doesn't exist.
//!
//! # Examples
//!
//! ```no_run
//! use attendant_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration from default location
//! let config = Config::load_or_create()?;
//!
//! println!("Store: {}", config.store.base_url);
//! println!("AFK interval: {:?}", config.watcher.afk_interval());
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    pub core: CoreConfig,

    /// Answer store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Backoff between poll cycles
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Override watcher settings
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Controller escalation settings
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Session driver settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Desktop notification settings
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Append log lines to `<data_dir>/attendant.log`
    #[serde(default = "default_true")]
    pub log_to_file: bool,
}

/// Answer store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the store (e.g. a Firebase Realtime Database URL)
    #[serde(default)]
    pub base_url: String,

    /// Key holding the latest publish time
    #[serde(default = "default_last_key_path")]
    pub last_key_path: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Interval after a successful cycle (seconds)
    #[serde(default = "default_backoff_base")]
    pub base_secs: u64,

    /// Added per consecutive retryable failure (seconds)
    #[serde(default = "default_backoff_step")]
    pub step_secs: u64,

    /// Ceiling (seconds)
    #[serde(default = "default_backoff_max")]
    pub max_secs: u64,
}

/// Override watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// How long a staged free-text answer waits for the human (seconds)
    #[serde(default = "default_afk_interval")]
    pub afk_interval_secs: u64,

    /// How often the staged input is re-read (seconds, 1-5)
    #[serde(default = "default_watch_tick")]
    pub tick_secs: u64,
}

/// Controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Pause after an authentication failure before trying again (seconds)
    #[serde(default = "default_auth_pause")]
    pub auth_pause_secs: u64,

    /// Consecutive confirmation mismatches before the operator is notified
    #[serde(default = "default_confirm_alert_threshold")]
    pub confirm_alert_threshold: u32,
}

/// Session driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// W3C WebDriver endpoint (e.g. chromedriver)
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Landing page where a session id is entered
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Prefix of the single sign-on login page
    #[serde(default = "default_login_url_prefix")]
    pub login_url_prefix: String,

    /// URL shown after a session was joined
    #[serde(default = "default_joined_url")]
    pub joined_url: String,

    /// CSS selector of the element showing the submitted answer
    #[serde(default = "default_confirmed_answer_selector")]
    pub confirmed_answer_selector: String,

    /// Per-command timeout for WebDriver requests (seconds)
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Upper bound for page loads and element waits (seconds)
    #[serde(default = "default_page_wait")]
    pub page_wait_secs: u64,

    /// Run the browser without a window
    #[serde(default)]
    pub headless: bool,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Deliver desktop notifications (otherwise they are only logged)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Program used to show notifications; platform default when unset
    #[serde(default)]
    pub command: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            last_key_path: default_last_key_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_secs: default_backoff_base(),
            step_secs: default_backoff_step(),
            max_secs: default_backoff_max(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            afk_interval_secs: default_afk_interval(),
            tick_secs: default_watch_tick(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            auth_pause_secs: default_auth_pause(),
            confirm_alert_threshold: default_confirm_alert_threshold(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            site_url: default_site_url(),
            login_url_prefix: default_login_url_prefix(),
            joined_url: default_joined_url(),
            confirmed_answer_selector: default_confirmed_answer_selector(),
            command_timeout_secs: default_command_timeout(),
            page_wait_secs: default_page_wait(),
            headless: false,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: None,
        }
    }
}

impl BackoffConfig {
    pub fn base(&self) -> Duration {
        Duration::from_secs(self.base_secs)
    }

    pub fn step(&self) -> Duration {
        Duration::from_secs(self.step_secs)
    }

    pub fn max(&self) -> Duration {
        Duration::from_secs(self.max_secs)
    }
}

impl WatcherConfig {
    pub fn afk_interval(&self) -> Duration {
        Duration::from_secs(self.afk_interval_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.attendant")
}

fn default_last_key_path() -> String {
    "Last Updated Time".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_backoff_base() -> u64 {
    5
}

fn default_backoff_step() -> u64 {
    5
}

fn default_backoff_max() -> u64 {
    30
}

fn default_afk_interval() -> u64 {
    60
}

fn default_watch_tick() -> u64 {
    2
}

fn default_auth_pause() -> u64 {
    300
}

fn default_confirm_alert_threshold() -> u32 {
    3
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_site_url() -> String {
    "https://server4.ureply.mobi/".to_string()
}

fn default_login_url_prefix() -> String {
    "https://sts.cuhk.edu.hk/adfs/ls/".to_string()
}

fn default_joined_url() -> String {
    "https://server4.ureply.mobi/student/cads/joinsession.php".to_string()
}

fn default_confirmed_answer_selector() -> String {
    ".answered_choice, .answered_text".to_string()
}

fn default_command_timeout() -> u64 {
    30
}

fn default_page_wait() -> u64 {
    10
}

impl Config {
    /// Load configuration from the default location (~/.attendant/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default
    /// configuration. The default has no store URL, so `validate_for_run`
    /// will reject it until the operator fills one in.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default_config();

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Wrote default configuration to {}", path.display());

        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.attendant/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".attendant").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
                log_to_file: true,
            },
            store: StoreConfig::default(),
            backoff: BackoffConfig::default(),
            watcher: WatcherConfig::default(),
            controller: ControllerConfig::default(),
            session: SessionConfig::default(),
            notify: NotifyConfig::default(),
        }
    }

    /// Checks that only matter when the control loop is about to start.
    pub fn validate_for_run(&self) -> Result<(), EngineError> {
        if self.store.base_url.trim().is_empty() {
            return Err(EngineError::Config(
                "store.base_url is not set. Add the answer store URL to config.toml".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates the log level
    /// - Validates backoff and watcher bounds
    /// - Expands ~ in the data directory and creates it
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.store.request_timeout_secs == 0 {
            return Err(EngineError::Config(
                "store.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.backoff.step_secs == 0 {
            return Err(EngineError::Config(
                "backoff.step_secs must be greater than 0".to_string(),
            ));
        }
        if self.backoff.base_secs > self.backoff.max_secs {
            return Err(EngineError::Config(format!(
                "backoff.base_secs ({}) must not exceed backoff.max_secs ({})",
                self.backoff.base_secs, self.backoff.max_secs
            )));
        }

        if !(1..=5).contains(&self.watcher.tick_secs) {
            return Err(EngineError::Config(
                "watcher.tick_secs must be between 1 and 5".to_string(),
            ));
        }
        if self.watcher.tick_secs > self.watcher.afk_interval_secs {
            return Err(EngineError::Config(
                "watcher.tick_secs must not exceed watcher.afk_interval_secs".to_string(),
            ));
        }

        if self.session.command_timeout_secs == 0 || self.session.page_wait_secs == 0 {
            return Err(EngineError::Config(
                "session timeouts must be greater than 0".to_string(),
            ));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.store.last_key_path, "Last Updated Time");
        assert_eq!(config.backoff.base(), Duration::from_secs(5));
        assert_eq!(config.backoff.max(), Duration::from_secs(30));
        assert!(config.watcher.tick() <= Duration::from_secs(5));
        assert!(config.notify.enabled);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        let expanded = expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default_config();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(config.session.site_url, deserialized.session.site_url);
        assert_eq!(
            config.watcher.afk_interval_secs,
            deserialized.watcher.afk_interval_secs
        );
    }

    #[test]
    fn test_default_config_needs_store_url_to_run() {
        let mut config = Config::default_config();
        assert!(config.validate_for_run().is_err());

        config.store.base_url = "https://example.firebaseio.com".to_string();
        assert!(config.validate_for_run().is_ok());
    }
}
