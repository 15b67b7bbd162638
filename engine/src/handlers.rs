//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - run: Start the attendance loop
//! - latest: Print the latest published record
//! - status: Show the cursor, the last seen record, the running instance and
//!   whether credentials are stored
//! - credentials: Store sign-on credentials in the keychain

use anyhow::{Context, Result};
use serde_json::json;
use std::io::{self, Write};

use crate::cli::RunArgs;
use crate::config::Config;
use crate::controller::{AttendanceController, ControllerSettings};
use crate::daemon::InstanceLock;
use crate::driver::WebDriverSession;
use crate::notify;
use crate::secrets::{SecretManager, LOGIN_ID_KEY, PASSWORD_KEY};
use crate::state::{Cursor, LastSeenFile, StartMode};
use crate::store::{AnswerStore, FirebaseStore};
use sdk::types::{AnswerRecord, Timestamp, TIMESTAMP_FORMAT};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Asked when `run` is given no start mode
pub const START_PROMPT: &str = "Do you want to take attendance now? (y/[n]): ";

fn store_from_config(config: &Config) -> Result<FirebaseStore> {
    config.validate_for_run()?;
    let store = FirebaseStore::new(
        &config.store.base_url,
        &config.store.last_key_path,
        config.store.request_timeout(),
    )?;
    Ok(store)
}

fn prompt_start_mode() -> Result<StartMode> {
    print!("{}", START_PROMPT);
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    Ok(StartMode::from_prompt_answer(&answer))
}

/// Start the attendance loop and run it until SIGTERM or Ctrl-C.
pub async fn handle_run(args: RunArgs, config: &Config) -> Result<()> {
    let store = store_from_config(config)?;
    let data_dir = &config.core.data_dir;

    let lock = InstanceLock::acquire(data_dir)?;

    let mode = match args.start_mode() {
        Some(mode) => mode,
        None => prompt_start_mode()?,
    };

    let credentials = SecretManager::default()
        .load_credentials()
        .context("Sign-on credentials are required. Run 'attendant credentials'")?;

    let driver = WebDriverSession::new(&config.session)?;
    let cursor = Cursor::open(data_dir, mode)?;
    let last_seen = LastSeenFile::new(data_dir);

    let shutdown = lock.shutdown_flag();
    InstanceLock::setup_signal_handler(lock.shutdown_flag());

    let mut controller = AttendanceController::new(
        ControllerSettings::from_config(config),
        Box::new(store),
        Box::new(driver),
        notify::from_config(&config.notify),
        credentials,
        cursor,
        last_seen,
    )
    .with_shutdown_flag(shutdown);

    controller.run().await?;
    drop(lock);
    Ok(())
}

fn record_json(record: &AnswerRecord) -> serde_json::Value {
    json!({
        "published_at": record.published_at.as_str(),
        "session_id": record.session_id,
        "question_type": record.question_type.wire_name(),
        "answer": record.answer,
    })
}

fn print_record(record: &AnswerRecord) {
    println!("Published at:  {}", record.published_at);
    println!("Session ID:    {}", record.session_id);
    println!("Question type: {}", record.question_type);
    println!("Answer:        {}", record.answer);
}

/// How long ago `ts` was, read as local time. `None` for the sentinel.
fn age(ts: &Timestamp) -> Option<chrono::Duration> {
    let at = chrono::NaiveDateTime::parse_from_str(ts.as_str(), TIMESTAMP_FORMAT).ok()?;
    Some(chrono::Local::now().naive_local() - at)
}

fn describe_age(age: chrono::Duration) -> String {
    if age.num_days() > 0 {
        format!("{}d ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{}m ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}

/// Print the latest published record.
pub async fn handle_latest(config: &Config, format: OutputFormat) -> Result<()> {
    let store = store_from_config(config)?;

    let key = store
        .fetch_latest_key()
        .await
        .context("Failed to fetch the latest key")?;
    let record = store
        .fetch_record(&key)
        .await
        .with_context(|| format!("Failed to fetch record {}", key))?;

    match format {
        OutputFormat::Text => print_record(&record),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record_json(&record))?),
    }
    Ok(())
}

/// Show the cursor, the last seen record and whether an instance is running.
pub async fn handle_status(config: &Config, format: OutputFormat) -> Result<()> {
    let data_dir = &config.core.data_dir;
    let cursor = Cursor::load(data_dir, Timestamp::beginning())?;
    let last_seen = LastSeenFile::new(data_dir).load()?;
    let instance = InstanceLock::status(data_dir);
    let secrets = SecretManager::default();
    let credentials_stored =
        secrets.has_secret(LOGIN_ID_KEY) && secrets.has_secret(PASSWORD_KEY);

    match format {
        OutputFormat::Text => {
            if let Some(pid) = instance.pid {
                println!("Attendant is running (PID {})", pid);
            } else {
                println!("Attendant is not running.");
            }
            match age(cursor.last_acted_on()) {
                Some(age) => println!(
                    "Cursor: {} ({})",
                    cursor.last_acted_on(),
                    describe_age(age)
                ),
                None => println!("Cursor: beginning (catching up)"),
            }
            if !credentials_stored {
                println!("Credentials: missing (run 'attendant credentials')");
            }
            match &last_seen {
                Some(record) => {
                    println!();
                    println!("Last seen record:");
                    print_record(record);
                }
                None => println!("No record seen yet."),
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "running": instance.is_running,
                "pid": instance.pid,
                "cursor": cursor.last_acted_on().as_str(),
                "cursor_age_secs": age(cursor.last_acted_on()).map(|a| a.num_seconds()),
                "last_seen": last_seen.as_ref().map(record_json),
                "credentials_stored": credentials_stored,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Prompt for sign-on credentials and store them in the keychain.
pub async fn handle_credentials() -> Result<()> {
    SecretManager::default().store_credentials()?;
    println!("✓ Credentials stored in the OS keychain");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_has_no_age() {
        assert!(age(&Timestamp::beginning()).is_none());
    }

    #[test]
    fn test_age_of_past_key() {
        let key = Timestamp::parse("2020-01-01 00:00:00").unwrap();
        assert!(age(&key).unwrap().num_days() > 365);
    }

    #[test]
    fn test_describe_age() {
        assert_eq!(describe_age(chrono::Duration::seconds(20)), "just now");
        assert_eq!(describe_age(chrono::Duration::minutes(5)), "5m ago");
        assert_eq!(describe_age(chrono::Duration::hours(3)), "3h ago");
        assert_eq!(describe_age(chrono::Duration::days(2)), "2d ago");
    }
}
