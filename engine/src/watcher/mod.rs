//! Override watcher
//!
//! While a free-text answer sits staged in the session, a human may still
//! type their own. The watcher owns the session driver for that window and
//! re-reads the staged input every tick until one of three things happens:
//!
//! - the input no longer holds what was staged: the human is driving, stop
//!   without submitting;
//! - the controller raised the override signal (a newer record arrived, or
//!   the engine is shutting down): stop without submitting;
//! - the AFK interval elapsed: submit the staged answer.
//!
//! The driver travels back to the controller through the task's join handle,
//! so the controller cannot touch the session until the watcher is done.

use sdk::driver::{DriverError, SessionDriver};
use sdk::types::{AnswerRecord, Timestamp};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, Instrument};

/// Cancellation flag for one staged answer
///
/// Written only by the controller, read by the watcher on every tick.
#[derive(Debug, Default)]
pub struct OverrideSignal {
    cancel: AtomicBool,
    superseded_by: OnceLock<Timestamp>,
}

impl OverrideSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the watcher without naming a replacement record.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Stop the watcher because `key` was published.
    pub fn supersede(&self, key: Timestamp) {
        // First writer wins; later records are handled by their own cycle
        let _ = self.superseded_by.set(key);
        self.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn superseded_by(&self) -> Option<&Timestamp> {
        self.superseded_by.get()
    }
}

/// How a watcher ended. Exactly one per watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The staged text was changed by someone else
    ManualEdit { found: String },

    /// The controller raised the override signal
    Cancelled { superseded_by: Option<Timestamp> },

    /// The AFK interval elapsed and the staged text was submitted
    Submitted,

    /// The driver failed while reading or submitting
    Failed(DriverError),
}

/// Timing of a watcher
#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    /// How long to wait for a human before submitting
    pub afk_interval: Duration,

    /// How often the staged input is re-read
    pub tick: Duration,
}

/// The watcher task panicked and took the driver with it
#[derive(Debug, thiserror::Error)]
#[error("override watcher for {key} did not complete: {reason}")]
pub struct WatcherLost {
    pub key: Timestamp,
    pub reason: String,
}

/// Handle to a running watcher
pub struct OverrideWatcher {
    record: AnswerRecord,
    signal: Arc<OverrideSignal>,
    handle: JoinHandle<(Box<dyn SessionDriver>, WatchOutcome)>,
}

impl OverrideWatcher {
    /// Start watching `staged` for `record`, taking ownership of the driver.
    pub fn spawn(
        driver: Box<dyn SessionDriver>,
        record: AnswerRecord,
        staged: String,
        settings: WatchSettings,
    ) -> Self {
        let signal = Arc::new(OverrideSignal::new());
        let span = tracing::info_span!("watcher", key = %record.published_at);

        let handle = tokio::spawn(
            watch(driver, staged, settings, Arc::clone(&signal)).instrument(span),
        );

        Self {
            record,
            signal,
            handle,
        }
    }

    pub fn record(&self) -> &AnswerRecord {
        &self.record
    }

    pub fn key(&self) -> &Timestamp {
        &self.record.published_at
    }

    /// Whether the watcher has reached its outcome on its own.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn signal(&self) -> &OverrideSignal {
        &self.signal
    }

    /// Wait for the watcher and take the driver back.
    pub async fn join(
        self,
    ) -> Result<(AnswerRecord, Box<dyn SessionDriver>, WatchOutcome), WatcherLost> {
        match self.handle.await {
            Ok((driver, outcome)) => Ok((self.record, driver, outcome)),
            Err(e) => Err(WatcherLost {
                key: self.record.published_at,
                reason: e.to_string(),
            }),
        }
    }
}

async fn watch(
    mut driver: Box<dyn SessionDriver>,
    staged: String,
    settings: WatchSettings,
    signal: Arc<OverrideSignal>,
) -> (Box<dyn SessionDriver>, WatchOutcome) {
    let deadline = Instant::now() + settings.afk_interval;
    debug!(
        "Waiting up to {:?} for a manual answer",
        settings.afk_interval
    );

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(settings.tick.min(remaining)).await;

        if signal.is_cancelled() {
            let superseded_by = signal.superseded_by().cloned();
            info!("Staged answer withdrawn (superseded by {:?})", superseded_by);
            return (driver, WatchOutcome::Cancelled { superseded_by });
        }

        match driver.read_staged_text().await {
            Ok(current) if current != staged => {
                info!("Staged answer was edited by hand; leaving it alone");
                return (driver, WatchOutcome::ManualEdit { found: current });
            }
            Ok(_) => {}
            Err(e) => return (driver, WatchOutcome::Failed(e)),
        }

        if Instant::now() >= deadline {
            break;
        }
    }

    info!("No manual answer within {:?}; submitting", settings.afk_interval);
    let outcome = match driver.submit_staged().await {
        Ok(()) => WatchOutcome::Submitted,
        Err(e) => WatchOutcome::Failed(e),
    };
    (driver, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supersede_keeps_first_key() {
        let signal = OverrideSignal::new();
        assert!(!signal.is_cancelled());

        signal.supersede(Timestamp::parse("2024-01-01 10:00:05").unwrap());
        signal.supersede(Timestamp::parse("2024-01-01 10:00:09").unwrap());

        assert!(signal.is_cancelled());
        assert_eq!(
            signal.superseded_by().map(|t| t.as_str()),
            Some("2024-01-01 10:00:05")
        );
    }

    #[test]
    fn test_plain_cancel_has_no_successor() {
        let signal = OverrideSignal::new();
        signal.cancel();

        assert!(signal.is_cancelled());
        assert!(signal.superseded_by().is_none());
    }
}
