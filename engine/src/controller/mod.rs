//! Attendance controller
//!
//! The controller is the polling loop. Each cycle it:
//!
//! 1. reaps an override watcher that finished on its own;
//! 2. asks the store for the newest key and compares it with the cursor;
//! 3. fetches a new record, records it in the last-seen file, and withdraws
//!    any answer still staged for an older record;
//! 4. drives the session driver through authenticate, join, answer and
//!    confirm, or parks a free-text answer with a watcher;
//! 5. classifies whatever went wrong exactly once, moves the cursor on
//!    terminal outcomes, and picks the sleep for the next cycle.
//!
//! Failures never escape the loop. A cursor that cannot be persisted holds
//! the record for a retry. The only error `run_cycle` returns is a session
//! driver lost with a crashed watcher.

pub mod session;

pub use session::answer_confirmed;

use sdk::driver::{Credentials, DriverError, JoinOutcome, SessionDriver};
use sdk::errors::{AttendanceError, AttendantErrorExt, Disposition, EngineError};
use sdk::types::{AnswerRecord, QuestionType, SessionState, Timestamp};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};

use crate::backoff::BackoffPolicy;
use crate::config::Config;
use crate::notify::Notifier;
use crate::state::{Cursor, LastSeenFile};
use crate::store::{AnswerStore, StoreError};
use crate::watcher::{OverrideWatcher, WatchOutcome, WatchSettings};
use session::enter;

const NOTIFY_TITLE: &str = "Attendant";

/// Shown when a free-text answer has been staged
pub const TYPE_YOUR_OWN: &str = "Remember to type your own answer!";

/// Slice used when sleeping so a shutdown request is noticed promptly
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Controller timing and escalation settings
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub backoff_base: Duration,
    pub backoff_step: Duration,
    pub backoff_max: Duration,
    pub watch: WatchSettings,
    pub auth_pause: Duration,
    pub confirm_alert_threshold: u32,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            backoff_base: config.backoff.base(),
            backoff_step: config.backoff.step(),
            backoff_max: config.backoff.max(),
            watch: WatchSettings {
                afk_interval: config.watcher.afk_interval(),
                tick: config.watcher.tick(),
            },
            auth_pause: Duration::from_secs(config.controller.auth_pause_secs),
            confirm_alert_threshold: config.controller.confirm_alert_threshold,
        }
    }
}

/// What one cycle (or one reaped watcher) amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No record newer than the cursor
    NothingNew,

    /// The answer was submitted and confirmed
    Committed { key: Timestamp },

    /// A free-text answer is staged and waiting for the watcher
    AwaitingOverride { key: Timestamp },

    /// A human answered by hand; the record is done
    ManualOverride { key: Timestamp },

    /// The record can never be answered and was passed over
    Skipped {
        key: Timestamp,
        error: AttendanceError,
    },

    /// Something failed that may work next time; the cursor was held
    Retry {
        key: Option<Timestamp>,
        error: AttendanceError,
    },

    /// The operator has to step in; the loop pauses
    Escalated { error: AttendanceError },
}

impl CycleOutcome {
    fn is_retry_or_escalation(&self) -> bool {
        matches!(self, Self::Retry { .. } | Self::Escalated { .. })
    }
}

/// Result of `AttendanceController::run_cycle`
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Outcome of a watcher that finished since the previous cycle
    pub reaped: Option<CycleOutcome>,

    /// Outcome of polling the store
    pub outcome: CycleOutcome,

    /// How long to sleep before the next cycle
    pub sleep: Duration,
}

/// The polling and submission loop
pub struct AttendanceController {
    settings: ControllerSettings,
    store: Box<dyn AnswerStore>,
    /// `None` while a watcher owns the driver
    driver: Option<Box<dyn SessionDriver>>,
    notifier: Box<dyn Notifier>,
    credentials: Credentials,
    cursor: Cursor,
    last_seen: LastSeenFile,
    backoff: BackoffPolicy,
    watcher: Option<OverrideWatcher>,
    state: SessionState,
    authenticated: bool,
    auth_alerted: bool,
    confirm_mismatches: u32,
    cursor_write_failures: u32,
    shutdown: Arc<AtomicBool>,
}

impl AttendanceController {
    pub fn new(
        settings: ControllerSettings,
        store: Box<dyn AnswerStore>,
        driver: Box<dyn SessionDriver>,
        notifier: Box<dyn Notifier>,
        credentials: Credentials,
        cursor: Cursor,
        last_seen: LastSeenFile,
    ) -> Self {
        let backoff = BackoffPolicy::new(
            settings.backoff_base,
            settings.backoff_step,
            settings.backoff_max,
        );

        Self {
            settings,
            store,
            driver: Some(driver),
            notifier,
            credentials,
            cursor,
            last_seen,
            backoff,
            watcher: None,
            state: SessionState::Idle,
            authenticated: false,
            auth_alerted: false,
            confirm_mismatches: 0,
            cursor_write_failures: 0,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a shutdown flag with signal handlers.
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// State of the most recent record
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Key of the record whose free-text answer is staged, if any
    pub fn active_key(&self) -> Option<&Timestamp> {
        self.watcher.as_ref().map(|w| w.key())
    }

    /// Run cycles until the shutdown flag is raised.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        info!("Attendance loop started (cursor at {})", self.cursor.last_acted_on());

        while !self.shutdown.load(Ordering::Relaxed) {
            let report = self.run_cycle().await?;
            debug!("Cycle finished: {:?}; sleeping {:?}", report.outcome, report.sleep);
            sleep_unless_shutdown(&self.shutdown, report.sleep).await;
        }

        info!("Shutdown requested");
        self.shutdown().await
    }

    /// One iteration of the loop. Does not sleep.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, EngineError> {
        let reaped = match self.watcher.take() {
            Some(watcher) if watcher.is_finished() => Some(self.reap(watcher).await?),
            other => {
                self.watcher = other;
                None
            }
        };

        // A parked record that failed gets its backoff before being retried
        let outcome = match &reaped {
            Some(outcome) if outcome.is_retry_or_escalation() => outcome.clone(),
            _ => self.poll().await?,
        };

        let sleep = match &outcome {
            CycleOutcome::Retry { .. } => self.backoff.on_retryable(),
            CycleOutcome::Escalated { .. } => self.settings.auth_pause,
            _ => self.backoff.on_success(),
        };

        Ok(CycleReport {
            reaped,
            outcome,
            sleep,
        })
    }

    /// Withdraw any staged answer and release the session.
    pub async fn shutdown(&mut self) -> Result<(), EngineError> {
        if let Some(watcher) = self.watcher.take() {
            watcher.signal().cancel();
            self.take_back(watcher).await?;
        }

        if let Some(driver) = self.driver.as_mut() {
            if let Err(e) = driver.close().await {
                warn!("Failed to close session driver: {}", e);
            }
        }

        info!("Attendance loop stopped (cursor at {})", self.cursor.last_acted_on());
        Ok(())
    }

    async fn poll(&mut self) -> Result<CycleOutcome, EngineError> {
        let latest = match self.store.fetch_latest_key().await {
            Ok(key) => key,
            Err(StoreError::NotFound(_)) => {
                debug!("Nothing published yet");
                return Ok(CycleOutcome::NothingNew);
            }
            Err(e) => return self.classify(None, AttendanceError::Transient(e.to_string())).await,
        };

        if !self.cursor.is_new(&latest) || self.active_key() == Some(&latest) {
            debug!("Nothing new (latest {}, cursor {})", latest, self.cursor.last_acted_on());
            return Ok(CycleOutcome::NothingNew);
        }

        let record = match self.store.fetch_record(&latest).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                debug!("Record {} vanished before it could be read", latest);
                return Ok(CycleOutcome::NothingNew);
            }
            Err(StoreError::Transient(reason)) => {
                return self
                    .classify(Some(&latest), AttendanceError::Transient(reason))
                    .await
            }
            Err(e @ StoreError::Malformed { .. }) => {
                return self
                    .classify(Some(&latest), AttendanceError::MalformedRecord(e.to_string()))
                    .await
            }
        };

        info!(
            "New record {}: session {} ({})",
            record.published_at, record.session_id, record.question_type
        );
        if let Err(e) = self.last_seen.record(&record) {
            warn!("Failed to write last-seen record: {}", e);
        }

        if let Some(watcher) = self.watcher.take() {
            watcher.signal().supersede(latest.clone());
            let (old, outcome) = self.take_back(watcher).await?;
            // It may have finished on its own since the reap check
            let settled = self.settle(old, outcome).await?;
            debug!("Previous record settled as {:?}", settled);
        }

        let span = tracing::info_span!("record", key = %record.published_at);
        self.drive(record).instrument(span).await
    }

    /// Act on one record and classify the result.
    async fn drive(&mut self, record: AnswerRecord) -> Result<CycleOutcome, EngineError> {
        if self.driver.is_none() {
            return Err(EngineError::DriverLost(
                "no session driver available".to_string(),
            ));
        }

        self.state = SessionState::Idle;
        let key = record.published_at.clone();

        match self.act(&record).await {
            Ok(Acted::Submitted) => self.confirm(&record).await,
            Ok(Acted::Staged) => {
                let driver = self.driver.take().ok_or_else(|| {
                    EngineError::DriverLost("no session driver available".to_string())
                })?;
                enter(&mut self.state, SessionState::AwaitingOverride);
                self.watcher = Some(OverrideWatcher::spawn(
                    driver,
                    record.clone(),
                    record.answer.clone(),
                    self.settings.watch,
                ));
                self.notifier.notify(NOTIFY_TITLE, TYPE_YOUR_OWN).await;
                info!("Free-text answer staged for {:?}", self.settings.watch.afk_interval);
                Ok(CycleOutcome::AwaitingOverride { key })
            }
            Err(error) => self.classify(Some(&key), error).await,
        }
    }

    /// Authenticate if needed, join, and enter the answer.
    async fn act(&mut self, record: &AnswerRecord) -> Result<Acted, AttendanceError> {
        let driver = self
            .driver
            .as_mut()
            .ok_or_else(|| AttendanceError::SessionLost("no session driver".to_string()))?;

        if !self.authenticated {
            enter(&mut self.state, SessionState::Authenticating);
            info!("Authenticating with {}", driver.name());
            driver
                .authenticate(&self.credentials)
                .await
                .map_err(|e| match e {
                    DriverError::AuthenticationRequired(reason) => {
                        AttendanceError::AuthenticationRequired(reason)
                    }
                    other => AttendanceError::SessionLost(other.to_string()),
                })?;
            self.authenticated = true;
            self.auth_alerted = false;
        }

        enter(&mut self.state, SessionState::Joining);
        match driver.join_session(&record.session_id).await {
            Ok(JoinOutcome::Joined) => {}
            Ok(JoinOutcome::SessionInvalidOrEnded) => {
                return Err(AttendanceError::SessionInvalidOrEnded {
                    session_id: record.session_id.clone(),
                })
            }
            Err(e) => return Err(AttendanceError::from_join(&record.session_id, e)),
        }

        enter(&mut self.state, SessionState::Answering);
        match record.question_type {
            QuestionType::MultipleChoice => {
                let letter = record.choice().ok_or_else(|| {
                    AttendanceError::MalformedRecord(format!(
                        "'{}' is not a choice letter",
                        record.answer
                    ))
                })?;
                driver
                    .submit_choice(letter)
                    .await
                    .map_err(AttendanceError::from_answer)?;
                Ok(Acted::Submitted)
            }
            QuestionType::FreeText => {
                driver
                    .stage_text(&record.answer)
                    .await
                    .map_err(AttendanceError::from_answer)?;
                Ok(Acted::Staged)
            }
        }
    }

    /// Compare what the session shows with what was submitted.
    async fn confirm(&mut self, record: &AnswerRecord) -> Result<CycleOutcome, EngineError> {
        let key = record.published_at.clone();
        enter(&mut self.state, SessionState::Confirming);

        let shown = match self.driver.as_mut() {
            Some(driver) => driver.read_confirmed_answer().await,
            None => Err(DriverError::SessionLost("no session driver".to_string())),
        };

        let shown = match shown {
            Ok(shown) => shown,
            Err(e) => return self.classify(Some(&key), AttendanceError::from_answer(e)).await,
        };

        if !answer_confirmed(record, &shown) {
            let error = AttendanceError::ConfirmMismatch {
                expected: record.answer.clone(),
                found: shown,
            };
            return self.classify(Some(&key), error).await;
        }

        self.confirm_mismatches = 0;
        if let Err(error) = self.advance_cursor(&key) {
            return self.classify(Some(&key), error).await;
        }
        enter(&mut self.state, SessionState::Committed);
        info!("Committed answer for {} (session {})", key, record.session_id);
        Ok(CycleOutcome::Committed { key })
    }

    /// Wait for a watcher that finished on its own and act on its outcome.
    async fn reap(&mut self, watcher: OverrideWatcher) -> Result<CycleOutcome, EngineError> {
        let (record, outcome) = self.take_back(watcher).await?;
        self.settle(record, outcome).await
    }

    /// Act on how a watcher ended.
    async fn settle(
        &mut self,
        record: AnswerRecord,
        outcome: WatchOutcome,
    ) -> Result<CycleOutcome, EngineError> {
        let key = record.published_at.clone();

        let span = tracing::info_span!("record", key = %key);
        async {
            match outcome {
                WatchOutcome::Submitted => self.confirm(&record).await,
                WatchOutcome::ManualEdit { .. } => {
                    if let Err(error) = self.advance_cursor(&key) {
                        return self.classify(Some(&key), error).await;
                    }
                    enter(&mut self.state, SessionState::Committed);
                    Ok(CycleOutcome::ManualOverride { key })
                }
                WatchOutcome::Failed(e) => {
                    self.classify(Some(&key), AttendanceError::from_answer(e)).await
                }
                WatchOutcome::Cancelled { superseded_by } => {
                    self.classify(Some(&key), cancelled(superseded_by)).await
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Join a watcher and put the driver back in the controller's hands.
    async fn take_back(
        &mut self,
        watcher: OverrideWatcher,
    ) -> Result<(AnswerRecord, WatchOutcome), EngineError> {
        let (record, driver, outcome) = watcher.join().await.map_err(|e| {
            error!("{}", e);
            EngineError::DriverLost(e.to_string())
        })?;
        self.driver = Some(driver);

        match &outcome {
            WatchOutcome::Cancelled { .. } => {
                debug!("Withdrew staged answer for {}", record.published_at)
            }
            WatchOutcome::ManualEdit { found } => {
                debug!("Manual answer for {}: {:?}", record.published_at, found)
            }
            WatchOutcome::Submitted => {
                debug!("Watcher submitted staged answer for {}", record.published_at)
            }
            WatchOutcome::Failed(e) => {
                debug!("Watcher for {} failed: {}", record.published_at, e)
            }
        }

        Ok((record, outcome))
    }

    /// The single place a failure is classified.
    async fn classify(
        &mut self,
        key: Option<&Timestamp>,
        error: AttendanceError,
    ) -> Result<CycleOutcome, EngineError> {
        if key.is_some() {
            enter(&mut self.state, SessionState::Failed);
        }

        match error.disposition() {
            Disposition::Retry => Ok(self.retry(key, error).await),
            Disposition::Skip => {
                warn!("{}; skipping ({})", error, error.user_hint());
                let outcome = match key {
                    Some(key) => match self.advance_cursor(key) {
                        Ok(()) => CycleOutcome::Skipped {
                            key: key.clone(),
                            error: error.clone(),
                        },
                        Err(write_error) => return Ok(self.retry(Some(key), write_error).await),
                    },
                    None => CycleOutcome::NothingNew,
                };

                if error.notifies_operator() {
                    alert(self.notifier.as_ref(), &error).await;
                }
                Ok(outcome)
            }
            Disposition::Escalate => {
                error!("{} ({})", error, error.user_hint());
                self.authenticated = false;
                if !self.auth_alerted {
                    alert(self.notifier.as_ref(), &error).await;
                    self.auth_alerted = true;
                }
                info!("Pausing for {:?} before trying again", self.settings.auth_pause);
                Ok(CycleOutcome::Escalated { error })
            }
            Disposition::Expected => {
                info!("{}", error);
                Ok(CycleOutcome::NothingNew)
            }
        }
    }

    /// A retryable failure: the cursor stays, repeated failures alert.
    async fn retry(&mut self, key: Option<&Timestamp>, error: AttendanceError) -> CycleOutcome {
        warn!("{} ({})", error, error.user_hint());
        let threshold = self.settings.confirm_alert_threshold;

        match &error {
            AttendanceError::SessionLost(_) => self.authenticated = false,
            AttendanceError::ConfirmMismatch { .. } => {
                self.confirm_mismatches += 1;
                if self.confirm_mismatches == threshold {
                    alert(self.notifier.as_ref(), &error).await;
                }
            }
            AttendanceError::CursorWrite(_) => {
                self.cursor_write_failures += 1;
                if self.cursor_write_failures == threshold {
                    alert(self.notifier.as_ref(), &error).await;
                }
            }
            _ => {}
        }
        if !matches!(error, AttendanceError::ConfirmMismatch { .. }) {
            self.confirm_mismatches = 0;
        }

        CycleOutcome::Retry {
            key: key.cloned(),
            error,
        }
    }

    /// Persist the cursor at `key`. A failed write leaves it in place.
    fn advance_cursor(&mut self, key: &Timestamp) -> Result<(), AttendanceError> {
        match self.cursor.advance(key) {
            Ok(_) => {
                self.cursor_write_failures = 0;
                Ok(())
            }
            Err(e) => {
                error!("Cursor not advanced to {}: {}", key, e);
                Err(AttendanceError::CursorWrite(e.to_string()))
            }
        }
    }
}

fn cancelled(superseded_by: Option<Timestamp>) -> AttendanceError {
    AttendanceError::Cancelled {
        superseded_by: superseded_by.map(|t| t.to_string()).unwrap_or_default(),
    }
}

async fn alert(notifier: &dyn Notifier, error: &AttendanceError) {
    let message = format!("{}. {}", error, error.user_hint());
    notifier.notify(NOTIFY_TITLE, &message).await;
}

/// Sleep for `duration`, returning early once `shutdown` is raised.
async fn sleep_unless_shutdown(shutdown: &AtomicBool, duration: Duration) {
    let deadline = tokio::time::Instant::now() + duration;
    while !shutdown.load(Ordering::Relaxed) {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        tokio::time::sleep(remaining.min(SHUTDOWN_POLL)).await;
    }
}

/// How far `act` got with a record
enum Acted {
    /// Multiple-choice answer submitted; confirmation pending
    Submitted,

    /// Free-text answer typed but not submitted
    Staged,
}
