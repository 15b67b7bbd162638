//! Error types and handling
//!
//! Two families live here:
//!
//! - `EngineError`: setup and plumbing failures (configuration, keychain,
//!   files). These surface to the operator at the CLI edge.
//! - `AttendanceError`: everything that can go wrong while acting on one
//!   answer record. The control loop classifies each one exactly once with
//!   `disposition()` and never lets it escape the loop.
//!
//! Both implement `AttendantErrorExt`, which provides user-friendly hints and
//! indicates whether errors are recoverable.

use thiserror::Error;

use crate::driver::DriverError;

/// Trait for Attendant error extensions
///
/// Provides additional context for errors: a hint that is safe to show to the
/// operator (no credentials, no internal paths) and whether the error can be
/// retried or worked around without manual intervention.
pub trait AttendantErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    fn is_recoverable(&self) -> bool;
}

/// Setup and plumbing errors
///
/// # Examples
///
/// ```
/// use sdk::errors::{AttendantErrorExt, EngineError};
///
/// let error = EngineError::Config("missing [store] section".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(!error.is_recoverable());
///
/// let error = EngineError::Network("connection reset".to_string());
/// assert!(error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Persisted state errors
    #[error("State file error: {0}")]
    State(String),

    // Keyring errors
    #[error("Keyring error: {0}")]
    KeyringError(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Instance errors
    #[error("Another attendant instance is already running (PID {0})")]
    AlreadyRunning(u32),

    // The session driver did not come back from a background task
    #[error("Session driver lost: {0}")]
    DriverLost(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AttendantErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::State(_) => "Inspect or delete the state files in the data directory",
            Self::KeyringError(_) => {
                "Failed to access secure storage. Run 'attendant credentials' again"
            }
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::AlreadyRunning(_) => "Stop the other attendant process first",
            Self::DriverLost(_) => "The browser session crashed. Restart attendant",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_)
            | Self::State(_)
            | Self::KeyringError(_)
            | Self::AlreadyRunning(_)
            | Self::DriverLost(_) => false,
            Self::Network(_) | Self::Io(_) => true,
        }
    }
}

/// What the control loop does with a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Hold the cursor, escalate backoff, try the same record again
    Retry,

    /// Advance the cursor past the record; retrying cannot help
    Skip,

    /// Stop acting and get the operator's attention
    Escalate,

    /// Not a fault (a newer record superseded this one)
    Expected,
}

/// Failures while acting on an answer record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttendanceError {
    #[error("Answer store unavailable: {0}")]
    Transient(String),

    #[error("Session '{session_id}' is invalid or has ended")]
    SessionInvalidOrEnded { session_id: String },

    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("Failed to join session '{session_id}': {reason}")]
    JoinFailed { session_id: String, reason: String },

    #[error("Failed to enter answer: {0}")]
    AnswerFailed(String),

    #[error("Submitted answer mismatch: expected '{expected}', session shows '{found}'")]
    ConfirmMismatch { expected: String, found: String },

    #[error("Superseded by newer record {superseded_by}")]
    Cancelled { superseded_by: String },

    #[error("Malformed answer record: {0}")]
    MalformedRecord(String),

    #[error("Session lost: {0}")]
    SessionLost(String),

    /// The cursor could not be saved; it stays where it was
    #[error("Failed to save the cursor: {0}")]
    CursorWrite(String),
}

impl AttendanceError {
    /// Classify the failure for the control loop.
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Transient(_)
            | Self::JoinFailed { .. }
            | Self::AnswerFailed(_)
            | Self::ConfirmMismatch { .. }
            | Self::SessionLost(_)
            | Self::CursorWrite(_) => Disposition::Retry,
            Self::SessionInvalidOrEnded { .. } | Self::MalformedRecord(_) => Disposition::Skip,
            Self::AuthenticationRequired(_) => Disposition::Escalate,
            Self::Cancelled { .. } => Disposition::Expected,
        }
    }

    /// Whether the operator should get a desktop notification the first
    /// time this failure is seen.
    pub fn notifies_operator(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRequired(_) | Self::MalformedRecord(_)
        )
    }

    /// Map a driver failure during the join step.
    pub fn from_join(session_id: &str, err: DriverError) -> Self {
        match err {
            DriverError::AuthenticationRequired(reason) => Self::AuthenticationRequired(reason),
            DriverError::SessionLost(reason) => Self::SessionLost(reason),
            other => Self::JoinFailed {
                session_id: session_id.to_string(),
                reason: other.to_string(),
            },
        }
    }

    /// Map a driver failure while entering, submitting, or reading back an
    /// answer.
    pub fn from_answer(err: DriverError) -> Self {
        match err {
            DriverError::AuthenticationRequired(reason) => Self::AuthenticationRequired(reason),
            DriverError::SessionLost(reason) => Self::SessionLost(reason),
            other => Self::AnswerFailed(other.to_string()),
        }
    }
}

impl AttendantErrorExt for AttendanceError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Transient(_) => "Answer store unreachable. Retrying with backoff",
            Self::SessionInvalidOrEnded { .. } => {
                "The session id was rejected. Check the published session id"
            }
            Self::AuthenticationRequired(_) => {
                "Log in manually (a second factor may be required) or update credentials"
            }
            Self::JoinFailed { .. } => "Could not join the session. Retrying",
            Self::AnswerFailed(_) => "Could not enter the answer. Retrying",
            Self::ConfirmMismatch { .. } => {
                "The session shows a different answer. Check the session manually"
            }
            Self::Cancelled { .. } => "A newer answer was published",
            Self::MalformedRecord(_) => "The published record could not be read. Republish it",
            Self::SessionLost(_) => "Browser session was lost. Logging in again",
            Self::CursorWrite(_) => {
                "Could not write to the data directory. Check that it exists and has free space"
            }
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::AuthenticationRequired(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispositions() {
        assert_eq!(
            AttendanceError::Transient("x".into()).disposition(),
            Disposition::Retry
        );
        assert_eq!(
            AttendanceError::SessionInvalidOrEnded {
                session_id: "A1".into()
            }
            .disposition(),
            Disposition::Skip
        );
        assert_eq!(
            AttendanceError::AuthenticationRequired("2fa".into()).disposition(),
            Disposition::Escalate
        );
        assert_eq!(
            AttendanceError::ConfirmMismatch {
                expected: "b".into(),
                found: "c".into()
            }
            .disposition(),
            Disposition::Retry
        );
        assert_eq!(
            AttendanceError::Cancelled {
                superseded_by: "2024-01-01 10:00:00".into()
            }
            .disposition(),
            Disposition::Expected
        );
    }

    #[test]
    fn test_join_error_mapping() {
        let err = AttendanceError::from_join("A1", DriverError::Timeout("body".into()));
        assert!(matches!(err, AttendanceError::JoinFailed { ref session_id, .. } if session_id == "A1"));

        let err = AttendanceError::from_join("A1", DriverError::SessionLost("sso".into()));
        assert!(matches!(err, AttendanceError::SessionLost(_)));

        let err = AttendanceError::from_answer(DriverError::ElementNotFound("textarea".into()));
        assert!(matches!(err, AttendanceError::AnswerFailed(_)));
    }

    #[test]
    fn test_only_auth_is_unrecoverable() {
        assert!(!AttendanceError::AuthenticationRequired("x".into()).is_recoverable());
        assert!(AttendanceError::AnswerFailed("x".into()).is_recoverable());
        assert!(AttendanceError::CursorWrite("disk full".into()).is_recoverable());
    }
}
