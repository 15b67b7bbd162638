//! Session driver trait and types
//!
//! A `SessionDriver` is the engine's only way to touch the external quiz
//! session. Concrete bindings (a browser automation endpoint, an HTTP client)
//! live behind this trait; the control loop only sees join outcomes, strings
//! and typed errors, never page markup.
//!
//! A driver is exclusively owned: either the controller holds it or the
//! override watcher does, and ownership moves between them. It therefore only
//! needs to be `Send`.

use async_trait::async_trait;
use std::fmt;

use crate::secret::SecretString;

/// Result of asking the driver to join a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The session accepted us and is showing a question
    Joined,

    /// The session id does not exist or the session has ended
    SessionInvalidOrEnded,
}

/// Errors a session driver may report
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// Login could not complete unattended (wrong credentials, second factor)
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// The authenticated session is gone and must be re-established
    #[error("Session lost: {0}")]
    SessionLost(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Unexpected page: {0}")]
    UnexpectedPage(String),

    #[error("Driver transport error: {0}")]
    Transport(String),
}

/// Login credentials handed to `SessionDriver::authenticate`.
#[derive(Clone)]
pub struct Credentials {
    pub login_id: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(login_id: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self {
            login_id: login_id.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login_id", &self.login_id)
            .field("password", &self.password)
            .finish()
    }
}

/// Capability interface for the external session.
///
/// Every method must bound its own waiting; the engine adds no timeout of its
/// own around driver calls.
#[async_trait]
pub trait SessionDriver: Send {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Establish an authenticated session. Called once per process, and again
    /// after `DriverError::SessionLost`.
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), DriverError>;

    /// Join the session identified by `session_id`.
    async fn join_session(&mut self, session_id: &str) -> Result<JoinOutcome, DriverError>;

    /// Pick and submit the multiple-choice option `letter` (lowercase a-z).
    async fn submit_choice(&mut self, letter: char) -> Result<(), DriverError>;

    /// Replace the free-text input's content with `text` without submitting.
    async fn stage_text(&mut self, text: &str) -> Result<(), DriverError>;

    /// Current content of the free-text input.
    async fn read_staged_text(&mut self) -> Result<String, DriverError>;

    /// Submit whatever the free-text input currently holds.
    async fn submit_staged(&mut self) -> Result<(), DriverError>;

    /// The answer the session currently shows as submitted.
    async fn read_confirmed_answer(&mut self) -> Result<String, DriverError>;

    /// Release the external session. Called once on shutdown.
    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("1155000000", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("1155000000"));
        assert!(!debug.contains("hunter2"));
    }
}
