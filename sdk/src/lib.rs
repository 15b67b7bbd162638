//! Attendant SDK
//!
//! Shared contracts for Attendant components: the answer-record domain types,
//! the `SessionDriver` capability the engine drives, and the error taxonomy
//! the control loop classifies failures with.

/// Session driver trait and types
pub mod driver;

/// Error types and handling
pub mod errors;

/// Redacting wrapper for sensitive strings
pub mod secret;

/// Answer record and session state types
pub mod types;

// Re-export commonly used types
pub use driver::{Credentials, DriverError, JoinOutcome, SessionDriver};
pub use errors::{AttendanceError, AttendantErrorExt, Disposition, EngineError};
pub use secret::SecretString;
pub use types::{normalize_choice, AnswerRecord, QuestionType, SessionState, Timestamp};
