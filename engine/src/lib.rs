//! Attendant Engine Library
//!
//! This library provides the core functionality of the attendant: the
//! polling loop that turns published answers into submitted ones.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Answer store client
pub mod store;

/// Persisted cursor and last-seen record
pub mod state;

/// Poll interval policy
pub mod backoff;

/// Override watcher for staged free-text answers
pub mod watcher;

/// Attendance controller (the main loop)
pub mod controller;

/// Session driver implementations
pub mod driver;

/// Operator notifications
pub mod notify;

/// Telemetry and Observability
pub mod telemetry;

/// Process lifecycle management module
pub mod daemon;

/// CLI interface module
pub mod cli;

/// Command handlers
pub mod handlers;
