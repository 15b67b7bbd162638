//! Process lifecycle management
//!
//! This module provides the `InstanceLock` for the attendant process.
//! It handles:
//! - PID file management (`<data_dir>/attendant.pid`)
//! - Detection of an already-running instance
//! - SIGTERM / Ctrl-C handling through a shared shutdown flag
//!
//! Two instances driving the same quiz session would fight over it, so only
//! one may run at a time:
//! 1. Check for an existing PID file
//! 2. Verify the process is actually running
//! 3. Replace stale PID files (process no longer exists)
//!
//! # Examples
//!
//! ```no_run
//! use attendant_engine::config::Config;
//! use attendant_engine::daemon::InstanceLock;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! let lock = InstanceLock::acquire(&config.core.data_dir)?;
//! let shutdown = lock.shutdown_flag();
//! InstanceLock::setup_signal_handler(shutdown);
//! // ... run until the flag is raised; the PID file goes away with `lock`
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use sdk::errors::EngineError;

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// File name of the PID file inside the data directory
pub const PID_FILE: &str = "attendant.pid";

/// Status of the instance owning a data directory
#[derive(Debug, Clone)]
pub struct InstanceStatus {
    /// Whether an instance is currently running
    pub is_running: bool,

    /// Process ID if running
    pub pid: Option<u32>,

    /// Path to the PID file
    pub pid_file: PathBuf,
}

/// Exclusive claim on a data directory for the lifetime of the process
///
/// The PID file is removed when the lock is dropped.
pub struct InstanceLock {
    /// Path to the PID file
    pid_file: PathBuf,

    /// Shutdown flag for graceful termination
    shutdown_flag: Arc<AtomicBool>,
}

impl InstanceLock {
    /// Claim `data_dir` for this process.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if a live process holds the PID file
    /// - `Io` if the PID file cannot be written
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        let pid_file = data_dir.join(PID_FILE);

        if let Ok(pid) = Self::read_pid_file(&pid_file) {
            if pid != std::process::id() && Self::is_process_running(pid) {
                return Err(EngineError::AlreadyRunning(pid));
            }
            tracing::warn!("Removing stale PID file for process {}", pid);
        }

        fs::write(&pid_file, std::process::id().to_string())?;
        tracing::debug!("Wrote PID file {}", pid_file.display());

        Ok(Self {
            pid_file,
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Report whether some instance holds `data_dir`.
    pub fn status(data_dir: &Path) -> InstanceStatus {
        let pid_file = data_dir.join(PID_FILE);

        let pid = Self::read_pid_file(&pid_file)
            .ok()
            .filter(|pid| Self::is_process_running(*pid));

        InstanceStatus {
            is_running: pid.is_some(),
            pid,
            pid_file,
        }
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_flag)
    }

    /// Raise the shutdown flag
    pub fn signal_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    /// Raise `shutdown_flag` on SIGTERM or Ctrl-C.
    #[cfg(unix)]
    pub fn setup_signal_handler(shutdown_flag: Arc<AtomicBool>) -> JoinHandle<()> {
        use tokio::signal::unix::{signal, SignalKind};

        tokio::spawn(async move {
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::info!("Received Ctrl-C");
                        shutdown_flag.store(true, Ordering::Relaxed);
                    }
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl-C"),
            }
            shutdown_flag.store(true, Ordering::Relaxed);
        })
    }

    /// Raise `shutdown_flag` on Ctrl-C.
    #[cfg(windows)]
    pub fn setup_signal_handler(shutdown_flag: Arc<AtomicBool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl-C");
                shutdown_flag.store(true, Ordering::Relaxed);
            }
        })
    }

    fn read_pid_file(pid_file: &Path) -> Result<u32> {
        let contents = fs::read_to_string(pid_file)?;
        contents
            .trim()
            .parse::<u32>()
            .map_err(|e| EngineError::State(format!("Invalid PID file contents: {}", e)))
    }

    /// Checks whether a process with the given PID exists.
    #[cfg(unix)]
    fn is_process_running(pid: u32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // Signal 0 only checks for existence
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    #[cfg(windows)]
    fn is_process_running(_pid: u32) -> bool {
        // Without a process API, trust the PID file
        true
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.pid_file) {
            Ok(_) => tracing::debug!("PID file removed"),
            Err(e) => tracing::warn!("Failed to remove PID file: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_writes_and_drop_removes_pid_file() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join(PID_FILE);

        {
            let _lock = InstanceLock::acquire(dir.path()).unwrap();
            let contents = fs::read_to_string(&pid_file).unwrap();
            assert_eq!(contents, std::process::id().to_string());
        }

        assert!(!pid_file.exists());
    }

    #[test]
    fn test_stale_pid_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        // PIDs this large are never handed out
        fs::write(dir.path().join(PID_FILE), "4194999").unwrap();

        let status = InstanceLock::status(dir.path());
        assert!(!status.is_running);

        let _lock = InstanceLock::acquire(dir.path()).unwrap();
        assert!(InstanceLock::status(dir.path()).is_running);
    }

    #[test]
    fn test_signal_shutdown_sets_flag() {
        let dir = TempDir::new().unwrap();
        let lock = InstanceLock::acquire(dir.path()).unwrap();
        let flag = lock.shutdown_flag();

        lock.signal_shutdown();
        assert!(flag.load(Ordering::Relaxed));
    }
}
