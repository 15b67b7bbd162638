//! Operator notifications
//!
//! Notifications are best-effort: a failure to show one is logged and
//! swallowed, never surfaced to the control loop.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::NotifyConfig;

/// Upper bound for a notification command
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Sink for messages that need a human's attention
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str);
}

/// Writes notifications to the log only
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, message: &str) {
        info!(title, "{}", message);
    }
}

/// Shows desktop notifications by running a local program
///
/// Defaults to `osascript` on macOS and `notify-send` elsewhere. A configured
/// command is run as `<command> <title> <message>`.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    command: Option<String>,
}

impl CommandNotifier {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }

    /// Program and arguments for one notification
    fn invocation(&self, title: &str, message: &str) -> (String, Vec<String>) {
        if let Some(command) = &self.command {
            return (command.clone(), vec![title.to_string(), message.to_string()]);
        }

        #[cfg(target_os = "macos")]
        {
            let script = format!(
                "display notification {:?} with title {:?}",
                message, title
            );
            ("osascript".to_string(), vec!["-e".to_string(), script])
        }

        #[cfg(not(target_os = "macos"))]
        {
            (
                "notify-send".to_string(),
                vec![title.to_string(), message.to_string()],
            )
        }
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn notify(&self, title: &str, message: &str) {
        // Always leave a trace in the log, even if the desktop never shows it
        info!(title, "{}", message);

        let (program, args) = self.invocation(title, message);
        let run = tokio::process::Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(NOTIFY_TIMEOUT, run).await {
            Ok(Ok(output)) if output.status.success() => {}
            Ok(Ok(output)) => {
                let err = String::from_utf8_lossy(&output.stderr);
                warn!("Notification command '{}' failed: {}", program, err.trim());
            }
            Ok(Err(e)) => warn!("Failed to execute notification command '{}': {}", program, e),
            Err(_) => warn!("Notification command '{}' timed out", program),
        }
    }
}

/// Build the notifier described by the configuration.
pub fn from_config(config: &NotifyConfig) -> Box<dyn Notifier> {
    if config.enabled {
        Box::new(CommandNotifier::new(config.command.clone()))
    } else {
        Box::new(LogNotifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_command_gets_title_and_message() {
        let notifier = CommandNotifier::new(Some("my-notify".to_string()));
        let (program, args) = notifier.invocation("Attendant", "Remember to type your own answer!");

        assert_eq!(program, "my-notify");
        assert_eq!(args, vec!["Attendant", "Remember to type your own answer!"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_swallowed() {
        let notifier = CommandNotifier::new(Some("attendant-no-such-notifier".to_string()));
        notifier.notify("title", "message").await;
    }

    #[tokio::test]
    async fn test_log_notifier() {
        LogNotifier.notify("title", "message").await;
    }
}
