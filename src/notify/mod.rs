//! Chat notifications.
//!
//! Notifications are fire-and-forget from the caller's point of view:
//! [`dispatch`] logs failures and never returns them.

pub mod webex;

use crate::config::NotifierConfig;
use crate::external::{bounded, UpstreamError};
use async_trait::async_trait;
use tracing::{info, warn};

pub use webex::WebexNotifier;

/// A destination for human-readable messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn notify(&self, message: &str) -> Result<(), UpstreamError>;
}

/// Logs messages instead of sending them. Used when the channel is
/// disabled, unconfigured, or in dry-run mode.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, message: &str) -> Result<(), UpstreamError> {
        info!("Notification (not sent):\n{}", message);
        Ok(())
    }
}

/// Cut a message to at most `max_chars` characters, marking the cut.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }

    const MARKER: &str = "\n\n_(truncated)_";
    let keep = max_chars.saturating_sub(MARKER.chars().count());
    let mut truncated: String = message.chars().take(keep).collect();
    truncated.push_str(MARKER);
    truncated
}

/// Send a message, logging the outcome. Returns whether it was delivered.
pub async fn dispatch(notifier: &dyn Notifier, message: &str, timeout_secs: u64) -> bool {
    match bounded(timeout_secs, notifier.notify(message)).await {
        Ok(()) => {
            info!("Message sent via {}", notifier.name());
            true
        }
        Err(e) => {
            warn!("Failed to send message via {}: {}", notifier.name(), e);
            false
        }
    }
}

/// Build the notifier for the given settings.
///
/// Falls back to [`LogNotifier`] when notifications are disabled or the
/// room and token are not both set.
pub fn notifier_from_config(config: &NotifierConfig) -> Box<dyn Notifier> {
    if !config.enabled {
        info!("Notifications disabled");
        return Box::new(LogNotifier);
    }

    match (&config.room_id, &config.bot_token) {
        (Some(room_id), Some(token)) if !room_id.is_empty() && !token.is_empty() => {
            match WebexNotifier::new(config.clone(), room_id.clone(), token.clone()) {
                Ok(notifier) => Box::new(notifier),
                Err(e) => {
                    warn!("Cannot create Webex notifier: {}", e);
                    Box::new(LogNotifier)
                }
            }
        }
        _ => {
            warn!("Set WEBEX_ROOM_ID and WEBEX_BOT_TOKEN to send notifications to Webex");
            Box::new(LogNotifier)
        }
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory notifier for tests.

    use super::*;
    use std::sync::Mutex;

    /// Records every message; optionally fails each call.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub messages: Mutex<Vec<String>>,
        pub fail_with: Option<UpstreamError>,
    }

    impl RecordingNotifier {
        pub fn failing(err: UpstreamError) -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
                fail_with: Some(err),
            }
        }

        pub fn sent(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn notify(&self, message: &str) -> Result<(), UpstreamError> {
            self.messages.lock().unwrap().push(message.to_string());
            match self.fail_with {
                Some(ref err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }
}
