//! Notification Sink.
//!
//! Operator notifications are fire-and-forget: [`NotificationSink::notify`]
//! never blocks the caller and never returns an error. Delivery failures are
//! only logged.

use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{TelemetryError, TelemetryResult};

/// Webhook request timeout.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Message importance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Routine status (per-cycle counts, covered symbols).
    Info,
    /// Needs operator attention (missing stops, failures, ITM closes).
    Important,
}

/// Which messages reach the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Nothing is sent.
    Off,
    /// Only [`Severity::Important`].
    #[default]
    Important,
    /// Everything.
    All,
}

impl NotificationLevel {
    /// True if a message of `severity` passes this level.
    #[must_use]
    pub fn allows(self, severity: Severity) -> bool {
        match self {
            Self::Off => false,
            Self::Important => severity == Severity::Important,
            Self::All => true,
        }
    }
}

/// Destination for operator notifications.
pub trait NotificationSink: Send + Sync {
    /// Deliver `message`. Must not block.
    fn notify(&self, message: &str, severity: Severity);
}

/// Arc wrapper for NotificationSink trait objects.
pub type DynNotifier = Arc<dyn NotificationSink>;

// ============================================================================
// Webhook
// ============================================================================

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts `{"content": message}` to a chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    level: NotificationLevel,
}

impl WebhookNotifier {
    /// Create a webhook notifier.
    pub fn new(url: impl Into<String>, level: NotificationLevel) -> TelemetryResult<Self> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| TelemetryError::Notification(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            level,
        })
    }
}

impl NotificationSink for WebhookNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        if !self.level.allows(severity) {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(message = %message, "No runtime for webhook notification, dropping");
            return;
        };

        let client = self.client.clone();
        let url = self.url.clone();
        let content = message.to_string();
        handle.spawn(async move {
            let result = client
                .post(&url)
                .json(&WebhookPayload { content: &content })
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    debug!("Webhook notification delivered");
                }
                Ok(resp) => {
                    warn!(status = resp.status().as_u16(), "Webhook notification rejected");
                }
                Err(e) => {
                    warn!(error = %e, "Webhook notification failed");
                }
            }
        });
    }
}

// ============================================================================
// Log-only
// ============================================================================

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier {
    level: NotificationLevel,
}

impl LogNotifier {
    pub fn new(level: NotificationLevel) -> Self {
        Self { level }
    }
}

impl NotificationSink for LogNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        if self.level.allows(severity) {
            info!(severity = ?severity, "NOTIFY: {message}");
        }
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Records notifications for inspection in tests.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    level: NotificationLevel,
    messages: Mutex<Vec<(Severity, String)>>,
}

impl MemoryNotifier {
    /// Create a notifier that keeps everything `level` allows.
    pub fn new(level: NotificationLevel) -> Self {
        Self {
            level,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Recorded messages.
    pub fn messages(&self) -> Vec<(Severity, String)> {
        self.messages.lock().clone()
    }

    /// Recorded messages containing `needle`.
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(_, m)| m.contains(needle))
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl NotificationSink for MemoryNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        if self.level.allows(severity) {
            self.messages.lock().push((severity, message.to_string()));
        }
    }
}
