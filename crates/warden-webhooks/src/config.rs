//! Webhook dispatch configuration

use crate::{Result, WebhookError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for webhook delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhooksConfig {
    /// Whether webhooks are delivered at all
    pub enabled: bool,

    /// Timeout in seconds for each subscriber request
    pub timeout_secs: u64,

    /// Event names that are never delivered
    pub disabled_events: Vec<String>,
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            disabled_events: Vec::new(),
        }
    }
}

impl WebhooksConfig {
    /// Check if a specific event is delivered
    #[must_use]
    pub fn is_event_enabled(&self, event: &str) -> bool {
        self.enabled && !self.disabled_events.iter().any(|name| name == event)
    }

    /// Per-request timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject settings the dispatcher cannot honour
    ///
    /// # Errors
    /// Returns [`WebhookError::Config`] when the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(WebhookError::Config(
                "webhook timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
