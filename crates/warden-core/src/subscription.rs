use crate::event::EventName;
use crate::id::SubscriptionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Registered webhook endpoint.
///
/// Owned by the business-data store; the dispatcher only reads it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    /// Stable identifier.
    #[serde(default = "SubscriptionId::new")]
    pub id: SubscriptionId,
    /// Target URL receiving `POST` requests.
    pub url: String,
    /// Event names this endpoint wants.
    pub events: BTreeSet<EventName>,
    /// Inactive subscriptions are never delivered to.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Shared secret used to sign payloads, if any.
    #[serde(default)]
    pub secret: Option<String>,
}

const fn default_active() -> bool {
    true
}

impl WebhookSubscription {
    /// Create an active, unsigned subscription.
    pub fn new(url: impl Into<String>, events: impl IntoIterator<Item = EventName>) -> Self {
        Self {
            id: SubscriptionId::new(),
            url: url.into(),
            events: events.into_iter().collect(),
            is_active: true,
            secret: None,
        }
    }

    /// Attach a signing secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Mark the subscription inactive.
    #[must_use]
    pub const fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// True when the subscription is active and lists `event`.
    #[must_use]
    pub fn wants(&self, event: &str) -> bool {
        self.is_active && self.events.contains(event)
    }
}

// Hand-written so the secret never reaches logs.
impl fmt::Debug for WebhookSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookSubscription")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("events", &self.events)
            .field("is_active", &self.is_active)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventNameError, names};

    fn name(value: &str) -> Result<EventName, EventNameError> {
        EventName::new(value)
    }

    #[test]
    fn wants_requires_active_and_listed_event() -> Result<(), EventNameError> {
        let sub = WebhookSubscription::new("http://hooks.invalid", [name(names::MEETING_COMPLETED)?]);
        assert!(sub.wants(names::MEETING_COMPLETED));
        assert!(!sub.wants(names::MEETING_FAILED));
        assert!(!sub.deactivated().wants(names::MEETING_COMPLETED));
        Ok(())
    }

    #[test]
    fn debug_output_redacts_secret() -> Result<(), EventNameError> {
        let sub = WebhookSubscription::new("http://hooks.invalid", [name(names::TEAM_CREATED)?])
            .with_secret("hunter2");
        let rendered = format!("{sub:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
        Ok(())
    }

    #[test]
    fn deserialize_defaults_to_active_with_fresh_id() -> Result<(), serde_json::Error> {
        let sub: WebhookSubscription = serde_json::from_str(
            r#"{ "url": "http://hooks.invalid", "events": ["agent.created"] }"#,
        )?;
        assert!(sub.is_active);
        assert!(sub.secret.is_none());
        assert_eq!(sub.id.0.get_version_num(), 7);
        Ok(())
    }
}
