//! Delivery attempts and dispatch reports

use bytes::Bytes;
use warden_core::{EventName, SubscriptionId};

/// Why a single subscriber did not receive an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryFailure {
    /// Subscriber answered with a non-2xx status
    #[error("subscriber responded with HTTP {0}")]
    Status(u16),

    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Connection could not be established (DNS, refused, TLS)
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport error
    #[error("request failed: {0}")]
    Request(String),

    /// Subscription record is unusable (bad URL or secret)
    #[error("invalid subscription: {0}")]
    InvalidSubscription(String),
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Subscriber acknowledged with a 2xx status
    Delivered {
        /// HTTP status code returned
        status: u16,
    },
    /// Delivery did not succeed
    Failed(DeliveryFailure),
}

/// One POST to one subscriber. Attempts are independent and unordered.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    /// Subscription the attempt targeted
    pub subscription_id: SubscriptionId,
    /// URL that was (or would have been) called
    pub url: String,
    /// Event being delivered
    pub event: EventName,
    /// Exact body bytes sent
    pub payload: Bytes,
    /// Hex signature attached, when the subscription has a secret
    pub signature: Option<String>,
    /// What happened
    pub outcome: DeliveryOutcome,
}

impl DeliveryAttempt {
    /// Whether the subscriber acknowledged the event
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered { .. })
    }

    /// Failure reason, if the attempt failed
    #[must_use]
    pub const fn failure(&self) -> Option<&DeliveryFailure> {
        match &self.outcome {
            DeliveryOutcome::Failed(reason) => Some(reason),
            DeliveryOutcome::Delivered { .. } => None,
        }
    }
}

/// Outcome of dispatching one event to every matching subscriber.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Event that was dispatched
    pub event: EventName,
    /// One entry per active subscription listening for the event
    pub attempts: Vec<DeliveryAttempt>,
}

impl DispatchReport {
    /// Report for a dispatch that targeted nobody
    #[must_use]
    pub const fn empty(event: EventName) -> Self {
        Self {
            event,
            attempts: Vec::new(),
        }
    }

    /// Number of acknowledged deliveries
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.attempts.iter().filter(|a| a.is_delivered()).count()
    }

    /// Number of failed deliveries
    #[must_use]
    pub fn failed(&self) -> usize {
        self.attempts.len() - self.delivered()
    }

    /// Find the attempt made for a given subscription
    #[must_use]
    pub fn attempt_for(&self, id: SubscriptionId) -> Option<&DeliveryAttempt> {
        self.attempts.iter().find(|a| a.subscription_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(outcome: DeliveryOutcome) -> Result<DeliveryAttempt, warden_core::EventNameError> {
        Ok(DeliveryAttempt {
            subscription_id: SubscriptionId::new(),
            url: "http://hooks.invalid".into(),
            event: EventName::new("team.created")?,
            payload: Bytes::from_static(b"{}"),
            signature: None,
            outcome,
        })
    }

    #[test]
    fn report_counts_delivered_and_failed() -> Result<(), warden_core::EventNameError> {
        let delivered = attempt(DeliveryOutcome::Delivered { status: 204 })?;
        let failed = attempt(DeliveryOutcome::Failed(DeliveryFailure::Status(500)))?;
        let failed_id = failed.subscription_id;
        let report = DispatchReport {
            event: EventName::new("team.created")?,
            attempts: vec![delivered, failed],
        };

        assert_eq!(report.delivered(), 1);
        assert_eq!(report.failed(), 1);
        let Some(found) = report.attempt_for(failed_id) else {
            panic!("attempt for failed subscription");
        };
        assert_eq!(found.failure(), Some(&DeliveryFailure::Status(500)));
        Ok(())
    }

    #[test]
    fn failure_messages_name_the_cause() {
        assert_eq!(
            DeliveryFailure::Status(503).to_string(),
            "subscriber responded with HTTP 503"
        );
        assert_eq!(DeliveryFailure::Timeout.to_string(), "request timed out");
    }
}
