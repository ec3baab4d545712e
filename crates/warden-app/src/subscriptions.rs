//! In-process webhook subscription registry.

use std::convert::Infallible;
use tokio::sync::RwLock;
use warden_core::{SubscriptionId, WebhookSubscription};
use warden_webhooks::SubscriptionSource;

/// Subscriptions held in memory, seeded from configuration.
///
/// Every dispatch reads a fresh snapshot, so changes apply to the next event.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<Vec<WebhookSubscription>>,
}

impl SubscriptionRegistry {
    /// Create a registry holding `subscriptions`.
    #[must_use]
    pub fn new(subscriptions: Vec<WebhookSubscription>) -> Self {
        Self {
            entries: RwLock::new(subscriptions),
        }
    }

    /// Register a subscription, replacing any with the same id.
    pub async fn upsert(&self, subscription: WebhookSubscription) -> SubscriptionId {
        let id = subscription.id;
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|existing| existing.id == id) {
            Some(existing) => *existing = subscription,
            None => entries.push(subscription),
        }
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub async fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|subscription| subscription.id != id);
        entries.len() != before
    }

    /// Toggle delivery for a subscription. Returns whether it existed.
    pub async fn set_active(&self, id: SubscriptionId, active: bool) -> bool {
        let mut entries = self.entries.write().await;
        let Some(subscription) = entries.iter_mut().find(|subscription| subscription.id == id) else {
            return false;
        };
        subscription.is_active = active;
        true
    }

    /// Snapshot of every registered subscription.
    pub async fn list(&self) -> Vec<WebhookSubscription> {
        self.entries.read().await.clone()
    }
}

impl SubscriptionSource for SubscriptionRegistry {
    type Error = Infallible;

    async fn subscriptions(&self) -> Result<Vec<WebhookSubscription>, Infallible> {
        Ok(self.list().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{EventName, EventNameError, names};

    fn hook(url: &str) -> Result<WebhookSubscription, EventNameError> {
        Ok(WebhookSubscription::new(url, [EventName::new(names::TEAM_CREATED)?]))
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() -> Result<(), EventNameError> {
        let registry = SubscriptionRegistry::default();
        let original = hook("https://a.invalid")?;
        let id = registry.upsert(original.clone()).await;

        let mut changed = original;
        changed.url = "https://b.invalid".into();
        registry.upsert(changed).await;

        let all = registry.list().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].url, "https://b.invalid");
        Ok(())
    }

    #[tokio::test]
    async fn deactivate_and_remove() -> Result<(), EventNameError> {
        let registry = SubscriptionRegistry::new(vec![hook("https://a.invalid")?]);
        let id = registry.list().await[0].id;

        assert!(registry.set_active(id, false).await);
        let Ok(snapshot) = registry.subscriptions().await;
        assert!(!snapshot[0].wants(names::TEAM_CREATED));

        assert!(registry.remove(id).await);
        assert!(!registry.remove(id).await);
        assert!(!registry.set_active(id, true).await);
        Ok(())
    }
}
