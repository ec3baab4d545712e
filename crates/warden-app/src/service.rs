//! The [`Warden`] service wiring every component from one configuration.

use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;
use warden_cache::CacheBackend;
use warden_core::EventName;
use warden_webhooks::{DispatchReport, WebhookDispatcher};

use crate::blocklist::TokenBlocklist;
use crate::config::WardenConfig;
use crate::credentials::CredentialCipher;
use crate::rate_limit::RateLimiter;
use crate::subscriptions::SubscriptionRegistry;

/// Shared cache handle passed into every cache-backed component.
pub type SharedCache = Arc<CacheBackend>;

/// Dispatcher reading from the in-process registry.
pub type Dispatcher = WebhookDispatcher<Arc<SubscriptionRegistry>>;

/// Which named limiter a request is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterKind {
    /// Expensive LLM-backed operations.
    Llm,
    /// General API traffic.
    Api,
}

/// Façade wiring every component from one [`WardenConfig`].
///
/// The cache is built once here and shared by the limiters and the blocklist.
pub struct Warden {
    cache: SharedCache,
    llm: RateLimiter<SharedCache>,
    api: RateLimiter<SharedCache>,
    blocklist: TokenBlocklist<SharedCache>,
    cipher: Option<CredentialCipher>,
    subscriptions: Arc<SubscriptionRegistry>,
    webhooks: Arc<Dispatcher>,
}

impl Warden {
    /// Connect the configured cache backend and build every component.
    ///
    /// # Errors
    /// Returns an error if the cache cannot be reached or the webhook client cannot be built.
    pub async fn from_config(config: &WardenConfig) -> Result<Self> {
        let cache = CacheBackend::from_config(&config.cache)
            .await
            .context("failed to initialise cache backend")?;
        Self::with_cache(config, Arc::new(cache))
    }

    /// Build every component around an existing cache.
    ///
    /// # Errors
    /// Returns an error if the webhook client cannot be built.
    pub fn with_cache(config: &WardenConfig, cache: SharedCache) -> Result<Self> {
        let limits = &config.rate_limit;
        let llm = RateLimiter::new(Arc::clone(&cache), limits.llm)
            .with_failure_policy(limits.on_cache_error);
        let api = RateLimiter::new(Arc::clone(&cache), limits.api)
            .with_failure_policy(limits.on_cache_error);
        let blocklist = TokenBlocklist::new(Arc::clone(&cache))
            .with_default_ttl(config.blocklist.default_ttl())
            .with_failure_policy(config.blocklist.on_cache_error);
        let cipher = config.credentials.secret.as_deref().map(CredentialCipher::new);

        let subscriptions = Arc::new(SubscriptionRegistry::new(
            config.webhooks.subscriptions.clone(),
        ));
        let webhooks = WebhookDispatcher::new(
            Arc::clone(&subscriptions),
            config.webhooks.settings.clone(),
        )
        .context("failed to build webhook dispatcher")?;

        info!(
            cache = cache.kind(),
            subscriptions = config.webhooks.subscriptions.len(),
            credentials = cipher.is_some(),
            "warden initialised"
        );

        Ok(Self {
            cache,
            llm,
            api,
            blocklist,
            cipher,
            subscriptions,
            webhooks: Arc::new(webhooks),
        })
    }

    /// Shared cache handle.
    #[must_use]
    pub const fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Limiter for the given traffic class.
    #[must_use]
    pub const fn limiter(&self, kind: LimiterKind) -> &RateLimiter<SharedCache> {
        match kind {
            LimiterKind::Llm => &self.llm,
            LimiterKind::Api => &self.api,
        }
    }

    /// Token blocklist.
    #[must_use]
    pub const fn blocklist(&self) -> &TokenBlocklist<SharedCache> {
        &self.blocklist
    }

    /// Credential cipher for the configured secret.
    ///
    /// # Errors
    /// Returns an error when no secret is configured.
    pub fn cipher(&self) -> Result<&CredentialCipher> {
        self.cipher.as_ref().ok_or_else(|| {
            anyhow!("credentials.secret is not configured (set it or WARDEN_SECRET_KEY)")
        })
    }

    /// Webhook subscription registry.
    #[must_use]
    pub const fn subscriptions(&self) -> &Arc<SubscriptionRegistry> {
        &self.subscriptions
    }

    /// Webhook dispatcher.
    #[must_use]
    pub const fn webhooks(&self) -> &Arc<Dispatcher> {
        &self.webhooks
    }

    /// Deliver `event` and wait for every attempt to finish.
    ///
    /// # Errors
    /// Returns an error only when dispatch could not start.
    pub async fn dispatch(
        &self,
        event: &EventName,
        payload: serde_json::Value,
    ) -> Result<DispatchReport> {
        Ok(self.webhooks.dispatch(event, payload).await?)
    }

    /// Deliver `event` in the background; the caller never observes the outcome.
    pub fn emit(&self, event: EventName, payload: serde_json::Value) -> JoinHandle<()> {
        self.webhooks.spawn_dispatch(event, payload)
    }
}
