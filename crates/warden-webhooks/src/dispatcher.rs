//! Event fan-out to subscriber endpoints

use crate::signing::{SIGNATURE_HEADER, encode_envelope, sign_payload};
use crate::{
    DeliveryAttempt, DeliveryFailure, DeliveryOutcome, DispatchReport, Result, WebhookError,
    WebhooksConfig,
};
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use warden_core::{EventName, WebhookSubscription};

/// Read access to the registered webhook subscriptions.
///
/// Called on every dispatch; implementations must not cache, so configuration
/// changes take effect on the next event.
pub trait SubscriptionSource: Send + Sync {
    /// Error type bubbled up from the backing store.
    type Error: Into<anyhow::Error> + Send;

    /// Snapshot of every subscription, active or not.
    ///
    /// # Errors
    /// Returns a store-specific error when the subscriptions cannot be read.
    fn subscriptions(
        &self,
    ) -> impl Future<Output = std::result::Result<Vec<WebhookSubscription>, Self::Error>> + Send;
}

impl SubscriptionSource for Vec<WebhookSubscription> {
    type Error = Infallible;

    async fn subscriptions(&self) -> std::result::Result<Vec<WebhookSubscription>, Infallible> {
        Ok(self.clone())
    }
}

impl<S: SubscriptionSource> SubscriptionSource for Arc<S> {
    type Error = S::Error;

    fn subscriptions(
        &self,
    ) -> impl Future<Output = std::result::Result<Vec<WebhookSubscription>, Self::Error>> + Send
    {
        (**self).subscriptions()
    }
}

/// Delivers events to every active subscription listening for them.
///
/// Each subscriber gets its own task, request and timeout; nothing one
/// subscriber does can affect delivery to another or the caller.
pub struct WebhookDispatcher<S> {
    source: S,
    client: Client,
    config: WebhooksConfig,
}

impl<S> WebhookDispatcher<S> {
    /// Create a dispatcher with an HTTP client honouring `config.timeout()`.
    ///
    /// Redirects are not followed: a 3xx answer counts as a failed delivery.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the client cannot be built.
    pub fn new(source: S, config: WebhooksConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .redirect(Policy::none())
            .user_agent(concat!("warden-webhooks/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WebhookError::Client(e.to_string()))?;
        Ok(Self::with_client(source, config, client))
    }

    /// Create a dispatcher around a preconfigured client.
    #[must_use]
    pub const fn with_client(source: S, config: WebhooksConfig, client: Client) -> Self {
        Self {
            source,
            client,
            config,
        }
    }

    /// Borrow the dispatch configuration.
    #[must_use]
    pub const fn config(&self) -> &WebhooksConfig {
        &self.config
    }

    /// Borrow the subscription source.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }
}

impl<S: SubscriptionSource> WebhookDispatcher<S> {
    /// Deliver `payload` for `event` to every matching subscription.
    ///
    /// Per-subscriber failures are logged and recorded in the returned report.
    ///
    /// # Errors
    /// Returns an error only when the subscriptions cannot be loaded or the
    /// envelope cannot be serialized; no delivery is attempted in that case.
    pub async fn dispatch(
        &self,
        event: &EventName,
        payload: serde_json::Value,
    ) -> Result<DispatchReport> {
        if !self.config.is_event_enabled(event.as_str()) {
            debug!(%event, "webhook event disabled by configuration");
            return Ok(DispatchReport::empty(event.clone()));
        }

        let subscriptions = self
            .source
            .subscriptions()
            .await
            .map_err(|e| {
                let err: anyhow::Error = e.into();
                WebhookError::Subscriptions(format!("{err:#}"))
            })?;
        let targets: Vec<WebhookSubscription> = subscriptions
            .into_iter()
            .filter(|subscription| subscription.wants(event.as_str()))
            .collect();
        if targets.is_empty() {
            debug!(%event, "no active webhook subscriptions for event");
            return Ok(DispatchReport::empty(event.clone()));
        }

        // Serialized once so every subscriber receives identical bytes.
        let body = Bytes::from(encode_envelope(event, payload)?);

        let mut tasks = JoinSet::new();
        for (index, subscription) in targets.into_iter().enumerate() {
            let client = self.client.clone();
            let event = event.clone();
            let body = body.clone();
            tasks.spawn(async move { (index, deliver(&client, subscription, event, body).await) });
        }

        let mut attempts = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(attempt) => attempts.push(attempt),
                Err(err) => error!(%event, %err, "webhook delivery task did not complete"),
            }
        }
        attempts.sort_by_key(|(index, _)| *index);

        let report = DispatchReport {
            event: event.clone(),
            attempts: attempts.into_iter().map(|(_, attempt)| attempt).collect(),
        };
        debug!(
            %event,
            delivered = report.delivered(),
            failed = report.failed(),
            "webhook dispatch finished"
        );
        Ok(report)
    }
}

impl<S: SubscriptionSource + 'static> WebhookDispatcher<S> {
    /// Fire-and-forget form of [`dispatch`](Self::dispatch).
    ///
    /// The dispatch runs on its own Tokio task; its outcome is only logged.
    /// The handle may be awaited (e.g. on shutdown) but never yields an error.
    pub fn spawn_dispatch(
        self: &Arc<Self>,
        event: EventName,
        payload: serde_json::Value,
    ) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            match dispatcher.dispatch(&event, payload).await {
                Ok(report) if !report.attempts.is_empty() => info!(
                    %event,
                    delivered = report.delivered(),
                    failed = report.failed(),
                    "background webhook dispatch finished"
                ),
                Ok(_) => {}
                Err(err) => error!(%event, %err, "webhook dispatch aborted"),
            }
        })
    }
}

async fn deliver(
    client: &Client,
    subscription: WebhookSubscription,
    event: EventName,
    body: Bytes,
) -> DeliveryAttempt {
    let (signature, outcome) = match prepare(&subscription, &body) {
        Ok((url, signature)) => {
            let outcome = post(client, url, &body, signature.as_deref()).await;
            (signature, outcome)
        }
        Err(failure) => (None, DeliveryOutcome::Failed(failure)),
    };
    let attempt = DeliveryAttempt {
        subscription_id: subscription.id,
        url: subscription.url,
        event,
        payload: body,
        signature,
        outcome,
    };

    match &attempt.outcome {
        DeliveryOutcome::Delivered { status } => {
            info!(
                subscription = %attempt.subscription_id,
                event = %attempt.event,
                status,
                "webhook delivered"
            );
        }
        DeliveryOutcome::Failed(reason) => {
            warn!(
                subscription = %attempt.subscription_id,
                url = %attempt.url,
                event = %attempt.event,
                %reason,
                "webhook delivery failed"
            );
        }
    }
    attempt
}

/// Validate the target URL and compute the signature, if any.
fn prepare(
    subscription: &WebhookSubscription,
    body: &[u8],
) -> std::result::Result<(Url, Option<String>), DeliveryFailure> {
    let url = Url::parse(&subscription.url)
        .map_err(|e| DeliveryFailure::InvalidSubscription(format!("invalid url: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DeliveryFailure::InvalidSubscription(format!(
            "unsupported url scheme '{}'",
            url.scheme()
        )));
    }
    let signature = subscription
        .secret
        .as_deref()
        .map(|secret| sign_payload(secret, body))
        .transpose()
        .map_err(|e| DeliveryFailure::InvalidSubscription(e.to_string()))?;
    Ok((url, signature))
}

async fn post(client: &Client, url: Url, body: &Bytes, signature: Option<&str>) -> DeliveryOutcome {
    let mut request = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body.clone());
    if let Some(signature) = signature {
        request = request.header(SIGNATURE_HEADER, signature);
    }

    match request.send().await {
        Ok(response) if response.status().is_success() => DeliveryOutcome::Delivered {
            status: response.status().as_u16(),
        },
        Ok(response) => DeliveryOutcome::Failed(DeliveryFailure::Status(response.status().as_u16())),
        Err(err) if err.is_timeout() => DeliveryOutcome::Failed(DeliveryFailure::Timeout),
        Err(err) if err.is_connect() => DeliveryOutcome::Failed(DeliveryFailure::Connect(err.to_string())),
        Err(err) => DeliveryOutcome::Failed(DeliveryFailure::Request(err.to_string())),
    }
}
