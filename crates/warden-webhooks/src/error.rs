//! Error types for webhook dispatch

/// Result type for webhook operations
pub type Result<T> = std::result::Result<T, WebhookError>;

/// Hard failures that stop a dispatch before any delivery is attempted.
///
/// Per-subscriber problems never surface here; they are recorded as
/// [`DeliveryFailure`](crate::DeliveryFailure) values in the report.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// Subscription source could not be read
    #[error("Failed to load webhook subscriptions: {0}")]
    Subscriptions(String),

    /// Event envelope could not be serialized
    #[error("Failed to serialize webhook payload: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Signing secret rejected by the MAC implementation
    #[error("Invalid webhook signing secret")]
    InvalidSecret,

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Webhook configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
