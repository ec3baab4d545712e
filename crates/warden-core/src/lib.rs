//! Domain types shared by the warden crates: subscription identifiers,
//! event names, the webhook envelope and subscription records.

/// Event names and the webhook envelope.
pub mod event;
/// Identifier types.
pub mod id;
/// Webhook subscription records.
pub mod subscription;

pub use event::{EventEnvelope, EventName, EventNameError, names};
pub use id::SubscriptionId;
pub use subscription::WebhookSubscription;
