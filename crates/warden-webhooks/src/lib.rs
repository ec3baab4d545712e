//! Webhook delivery for warden
//!
//! This crate turns domain events into signed HTTP callbacks. Every active
//! subscription listening for an event receives one `POST` carrying the
//! canonical JSON envelope, optionally signed with HMAC-SHA256.

mod config;
mod dispatcher;
mod error;
mod signing;
mod types;

pub use config::{DEFAULT_TIMEOUT_SECS, WebhooksConfig};
pub use dispatcher::{SubscriptionSource, WebhookDispatcher};
pub use error::{Result, WebhookError};
pub use signing::{SIGNATURE_HEADER, encode_envelope, sign_payload, verify_signature};
pub use types::{DeliveryAttempt, DeliveryFailure, DeliveryOutcome, DispatchReport};
