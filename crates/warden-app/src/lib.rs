//! Application layer for warden.
//!
//! This crate wires the shared cache into the rate limiter and token blocklist,
//! provides credential encryption, loads configuration, and exposes the
//! [`Warden`] service used by the CLI and by embedding HTTP layers.

pub mod blocklist;
pub mod config;
pub mod credentials;
pub mod policy;
pub mod rate_limit;
pub mod service;
pub mod subscriptions;

// Re-exports for convenience
pub use blocklist::{BlocklistError, DEFAULT_BLOCK_TTL, TokenBlocklist};
pub use config::{
    BlocklistConfig, CredentialsConfig, RateLimitConfig, WardenConfig, WebhooksSection,
};
pub use credentials::{
    CredentialCipher, CredentialError, CredentialKey, StoredCredential, decrypt, derive_key,
    encrypt,
};
pub use policy::FailurePolicy;
pub use rate_limit::{
    RateLimitError, RateLimitExceeded, RateLimitInfo, RateLimitPolicy, RateLimiter,
};
pub use service::{Dispatcher, LimiterKind, SharedCache, Warden};
pub use subscriptions::SubscriptionRegistry;
