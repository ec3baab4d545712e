//! Behaviour when the shared cache cannot answer.

use serde::{Deserialize, Serialize};

/// What a cache-backed check does when the cache is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Allow the request and log a warning.
    FailOpen,
    /// Deny the request.
    #[default]
    FailClosed,
}

impl FailurePolicy {
    /// True when a cache failure lets the request through.
    #[must_use]
    pub const fn allows(self) -> bool {
        matches!(self, Self::FailOpen)
    }
}
