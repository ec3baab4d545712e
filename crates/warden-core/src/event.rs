use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt, str::FromStr};
use thiserror::Error;

/// Well-known event names emitted by the application.
///
/// The set is open: subscriptions may list names that are not declared here.
pub mod names {
    /// A meeting finished and its transcript is available.
    pub const MEETING_COMPLETED: &str = "meeting.completed";
    /// A meeting aborted before completion.
    pub const MEETING_FAILED: &str = "meeting.failed";
    /// An artifact was produced by a meeting.
    pub const ARTIFACT_CREATED: &str = "artifact.created";
    /// A team was created.
    pub const TEAM_CREATED: &str = "team.created";
    /// An agent was created.
    pub const AGENT_CREATED: &str = "agent.created";

    /// Every event name declared above.
    pub const KNOWN: [&str; 5] = [
        MEETING_COMPLETED,
        MEETING_FAILED,
        ARTIFACT_CREATED,
        TEAM_CREATED,
        AGENT_CREATED,
    ];
}

/// Rejected event name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventNameError {
    /// Name is empty after trimming.
    #[error("event name must not be empty")]
    Empty,
    /// Name contains whitespace or control characters.
    #[error("event name '{0}' contains whitespace or control characters")]
    InvalidCharacter(String),
}

/// Name of a domain event, e.g. `meeting.completed`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventName(String);

impl EventName {
    /// Validate and wrap an event name.
    ///
    /// # Errors
    /// Returns [`EventNameError`] when the name is empty or contains whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, EventNameError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(EventNameError::Empty);
        }
        if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(EventNameError::InvalidCharacter(value));
        }
        Ok(Self(value))
    }

    /// Borrow the wire value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name is one of the [`names::KNOWN`] events.
    #[must_use]
    pub fn is_known(&self) -> bool {
        names::KNOWN.contains(&self.as_str())
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EventName {
    type Err = EventNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EventName {
    type Error = EventNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventName> for String {
    fn from(value: EventName) -> Self {
        value.0
    }
}

impl Borrow<str> for EventName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Body posted to webhook subscribers: `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event name.
    pub event: EventName,
    /// Event payload.
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Build an envelope.
    #[must_use]
    pub const fn new(event: EventName, data: serde_json::Value) -> Self {
        Self { event, data }
    }
}
