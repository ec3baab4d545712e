//! Configuration loaded from `warden.toml` with environment overrides.

use std::{env, fmt, fs, path::Path, time::Duration};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use warden_cache::CacheConfig;
use warden_core::WebhookSubscription;
use warden_webhooks::WebhooksConfig;

use crate::blocklist::DEFAULT_BLOCK_TTL;
use crate::policy::FailurePolicy;
use crate::rate_limit::RateLimitPolicy;

/// Environment variable overriding `cache.redis_url`.
pub const ENV_REDIS_URL: &str = "WARDEN_REDIS_URL";
/// Environment variable overriding `credentials.secret`.
pub const ENV_SECRET_KEY: &str = "WARDEN_SECRET_KEY";

/// Top-level process configuration, usually loaded from `warden.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Cache backend selection.
    pub cache: CacheConfig,
    /// Named limiter policies.
    pub rate_limit: RateLimitConfig,
    /// Token revocation settings.
    pub blocklist: BlocklistConfig,
    /// Credential encryption secret.
    pub credentials: CredentialsConfig,
    /// Webhook delivery settings and static subscriptions.
    pub webhooks: WebhooksSection,
}

impl WardenConfig {
    /// Load configuration from `path`, falling back to defaults when the file is absent.
    ///
    /// Environment overrides are applied before validation.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if validation fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut fetch = |key: &'static str| env::var(key).ok();
        Self::load_with_env(path, &mut fetch)
    }

    fn load_with_env(
        path: impl AsRef<Path>,
        fetch: &mut impl FnMut(&'static str) -> Option<String>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Self::from_toml(&contents).with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env_with(fetch);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text without touching the environment.
    ///
    /// # Errors
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_with(&mut self, fetch: &mut impl FnMut(&'static str) -> Option<String>) {
        if let Some(url) = env_value_with(ENV_REDIS_URL, fetch) {
            self.cache.redis_url = Some(url);
        }
        if let Some(secret) = env_value_with(ENV_SECRET_KEY, fetch) {
            self.credentials.secret = Some(secret);
        }
    }

    /// Reject settings no component can honour.
    ///
    /// # Errors
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<()> {
        self.rate_limit.validate()?;
        if self.blocklist.default_ttl_secs == 0 {
            bail!("blocklist.default_ttl_secs must be greater than zero");
        }
        if self
            .credentials
            .secret
            .as_deref()
            .is_some_and(|secret| secret.trim().is_empty())
        {
            bail!("credentials.secret must not be empty");
        }
        self.webhooks.validate()
    }
}

fn env_value_with(
    key: &'static str,
    fetch: &mut impl FnMut(&'static str) -> Option<String>,
) -> Option<String> {
    fetch(key).filter(|value| !value.trim().is_empty())
}

/// Limiter policies and cache failure behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Behaviour of both limiters when the cache fails.
    pub on_cache_error: FailurePolicy,
    /// Strict policy for LLM-backed operations.
    pub llm: RateLimitPolicy,
    /// Loose policy for general API traffic.
    pub api: RateLimitPolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            on_cache_error: FailurePolicy::FailClosed,
            llm: RateLimitPolicy::LLM,
            api: RateLimitPolicy::API,
        }
    }
}

impl RateLimitConfig {
    fn validate(&self) -> Result<()> {
        for (name, policy) in [("llm", self.llm), ("api", self.api)] {
            if !policy.is_valid() {
                bail!("rate_limit.{name} needs max_requests and window_secs greater than zero");
            }
        }
        Ok(())
    }
}

/// Token blocklist settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BlocklistConfig {
    /// TTL applied when a block carries no explicit lifetime.
    pub default_ttl_secs: u64,
    /// Behaviour of lookups when the cache fails.
    pub on_cache_error: FailurePolicy,
}

impl Default for BlocklistConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: DEFAULT_BLOCK_TTL.as_secs(),
            on_cache_error: FailurePolicy::FailClosed,
        }
    }
}

impl BlocklistConfig {
    /// Default TTL as a duration.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

/// Credential encryption settings.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Process secret the encryption key is derived from.
    pub secret: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// `[webhooks]` table: dispatch settings plus statically registered subscriptions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhooksSection {
    /// Dispatch settings, flattened into the `[webhooks]` table.
    #[serde(flatten)]
    pub settings: WebhooksConfig,
    /// Subscriptions registered at startup.
    pub subscriptions: Vec<WebhookSubscription>,
}

impl WebhooksSection {
    fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        for (index, subscription) in self.subscriptions.iter().enumerate() {
            if subscription.url.trim().is_empty() {
                bail!("webhooks.subscriptions[{index}] has an empty url");
            }
            if subscription.events.is_empty() {
                bail!("webhooks.subscriptions[{index}] lists no events");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn no_env(_: &'static str) -> Option<String> {
        None
    }

    #[test]
    fn missing_file_returns_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = WardenConfig::load_with_env(dir.path().join("warden.toml"), &mut no_env)?;
        assert!(config.cache.redis_url.is_none());
        assert_eq!(config.rate_limit.llm, RateLimitPolicy::new(10, 60));
        assert_eq!(config.rate_limit.api, RateLimitPolicy::new(100, 60));
        assert_eq!(config.rate_limit.on_cache_error, FailurePolicy::FailClosed);
        assert_eq!(config.blocklist.default_ttl(), Duration::from_secs(604_800));
        assert!(config.webhooks.settings.enabled);
        assert!(config.webhooks.subscriptions.is_empty());
        Ok(())
    }

    #[test]
    fn load_full_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("warden.toml");
        let mut file = fs::File::create(&path)?;
        write!(
            file,
            r#"
[cache]
redis_url = "redis://cache.internal/"
capacity = 500

[rate_limit]
on_cache_error = "fail_open"
llm = {{ max_requests = 5, window_secs = 30 }}

[blocklist]
default_ttl_secs = 3600

[credentials]
secret = "file-secret"

[webhooks]
timeout_secs = 3
disabled_events = ["team.created"]

[[webhooks.subscriptions]]
url = "https://hooks.invalid/a"
events = ["meeting.completed", "meeting.failed"]
secret = "s3cr3t"
"#
        )?;

        let config = WardenConfig::load_with_env(&path, &mut no_env)?;
        assert_eq!(config.cache.redis_url.as_deref(), Some("redis://cache.internal/"));
        assert_eq!(config.cache.capacity.get(), 500);
        assert_eq!(config.rate_limit.on_cache_error, FailurePolicy::FailOpen);
        assert_eq!(config.rate_limit.llm, RateLimitPolicy::new(5, 30));
        assert_eq!(config.rate_limit.api, RateLimitPolicy::API);
        assert_eq!(config.blocklist.default_ttl_secs, 3600);
        assert_eq!(config.credentials.secret.as_deref(), Some("file-secret"));
        assert_eq!(config.webhooks.settings.timeout_secs, 3);
        assert!(!config.webhooks.settings.is_event_enabled("team.created"));

        let [subscription] = config.webhooks.subscriptions.as_slice() else {
            panic!("expected one subscription");
        };
        assert!(subscription.is_active);
        assert!(subscription.wants("meeting.failed"));
        assert_eq!(subscription.secret.as_deref(), Some("s3cr3t"));
        Ok(())
    }

    #[test]
    fn environment_overrides_file_values() -> Result<()> {
        let mut config = WardenConfig::from_toml("[credentials]\nsecret = \"file\"")?;
        let mut fetch = |key: &'static str| match key {
            ENV_REDIS_URL => Some("redis://env/".into()),
            ENV_SECRET_KEY => Some("env-secret".into()),
            _ => None,
        };
        config.apply_env_with(&mut fetch);
        assert_eq!(config.cache.redis_url.as_deref(), Some("redis://env/"));
        assert_eq!(config.credentials.secret.as_deref(), Some("env-secret"));
        Ok(())
    }

    #[test]
    fn blank_environment_values_are_ignored() -> Result<()> {
        let mut config = WardenConfig::from_toml("[credentials]\nsecret = \"file\"")?;
        let mut fetch = |_: &'static str| Some("  ".to_owned());
        config.apply_env_with(&mut fetch);
        assert!(config.cache.redis_url.is_none());
        assert_eq!(config.credentials.secret.as_deref(), Some("file"));
        Ok(())
    }

    #[test]
    fn invalid_settings_are_rejected() -> Result<()> {
        for text in [
            "[rate_limit]\nllm = { max_requests = 0, window_secs = 60 }",
            "[rate_limit]\napi = { max_requests = 1, window_secs = 0 }",
            "[blocklist]\ndefault_ttl_secs = 0",
            "[credentials]\nsecret = \"\"",
            "[webhooks]\ntimeout_secs = 0",
            "[[webhooks.subscriptions]]\nurl = \"\"\nevents = [\"team.created\"]",
            "[[webhooks.subscriptions]]\nurl = \"https://a.invalid\"\nevents = []",
        ] {
            let config = WardenConfig::from_toml(text)?;
            assert!(config.validate().is_err(), "accepted: {text}");
        }
        assert!(WardenConfig::from_toml("[cache]\ncapacity = 0").is_err());
        Ok(())
    }

    #[test]
    fn secret_is_redacted_in_debug() -> Result<()> {
        let config = WardenConfig::from_toml("[credentials]\nsecret = \"hunter2\"")?;
        assert!(!format!("{config:?}").contains("hunter2"));
        Ok(())
    }
}
