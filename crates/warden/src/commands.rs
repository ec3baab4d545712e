use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use warden_app::{LimiterKind, RateLimitError, Warden, WardenConfig};
use warden_core::EventName;
use warden_webhooks::{DeliveryOutcome, encode_envelope, sign_payload};

use crate::{Command, PolicyArg};

impl From<PolicyArg> for LimiterKind {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Llm => Self::Llm,
            PolicyArg::Api => Self::Api,
        }
    }
}

pub async fn run(config_path: &Path, command: Command) -> Result<()> {
    // Signing is pure; it needs neither configuration nor a cache.
    if let Command::Sign {
        secret,
        event,
        data,
    } = &command
    {
        return sign(secret, event, data);
    }

    let config = WardenConfig::load(config_path)?;
    let warden = Warden::from_config(&config).await?;

    match command {
        Command::Check { key, policy } => {
            match warden.limiter(policy.into()).check(&key).await {
                Ok(info) => {
                    println!("allowed: {}/{} remaining", info.remaining, info.limit);
                    Ok(())
                }
                Err(RateLimitError::Exceeded(exceeded)) => {
                    for (name, value) in exceeded.headers() {
                        println!("{name}: {value}");
                    }
                    Err(exceeded.into())
                }
                Err(err) => Err(err.into()),
            }
        }

        Command::Block { token, ttl_secs } => {
            warden
                .blocklist()
                .block(&token, ttl_secs.map(Duration::from_secs))
                .await
                .with_context(|| format!("failed to block {token}"))?;
            println!("blocked {token}");
            Ok(())
        }

        Command::IsBlocked { token } => {
            let blocked = warden
                .blocklist()
                .try_is_blocked(&token)
                .await
                .context("blocklist lookup failed")?;
            println!("{blocked}");
            Ok(())
        }

        Command::Encrypt { plaintext } => {
            println!("{}", warden.cipher()?.encrypt(&plaintext)?);
            Ok(())
        }

        Command::Decrypt { ciphertext } => {
            println!("{}", warden.cipher()?.decrypt(&ciphertext)?);
            Ok(())
        }

        Command::Dispatch { event, data } => {
            let event = EventName::new(event)?;
            let report = warden.dispatch(&event, parse_payload(&data)?).await?;
            if report.attempts.is_empty() {
                println!("no subscriptions for {event}");
            }
            for attempt in &report.attempts {
                match &attempt.outcome {
                    DeliveryOutcome::Delivered { status } => {
                        println!("{} {} delivered ({status})", attempt.subscription_id, attempt.url);
                    }
                    DeliveryOutcome::Failed(reason) => {
                        println!("{} {} failed: {reason}", attempt.subscription_id, attempt.url);
                    }
                }
            }
            Ok(())
        }

        Command::Sign {
            secret,
            event,
            data,
        } => sign(&secret, &event, &data),
    }
}

fn sign(secret: &str, event: &str, data: &str) -> Result<()> {
    let event = EventName::new(event)?;
    let body = encode_envelope(&event, parse_payload(data)?)?;
    let signature = sign_payload(secret, &body)?;
    println!("{}", String::from_utf8_lossy(&body));
    println!("{signature}");
    Ok(())
}

fn parse_payload(data: &str) -> Result<Value> {
    serde_json::from_str(data).context("--data must be valid JSON")
}
