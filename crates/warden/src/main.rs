//! CLI entry point for warden.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod commands;

/// Rate limiting, token revocation, credential encryption and webhooks.
#[derive(Parser, Debug)]
#[command(
    name = "warden",
    version,
    about = "warden: cache-backed rate limits, token blocklist and signed webhooks"
)]
struct Cli {
    /// Configuration file (defaults to ./warden.toml; missing means defaults).
    #[arg(long, default_value = "warden.toml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

/// Named limiter selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Llm,
    Api,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count one request against a limiter.
    Check {
        #[arg(long)]
        key: String,
        #[arg(long, value_enum, default_value_t = PolicyArg::Api)]
        policy: PolicyArg,
    },

    /// Revoke a token.
    Block {
        #[arg(long)]
        token: String,
        /// Seconds to keep the token blocked (defaults to blocklist.default_ttl_secs).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        ttl_secs: Option<u64>,
    },

    /// Check whether a token is revoked.
    IsBlocked {
        #[arg(long)]
        token: String,
    },

    /// Encrypt an API key with the configured secret.
    Encrypt {
        #[arg(long)]
        plaintext: String,
    },

    /// Decrypt a stored API key with the configured secret.
    Decrypt {
        #[arg(long)]
        ciphertext: String,
    },

    /// Print the canonical body and signature for an event.
    Sign {
        #[arg(long)]
        secret: String,
        #[arg(long)]
        event: String,
        /// JSON payload.
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Deliver an event to the configured subscriptions.
    Dispatch {
        #[arg(long)]
        event: String,
        /// JSON payload.
        #[arg(long, default_value = "{}")]
        data: String,
    },
}

fn main() -> Result<()> {
    let Cli { config, cmd } = Cli::parse();
    install_tracing();

    tokio::runtime::Runtime::new()?.block_on(commands::run(&config, cmd))
}

fn install_tracing() {
    // RUST_LOG is honoured; the default level is INFO.
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_check_command() {
        let cli = Cli::parse_from([
            "warden",
            "--config",
            "/etc/warden.toml",
            "check",
            "--key",
            "user-1",
            "--policy",
            "llm",
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/warden.toml"));

        match cli.cmd {
            Command::Check { key, policy } => {
                assert_eq!(key, "user-1");
                assert_eq!(policy, PolicyArg::Llm);
            }
            _ => panic!("expected check command"),
        }
    }

    #[test]
    fn check_defaults_to_api_policy() {
        let cli = Cli::parse_from(["warden", "check", "--key", "k"]);
        assert_eq!(cli.config, PathBuf::from("warden.toml"));
        assert!(matches!(cli.cmd, Command::Check { policy: PolicyArg::Api, .. }));
    }

    #[test]
    fn parse_block_command() {
        let cli = Cli::parse_from(["warden", "block", "--token", "jti-1", "--ttl-secs", "30"]);

        match cli.cmd {
            Command::Block { token, ttl_secs } => {
                assert_eq!(token, "jti-1");
                assert_eq!(ttl_secs, Some(30));
            }
            _ => panic!("expected block command"),
        }
    }

    #[test]
    fn block_rejects_zero_ttl() {
        let parsed = Cli::try_parse_from(["warden", "block", "--token", "jti-1", "--ttl-secs", "0"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn parse_sign_command() {
        let cli = Cli::parse_from([
            "warden",
            "sign",
            "--secret",
            "s3cr3t",
            "--event",
            "meeting.completed",
            "--data",
            r#"{"meeting_id":"mtg-42"}"#,
        ]);

        match cli.cmd {
            Command::Sign { secret, event, data } => {
                assert_eq!(secret, "s3cr3t");
                assert_eq!(event, "meeting.completed");
                assert_eq!(data, r#"{"meeting_id":"mtg-42"}"#);
            }
            _ => panic!("expected sign command"),
        }
    }

    #[test]
    fn parse_is_blocked_and_dispatch() {
        let cli = Cli::parse_from(["warden", "is-blocked", "--token", "t"]);
        assert!(matches!(cli.cmd, Command::IsBlocked { token } if token == "t"));

        let cli = Cli::parse_from(["warden", "dispatch", "--event", "team.created"]);
        assert!(matches!(cli.cmd, Command::Dispatch { data, .. } if data == "{}"));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
