use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::auth::MAX_TTL_SECONDS;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_VERIFY_TOKEN_TTL_SECONDS: &str = "verify-token-ttl-seconds";
pub const ARG_VERIFY_BASE_URL: &str = "verify-base-url";

#[derive(Debug, Clone)]
pub struct Options {
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub verify_token_ttl_seconds: i64,
    pub verify_base_url: String,
}

impl Options {
    /// Parse session and verification arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the session secret is missing or a TTL is outside
    /// `1..=MAX_TTL_SECONDS`.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let session_secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.clone()))
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_SESSION_SECRET}"))?;

        let ttl = |id: &str| -> anyhow::Result<i64> {
            match matches.get_one::<i64>(id).copied() {
                Some(seconds) if (1..=MAX_TTL_SECONDS).contains(&seconds) => Ok(seconds),
                _ => Err(anyhow::anyhow!(
                    "--{id} must be between 1 and {MAX_TTL_SECONDS} seconds"
                )),
            }
        };

        Ok(Self {
            session_secret,
            session_ttl_seconds: ttl(ARG_SESSION_TTL_SECONDS)?,
            verify_token_ttl_seconds: ttl(ARG_VERIFY_TOKEN_TTL_SECONDS)?,
            verify_base_url: matches
                .get_one::<String>(ARG_VERIFY_BASE_URL)
                .cloned()
                .ok_or_else(|| {
                    anyhow::anyhow!("missing required argument: --{ARG_VERIFY_BASE_URL}")
                })?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to sign session tokens (HS256)")
                .env("SHEETDASH_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session token TTL in seconds")
                .env("SHEETDASH_SESSION_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_VERIFY_TOKEN_TTL_SECONDS)
                .long(ARG_VERIFY_TOKEN_TTL_SECONDS)
                .help("Email verification token TTL in seconds")
                .env("SHEETDASH_VERIFY_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_VERIFY_BASE_URL)
                .long(ARG_VERIFY_BASE_URL)
                .help("Base URL of the verification link; the token is appended as a path segment")
                .env("SHEETDASH_VERIFY_BASE_URL")
                .default_value("http://localhost:5000/api/auth/verify"),
        )
}
