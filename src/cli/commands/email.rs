use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::api::email::SmtpConfig;

pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_USERNAME: &str = "smtp-username";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_MAIL_FROM: &str = "mail-from";
pub const ARG_EMAIL_MAX_ATTEMPTS: &str = "email-max-attempts";
pub const ARG_EMAIL_BACKOFF_BASE_SECONDS: &str = "email-backoff-base-seconds";
pub const ARG_EMAIL_BACKOFF_MAX_SECONDS: &str = "email-backoff-max-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    /// `None` when no relay host is configured; mail is then only logged.
    pub smtp: Option<SmtpConfig>,
    pub max_attempts: u32,
    pub backoff_base_seconds: u64,
    pub backoff_max_seconds: u64,
}

impl Options {
    /// Parse mail transport and delivery retry arguments.
    ///
    /// # Errors
    /// Returns an error if a relay host is given without credentials.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let smtp = match matches.get_one::<String>(ARG_SMTP_HOST) {
            Some(host) => {
                let read_required = |id: &str| -> anyhow::Result<String> {
                    matches
                        .get_one::<String>(id)
                        .cloned()
                        .filter(|v| !v.trim().is_empty())
                        .ok_or_else(|| {
                            anyhow::anyhow!(
                                "missing required argument: --{id} (required with --{ARG_SMTP_HOST})"
                            )
                        })
                };

                Some(SmtpConfig {
                    host: host.clone(),
                    port: matches.get_one::<u16>(ARG_SMTP_PORT).copied().unwrap_or(587),
                    username: read_required(ARG_SMTP_USERNAME)?,
                    password: SecretString::from(read_required(ARG_SMTP_PASSWORD)?),
                    from: matches.get_one::<String>(ARG_MAIL_FROM).cloned(),
                })
            }
            None => None,
        };

        Ok(Self {
            smtp,
            max_attempts: matches
                .get_one::<u32>(ARG_EMAIL_MAX_ATTEMPTS)
                .copied()
                .unwrap_or(5),
            backoff_base_seconds: matches
                .get_one::<u64>(ARG_EMAIL_BACKOFF_BASE_SECONDS)
                .copied()
                .unwrap_or(2),
            backoff_max_seconds: matches
                .get_one::<u64>(ARG_EMAIL_BACKOFF_MAX_SECONDS)
                .copied()
                .unwrap_or(300),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_smtp_args(command);
    with_delivery_args(command)
}

fn with_smtp_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long(ARG_SMTP_HOST)
                .help("SMTP relay host (STARTTLS); verification emails are only logged when unset")
                .env("SHEETDASH_SMTP_HOST"),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long(ARG_SMTP_PORT)
                .help("SMTP relay port")
                .env("SHEETDASH_SMTP_PORT")
                .default_value("587")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_USERNAME)
                .long(ARG_SMTP_USERNAME)
                .help("SMTP username")
                .env("SHEETDASH_SMTP_USERNAME"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long(ARG_SMTP_PASSWORD)
                .help("SMTP password")
                .env("SHEETDASH_SMTP_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender address (defaults to the SMTP username)")
                .env("SHEETDASH_MAIL_FROM"),
        )
}

fn with_delivery_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_EMAIL_MAX_ATTEMPTS)
                .long(ARG_EMAIL_MAX_ATTEMPTS)
                .help("Max delivery attempts per verification email")
                .env("SHEETDASH_EMAIL_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_EMAIL_BACKOFF_BASE_SECONDS)
                .long(ARG_EMAIL_BACKOFF_BASE_SECONDS)
                .help("Base delay for email retry backoff")
                .env("SHEETDASH_EMAIL_BACKOFF_BASE_SECONDS")
                .default_value("2")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_EMAIL_BACKOFF_MAX_SECONDS)
                .long(ARG_EMAIL_BACKOFF_MAX_SECONDS)
                .help("Max delay for email retry backoff")
                .env("SHEETDASH_EMAIL_BACKOFF_MAX_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}
