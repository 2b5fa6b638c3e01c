//! Map validated CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, email};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    let email_opts = email::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        session_secret: auth_opts.session_secret,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        verify_token_ttl_seconds: auth_opts.verify_token_ttl_seconds,
        verify_base_url: auth_opts.verify_base_url,
        smtp: email_opts.smtp,
        email_max_attempts: email_opts.max_attempts,
        email_backoff_base_seconds: email_opts.backoff_base_seconds,
        email_backoff_max_seconds: email_opts.backoff_max_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const ENV: [(&str, Option<&str>); 8] = [
        ("SHEETDASH_DSN", Some("memory://")),
        ("SHEETDASH_SESSION_SECRET", Some("s3cret")),
        ("SHEETDASH_SESSION_TTL_SECONDS", None),
        ("SHEETDASH_SMTP_HOST", None),
        ("SHEETDASH_SMTP_USERNAME", None),
        ("SHEETDASH_SMTP_PASSWORD", None),
        ("SHEETDASH_MAIL_FROM", None),
        ("SHEETDASH_EMAIL_MAX_ATTEMPTS", None),
    ];

    #[test]
    fn server_action_from_env() {
        temp_env::with_vars(ENV, || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["sheetdash"]);
            let result = handler(&matches);
            assert!(result.is_ok());
            if let Ok(Action::Server(args)) = result {
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, "memory://");
                assert_eq!(args.session_secret.expose_secret(), "s3cret");
                assert_eq!(args.session_ttl_seconds, 3600);
                assert!(args.smtp.is_none());
                assert_eq!(args.email_max_attempts, 5);
            }
        });
    }

    #[test]
    fn smtp_host_requires_credentials() {
        temp_env::with_vars(ENV, || {
            let matches = crate::cli::commands::new().get_matches_from(vec![
                "sheetdash",
                "--smtp-host",
                "smtp.example.com",
            ]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err
                    .to_string()
                    .contains("missing required argument: --smtp-username"));
            }
        });
    }

    #[test]
    fn smtp_options_are_collected() {
        temp_env::with_vars(ENV, || {
            let matches = crate::cli::commands::new().get_matches_from(vec![
                "sheetdash",
                "--smtp-host",
                "smtp.example.com",
                "--smtp-port",
                "2525",
                "--smtp-username",
                "mailer@example.com",
                "--smtp-password",
                "pw",
                "--mail-from",
                "noreply@example.com",
            ]);
            let result = handler(&matches);
            assert!(result.is_ok());
            if let Ok(Action::Server(args)) = result {
                let smtp = args.smtp.as_ref();
                assert_eq!(smtp.map(|s| s.host.as_str()), Some("smtp.example.com"));
                assert_eq!(smtp.map(|s| s.port), Some(2525));
                assert_eq!(smtp.and_then(|s| s.from.as_deref()), Some("noreply@example.com"));
                assert_eq!(
                    smtp.map(|s| s.password.expose_secret().to_string()),
                    Some("pw".to_string())
                );
                assert!(!format!("{args:?}").contains("s3cret"));
            }
        });
    }

    #[test]
    fn non_positive_ttl_is_rejected() {
        temp_env::with_vars(ENV, || {
            let matches = crate::cli::commands::new().get_matches_from(vec![
                "sheetdash",
                "--session-ttl-seconds",
                "0",
            ]);
            assert!(handler(&matches).is_err());
        });
    }
}
