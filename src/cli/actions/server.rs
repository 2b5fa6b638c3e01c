use crate::{
    account::{AccountStore, MemoryAccountStore, PgAccountStore},
    api::{
        self,
        email::{self, EmailSender, EmailWorkerConfig, LogEmailSender, Mailer, SmtpConfig},
    },
    auth::{AuthConfig, AuthService, SessionSigner},
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub verify_token_ttl_seconds: i64,
    pub verify_base_url: String,
    pub smtp: Option<SmtpConfig>,
    pub email_max_attempts: u32,
    pub email_backoff_base_seconds: u64,
    pub email_backoff_max_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the account store cannot be opened, the mail transport
/// is misconfigured, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let store = open_store(&args.dsn).await?;

    let sender: Arc<dyn EmailSender> = match &args.smtp {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "Delivering email through SMTP relay");
            Arc::new(email::SmtpEmailSender::new(smtp).context("Invalid SMTP configuration")?)
        }
        None => {
            warn!("No SMTP relay configured, verification emails are only logged");
            Arc::new(LogEmailSender)
        }
    };

    let email_config = EmailWorkerConfig::new()
        .with_max_attempts(args.email_max_attempts)
        .with_backoff_base_seconds(args.email_backoff_base_seconds)
        .with_backoff_max_seconds(args.email_backoff_max_seconds);

    let (mailer, outbox) = Mailer::channel();
    email::spawn_email_worker(outbox, sender, email_config);

    let auth_config = AuthConfig::new()
        .with_verify_base_url(args.verify_base_url)
        .with_verification_token_ttl_seconds(args.verify_token_ttl_seconds)
        .with_session_ttl_seconds(args.session_ttl_seconds);

    let signer = SessionSigner::new(&args.session_secret, auth_config.session_ttl());

    let auth = AuthService::new(store, mailer, signer, auth_config)
        .context("Failed to initialize auth service")?;

    api::new(args.port, Arc::new(auth)).await
}

/// Open the account store named by `dsn`: `memory://` or a Postgres URL.
///
/// # Errors
/// Returns an error for unsupported schemes, or if Postgres is unreachable or
/// migrations fail.
pub async fn open_store(dsn: &str) -> Result<Arc<dyn AccountStore>> {
    let url = Url::parse(dsn).context("Invalid DSN")?;

    match url.scheme() {
        "memory" => {
            warn!("Using in-memory account store, accounts are lost on restart");
            Ok(Arc::new(MemoryAccountStore::new()))
        }
        "postgres" | "postgresql" => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(dsn)
                .await
                .context("Failed to connect to database")?;

            let store = PgAccountStore::new(pool);
            store.migrate().await?;
            info!("Database migrations applied");

            Ok(Arc::new(store))
        }
        scheme => Err(anyhow!("Unsupported DSN scheme: {scheme}")),
    }
}
