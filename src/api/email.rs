//! Verification email delivery.
//!
//! Request handlers only push a [`VerificationEmail`] onto an in-process queue
//! through [`Mailer`]. A background worker drains the queue and hands each
//! message to an [`EmailSender`], retrying failures with exponential backoff
//! and jitter until `max_attempts` is reached.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, error, info, warn, Instrument};

const FROM_DISPLAY_NAME: &str = "Verify your email";

#[derive(Clone, PartialEq, Eq)]
pub struct VerificationEmail {
    pub to_email: String,
    pub username: String,
    pub verify_url: String,
}

impl VerificationEmail {
    #[must_use]
    pub fn subject(&self) -> &'static str {
        "Email Verification"
    }

    #[must_use]
    pub fn html_body(&self) -> String {
        format!(
            "<h3>Hi {}, click <a href=\"{}\">here</a> to verify your email</h3>",
            escape_html(&self.username),
            self.verify_url
        )
    }
}

// The link carries the raw token, keep it out of logs.
impl std::fmt::Debug for VerificationEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationEmail")
            .field("to_email", &self.to_email)
            .field("username", &self.username)
            .field("verify_url", &"***")
            .finish()
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &VerificationEmail) -> Result<()>;
}

/// Development sender: logs the recipient instead of delivering.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &VerificationEmail) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = message.subject(),
            "verification email send stub"
        );
        Ok(())
    }
}

/// SMTP relay settings.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from: Option<String>,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("from", &self.from)
            .finish()
    }
}

/// Delivers through an SMTP relay using STARTTLS.
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// Build the transport. No connection is made until the first send.
    ///
    /// # Errors
    /// Returns an error if the relay host or sender address is invalid.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from_address = config.from.as_deref().unwrap_or(&config.username);
        let address: Address = from_address
            .parse()
            .with_context(|| format!("Invalid sender address: {from_address}"))?;

        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("Invalid SMTP relay: {}", config.host))?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from: Mailbox::new(Some(FROM_DISPLAY_NAME.to_string()), address),
        })
    }

    fn build_message(&self, message: &VerificationEmail) -> Result<Message> {
        let to: Mailbox = message
            .to_email
            .parse()
            .with_context(|| format!("Invalid recipient address: {}", message.to_email))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject())
            .user_agent(crate::APP_USER_AGENT.to_string())
            .header(ContentType::TEXT_HTML)
            .body(message.html_body())
            .context("failed to build verification email")
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: &VerificationEmail) -> Result<()> {
        let email = self.build_message(message)?;
        self.transport
            .send(email)
            .await
            .context("SMTP relay rejected message")?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EmailWorkerConfig {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl EmailWorkerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }
}

impl Default for EmailWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub type EmailReceiver = mpsc::UnboundedReceiver<VerificationEmail>;

/// Cheap handle used by the request path to queue outgoing email.
#[derive(Clone, Debug)]
pub struct Mailer {
    tx: mpsc::UnboundedSender<VerificationEmail>,
}

impl Mailer {
    #[must_use]
    pub fn channel() -> (Self, EmailReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a message for delivery.
    ///
    /// # Errors
    /// Returns an error if the worker is gone.
    pub fn enqueue(&self, message: VerificationEmail) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| anyhow!("email queue is closed"))
    }
}

pub fn spawn_email_worker(
    mut rx: EmailReceiver,
    sender: Arc<dyn EmailSender>,
    config: EmailWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let sender = sender.clone();
            let span = tracing::info_span!("email.deliver", to_email = %message.to_email);
            // One task per message so a backing-off delivery never holds up the queue.
            tokio::spawn(
                async move {
                    deliver_with_retry(sender.as_ref(), &message, &config).await;
                }
                .instrument(span),
            );
        }
        debug!("email queue closed, worker exiting");
    })
}

/// Returns the number of attempts made and whether delivery succeeded.
async fn deliver_with_retry(
    sender: &dyn EmailSender,
    message: &VerificationEmail,
    config: &EmailWorkerConfig,
) -> (u32, bool) {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match sender.send(message).await {
            Ok(()) => {
                debug!(attempt, "verification email delivered");
                return (attempt, true);
            }
            Err(err) if attempt >= config.max_attempts() => {
                error!(attempt, "verification email delivery failed permanently: {err:#}");
                return (attempt, false);
            }
            Err(err) => {
                let delay = backoff_delay(attempt, config.backoff_base(), config.backoff_max());
                warn!(
                    attempt,
                    retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "verification email delivery failed: {err:#}"
                );
                sleep(delay).await;
            }
        }
    }
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << shift;
    let delay = base.checked_mul(factor).unwrap_or(max);
    let capped = if delay > max { max } else { delay };
    jitter_delay(capped)
}

fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}
