//! Account lifecycle: registration, email verification and login gating.

use chrono::{Duration, Utc};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, instrument, warn};

use crate::account::{Account, AccountStore, NewAccount};
use crate::api::email::{Mailer, VerificationEmail};

mod error;
pub mod password;
pub mod session;
pub mod token;

pub use error::AuthError;
pub use password::PasswordHasher;
pub use session::{SessionClaims, SessionSigner};
pub use token::{IssuedToken, TokenIssuer};

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_VERIFY_BASE_URL: &str = "http://localhost:5000/api/auth/verify";

/// Upper bound accepted for either TTL: 30 days.
pub const MAX_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    verify_base_url: String,
    verification_token_ttl_seconds: i64,
    session_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            verify_base_url: DEFAULT_VERIFY_BASE_URL.to_string(),
            verification_token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_verify_base_url(mut self, url: String) -> Self {
        self.verify_base_url = url;
        self
    }

    #[must_use]
    pub fn with_verification_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.verification_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn verify_base_url(&self) -> &str {
        &self.verify_base_url
    }

    // Out-of-range seconds saturate; `issue` and `sign` then return an error.
    #[must_use]
    pub fn verification_token_ttl(&self) -> Duration {
        Duration::try_seconds(self.verification_token_ttl_seconds).unwrap_or(Duration::MAX)
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::try_seconds(self.session_ttl_seconds).unwrap_or(Duration::MAX)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a successful registration: the account exists, unverified,
/// and a verification email has been queued.
#[derive(Debug, Clone)]
pub struct Pending {
    pub account_id: uuid::Uuid,
    pub email: String,
}

/// Basic `local@domain.tld` shape check.
pub fn valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(email))
}

/// Build the link included in verification emails.
fn build_verify_url(verify_base_url: &str, token: &str) -> String {
    let base = verify_base_url.trim_end_matches('/');
    format!("{base}/{token}")
}

pub struct AuthService {
    store: Arc<dyn AccountStore>,
    mailer: Mailer,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    signer: SessionSigner,
    config: AuthConfig,
    // Verified against when the email is unknown so both failure paths cost the same.
    dummy_hash: String,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("config", &self.config)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// # Errors
    /// Returns an error if the timing-equalization hash cannot be computed.
    pub fn new(
        store: Arc<dyn AccountStore>,
        mailer: Mailer,
        signer: SessionSigner,
        config: AuthConfig,
    ) -> Result<Self, AuthError> {
        let hasher = PasswordHasher::new();
        let dummy_hash = hasher.hash_password(&uuid::Uuid::new_v4().to_string())?;

        Ok(Self {
            store,
            mailer,
            hasher,
            issuer: TokenIssuer::new(config.verification_token_ttl()),
            signer,
            config,
            dummy_hash,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Create an unverified account and queue its verification email.
    ///
    /// # Errors
    /// [`AuthError::DuplicateAccount`] if the email is taken,
    /// [`AuthError::InvalidInput`] for malformed input.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<Pending, AuthError> {
        if !valid_email(email) {
            return Err(AuthError::InvalidInput("Invalid email"));
        }
        if username.trim().is_empty() {
            return Err(AuthError::InvalidInput("Missing username"));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("Missing password"));
        }

        // Cheap pre-check; the unique constraint is still the source of truth.
        if self.store.find_by_email(email).await?.is_some() {
            debug!("account already exists");
            return Err(AuthError::DuplicateAccount);
        }

        let password_hash = self.hash_password(password).await?;
        let issued = self.issuer.issue(Utc::now())?;

        let account = self
            .store
            .create(NewAccount {
                email: email.to_string(),
                username: username.to_string(),
                password_hash,
                verification_token_hash: issued.token_hash.clone(),
                verification_token_expiry: issued.expires_at,
            })
            .await?;

        info!(account_id = %account.id, "account registered");

        // The account exists either way; a lost email is recovered by logging in.
        if let Err(err) = self.notify(&account, &issued) {
            error!(account_id = %account.id, error = ?err, "verification email not queued");
        }

        Ok(Pending {
            account_id: account.id,
            email: account.email,
        })
    }

    /// Consume a verification token and mark its account verified.
    ///
    /// # Errors
    /// [`AuthError::InvalidOrExpiredToken`] for unknown, expired or already used tokens.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<Account, AuthError> {
        let token = token.trim();
        if !token::well_formed(token) {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let token_hash = token::hash_token(token);
        match self
            .store
            .consume_verification_token(&token_hash, Utc::now())
            .await?
        {
            Some(account) => {
                info!(account_id = %account.id, "email verified");
                Ok(account)
            }
            None => Err(AuthError::InvalidOrExpiredToken),
        }
    }

    /// Check credentials and issue a session token for verified accounts.
    ///
    /// # Errors
    /// [`AuthError::InvalidCredentials`] for unknown emails and wrong passwords alike,
    /// [`AuthError::UnverifiedAccount`] when the password is right but the email is
    /// not verified yet; a new verification email is queued in that case.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let account = self.store.find_by_email(email).await?;

        let stored_hash = account
            .as_ref()
            .map_or_else(|| self.dummy_hash.clone(), |a| a.password_hash.clone());
        let password_ok = self.verify_password(password, stored_hash).await?;

        let Some(account) = account.filter(|_| password_ok) else {
            debug!("invalid credentials");
            return Err(AuthError::InvalidCredentials);
        };

        if !account.verified {
            self.reissue(&account).await?;
            return Err(AuthError::UnverifiedAccount);
        }

        let session = self.signer.sign(account.id, Utc::now())?;
        info!(account_id = %account.id, "login successful");
        Ok(session)
    }

    /// Resolve a session token to its (still verified) account.
    ///
    /// # Errors
    /// [`AuthError::InvalidSession`] for bad or expired tokens and missing accounts.
    pub async fn authenticate(&self, session_token: &str) -> Result<Account, AuthError> {
        let claims = self.signer.verify(session_token)?;
        let account_id = claims.account_id()?;

        match self.store.find_by_id(account_id).await? {
            Some(account) if account.verified => Ok(account),
            _ => Err(AuthError::InvalidSession),
        }
    }

    async fn reissue(&self, account: &Account) -> Result<(), AuthError> {
        let issued = self.issuer.issue(Utc::now())?;
        let replaced = self
            .store
            .reissue_verification_token(account.id, &issued.token_hash, issued.expires_at)
            .await?;

        if replaced {
            debug!(account_id = %account.id, "verification token reissued");
            if let Err(err) = self.notify(account, &issued) {
                error!(account_id = %account.id, error = ?err, "verification email not queued");
            }
        } else {
            // Verified concurrently; nothing to resend.
            warn!(account_id = %account.id, "verification token reissue skipped");
        }
        Ok(())
    }

    fn notify(&self, account: &Account, issued: &IssuedToken) -> Result<(), AuthError> {
        let message = VerificationEmail {
            to_email: account.email.clone(),
            username: account.username.clone(),
            verify_url: build_verify_url(self.config.verify_base_url(), &issued.token),
        };

        self.mailer
            .enqueue(message)
            .map_err(AuthError::DeliveryFailure)
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|e| AuthError::Internal(anyhow::Error::new(e)))?
    }

    async fn verify_password(&self, password: &str, stored_hash: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify_password(&password, &stored_hash))
            .await
            .map_err(|e| AuthError::Internal(anyhow::Error::new(e)))?
    }
}
