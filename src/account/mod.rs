//! Credential store: one account record per email.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;

/// Stored identity and credential record.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub verified: bool,
    pub verification_token_hash: Option<String>,
    pub verification_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Flip to verified and drop any pending token.
    pub fn mark_verified(&mut self, now: DateTime<Utc>) {
        self.verified = true;
        self.verification_token_hash = None;
        self.verification_token_expiry = None;
        self.updated_at = now;
    }

    /// Replace the pending token. Returns `false` if the account is already verified.
    pub fn replace_verification_token(
        &mut self,
        token_hash: String,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.verified {
            return false;
        }
        self.verification_token_hash = Some(token_hash);
        self.verification_token_expiry = Some(expiry);
        self.updated_at = now;
        true
    }

    /// True while a token with this digest is pending and unexpired.
    #[must_use]
    pub fn token_matches(&self, token_hash: &str, now: DateTime<Utc>) -> bool {
        match (
            self.verification_token_hash.as_deref(),
            self.verification_token_expiry,
        ) {
            (Some(stored), Some(expiry)) => stored == token_hash && expiry > now,
            _ => false,
        }
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password_hash", &"***")
            .field("verified", &self.verified)
            .field(
                "verification_token_hash",
                &self.verification_token_hash.as_ref().map(|_| "***"),
            )
            .field("verification_token_expiry", &self.verification_token_expiry)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Fields needed to create an unverified account.
#[derive(Clone)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub verification_token_hash: String,
    pub verification_token_expiry: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("an account with this email already exists")]
    Duplicate,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>>;

    /// Insert a new unverified account.
    ///
    /// # Errors
    /// [`StoreError::Duplicate`] when the email is already registered.
    async fn create(&self, account: NewAccount) -> StoreResult<Account>;

    /// Persist in-place mutations of an existing account.
    async fn save(&self, account: &Account) -> StoreResult<()>;

    /// Atomically verify the account holding `token_hash` if the token is
    /// still unexpired at `now`, clearing the token in the same write.
    ///
    /// Returns `None` when no pending, unexpired token matches.
    async fn consume_verification_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Account>>;

    /// Atomically overwrite the pending token of an unverified account.
    ///
    /// Returns `false` when the account is missing or already verified.
    async fn reissue_verification_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expiry: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;
}
