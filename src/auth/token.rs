//! Single-use verification tokens for email links.

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use super::AuthError;

const TOKEN_BYTES: usize = 32;

/// Hex length of a raw verification token.
pub const TOKEN_LEN: usize = TOKEN_BYTES * 2;

/// A freshly issued token. `token` goes into the email, `token_hash` into the store.
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"***")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TokenIssuer {
    ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Issue a token valid until `now + ttl`.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails or the expiry is not
    /// representable.
    pub fn issue(&self, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            AuthError::Internal(anyhow::anyhow!("verification token expiry out of range"))
        })?;

        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
            AuthError::Internal(anyhow::Error::new(e).context("failed to generate verification token"))
        })?;

        let token = hex::encode(bytes);
        let token_hash = hash_token(&token);

        Ok(IssuedToken {
            token,
            token_hash,
            expires_at,
        })
    }
}

/// Digest stored in place of the raw token.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Shape check before touching the store.
#[must_use]
pub fn well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}
