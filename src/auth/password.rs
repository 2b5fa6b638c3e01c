//! Password hashing and verification using Argon2id.

use argon2::password_hash::{rand_core::OsRng, Error as ArgonError, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier};
use tracing::{debug, error, warn};

use super::AuthError;

/// Argon2id hasher with the crate's default (OWASP recommended) parameters.
///
/// Hashes are PHC strings carrying algorithm, parameters and salt, so they can
/// be stored as-is.
#[derive(Clone, Debug, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a password with a fresh random salt.
    ///
    /// # Errors
    /// [`AuthError::Internal`] if hashing fails.
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!(error = %e, "password hashing operation failed");
                AuthError::Internal(anyhow::anyhow!("password hashing failed: {e}"))
            })
    }

    /// Check `password` against a stored PHC hash.
    ///
    /// Returns `Ok(false)` on mismatch; the comparison is constant time.
    ///
    /// # Errors
    /// [`AuthError::Internal`] if the stored hash cannot be parsed.
    pub fn verify_password(&self, password: &str, stored_hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| {
            warn!(error = %e, "invalid password hash format");
            AuthError::Internal(anyhow::anyhow!("invalid stored password hash: {e}"))
        })?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(ArgonError::Password) => {
                debug!("password verification failed");
                Ok(false)
            }
            Err(e) => {
                error!(error = %e, "password verification errored");
                Err(AuthError::Internal(anyhow::anyhow!(
                    "password verification failed: {e}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() -> Result<(), AuthError> {
        let hasher = PasswordHasher::new();
        let hash = hasher.hash_password("Secret1!")?;
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify_password("Secret1!", &hash)?);
        assert!(!hasher.verify_password("secret1!", &hash)?);
        Ok(())
    }

    #[test]
    fn same_password_gets_different_salts() -> Result<(), AuthError> {
        let hasher = PasswordHasher::new();
        let first = hasher.hash_password("Secret1!")?;
        let second = hasher.hash_password("Secret1!")?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn garbage_hash_is_an_internal_error() {
        let hasher = PasswordHasher::new();
        assert!(matches!(
            hasher.verify_password("Secret1!", "not-a-phc-string"),
            Err(AuthError::Internal(_))
        ));
    }
}
