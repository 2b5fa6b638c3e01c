use axum::http::StatusCode;
use thiserror::Error;

use crate::account::StoreError;

/// Outcomes of the account lifecycle that callers can act on.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User already exists")]
    DuplicateAccount,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Please verify your email first.")]
    UnverifiedAccount,
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("Unauthorized")]
    InvalidSession,
    #[error("email delivery failed")]
    DeliveryFailure(#[source] anyhow::Error),
    #[error("account store failure")]
    UnexpectedStoreFailure(#[source] anyhow::Error),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateAccount
            | Self::InvalidCredentials
            | Self::InvalidOrExpiredToken
            | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::UnverifiedAccount | Self::InvalidSession => StatusCode::UNAUTHORIZED,
            Self::DeliveryFailure(_) | Self::UnexpectedStoreFailure(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to clients; internal failures collapse to one string.
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "Server error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => Self::DuplicateAccount,
            StoreError::Backend(err) => Self::UnexpectedStoreFailure(err),
        }
    }
}
