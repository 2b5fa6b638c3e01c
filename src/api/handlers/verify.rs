use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use crate::auth::{AuthError, AuthService};

/// Consume the emailed token and mark the account verified.
///
/// Plain-text responses: the link is opened straight from the email client.
#[utoipa::path(
    get,
    path= "/api/auth/verify/{token}",
    params(
        ("token" = String, Path, description = "Verification token from the emailed link")
    ),
    responses (
        (status = 200, description = "Email verified", body = String, content_type = "text/plain"),
        (status = 400, description = "Unknown, expired or already used token", body = String, content_type = "text/plain"),
    ),
    tag= "auth"
)]
pub async fn verify(
    auth: Extension<Arc<AuthService>>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    match auth.verify(&token).await {
        Ok(_) => (StatusCode::OK, "Email verified successfully!".to_string()),
        Err(err @ AuthError::InvalidOrExpiredToken) => (err.status(), err.to_string()),
        Err(err) => {
            error!(error = ?err, "verification failed");
            (err.status(), err.public_message())
        }
    }
}
