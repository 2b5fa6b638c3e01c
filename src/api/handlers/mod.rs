//! Route handlers and the helpers they share for turning [`AuthError`]s into
//! HTTP responses.

pub mod health;
pub mod login;
pub mod me;
pub mod register;
pub mod root;
pub mod types;
pub mod verify;

use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::auth::AuthError;
use types::ErrorResponse;

pub(crate) fn missing_payload() -> Response {
    (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response()
}

/// JSON `{message}` body with the error's status. Server errors are logged
/// with their full cause chain and reach the client as "Server error".
pub(crate) fn error_response(err: &AuthError) -> Response {
    let status = err.status();
    if status.is_server_error() {
        error!(error = ?err, "request failed");
    }
    (
        status,
        Json(ErrorResponse {
            message: err.public_message(),
            error: None,
        }),
    )
        .into_response()
}

/// Token from an `Authorization: Bearer <token>` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
