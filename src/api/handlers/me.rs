//! Current account, resolved from the bearer session token.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::{bearer_token, error_response, types::ErrorResponse, types::MeResponse};
use crate::auth::{AuthError, AuthService};

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Return the authenticated account.", body = MeResponse),
        (status = 401, description = "Missing, invalid or expired session token.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(headers: HeaderMap, auth: Extension<Arc<AuthService>>) -> impl IntoResponse {
    let Some(token) = bearer_token(&headers) else {
        return error_response(&AuthError::InvalidSession);
    };

    match auth.authenticate(token).await {
        Ok(account) => (
            StatusCode::OK,
            Json(MeResponse {
                id: account.id.to_string(),
                email: account.email,
                username: account.username,
            }),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}
