use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::instrument;

use super::{
    error_response, missing_payload,
    types::{ErrorResponse, LoginRequest, TokenResponse},
};
use crate::auth::AuthService;

#[utoipa::path(
    post,
    path= "/api/auth/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Session token issued", body = TokenResponse, content_type = "application/json"),
        (status = 400, description = "Invalid credentials", body = ErrorResponse),
        (status = 401, description = "Email not verified; a new verification email was sent", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    auth: Extension<Arc<AuthService>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    match auth.login(&request.email, &request.password).await {
        Ok(token) => (StatusCode::OK, Json(TokenResponse { token })).into_response(),
        Err(err) => error_response(&err),
    }
}
