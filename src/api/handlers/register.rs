use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{debug, error, instrument};

use super::{
    error_response, missing_payload,
    types::{ErrorResponse, MessageResponse, RegisterRequest},
};
use crate::auth::AuthService;

#[utoipa::path(
    post,
    path= "/api/auth/register",
    request_body = RegisterRequest,
    responses (
        (status = 201, description = "Account created, verification email queued", body = MessageResponse, content_type = "application/json"),
        (status = 400, description = "Email already registered or invalid input", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    auth: Extension<Arc<AuthService>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    debug!("register: {:?}", request);

    match auth
        .register(&request.email, &request.username, &request.password)
        .await
    {
        Ok(_) => (
            StatusCode::CREATED,
            Json(MessageResponse {
                message: "User registered. Please check your email to verify your account."
                    .to_string(),
            }),
        )
            .into_response(),
        Err(err) if err.status().is_server_error() => {
            error!(error = ?err, "registration failed");
            (
                err.status(),
                Json(ErrorResponse {
                    message: err.public_message(),
                    error: Some("Registration failed".to_string()),
                }),
            )
                .into_response()
        }
        Err(err) => error_response(&err),
    }
}
