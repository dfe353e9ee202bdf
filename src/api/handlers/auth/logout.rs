//! Logout endpoint: revokes the session behind the presented access token.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use super::error::AuthError;
use super::login::client_info;
use super::middleware::error_response;
use super::service::AuthService;
use super::types::ErrorResponse;
use super::utils::extract_bearer_token;

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "No usable token", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return error_response(&AuthError::Unauthorized, false);
    };
    let client = client_info(&headers);
    match service.logout(token, &client).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err, false),
    }
}
