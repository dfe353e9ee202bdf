//! Refresh-token rotation endpoint.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use super::login::{client_info, token_response};
use super::middleware::{bad_request, error_response};
use super::service::AuthService;
use super::types::{ErrorResponse, RefreshRequest, TokenResponse};
use super::utils::reject_large_body;

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Invalid or spent refresh token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    if let Some(status) = reject_large_body(&headers) {
        return status.into_response();
    }
    let Some(Json(request)) = payload else {
        return bad_request("Missing payload");
    };
    if request.refresh_token.is_empty() {
        return bad_request("Missing refresh token");
    }

    let client = client_info(&headers);
    match service.refresh_session(&request.refresh_token, &client).await {
        Ok(outcome) => (StatusCode::OK, Json(token_response(outcome))).into_response(),
        Err(err) => error_response(&err, false),
    }
}
