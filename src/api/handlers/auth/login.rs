//! Login endpoint for both admins and growers.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use super::middleware::{bad_request, error_response};
use super::service::{AuthService, ClientInfo, LoginOutcome};
use super::types::{ErrorResponse, LoginRequest, TokenResponse};
use super::utils::{
    extract_client_ip, extract_user_agent, normalize_email, reject_large_body, valid_email,
};

pub(super) fn token_response(outcome: LoginOutcome) -> TokenResponse {
    TokenResponse {
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
        token_type: "Bearer",
        access_expires_at: outcome.tokens.access_expires_at.to_rfc3339(),
        refresh_expires_at: outcome.tokens.refresh_expires_at.to_rfc3339(),
        principal_id: outcome.principal_id,
        kind: outcome.kind,
        role: outcome.role,
    }
}

pub(super) fn client_info(headers: &HeaderMap) -> ClientInfo {
    ClientInfo {
        ip: extract_client_ip(headers),
        user_agent: extract_user_agent(headers),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    if let Some(status) = reject_large_body(&headers) {
        return status.into_response();
    }
    let Some(Json(request)) = payload else {
        return bad_request("Missing payload");
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return bad_request("Invalid email");
    }
    if request.password.is_empty() {
        return bad_request("Missing password");
    }

    let client = client_info(&headers);
    match service.authenticate(&email, &request.password, &client).await {
        Ok(outcome) => (StatusCode::OK, Json(token_response(outcome))).into_response(),
        Err(err) => error_response(&err, service.config().expose_lockout_seconds()),
    }
}
