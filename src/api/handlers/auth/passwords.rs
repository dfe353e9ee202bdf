//! Password management endpoints.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use super::middleware::{bad_request, error_response, require_auth};
use super::service::AuthService;
use super::types::{ChangePasswordRequest, ErrorResponse};
use super::utils::reject_large_body;

pub(super) const MIN_PASSWORD_LEN: usize = 8;
pub(super) const MAX_PASSWORD_LEN: usize = 512;

pub(super) fn valid_new_password(password: &str) -> bool {
    (MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password.len())
}

#[utoipa::path(
    post,
    path = "/v1/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed, other sessions revoked"),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Wrong current password", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn change_password(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> impl IntoResponse {
    if let Some(status) = reject_large_body(&headers) {
        return status.into_response();
    }
    let context = match require_auth(&service, &headers, &[]).await {
        Ok(context) => context,
        Err(response) => return response,
    };
    let Some(Json(request)) = payload else {
        return bad_request("Missing payload");
    };
    if !valid_new_password(&request.new_password) {
        return bad_request("Password must be 8 to 512 characters");
    }

    match service
        .change_password(&context, &request.current_password, &request.new_password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err, false),
    }
}
