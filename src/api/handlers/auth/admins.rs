//! Administrator provisioning endpoints. Super-admin only.

use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use super::middleware::{bad_request, error_response, require_auth};
use super::principal::Role;
use super::service::AuthService;
use super::types::{AdminResponse, CreateAdminRequest, ErrorResponse, ResetPasswordRequest};
use super::utils::{normalize_email, reject_large_body, valid_email};

// Only the super-admin role qualifies; the bypass in role checks makes
// listing it here equivalent to requiring it explicitly.
const REQUIRED: &[Role] = &[Role::SuperAdmin];

#[utoipa::path(
    post,
    path = "/v1/auth/admins",
    request_body = CreateAdminRequest,
    responses(
        (status = 201, description = "Administrator created", body = AdminResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 403, description = "Caller is not a super admin", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "admins"
)]
pub async fn create_admin(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<CreateAdminRequest>>,
) -> impl IntoResponse {
    if let Some(status) = reject_large_body(&headers) {
        return status.into_response();
    }
    if let Err(response) = require_auth(&service, &headers, REQUIRED).await {
        return response;
    }
    let Some(Json(request)) = payload else {
        return bad_request("Missing payload");
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return bad_request("Invalid email");
    }
    if !super::passwords::valid_new_password(&request.password) {
        return bad_request("Password must be 8 to 512 characters");
    }
    if request.display_name.trim().is_empty() {
        return bad_request("Missing display name");
    }

    match service
        .create_admin(
            &email,
            &request.password,
            request.display_name.trim(),
            request.is_super_admin,
        )
        .await
    {
        Ok(admin) => (
            StatusCode::CREATED,
            Json(AdminResponse {
                id: admin.id,
                email: admin.email,
                display_name: admin.display_name,
                is_super_admin: admin.is_super_admin,
                is_active: admin.is_active,
            }),
        )
            .into_response(),
        Err(err) => error_response(&err, false),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/admins/{id}/reset-password",
    request_body = ResetPasswordRequest,
    params(("id" = Uuid, Path, description = "Principal to reset")),
    responses(
        (status = 204, description = "Password reset, all sessions revoked"),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Target principal not found", body = ErrorResponse),
        (status = 403, description = "Caller is not a super admin", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "admins"
)]
pub async fn reset_password(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    if let Some(status) = reject_large_body(&headers) {
        return status.into_response();
    }
    if let Err(response) = require_auth(&service, &headers, REQUIRED).await {
        return response;
    }
    let Some(Json(request)) = payload else {
        return bad_request("Missing payload");
    };
    if !super::passwords::valid_new_password(&request.new_password) {
        return bad_request("Password must be 8 to 512 characters");
    }

    match service.reset_password(id, &request.new_password).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err, false),
    }
}
