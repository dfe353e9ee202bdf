//! Current-session introspection endpoint.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use super::middleware::{error_response, require_auth};
use super::service::AuthService;
use super::types::{ErrorResponse, SessionResponse};

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Current principal and session", body = SessionResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn whoami(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
) -> impl IntoResponse {
    let context = match require_auth(&service, &headers, &[]).await {
        Ok(context) => context,
        Err(response) => return response,
    };
    let session = match service.session_for(&context).await {
        Ok(session) => session,
        Err(err) => return error_response(&err, false),
    };

    (
        StatusCode::OK,
        Json(SessionResponse {
            principal_id: context.principal_id,
            kind: context.kind,
            role: context.role,
            email: context.email,
            session_id: session.id,
            issued_at: session.issued_at.to_rfc3339(),
            expires_at: session.expires_at.to_rfc3339(),
            refresh_expires_at: session.refresh_expires_at.to_rfc3339(),
        }),
    )
        .into_response()
}
