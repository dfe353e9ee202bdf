//! Request-side authorization helpers shared by protected handlers.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use super::error::AuthError;
use super::principal::{PrincipalContext, Role};
use super::service::AuthService;
use super::types::ErrorResponse;
use super::utils::extract_bearer_token;

/// Map a service error to its HTTP response. Lockout detail is only included
/// when the deployment enabled disclosure.
pub(super) fn error_response(err: &AuthError, expose_lockout_seconds: bool) -> Response {
    if let AuthError::Unavailable(source) = err {
        tracing::error!(error = %source, "auth backend unavailable");
    }
    (
        err.status(),
        Json(ErrorResponse {
            error: err.public_message(expose_lockout_seconds),
        }),
    )
        .into_response()
}

/// Resolve the caller for a protected route, or produce the error response.
///
/// An absent or malformed Authorization header is `Unauthorized` before any
/// token verification runs.
pub(super) async fn require_auth(
    service: &AuthService,
    headers: &HeaderMap,
    required: &[Role],
) -> Result<PrincipalContext, Response> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(error_response(&AuthError::Unauthorized, false));
    };
    service
        .authorize(token, required)
        .await
        .map_err(|err| error_response(&err, false))
}

pub(super) fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
