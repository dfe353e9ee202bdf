//! Error taxonomy for the authentication layer.
//!
//! Every failure a caller can observe is one of these variants. Handlers map
//! them to HTTP statuses; the login-path variants collapse into a single 401
//! body so unauthenticated callers cannot probe account state.

use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown email or wrong password. Returned uniformly for both so the
    /// response does not reveal whether the account exists.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The account is locked after repeated failures; the attempt was
    /// rejected before any password verification.
    #[error("account locked")]
    AccountLocked { retry_after_seconds: Option<u64> },
    /// Deactivated admin or non-active grower. Never authenticable,
    /// independent of lockout state.
    #[error("account inactive")]
    AccountInactive,
    /// Too many attempts from this client within the window.
    #[error("rate limited")]
    RateLimited,
    /// Malformed, expired, or badly signed token.
    #[error("invalid token")]
    InvalidToken,
    /// Structurally valid token, but the backing session is no longer active.
    #[error("session revoked")]
    SessionRevoked,
    /// No usable credentials were presented for a protected route.
    #[error("unauthorized")]
    Unauthorized,
    /// Authenticated, but the principal's role does not satisfy the route.
    #[error("forbidden")]
    Forbidden,
    /// Duplicate email or identification number on principal creation.
    #[error("principal already exists")]
    Conflict,
    /// Transient backing-store failure (timeout, connection loss). Retryable
    /// by the caller; never reported as a credential failure.
    #[error("store unavailable")]
    Unavailable(#[source] anyhow::Error),
}

impl AuthError {
    /// HTTP status for the boundary. Login-path failures share 401 on purpose.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials
            | Self::AccountLocked { .. }
            | Self::AccountInactive
            | Self::InvalidToken
            | Self::SessionRevoked
            | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Body text for unauthenticated callers. Locked and inactive accounts
    /// answer like a wrong password unless the deployment opted into
    /// disclosing lockout state.
    #[must_use]
    pub fn public_message(&self, expose_lockout_seconds: bool) -> String {
        match self {
            Self::AccountLocked {
                retry_after_seconds: Some(seconds),
            } if expose_lockout_seconds => {
                format!("Account locked, retry in {seconds}s")
            }
            Self::InvalidCredentials
            | Self::AccountLocked { .. }
            | Self::AccountInactive => "Invalid credentials".to_string(),
            Self::RateLimited => "Rate limited".to_string(),
            Self::InvalidToken | Self::SessionRevoked | Self::Unauthorized => {
                "Unauthorized".to_string()
            }
            Self::Forbidden => "Forbidden".to_string(),
            Self::Conflict => "Already exists".to_string(),
            Self::Unavailable(_) => "Service unavailable".to_string(),
        }
    }
}
