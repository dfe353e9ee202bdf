//! Request and response bodies for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::principal::{PrincipalKind, Role};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "maria@finca.co")]
    pub email: String,
    pub password: String,
}

/// Token pair returned by login and refresh. Expiry timestamps are RFC 3339.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub access_expires_at: String,
    pub refresh_expires_at: String,
    pub principal_id: Uuid,
    pub kind: PrincipalKind,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Current caller identity and session, for the whoami endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub principal_id: Uuid,
    pub kind: PrincipalKind,
    pub role: Role,
    pub email: Option<String>,
    pub session_id: Uuid,
    pub issued_at: String,
    pub expires_at: String,
    pub refresh_expires_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAdminRequest {
    #[schema(example = "ops@cafetal.app")]
    pub email: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub is_super_admin: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub is_super_admin: bool,
    pub is_active: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

/// Uniform error body for every auth failure.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
