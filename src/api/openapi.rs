//! OpenAPI document for the auth service.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::handlers::{auth, health};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::login::login,
        auth::refresh::refresh,
        auth::logout::logout,
        auth::whoami::whoami,
        auth::passwords::change_password,
        auth::admins::create_admin,
        auth::admins::reset_password,
    ),
    components(schemas(
        health::Health,
        auth::types::LoginRequest,
        auth::types::TokenResponse,
        auth::types::RefreshRequest,
        auth::types::SessionResponse,
        auth::types::ChangePasswordRequest,
        auth::types::CreateAdminRequest,
        auth::types::AdminResponse,
        auth::types::ResetPasswordRequest,
        auth::types::ErrorResponse,
        auth::principal::PrincipalKind,
        auth::principal::Role,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login, refresh, logout, and session introspection"),
        (name = "admins", description = "Administrator provisioning (super admin only)"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_auth_path() {
        let doc = openapi();
        for path in [
            "/health",
            "/v1/auth/login",
            "/v1/auth/refresh",
            "/v1/auth/logout",
            "/v1/auth/session",
            "/v1/auth/password",
            "/v1/auth/admins",
            "/v1/auth/admins/{id}/reset-password",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing path: {path}");
        }
    }
}
