//! End-to-end auth flow tests against the in-memory stores.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::Extension;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Duration, Utc};
use secrecy::SecretString;
use uuid::Uuid;

use super::error::AuthError;
use super::login::login;
use super::memory::{MemoryCredentialStore, MemorySessionRegistry};
use super::password::hash_password;
use super::principal::{
    AdminPrincipal, GrowerPrincipal, GrowerStatus, IdentificationType, PrincipalKind, Role,
};
use super::rate_limit::{NoopRateLimiter, RateLimiter, SlidingWindowRateLimiter};
use super::service::{AuthService, ClientInfo};
use super::state::AuthConfig;
use super::store::CredentialStore;
use super::types::LoginRequest;
use super::LogAuditSink;

const ADMIN_EMAIL: &str = "ops@cafetal.app";
const ADMIN_PASSWORD: &str = "correct horse battery";
const GROWER_EMAIL: &str = "maria@finca.co";
const GROWER_PASSWORD: &str = "cafe de altura 1800m";

struct Harness {
    service: Arc<AuthService>,
    store: Arc<MemoryCredentialStore>,
    admin_id: Uuid,
    grower_id: Uuid,
}

async fn harness() -> Result<Harness> {
    harness_with(AuthConfig::new(SecretString::from("test-secret")), Arc::new(NoopRateLimiter))
        .await
}

async fn harness_with(
    config: AuthConfig,
    rate_limiter: Arc<dyn RateLimiter>,
) -> Result<Harness> {
    let store = Arc::new(MemoryCredentialStore::new());
    let sessions = Arc::new(MemorySessionRegistry::new());
    let service = Arc::new(AuthService::new(
        config,
        store.clone(),
        sessions,
        rate_limiter,
        Arc::new(LogAuditSink),
    )?);

    let admin = service
        .create_admin(ADMIN_EMAIL, ADMIN_PASSWORD, "Operations", true)
        .await?;

    let grower_id = Uuid::new_v4();
    store
        .insert_grower(GrowerPrincipal {
            id: grower_id,
            identification_number: "1045678901".to_string(),
            identification_type: IdentificationType::Cc,
            email: Some(GROWER_EMAIL.to_string()),
            password_hash: Some(hash_password(GROWER_PASSWORD)?),
            status: GrowerStatus::Active,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
        })
        .await;

    Ok(Harness {
        service,
        store,
        admin_id: admin.id,
        grower_id,
    })
}

fn client() -> ClientInfo {
    ClientInfo {
        ip: Some("203.0.113.7".to_string()),
        user_agent: Some("cafetal-tests".to_string()),
    }
}

#[tokio::test]
async fn login_works_for_both_principal_kinds() -> Result<()> {
    let harness = harness().await?;

    let admin = harness
        .service
        .authenticate(ADMIN_EMAIL, ADMIN_PASSWORD, &client())
        .await?;
    assert_eq!(admin.kind, PrincipalKind::Admin);
    assert_eq!(admin.role, Role::SuperAdmin);

    let grower = harness
        .service
        .authenticate(GROWER_EMAIL, GROWER_PASSWORD, &client())
        .await?;
    assert_eq!(grower.kind, PrincipalKind::Grower);
    assert_eq!(grower.role, Role::CoffeeGrower);
    Ok(())
}

#[tokio::test]
async fn unknown_email_and_wrong_password_are_indistinguishable() -> Result<()> {
    let harness = harness().await?;

    let unknown = harness
        .service
        .authenticate("nobody@finca.co", "whatever", &client())
        .await;
    let wrong = harness
        .service
        .authenticate(ADMIN_EMAIL, "wrong password", &client())
        .await;

    assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
    Ok(())
}

#[tokio::test]
async fn fifth_failure_locks_and_correct_password_is_rejected() -> Result<()> {
    let harness = harness().await?;

    for _ in 0..4 {
        let result = harness
            .service
            .authenticate(ADMIN_EMAIL, "wrong password", &client())
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }
    // The failure that crosses the threshold reports the lock.
    let fifth = harness
        .service
        .authenticate(ADMIN_EMAIL, "wrong password", &client())
        .await;
    assert!(matches!(fifth, Err(AuthError::AccountLocked { .. })));

    // Even the right password is rejected while the window is open, before
    // any hash verification.
    let locked = harness
        .service
        .authenticate(ADMIN_EMAIL, ADMIN_PASSWORD, &client())
        .await;
    assert!(matches!(locked, Err(AuthError::AccountLocked { .. })));
    Ok(())
}

fn stale_locked_admin(id: Uuid, email: &str) -> Result<AdminPrincipal> {
    Ok(AdminPrincipal {
        id,
        email: email.to_string(),
        password_hash: hash_password(ADMIN_PASSWORD)?,
        display_name: "Stale Lock".to_string(),
        is_super_admin: false,
        is_active: true,
        two_factor_secret: None,
        two_factor_enabled: false,
        failed_login_attempts: 5,
        locked_until: Some(Utc::now() - Duration::seconds(1)),
        last_login_at: None,
    })
}

#[tokio::test]
async fn wrong_password_after_lock_expiry_restarts_the_counter() -> Result<()> {
    let harness = harness().await?;
    let id = Uuid::new_v4();
    harness
        .store
        .insert_admin(stale_locked_admin(id, "stale@cafetal.app")?)
        .await;

    // The lock window has elapsed, so this is an ordinary rejection and the
    // stale counter does not stack: it restarts at 1.
    let wrong = harness
        .service
        .authenticate("stale@cafetal.app", "wrong password", &client())
        .await;
    assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

    let principal = harness.store.find_by_id(id).await?.expect("admin exists");
    assert_eq!(principal.failed_login_attempts(), 1);
    assert!(principal.locked_until().is_none());
    Ok(())
}

#[tokio::test]
async fn correct_password_after_lock_expiry_logs_in_and_resets() -> Result<()> {
    let harness = harness().await?;
    let id = Uuid::new_v4();
    harness
        .store
        .insert_admin(stale_locked_admin(id, "stale@cafetal.app")?)
        .await;

    harness
        .service
        .authenticate("stale@cafetal.app", ADMIN_PASSWORD, &client())
        .await?;

    let principal = harness.store.find_by_id(id).await?.expect("admin exists");
    assert_eq!(principal.failed_login_attempts(), 0);
    assert!(principal.locked_until().is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_failures_never_lose_an_increment() -> Result<()> {
    let harness = harness().await?;

    let mut tasks = Vec::new();
    for _ in 0..6 {
        let service = harness.service.clone();
        tasks.push(tokio::spawn(async move {
            service
                .authenticate(GROWER_EMAIL, "wrong password", &client())
                .await
        }));
    }
    for task in tasks {
        assert!(task.await?.is_err());
    }

    let principal = harness
        .store
        .find_by_id(harness.grower_id)
        .await?
        .expect("grower exists");
    assert_eq!(principal.failed_login_attempts(), 6);
    assert!(principal.locked_until().is_some());
    Ok(())
}

#[tokio::test]
async fn client_rate_limit_fires_before_credential_checks() -> Result<()> {
    let limiter = Arc::new(SlidingWindowRateLimiter::new(
        2,
        std::time::Duration::from_secs(60),
    ));
    let harness = harness_with(
        AuthConfig::new(SecretString::from("test-secret")),
        limiter,
    )
    .await?;

    for _ in 0..2 {
        harness
            .service
            .authenticate(ADMIN_EMAIL, ADMIN_PASSWORD, &client())
            .await?;
    }
    let limited = harness
        .service
        .authenticate(ADMIN_EMAIL, ADMIN_PASSWORD, &client())
        .await;
    assert!(matches!(limited, Err(AuthError::RateLimited)));

    // Rate limiting is per client; the account itself is untouched.
    let other = ClientInfo {
        ip: Some("198.51.100.9".to_string()),
        user_agent: None,
    };
    assert!(harness
        .service
        .authenticate(ADMIN_EMAIL, ADMIN_PASSWORD, &other)
        .await
        .is_ok());
    Ok(())
}

#[tokio::test]
async fn expired_access_token_is_rejected() -> Result<()> {
    let config = AuthConfig::new(SecretString::from("test-secret"))
        .with_access_ttl_seconds(-5);
    let harness = harness_with(config, Arc::new(NoopRateLimiter)).await?;

    let outcome = harness
        .service
        .authenticate(ADMIN_EMAIL, ADMIN_PASSWORD, &client())
        .await?;
    let result = harness
        .service
        .authorize(&outcome.tokens.access_token, &[])
        .await;
    assert!(matches!(result, Err(AuthError::InvalidToken)));
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_and_spent_tokens_are_rejected() -> Result<()> {
    let harness = harness().await?;

    let first = harness
        .service
        .authenticate(GROWER_EMAIL, GROWER_PASSWORD, &client())
        .await?;
    let second = harness
        .service
        .refresh_session(&first.tokens.refresh_token, &client())
        .await?;
    assert_ne!(first.session_id, second.session_id);

    // The old pair is dead: its refresh token is spent and its access token
    // points at a revoked session.
    let reuse = harness
        .service
        .refresh_session(&first.tokens.refresh_token, &client())
        .await;
    assert!(matches!(reuse, Err(AuthError::SessionRevoked)));
    let stale = harness
        .service
        .authorize(&first.tokens.access_token, &[])
        .await;
    assert!(matches!(stale, Err(AuthError::SessionRevoked)));

    // The new pair works.
    assert!(harness
        .service
        .authorize(&second.tokens.access_token, &[])
        .await
        .is_ok());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_refresh_has_exactly_one_winner() -> Result<()> {
    let harness = harness().await?;
    let outcome = harness
        .service
        .authenticate(ADMIN_EMAIL, ADMIN_PASSWORD, &client())
        .await?;
    let refresh_token = outcome.tokens.refresh_token;

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let service = harness.service.clone();
        let token = refresh_token.clone();
        tasks.push(tokio::spawn(async move {
            service.refresh_session(&token, &client()).await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await?.is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    Ok(())
}

#[tokio::test]
async fn logout_revokes_the_session() -> Result<()> {
    let harness = harness().await?;
    let outcome = harness
        .service
        .authenticate(ADMIN_EMAIL, ADMIN_PASSWORD, &client())
        .await?;

    harness
        .service
        .logout(&outcome.tokens.access_token, &client())
        .await?;

    let access = harness
        .service
        .authorize(&outcome.tokens.access_token, &[])
        .await;
    assert!(matches!(access, Err(AuthError::SessionRevoked)));
    let refresh = harness
        .service
        .refresh_session(&outcome.tokens.refresh_token, &client())
        .await;
    assert!(matches!(refresh, Err(AuthError::SessionRevoked)));

    // Logging out again is a no-op, not an error.
    harness
        .service
        .logout(&outcome.tokens.access_token, &client())
        .await?;
    Ok(())
}

#[tokio::test]
async fn deactivation_invalidates_live_tokens() -> Result<()> {
    let harness = harness().await?;
    let outcome = harness
        .service
        .authenticate(GROWER_EMAIL, GROWER_PASSWORD, &client())
        .await?;
    assert!(harness
        .service
        .authorize(&outcome.tokens.access_token, &[])
        .await
        .is_ok());

    harness
        .store
        .set_grower_status(harness.grower_id, GrowerStatus::Suspended)
        .await?;

    let result = harness
        .service
        .authorize(&outcome.tokens.access_token, &[])
        .await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));

    let login = harness
        .service
        .authenticate(GROWER_EMAIL, GROWER_PASSWORD, &client())
        .await;
    assert!(matches!(login, Err(AuthError::AccountInactive)));
    Ok(())
}

#[tokio::test]
async fn role_checks_and_super_admin_bypass() -> Result<()> {
    let harness = harness().await?;

    // Seeded admin is a super admin: any required set passes.
    let su = harness
        .service
        .authenticate(ADMIN_EMAIL, ADMIN_PASSWORD, &client())
        .await?;
    assert!(harness
        .service
        .authorize(&su.tokens.access_token, &[Role::Moderator])
        .await
        .is_ok());

    // A grower hitting an admin-only requirement is forbidden, not
    // unauthorized.
    let grower = harness
        .service
        .authenticate(GROWER_EMAIL, GROWER_PASSWORD, &client())
        .await?;
    let result = harness
        .service
        .authorize(&grower.tokens.access_token, &[Role::Admin, Role::Moderator])
        .await;
    assert!(matches!(result, Err(AuthError::Forbidden)));

    // The same token still satisfies grower routes.
    assert!(harness
        .service
        .authorize(&grower.tokens.access_token, &[Role::CoffeeGrower])
        .await
        .is_ok());
    Ok(())
}

#[tokio::test]
async fn password_change_keeps_current_session_only() -> Result<()> {
    let harness = harness().await?;

    let first = harness
        .service
        .authenticate(ADMIN_EMAIL, ADMIN_PASSWORD, &client())
        .await?;
    let second = harness
        .service
        .authenticate(ADMIN_EMAIL, ADMIN_PASSWORD, &client())
        .await?;

    let context = harness
        .service
        .authorize(&second.tokens.access_token, &[])
        .await?;

    // Wrong current password is rejected and revokes nothing.
    let wrong = harness
        .service
        .change_password(&context, "not the password", "a fresh password")
        .await;
    assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
    assert!(harness
        .service
        .authorize(&first.tokens.access_token, &[])
        .await
        .is_ok());

    harness
        .service
        .change_password(&context, ADMIN_PASSWORD, "a fresh password")
        .await?;

    // The driving session survives, the other one dies.
    assert!(harness
        .service
        .authorize(&second.tokens.access_token, &[])
        .await
        .is_ok());
    let revoked = harness
        .service
        .authorize(&first.tokens.access_token, &[])
        .await;
    assert!(matches!(revoked, Err(AuthError::SessionRevoked)));

    // Only the new password logs in.
    assert!(harness
        .service
        .authenticate(ADMIN_EMAIL, ADMIN_PASSWORD, &client())
        .await
        .is_err());
    assert!(harness
        .service
        .authenticate(ADMIN_EMAIL, "a fresh password", &client())
        .await
        .is_ok());
    Ok(())
}

#[tokio::test]
async fn admin_reset_revokes_every_session() -> Result<()> {
    let harness = harness().await?;

    let session = harness
        .service
        .authenticate(GROWER_EMAIL, GROWER_PASSWORD, &client())
        .await?;
    harness
        .service
        .reset_password(harness.grower_id, "issued by support")
        .await?;

    let revoked = harness
        .service
        .authorize(&session.tokens.access_token, &[])
        .await;
    assert!(matches!(revoked, Err(AuthError::SessionRevoked)));
    assert!(harness
        .service
        .authenticate(GROWER_EMAIL, "issued by support", &client())
        .await
        .is_ok());
    Ok(())
}

#[tokio::test]
async fn duplicate_admin_email_conflicts() -> Result<()> {
    let harness = harness().await?;
    let result = harness
        .service
        .create_admin(ADMIN_EMAIL, "another password", "Duplicate", false)
        .await;
    assert!(matches!(result, Err(AuthError::Conflict)));
    Ok(())
}

#[tokio::test]
async fn login_handler_rejects_malformed_requests() -> Result<()> {
    let harness = harness().await?;

    let response = login(HeaderMap::new(), Extension(harness.service.clone()), None)
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = login(
        HeaderMap::new(),
        Extension(harness.service.clone()),
        Some(Json(LoginRequest {
            email: "not-an-email".to_string(),
            password: "whatever".to_string(),
        })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn login_handler_returns_uniform_unauthorized() -> Result<()> {
    let harness = harness().await?;
    let mut headers = HeaderMap::new();
    headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.7"));

    let response = login(
        headers,
        Extension(harness.service.clone()),
        Some(Json(LoginRequest {
            email: "nobody@finca.co".to_string(),
            password: "whatever".to_string(),
        })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = axum::body::to_bytes(response.into_body(), 1024).await?;
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&body)?["error"],
        "Invalid credentials"
    );
    Ok(())
}
