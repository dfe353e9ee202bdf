//! HTTP server assembly: router, middleware layers, and startup.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, Request};
use axum::routing::{get, options, post};
use axum::{Extension, Router};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::PropagateRequestIdLayer;
use tower_http::set_header::SetRequestHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;

use crate::api::handlers::{auth, health, root};

pub(crate) mod handlers;
mod openapi;

pub use openapi::openapi;

/// All documented routes plus the undocumented root.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/", get(root::root))
        .route("/health", get(health::health))
        .route("/v1/auth/login", post(auth::login::login))
        .route("/v1/auth/refresh", post(auth::refresh::refresh))
        .route("/v1/auth/logout", post(auth::logout::logout))
        .route("/v1/auth/session", get(auth::whoami::whoami))
        .route("/v1/auth/password", post(auth::passwords::change_password))
        .route("/v1/auth/admins", post(auth::admins::create_admin))
        .route(
            "/v1/auth/admins/:id/reset-password",
            post(auth::admins::reset_password),
        )
}

/// Backing stores selected at startup.
pub enum StoreBackend {
    /// Connect to Postgres with the given DSN.
    Postgres { dsn: String },
    /// Process-local stores; for development and tests only.
    Memory,
}

/// Start the server.
/// # Errors
/// Returns an error if the database, listener, or server fail.
pub async fn new(
    port: u16,
    backend: StoreBackend,
    frontend_base_url: &str,
    auth_config: auth::AuthConfig,
) -> Result<()> {
    let rate_limiter = Arc::new(auth::SlidingWindowRateLimiter::new(
        auth_config.rate_limit_max_attempts(),
        auth_config.rate_limit_window(),
    ));
    let audit = Arc::new(auth::LogAuditSink);

    let (service, pool) = match backend {
        StoreBackend::Postgres { dsn } => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(&dsn)
                .await
                .context("Failed to connect to database")?;
            let service = auth::AuthService::new(
                auth_config,
                Arc::new(auth::PgCredentialStore::new(pool.clone())),
                Arc::new(auth::PgSessionRegistry::new(pool.clone())),
                rate_limiter,
                audit,
            )?;
            (service, Some(pool))
        }
        StoreBackend::Memory => {
            info!("Using in-memory stores; state is lost on restart");
            let service = auth::AuthService::new(
                auth_config,
                Arc::new(auth::MemoryCredentialStore::new()),
                Arc::new(auth::MemorySessionRegistry::new()),
                rate_limiter,
                audit,
            )?;
            (service, None)
        }
    };
    let service = Arc::new(service);

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin(frontend_base_url)?))
        .allow_credentials(true);

    let mut app = router()
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(service)),
        );
    if let Some(pool) = pool {
        app = app.layer(Extension(pool));
    }

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::frontend_origin;

    #[test]
    fn frontend_origin_strips_path() {
        let origin = frontend_origin("https://app.cafetal.co/login").unwrap();
        assert_eq!(origin, "https://app.cafetal.co");
    }

    #[test]
    fn frontend_origin_keeps_explicit_port() {
        let origin = frontend_origin("http://localhost:5173").unwrap();
        assert_eq!(origin, "http://localhost:5173");
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
    }
}
