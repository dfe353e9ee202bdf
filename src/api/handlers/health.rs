//! Health endpoint.
//!
//! When running against Postgres the database is pinged; in memory-store mode
//! there is no external dependency and the service reports itself healthy.

use axum::extract::Extension;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool};
use tracing::{error, info_span, Instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database are healthy", body = Health),
        (status = 503, description = "Database is unhealthy", body = Health)
    ),
    tag = "health"
)]
pub async fn health(method: Method, pool: Option<Extension<PgPool>>) -> impl IntoResponse {
    let database = match pool {
        Some(Extension(pool)) => ping_database(&pool).await,
        None => DatabaseStatus::NotConfigured,
    };

    let status = if database.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let health = Health {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.as_str().to_string(),
    };

    // HEAD and OPTIONS callers only need the status code.
    if method == Method::GET {
        (status, Json(health)).into_response()
    } else {
        status.into_response()
    }
}

#[derive(Clone, Copy, Debug)]
enum DatabaseStatus {
    Ok,
    Error,
    NotConfigured,
}

impl DatabaseStatus {
    fn is_healthy(self) -> bool {
        !matches!(self, Self::Error)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::NotConfigured => "memory",
        }
    }
}

async fn ping_database(pool: &PgPool) -> DatabaseStatus {
    let acquire_span = info_span!(
        "db.acquire",
        db.system = "postgresql",
        db.operation = "ACQUIRE"
    );
    match pool.acquire().instrument(acquire_span).await {
        Ok(mut conn) => {
            let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
            match conn.ping().instrument(ping_span).await {
                Ok(()) => DatabaseStatus::Ok,
                Err(error) => {
                    error!("Failed to ping database: {}", error);
                    DatabaseStatus::Error
                }
            }
        }
        Err(error) => {
            error!("Failed to acquire database connection: {}", error);
            DatabaseStatus::Error
        }
    }
}
