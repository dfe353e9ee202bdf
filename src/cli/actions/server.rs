use crate::api::{self, handlers::auth::AuthConfig, StoreBackend};
use crate::cli::commands::auth::Options;
use anyhow::Result;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub memory_store: bool,
    pub auth: Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = AuthConfig::new(args.auth.token_secret)
        .with_access_ttl_seconds(args.auth.access_ttl_seconds)
        .with_refresh_ttl_seconds(args.auth.refresh_ttl_seconds)
        .with_lockout_threshold(args.auth.lockout_threshold)
        .with_lockout_seconds(args.auth.lockout_seconds)
        .with_rate_limit_max_attempts(args.auth.rate_limit_max_attempts)
        .with_rate_limit_window_seconds(args.auth.rate_limit_window_seconds)
        .with_expose_lockout_seconds(args.auth.expose_lockout_seconds);

    let backend = match args.dsn {
        Some(dsn) => StoreBackend::Postgres { dsn },
        None => StoreBackend::Memory,
    };

    api::new(
        args.port,
        backend,
        &args.auth.frontend_base_url,
        auth_config,
    )
    .await
}
