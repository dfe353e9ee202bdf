//! Auth policy arguments: token secret, TTLs, lockout, and rate limits.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use secrecy::SecretString;

pub const ARG_TOKEN_SECRET: &str = "token-secret";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long("token-secret")
                .help("Symmetric secret used to sign access and refresh tokens")
                .env("CAFETAL_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("access-ttl-seconds")
                .long("access-ttl-seconds")
                .help("Access token lifetime in seconds")
                .env("CAFETAL_ACCESS_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-ttl-seconds")
                .long("refresh-ttl-seconds")
                .help("Refresh token lifetime in seconds")
                .env("CAFETAL_REFRESH_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("lockout-threshold")
                .long("lockout-threshold")
                .help("Consecutive failures before an account locks")
                .env("CAFETAL_LOCKOUT_THRESHOLD")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("lockout-seconds")
                .long("lockout-seconds")
                .help("Lockout window in seconds")
                .env("CAFETAL_LOCKOUT_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("rate-limit-max-attempts")
                .long("rate-limit-max-attempts")
                .help("Login attempts allowed per client IP per window")
                .env("CAFETAL_RATE_LIMIT_MAX_ATTEMPTS")
                .default_value("10")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("rate-limit-window-seconds")
                .long("rate-limit-window-seconds")
                .help("Rate limit window in seconds")
                .env("CAFETAL_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("expose-lockout-seconds")
                .long("expose-lockout-seconds")
                .help("Include remaining lockout seconds in 401 responses")
                .env("CAFETAL_EXPOSE_LOCKOUT_SECONDS")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL, used as the allowed CORS origin")
                .env("CAFETAL_FRONTEND_BASE_URL")
                .default_value("https://app.cafetal.co"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub token_secret: SecretString,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub lockout_threshold: u32,
    pub lockout_seconds: i64,
    pub rate_limit_max_attempts: u32,
    pub rate_limit_window_seconds: u64,
    pub expose_lockout_seconds: bool,
    pub frontend_base_url: String,
}

impl Options {
    /// # Errors
    /// Returns an error when a defaulted argument is somehow absent.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let token_secret = matches
            .get_one::<String>(ARG_TOKEN_SECRET)
            .cloned()
            .context("missing required argument: --token-secret")?;
        Ok(Self {
            token_secret: SecretString::from(token_secret),
            access_ttl_seconds: matches
                .get_one::<i64>("access-ttl-seconds")
                .copied()
                .context("missing --access-ttl-seconds")?,
            refresh_ttl_seconds: matches
                .get_one::<i64>("refresh-ttl-seconds")
                .copied()
                .context("missing --refresh-ttl-seconds")?,
            lockout_threshold: matches
                .get_one::<u32>("lockout-threshold")
                .copied()
                .context("missing --lockout-threshold")?,
            lockout_seconds: matches
                .get_one::<i64>("lockout-seconds")
                .copied()
                .context("missing --lockout-seconds")?,
            rate_limit_max_attempts: matches
                .get_one::<u32>("rate-limit-max-attempts")
                .copied()
                .context("missing --rate-limit-max-attempts")?,
            rate_limit_window_seconds: matches
                .get_one::<u64>("rate-limit-window-seconds")
                .copied()
                .context("missing --rate-limit-window-seconds")?,
            expose_lockout_seconds: matches.get_flag("expose-lockout-seconds"),
            frontend_base_url: matches
                .get_one::<String>("frontend-base-url")
                .cloned()
                .context("missing --frontend-base-url")?,
        })
    }
}
