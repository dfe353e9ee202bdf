//! Auth configuration, built once at startup.
//!
//! All policy knobs (token TTLs, lockout window, rate limits, signing secret)
//! live here and are passed by reference into the components that need them.
//! Nothing in the auth layer reads ambient or static configuration.

use chrono::Duration;
use secrecy::SecretString;

use super::lockout::LockoutPolicy;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;
const DEFAULT_LOCKOUT_SECONDS: i64 = 15 * 60;
const DEFAULT_RATE_LIMIT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_secret: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    lockout_threshold: u32,
    lockout_seconds: i64,
    rate_limit_max_attempts: u32,
    rate_limit_window_seconds: u64,
    expose_lockout_seconds: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(token_secret: SecretString) -> Self {
        Self {
            token_secret,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            lockout_threshold: DEFAULT_LOCKOUT_THRESHOLD,
            lockout_seconds: DEFAULT_LOCKOUT_SECONDS,
            rate_limit_max_attempts: DEFAULT_RATE_LIMIT_MAX_ATTEMPTS,
            rate_limit_window_seconds: DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
            expose_lockout_seconds: false,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_lockout_threshold(mut self, threshold: u32) -> Self {
        self.lockout_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_lockout_seconds(mut self, seconds: i64) -> Self {
        self.lockout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_rate_limit_max_attempts(mut self, attempts: u32) -> Self {
        self.rate_limit_max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_rate_limit_window_seconds(mut self, seconds: u64) -> Self {
        self.rate_limit_window_seconds = seconds;
        self
    }

    /// Opt into disclosing remaining lockout seconds to callers. Off by
    /// default: it is an information-disclosure tradeoff per deployment.
    #[must_use]
    pub fn with_expose_lockout_seconds(mut self, expose: bool) -> Self {
        self.expose_lockout_seconds = expose;
        self
    }

    #[must_use]
    pub fn token_secret(&self) -> &SecretString {
        &self.token_secret
    }

    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        Duration::seconds(self.access_ttl_seconds)
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        Duration::seconds(self.refresh_ttl_seconds)
    }

    #[must_use]
    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy::new(
            self.lockout_threshold,
            Duration::seconds(self.lockout_seconds),
        )
    }

    #[must_use]
    pub fn rate_limit_max_attempts(&self) -> u32 {
        self.rate_limit_max_attempts
    }

    #[must_use]
    pub fn rate_limit_window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.rate_limit_window_seconds)
    }

    #[must_use]
    pub fn expose_lockout_seconds(&self) -> bool {
        self.expose_lockout_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let config = AuthConfig::new(SecretString::from("secret"));
        assert_eq!(config.access_ttl(), Duration::minutes(15));
        assert_eq!(config.refresh_ttl(), Duration::days(7));
        assert_eq!(config.lockout_policy().threshold(), 5);
        assert_eq!(config.lockout_policy().duration(), Duration::minutes(15));
        assert_eq!(config.rate_limit_max_attempts(), 10);
        assert!(!config.expose_lockout_seconds());

        let config = config
            .with_access_ttl_seconds(60)
            .with_refresh_ttl_seconds(3600)
            .with_lockout_threshold(3)
            .with_lockout_seconds(120)
            .with_rate_limit_max_attempts(2)
            .with_rate_limit_window_seconds(10)
            .with_expose_lockout_seconds(true);

        assert_eq!(config.access_ttl(), Duration::minutes(1));
        assert_eq!(config.refresh_ttl(), Duration::hours(1));
        assert_eq!(config.lockout_policy().threshold(), 3);
        assert_eq!(config.rate_limit_window().as_secs(), 10);
        assert!(config.expose_lockout_seconds());
    }
}
