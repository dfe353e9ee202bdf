//! Per-principal lockout policy.
//!
//! The policy is a pure function of the counter and `locked_until` fields on
//! the principal record; it keeps no state of its own. The store performs the
//! atomic increment, this module decides what the fields mean.

use chrono::{DateTime, Duration, Utc};

use super::error::AuthError;
use super::principal::Principal;

/// Lockout window parameters, read once from configuration.
#[derive(Clone, Copy, Debug)]
pub struct LockoutPolicy {
    threshold: u32,
    duration: Duration,
}

/// Observable lockout state for a principal at a point in time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LockoutState {
    Unlocked,
    Locked { until: DateTime<Utc> },
}

impl LockoutPolicy {
    #[must_use]
    pub fn new(threshold: u32, duration: Duration) -> Self {
        Self {
            threshold,
            duration,
        }
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Classify a principal's stored fields. An elapsed `locked_until` means
    /// unlocked; the stale field is cleared by the next counter update.
    #[must_use]
    pub fn state(&self, principal: &Principal, now: DateTime<Utc>) -> LockoutState {
        match principal.locked_until() {
            Some(until) if now < until => LockoutState::Locked { until },
            _ => LockoutState::Unlocked,
        }
    }

    /// Gate an authentication attempt. Must run before any password
    /// verification so a locked account fails fast without hashing.
    ///
    /// # Errors
    /// Returns `AccountLocked` while the window is still open.
    pub fn check(&self, principal: &Principal, now: DateTime<Utc>) -> Result<(), AuthError> {
        match self.state(principal, now) {
            LockoutState::Unlocked => Ok(()),
            LockoutState::Locked { until } => {
                let remaining = (until - now).num_seconds().max(0);
                Err(AuthError::AccountLocked {
                    retry_after_seconds: u64::try_from(remaining).ok(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::principal::{AdminPrincipal, Principal};
    use uuid::Uuid;

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(5, Duration::minutes(15))
    }

    fn admin_with(attempts: u32, locked_until: Option<DateTime<Utc>>) -> Principal {
        Principal::Admin(AdminPrincipal {
            id: Uuid::new_v4(),
            email: "admin@cafetal.app".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            display_name: "Admin".to_string(),
            is_super_admin: false,
            is_active: true,
            two_factor_secret: None,
            two_factor_enabled: false,
            failed_login_attempts: attempts,
            locked_until,
            last_login_at: None,
        })
    }

    #[test]
    fn below_threshold_is_unlocked() {
        let now = Utc::now();
        let principal = admin_with(4, None);
        assert_eq!(policy().state(&principal, now), LockoutState::Unlocked);
        assert!(policy().check(&principal, now).is_ok());
    }

    #[test]
    fn locked_until_in_future_rejects_before_verification() {
        let now = Utc::now();
        let until = now + Duration::minutes(15);
        let principal = admin_with(5, Some(until));

        // One second before expiry the account is still locked.
        let result = policy().check(&principal, until - Duration::seconds(1));
        match result {
            Err(AuthError::AccountLocked {
                retry_after_seconds,
            }) => assert_eq!(retry_after_seconds, Some(1)),
            other => panic!("expected AccountLocked, got {other:?}"),
        }
    }

    #[test]
    fn elapsed_window_unlocks() {
        let now = Utc::now();
        let until = now - Duration::seconds(1);
        let principal = admin_with(5, Some(until));
        assert_eq!(policy().state(&principal, now), LockoutState::Unlocked);
        assert!(policy().check(&principal, now).is_ok());
    }
}
