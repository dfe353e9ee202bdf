//! Client-side login rate limiting.
//!
//! Bounds attempts per client IP inside a sliding window. Deliberately
//! independent of the per-account lockout counter: the two protect against
//! different attackers and share no clock or state.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    /// Check and record one attempt for the given client address. Requests
    /// with no resolvable address are allowed; the account lockout still
    /// applies to them.
    fn check(&self, ip: Option<&str>) -> RateLimitDecision;
}

/// Disabled limiter for tests and trusted internal callers.
#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _ip: Option<&str>) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

/// In-process sliding window, per IP.
#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowRateLimiter {
    #[must_use]
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts: max_attempts as usize,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for SlidingWindowRateLimiter {
    fn check(&self, ip: Option<&str>) -> RateLimitDecision {
        let Some(ip) = ip else {
            return RateLimitDecision::Allowed;
        };
        let now = Instant::now();
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            // A poisoned map only ever under-counts; fail open rather than
            // turning a panic elsewhere into a denial of service.
            Err(poisoned) => poisoned.into_inner(),
        };

        // Drop entries that aged out everywhere, not just for this key, so
        // the map does not grow with one-shot clients.
        attempts.retain(|_, window| {
            window.retain(|at| now.duration_since(*at) < self.window);
            !window.is_empty()
        });

        let window = attempts.entry(ip.to_string()).or_default();
        if window.len() >= self.max_attempts {
            return RateLimitDecision::Limited;
        }
        window.push(now);
        RateLimitDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_always_allows() {
        let limiter = NoopRateLimiter;
        assert_eq!(limiter.check(Some("10.0.0.1")), RateLimitDecision::Allowed);
        assert_eq!(limiter.check(None), RateLimitDecision::Allowed);
    }

    #[test]
    fn limits_after_max_attempts() {
        let limiter = SlidingWindowRateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert_eq!(limiter.check(Some("10.0.0.1")), RateLimitDecision::Allowed);
        }
        assert_eq!(limiter.check(Some("10.0.0.1")), RateLimitDecision::Limited);
        // A different client is unaffected.
        assert_eq!(limiter.check(Some("10.0.0.2")), RateLimitDecision::Allowed);
    }

    #[test]
    fn window_expiry_readmits_client() {
        let limiter = SlidingWindowRateLimiter::new(1, Duration::from_millis(10));
        assert_eq!(limiter.check(Some("10.0.0.1")), RateLimitDecision::Allowed);
        assert_eq!(limiter.check(Some("10.0.0.1")), RateLimitDecision::Limited);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(limiter.check(Some("10.0.0.1")), RateLimitDecision::Allowed);
    }

    #[test]
    fn missing_ip_is_allowed() {
        let limiter = SlidingWindowRateLimiter::new(1, Duration::from_secs(60));
        assert_eq!(limiter.check(None), RateLimitDecision::Allowed);
        assert_eq!(limiter.check(None), RateLimitDecision::Allowed);
    }
}
