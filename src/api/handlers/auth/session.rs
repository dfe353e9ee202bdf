//! Server-side session registry.
//!
//! Sessions back refresh tokens and make revocation possible independent of
//! token expiry. Rows are invalidated, never deleted synchronously; a
//! periodic sweep outside this layer purges dead rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::principal::PrincipalKind;
use super::store::StoreError;

/// One issued session. The id is an opaque identifier carried in token
/// claims, never the token itself.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub principal_kind: PrincipalKind,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub is_active: bool,
}

impl Session {
    /// Usable for access-token checks: active and inside the access window.
    #[must_use]
    pub fn access_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now <= self.expires_at
    }

    /// Usable for refresh: active and inside the refresh window.
    #[must_use]
    pub fn refresh_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now <= self.refresh_expires_at
    }
}

/// Fields for a freshly issued session.
#[derive(Clone, Debug)]
pub struct NewSession {
    pub principal_id: Uuid,
    pub principal_kind: PrincipalKind,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[async_trait]
pub trait SessionRegistry: Send + Sync {
    async fn create(&self, session: NewSession) -> Result<Session, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Session>, StoreError>;

    /// Idempotent: invalidating a missing or already-inactive session is a
    /// no-op, not an error.
    async fn invalidate(&self, id: Uuid) -> Result<(), StoreError>;

    /// Flip `is_active` to false only if it is currently true; returns
    /// whether this call made the transition. Refresh rotation uses this as
    /// its single-winner gate under concurrency.
    async fn invalidate_if_active(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Invalidate every active session for a principal, optionally sparing
    /// one (the session driving a password change). Returns how many were
    /// invalidated.
    async fn invalidate_all_for_principal(
        &self,
        principal_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(is_active: bool, now: DateTime<Utc>) -> Session {
        Session {
            id: Uuid::new_v4(),
            principal_id: Uuid::new_v4(),
            principal_kind: PrincipalKind::Grower,
            issued_at: now,
            expires_at: now + Duration::minutes(15),
            refresh_expires_at: now + Duration::days(7),
            ip_address: None,
            user_agent: None,
            is_active,
        }
    }

    #[test]
    fn windows_are_independent() {
        let now = Utc::now();
        let session = session(true, now);
        // Past the access window but inside the refresh window.
        let later = now + Duration::hours(1);
        assert!(!session.access_valid(later));
        assert!(session.refresh_valid(later));
        // Past both.
        let much_later = now + Duration::days(8);
        assert!(!session.refresh_valid(much_later));
    }

    #[test]
    fn inactive_session_is_never_valid() {
        let now = Utc::now();
        let session = session(false, now);
        assert!(!session.access_valid(now));
        assert!(!session.refresh_valid(now));
    }
}
