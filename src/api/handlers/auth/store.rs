//! Credential store boundary.
//!
//! The store owns principal records exclusively; all mutation goes through
//! these operations so no caller ever does read-modify-write on lockout
//! counters. Timeouts surface as `Unavailable`, never as a missing principal,
//! so an outage cannot masquerade as a credential failure.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::error::AuthError;
use super::principal::{AdminPrincipal, GrowerStatus, Principal};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unique constraint violation (email or identification number).
    #[error("duplicate principal")]
    Conflict,
    #[error("principal not found")]
    NotFound,
    /// Transient failure: timeout, lost connection, poisoned pool.
    #[error("store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => Self::Conflict,
            // A principal that vanished mid-flight reads as bad credentials
            // at the auth surface; callers that need NotFound check first.
            StoreError::NotFound => Self::InvalidCredentials,
            StoreError::Unavailable(source) => Self::Unavailable(source),
        }
    }
}

/// Fields for a new administrator; the caller hashes the password first.
#[derive(Clone, Debug)]
pub struct NewAdmin {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub is_super_admin: bool,
}

/// Result of one atomic failed-attempt update.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FailedAttempt {
    pub attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up any principal by normalized email. Admins shadow growers on
    /// the rare shared address; the stores are independent namespaces.
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError>;

    /// # Errors
    /// `Conflict` when the email already exists.
    async fn create_admin(&self, admin: NewAdmin) -> Result<AdminPrincipal, StoreError>;

    /// Replace the stored hash and clear lockout state. Every password-reset
    /// path goes through here so a reset always unlocks the account.
    async fn update_password(&self, id: Uuid, new_hash: &str) -> Result<(), StoreError>;

    /// Atomically increment the failure counter and, when it crosses
    /// `threshold`, set `locked_until = now + lockout`. Single conditional
    /// update: two concurrent failures must not both observe a sub-threshold
    /// count.
    async fn record_failed_attempt(
        &self,
        id: Uuid,
        threshold: u32,
        lockout: Duration,
    ) -> Result<FailedAttempt, StoreError>;

    /// Reset the counter and `locked_until`, stamp `last_login_at`.
    async fn record_success(&self, id: Uuid) -> Result<(), StoreError>;

    async fn set_admin_active(&self, id: Uuid, active: bool) -> Result<(), StoreError>;

    async fn set_grower_status(&self, id: Uuid, status: GrowerStatus) -> Result<(), StoreError>;
}
