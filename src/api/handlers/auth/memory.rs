//! In-memory credential store and session registry.
//!
//! Backs the test suite and the `--memory-store` development mode. One mutex
//! per store makes every operation atomic, including the
//! increment-and-maybe-lock update the lockout policy depends on.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::principal::{AdminPrincipal, GrowerPrincipal, GrowerStatus, Principal};
use super::session::{NewSession, Session, SessionRegistry};
use super::store::{CredentialStore, FailedAttempt, NewAdmin, StoreError};

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    principals: Mutex<HashMap<Uuid, Principal>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a grower record (growers are provisioned by the farm-management
    /// side, not through this layer).
    pub async fn insert_grower(&self, grower: GrowerPrincipal) {
        self.principals
            .lock()
            .await
            .insert(grower.id, Principal::Grower(grower));
    }

    /// Seed an admin record directly, bypassing uniqueness checks. Test use.
    pub async fn insert_admin(&self, admin: AdminPrincipal) {
        self.principals
            .lock()
            .await
            .insert(admin.id, Principal::Admin(admin));
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        let principals = self.principals.lock().await;
        // Admins first, growers second; two independent namespaces.
        let admin = principals.values().find(
            |principal| matches!(principal, Principal::Admin(_)) && principal.email() == Some(email),
        );
        if let Some(found) = admin {
            return Ok(Some(found.clone()));
        }
        Ok(principals
            .values()
            .find(|principal| {
                matches!(principal, Principal::Grower(_)) && principal.email() == Some(email)
            })
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        Ok(self.principals.lock().await.get(&id).cloned())
    }

    async fn create_admin(&self, admin: NewAdmin) -> Result<AdminPrincipal, StoreError> {
        let mut principals = self.principals.lock().await;
        let duplicate = principals.values().any(|principal| {
            matches!(principal, Principal::Admin(_))
                && principal.email() == Some(admin.email.as_str())
        });
        if duplicate {
            return Err(StoreError::Conflict);
        }
        let record = AdminPrincipal {
            id: Uuid::new_v4(),
            email: admin.email,
            password_hash: admin.password_hash,
            display_name: admin.display_name,
            is_super_admin: admin.is_super_admin,
            is_active: true,
            two_factor_secret: None,
            two_factor_enabled: false,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
        };
        principals.insert(record.id, Principal::Admin(record.clone()));
        Ok(record)
    }

    async fn update_password(&self, id: Uuid, new_hash: &str) -> Result<(), StoreError> {
        let mut principals = self.principals.lock().await;
        match principals.get_mut(&id) {
            Some(Principal::Admin(admin)) => {
                admin.password_hash = new_hash.to_string();
                admin.failed_login_attempts = 0;
                admin.locked_until = None;
                Ok(())
            }
            Some(Principal::Grower(grower)) => {
                grower.password_hash = Some(new_hash.to_string());
                grower.failed_login_attempts = 0;
                grower.locked_until = None;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn record_failed_attempt(
        &self,
        id: Uuid,
        threshold: u32,
        lockout: Duration,
    ) -> Result<FailedAttempt, StoreError> {
        let mut principals = self.principals.lock().await;
        let principal = principals.get_mut(&id).ok_or(StoreError::NotFound)?;

        let (attempts, locked_until) = match principal {
            Principal::Admin(admin) => {
                (&mut admin.failed_login_attempts, &mut admin.locked_until)
            }
            Principal::Grower(grower) => {
                (&mut grower.failed_login_attempts, &mut grower.locked_until)
            }
        };

        // A failure after an elapsed lock restarts the count at 1.
        let now = Utc::now();
        if locked_until.is_some_and(|until| now >= until) {
            *attempts = 0;
            *locked_until = None;
        }

        *attempts += 1;
        if *attempts >= threshold && locked_until.is_none() {
            *locked_until = Some(now + lockout);
        }

        Ok(FailedAttempt {
            attempts: *attempts,
            locked_until: *locked_until,
        })
    }

    async fn record_success(&self, id: Uuid) -> Result<(), StoreError> {
        let mut principals = self.principals.lock().await;
        let principal = principals.get_mut(&id).ok_or(StoreError::NotFound)?;
        let now = Utc::now();
        match principal {
            Principal::Admin(admin) => {
                admin.failed_login_attempts = 0;
                admin.locked_until = None;
                admin.last_login_at = Some(now);
            }
            Principal::Grower(grower) => {
                grower.failed_login_attempts = 0;
                grower.locked_until = None;
                grower.last_login_at = Some(now);
            }
        }
        Ok(())
    }

    async fn set_admin_active(&self, id: Uuid, active: bool) -> Result<(), StoreError> {
        let mut principals = self.principals.lock().await;
        match principals.get_mut(&id) {
            Some(Principal::Admin(admin)) => {
                admin.is_active = active;
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn set_grower_status(&self, id: Uuid, status: GrowerStatus) -> Result<(), StoreError> {
        let mut principals = self.principals.lock().await;
        match principals.get_mut(&id) {
            Some(Principal::Grower(grower)) => {
                grower.status = status;
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionRegistry {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRegistry for MemorySessionRegistry {
    async fn create(&self, session: NewSession) -> Result<Session, StoreError> {
        let record = Session {
            id: Uuid::new_v4(),
            principal_id: session.principal_id,
            principal_kind: session.principal_kind,
            issued_at: Utc::now(),
            expires_at: session.expires_at,
            refresh_expires_at: session.refresh_expires_at,
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            is_active: true,
        };
        self.sessions
            .lock()
            .await
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.lock().await.get(&id).cloned())
    }

    async fn invalidate(&self, id: Uuid) -> Result<(), StoreError> {
        if let Some(session) = self.sessions.lock().await.get_mut(&id) {
            session.is_active = false;
        }
        Ok(())
    }

    async fn invalidate_if_active(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&id) {
            Some(session) if session.is_active => {
                session.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn invalidate_all_for_principal(
        &self,
        principal_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let mut count = 0;
        for session in sessions.values_mut() {
            if session.principal_id == principal_id
                && session.is_active
                && Some(session.id) != except
            {
                session.is_active = false;
                count += 1;
            }
        }
        Ok(count)
    }
}
