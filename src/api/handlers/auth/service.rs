//! Authentication service: the one place that sequences credential checks.
//!
//! Order on the login path is fixed: rate limit, principal lookup, active
//! check, lockout check, then password verification. The lockout gate runs
//! before any hashing so locked accounts fail fast, and unknown emails still
//! pay the cost of one hash verification so response timing does not reveal
//! whether an account exists.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::audit::{AuditEvent, AuditOutcome, AuditSink};
use super::error::AuthError;
use super::password::{hash_password, verify_password};
use super::principal::{Principal, PrincipalContext, PrincipalKind, Role};
use super::rate_limit::{RateLimitDecision, RateLimiter};
use super::session::{NewSession, Session, SessionRegistry};
use super::state::AuthConfig;
use super::store::{CredentialStore, NewAdmin};
use super::token::{TokenPair, TokenSigner};
use super::utils::normalize_email;

/// Request metadata carried into the service for auditing and rate limiting.
#[derive(Clone, Debug, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Result of a successful login or refresh.
#[derive(Clone, Debug)]
pub struct LoginOutcome {
    pub principal_id: Uuid,
    pub kind: PrincipalKind,
    pub role: Role,
    pub session_id: Uuid,
    pub tokens: TokenPair,
}

pub struct AuthService {
    config: AuthConfig,
    store: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionRegistry>,
    signer: TokenSigner,
    rate_limiter: Arc<dyn RateLimiter>,
    audit: Arc<dyn AuditSink>,
    // Verified against when the email resolves to nothing, so unknown and
    // known accounts take the same verification path.
    dummy_hash: String,
}

impl AuthService {
    /// # Errors
    /// Fails only if the decoy hash cannot be computed at startup.
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionRegistry>,
        rate_limiter: Arc<dyn RateLimiter>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, AuthError> {
        let signer = TokenSigner::new(config.token_secret());
        let dummy_hash = hash_password(&Uuid::new_v4().to_string())?;
        Ok(Self {
            config,
            store,
            sessions,
            signer,
            rate_limiter,
            audit,
            dummy_hash,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Full login flow for either principal kind.
    ///
    /// # Errors
    /// `RateLimited`, `InvalidCredentials`, `AccountInactive`,
    /// `AccountLocked`, or `Unavailable`.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<LoginOutcome, AuthError> {
        if self.rate_limiter.check(client.ip.as_deref()) == RateLimitDecision::Limited {
            self.audit
                .record(AuditEvent::new("login", None, AuditOutcome::Failure, client.ip.clone()));
            return Err(AuthError::RateLimited);
        }

        let email = normalize_email(email);
        let Some(principal) = self.store.find_by_email(&email).await? else {
            self.burn_verification(password).await?;
            self.audit
                .record(AuditEvent::new("login", None, AuditOutcome::Failure, client.ip.clone()));
            return Err(AuthError::InvalidCredentials);
        };

        if let Err(err) = principal.check_active() {
            self.audit.record(AuditEvent::new(
                "login",
                Some(principal.id()),
                AuditOutcome::Failure,
                client.ip.clone(),
            ));
            return Err(err);
        }

        let now = Utc::now();
        if let Err(err) = self.config.lockout_policy().check(&principal, now) {
            debug!(principal_id = %principal.id(), "login rejected while locked");
            self.audit.record(AuditEvent::new(
                "login",
                Some(principal.id()),
                AuditOutcome::Failure,
                client.ip.clone(),
            ));
            return Err(err);
        }

        let Some(stored_hash) = principal.password_hash().map(str::to_string) else {
            // Grower without provisioned credentials; indistinguishable from
            // a wrong password.
            self.burn_verification(password).await?;
            self.audit.record(AuditEvent::new(
                "login",
                Some(principal.id()),
                AuditOutcome::Failure,
                client.ip.clone(),
            ));
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_blocking(password, stored_hash).await? {
            let policy = self.config.lockout_policy();
            let attempt = self
                .store
                .record_failed_attempt(principal.id(), policy.threshold(), policy.duration())
                .await?;
            self.audit.record(AuditEvent::new(
                "login",
                Some(principal.id()),
                AuditOutcome::Failure,
                client.ip.clone(),
            ));
            // The failure that crosses the threshold already reports the lock.
            if let Some(until) = attempt.locked_until.filter(|until| *until > Utc::now()) {
                let remaining = (until - Utc::now()).num_seconds().max(0);
                return Err(AuthError::AccountLocked {
                    retry_after_seconds: u64::try_from(remaining).ok(),
                });
            }
            return Err(AuthError::InvalidCredentials);
        }

        self.store.record_success(principal.id()).await?;
        let outcome = self.open_session(&principal, client).await?;
        self.audit.record(AuditEvent::new(
            "login",
            Some(principal.id()),
            AuditOutcome::Success,
            client.ip.clone(),
        ));
        Ok(outcome)
    }

    /// Rotate a refresh token: one new session per presented token, ever.
    ///
    /// # Errors
    /// `InvalidToken` for a bad token, `SessionRevoked` when the session was
    /// already spent or revoked, `AccountInactive` if the principal was
    /// deactivated since issuance.
    pub async fn refresh_session(
        &self,
        refresh_token: &str,
        client: &ClientInfo,
    ) -> Result<LoginOutcome, AuthError> {
        let data = self.signer.verify_refresh(refresh_token)?;
        let session = self
            .sessions
            .get(data.session_id)
            .await?
            .ok_or(AuthError::SessionRevoked)?;

        let now = Utc::now();
        if !session.is_active {
            self.audit.record(AuditEvent::new(
                "refresh",
                Some(data.principal_id),
                AuditOutcome::Failure,
                client.ip.clone(),
            ));
            return Err(AuthError::SessionRevoked);
        }
        if !session.refresh_valid(now) {
            return Err(AuthError::InvalidToken);
        }

        let principal = self
            .store
            .find_by_id(data.principal_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        principal.check_active()?;

        // Single-winner gate: only the caller that flips the session gets a
        // new pair. Losers of the race get SessionRevoked.
        if !self.sessions.invalidate_if_active(session.id).await? {
            self.audit.record(AuditEvent::new(
                "refresh",
                Some(principal.id()),
                AuditOutcome::Failure,
                client.ip.clone(),
            ));
            return Err(AuthError::SessionRevoked);
        }

        let outcome = self.open_session(&principal, client).await?;
        self.audit.record(AuditEvent::new(
            "refresh",
            Some(principal.id()),
            AuditOutcome::Success,
            client.ip.clone(),
        ));
        Ok(outcome)
    }

    /// Revoke the session behind an access token. Idempotent; an already
    /// dead session logs out successfully.
    ///
    /// # Errors
    /// `InvalidToken` only when the token itself cannot be verified.
    pub async fn logout(&self, access_token: &str, client: &ClientInfo) -> Result<(), AuthError> {
        let data = self.signer.verify_access(access_token)?;
        self.sessions.invalidate(data.session_id).await?;
        self.audit.record(AuditEvent::new(
            "logout",
            Some(data.principal_id),
            AuditOutcome::Success,
            client.ip.clone(),
        ));
        Ok(())
    }

    /// Verify an access token and check role membership for a route.
    ///
    /// # Errors
    /// `InvalidToken`, `Unauthorized` (dead session or deactivated
    /// principal), or `Forbidden` (live principal, wrong role).
    pub async fn authorize(
        &self,
        access_token: &str,
        required: &[Role],
    ) -> Result<PrincipalContext, AuthError> {
        let data = self.signer.verify_access(access_token)?;
        let session = self
            .sessions
            .get(data.session_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        if !session.access_valid(Utc::now()) {
            return Err(if session.is_active {
                AuthError::Unauthorized
            } else {
                AuthError::SessionRevoked
            });
        }

        // Re-resolve the principal so deactivation takes effect on live
        // tokens immediately, not at next expiry.
        let principal = self
            .store
            .find_by_id(data.principal_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        if principal.check_active().is_err() {
            return Err(AuthError::Unauthorized);
        }

        let context = PrincipalContext {
            principal_id: principal.id(),
            kind: principal.kind(),
            role: principal.role(),
            is_super_admin: principal.is_super_admin(),
            email: principal.email().map(str::to_string),
            session_id: session.id,
        };

        if !context.satisfies(required) {
            self.audit.record(AuditEvent::new(
                "authorize",
                Some(context.principal_id),
                AuditOutcome::Denied,
                None,
            ));
            return Err(AuthError::Forbidden);
        }

        Ok(context)
    }

    /// Self-service password change. Every other session for the principal is
    /// revoked; the one driving the change survives.
    ///
    /// # Errors
    /// `InvalidCredentials` when the current password does not verify.
    pub async fn change_password(
        &self,
        context: &PrincipalContext,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let principal = self
            .store
            .find_by_id(context.principal_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        let Some(stored_hash) = principal.password_hash().map(str::to_string) else {
            return Err(AuthError::InvalidCredentials);
        };
        if !self.verify_blocking(current_password, stored_hash).await? {
            self.audit.record(AuditEvent::new(
                "password_change",
                Some(context.principal_id),
                AuditOutcome::Failure,
                None,
            ));
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = self.hash_blocking(new_password).await?;
        self.store
            .update_password(context.principal_id, &new_hash)
            .await?;
        self.sessions
            .invalidate_all_for_principal(context.principal_id, Some(context.session_id))
            .await?;
        self.audit.record(AuditEvent::new(
            "password_change",
            Some(context.principal_id),
            AuditOutcome::Success,
            None,
        ));
        Ok(())
    }

    /// Administrative reset: no current-password proof, every session dies.
    ///
    /// # Errors
    /// `InvalidCredentials` when the target principal does not exist.
    pub async fn reset_password(
        &self,
        principal_id: Uuid,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let new_hash = self.hash_blocking(new_password).await?;
        self.store.update_password(principal_id, &new_hash).await?;
        self.sessions
            .invalidate_all_for_principal(principal_id, None)
            .await?;
        self.audit.record(AuditEvent::new(
            "password_reset",
            Some(principal_id),
            AuditOutcome::Success,
            None,
        ));
        Ok(())
    }

    /// Create an administrator account with a freshly hashed password.
    ///
    /// # Errors
    /// `Conflict` when the email is already registered.
    pub async fn create_admin(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        is_super_admin: bool,
    ) -> Result<super::principal::AdminPrincipal, AuthError> {
        let email = normalize_email(email);
        let password_hash = self.hash_blocking(password).await?;
        let admin = self
            .store
            .create_admin(NewAdmin {
                email,
                password_hash,
                display_name: display_name.to_string(),
                is_super_admin,
            })
            .await?;
        self.audit.record(AuditEvent::new(
            "admin_created",
            Some(admin.id),
            AuditOutcome::Success,
            None,
        ));
        Ok(admin)
    }

    /// Current session details for an authenticated caller.
    ///
    /// # Errors
    /// `Unauthorized` if the session vanished between authorize and here.
    pub async fn session_for(&self, context: &PrincipalContext) -> Result<Session, AuthError> {
        self.sessions
            .get(context.session_id)
            .await?
            .ok_or(AuthError::Unauthorized)
    }

    async fn open_session(
        &self,
        principal: &Principal,
        client: &ClientInfo,
    ) -> Result<LoginOutcome, AuthError> {
        let now = Utc::now();
        let session = self
            .sessions
            .create(NewSession {
                principal_id: principal.id(),
                principal_kind: principal.kind(),
                expires_at: now + self.config.access_ttl(),
                refresh_expires_at: now + self.config.refresh_ttl(),
                ip_address: client.ip.clone(),
                user_agent: client.user_agent.clone(),
            })
            .await?;
        let tokens = self.signer.issue(principal, &session)?;
        Ok(LoginOutcome {
            principal_id: principal.id(),
            kind: principal.kind(),
            role: principal.role(),
            session_id: session.id,
            tokens,
        })
    }

    /// Argon2 verification is CPU-bound; keep it off the async workers.
    async fn verify_blocking(&self, password: &str, hash: String) -> Result<bool, AuthError> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|err| AuthError::Unavailable(anyhow!("verification task failed: {err}")))
    }

    async fn hash_blocking(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|err| AuthError::Unavailable(anyhow!("hashing task failed: {err}")))?
    }

    /// Spend one verification against the decoy hash so rejected lookups
    /// take as long as real ones.
    async fn burn_verification(&self, password: &str) -> Result<(), AuthError> {
        let _ = self.verify_blocking(password, self.dummy_hash.clone()).await?;
        Ok(())
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}
