//! Postgres-backed credential store and session registry.
//!
//! Admins and growers live in separate tables; lookups probe admins first.
//! The failed-attempt update is a single conditional UPDATE so concurrent
//! login failures serialize on the row and never lose an increment.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::Duration;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::principal::{
    AdminPrincipal, GrowerPrincipal, GrowerStatus, IdentificationType, Principal, PrincipalKind,
};
use super::session::{NewSession, Session, SessionRegistry};
use super::store::{CredentialStore, FailedAttempt, NewAdmin, StoreError};
use super::utils::is_unique_violation;

const ADMIN_COLUMNS: &str = "id, email, password_hash, display_name, is_super_admin, is_active, \
     two_factor_secret, two_factor_enabled, failed_login_attempts, locked_until, last_login_at";

const GROWER_COLUMNS: &str = "id, identification_number, identification_type, email, \
     password_hash, status, failed_login_attempts, locked_until, last_login_at";

const SESSION_COLUMNS: &str = "id, principal_id, principal_kind, issued_at, expires_at, \
     refresh_expires_at, ip_address, user_agent, is_active";

#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_admin(
        &self,
        column: &str,
        bind: Lookup<'_>,
    ) -> Result<Option<AdminPrincipal>, StoreError> {
        let query = format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE {column} = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let statement = sqlx::query(&query);
        let statement = match bind {
            Lookup::Email(email) => statement.bind(email),
            Lookup::Id(id) => statement.bind(id),
        };
        let row = statement
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup admin")
            .map_err(StoreError::Unavailable)?;
        row.map(|row| admin_from_row(&row)).transpose()
    }

    async fn fetch_grower(
        &self,
        column: &str,
        bind: Lookup<'_>,
    ) -> Result<Option<GrowerPrincipal>, StoreError> {
        let query = format!("SELECT {GROWER_COLUMNS} FROM growers WHERE {column} = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let statement = sqlx::query(&query);
        let statement = match bind {
            Lookup::Email(email) => statement.bind(email),
            Lookup::Id(id) => statement.bind(id),
        };
        let row = statement
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup grower")
            .map_err(StoreError::Unavailable)?;
        row.map(|row| grower_from_row(&row)).transpose()
    }

    /// Run the atomic failure update against one table. Returns `None` when
    /// the id is not in that table.
    async fn record_failure_in(
        &self,
        table: &str,
        id: Uuid,
        threshold: u32,
        lockout: Duration,
    ) -> Result<Option<FailedAttempt>, StoreError> {
        // All SET expressions read the pre-update row, so the CASE arms see a
        // consistent count. An elapsed lock restarts the count at 1.
        let query = format!(
            r"
            UPDATE {table} SET
                failed_login_attempts = CASE
                    WHEN locked_until IS NOT NULL AND locked_until <= now() THEN 1
                    ELSE failed_login_attempts + 1
                END,
                locked_until = CASE
                    WHEN locked_until IS NOT NULL AND locked_until > now() THEN locked_until
                    WHEN (CASE
                            WHEN locked_until IS NOT NULL AND locked_until <= now() THEN 1
                            ELSE failed_login_attempts + 1
                          END) >= $2 THEN now() + make_interval(secs => $3)
                    ELSE NULL
                END
            WHERE id = $1
            RETURNING failed_login_attempts, locked_until
            "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(i64::from(threshold))
            .bind(lockout.num_seconds() as f64)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to record failed attempt")
            .map_err(StoreError::Unavailable)?;

        Ok(row.map(|row| FailedAttempt {
            attempts: count_from_row(&row, "failed_login_attempts"),
            locked_until: row.get("locked_until"),
        }))
    }

    async fn touch(&self, table: &str, set: &str, id: Uuid) -> Result<bool, StoreError> {
        let query = format!("UPDATE {table} SET {set} WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query.as_str()
        );
        let result = sqlx::query(&query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update principal")
            .map_err(StoreError::Unavailable)?;
        Ok(result.rows_affected() > 0)
    }
}

enum Lookup<'a> {
    Email(&'a str),
    Id(Uuid),
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        if let Some(admin) = self.fetch_admin("email", Lookup::Email(email)).await? {
            return Ok(Some(Principal::Admin(admin)));
        }
        Ok(self
            .fetch_grower("email", Lookup::Email(email))
            .await?
            .map(Principal::Grower))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        if let Some(admin) = self.fetch_admin("id", Lookup::Id(id)).await? {
            return Ok(Some(Principal::Admin(admin)));
        }
        Ok(self
            .fetch_grower("id", Lookup::Id(id))
            .await?
            .map(Principal::Grower))
    }

    async fn create_admin(&self, admin: NewAdmin) -> Result<AdminPrincipal, StoreError> {
        let query = format!(
            r"
            INSERT INTO admins (email, password_hash, display_name, is_super_admin)
            VALUES ($1, $2, $3, $4)
            RETURNING {ADMIN_COLUMNS}
            "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(&admin.email)
            .bind(&admin.password_hash)
            .bind(&admin.display_name)
            .bind(admin.is_super_admin)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => admin_from_row(&row),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict),
            Err(err) => Err(StoreError::Unavailable(
                anyhow::Error::new(err).context("failed to insert admin"),
            )),
        }
    }

    async fn update_password(&self, id: Uuid, new_hash: &str) -> Result<(), StoreError> {
        for table in ["admins", "growers"] {
            let query = format!(
                "UPDATE {table} SET password_hash = $2, failed_login_attempts = 0, \
                 locked_until = NULL WHERE id = $1"
            );
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query.as_str()
            );
            let result = sqlx::query(&query)
                .bind(id)
                .bind(new_hash)
                .execute(&self.pool)
                .instrument(span)
                .await
                .context("failed to update password")
                .map_err(StoreError::Unavailable)?;
            if result.rows_affected() > 0 {
                return Ok(());
            }
        }
        Err(StoreError::NotFound)
    }

    async fn record_failed_attempt(
        &self,
        id: Uuid,
        threshold: u32,
        lockout: Duration,
    ) -> Result<FailedAttempt, StoreError> {
        for table in ["admins", "growers"] {
            if let Some(attempt) = self.record_failure_in(table, id, threshold, lockout).await? {
                return Ok(attempt);
            }
        }
        Err(StoreError::NotFound)
    }

    async fn record_success(&self, id: Uuid) -> Result<(), StoreError> {
        let set = "failed_login_attempts = 0, locked_until = NULL, last_login_at = now()";
        for table in ["admins", "growers"] {
            if self.touch(table, set, id).await? {
                return Ok(());
            }
        }
        Err(StoreError::NotFound)
    }

    async fn set_admin_active(&self, id: Uuid, active: bool) -> Result<(), StoreError> {
        let query = "UPDATE admins SET is_active = $2 WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update admin status")
            .map_err(StoreError::Unavailable)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_grower_status(&self, id: Uuid, status: GrowerStatus) -> Result<(), StoreError> {
        let query = "UPDATE growers SET status = $2 WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update grower status")
            .map_err(StoreError::Unavailable)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct PgSessionRegistry {
    pool: PgPool,
}

impl PgSessionRegistry {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRegistry for PgSessionRegistry {
    async fn create(&self, session: NewSession) -> Result<Session, StoreError> {
        let query = format!(
            r"
            INSERT INTO auth_sessions
                (principal_id, principal_kind, expires_at, refresh_expires_at,
                 ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SESSION_COLUMNS}
            "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(session.principal_id)
            .bind(session.principal_kind.as_str())
            .bind(session.expires_at)
            .bind(session.refresh_expires_at)
            .bind(&session.ip_address)
            .bind(&session.user_agent)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert session")
            .map_err(StoreError::Unavailable)?;
        session_from_row(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM auth_sessions WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")
            .map_err(StoreError::Unavailable)?;
        row.map(|row| session_from_row(&row)).transpose()
    }

    async fn invalidate(&self, id: Uuid) -> Result<(), StoreError> {
        let query = "UPDATE auth_sessions SET is_active = false WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to invalidate session")
            .map_err(StoreError::Unavailable)?;
        Ok(())
    }

    async fn invalidate_if_active(&self, id: Uuid) -> Result<bool, StoreError> {
        // The row lock serializes concurrent refreshes; exactly one caller
        // observes rows_affected == 1.
        let query = "UPDATE auth_sessions SET is_active = false WHERE id = $1 AND is_active";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to rotate session")
            .map_err(StoreError::Unavailable)?;
        Ok(result.rows_affected() == 1)
    }

    async fn invalidate_all_for_principal(
        &self,
        principal_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<u64, StoreError> {
        let query = r"
            UPDATE auth_sessions SET is_active = false
            WHERE principal_id = $1
              AND is_active
              AND ($2::uuid IS NULL OR id <> $2)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(principal_id)
            .bind(except)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to invalidate principal sessions")
            .map_err(StoreError::Unavailable)?;
        Ok(result.rows_affected())
    }
}

fn admin_from_row(row: &PgRow) -> Result<AdminPrincipal, StoreError> {
    Ok(AdminPrincipal {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        display_name: row.get("display_name"),
        is_super_admin: row.get("is_super_admin"),
        is_active: row.get("is_active"),
        two_factor_secret: row.get("two_factor_secret"),
        two_factor_enabled: row.get("two_factor_enabled"),
        failed_login_attempts: count_from_row(row, "failed_login_attempts"),
        locked_until: row.get("locked_until"),
        last_login_at: row.get("last_login_at"),
    })
}

fn grower_from_row(row: &PgRow) -> Result<GrowerPrincipal, StoreError> {
    let status: String = row.get("status");
    let identification_type: String = row.get("identification_type");
    Ok(GrowerPrincipal {
        id: row.get("id"),
        identification_number: row.get("identification_number"),
        identification_type: IdentificationType::parse(&identification_type).ok_or_else(|| {
            StoreError::Unavailable(anyhow!(
                "unknown identification type: {identification_type}"
            ))
        })?,
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        status: GrowerStatus::parse(&status)
            .ok_or_else(|| StoreError::Unavailable(anyhow!("unknown grower status: {status}")))?,
        failed_login_attempts: count_from_row(row, "failed_login_attempts"),
        locked_until: row.get("locked_until"),
        last_login_at: row.get("last_login_at"),
    })
}

fn session_from_row(row: &PgRow) -> Result<Session, StoreError> {
    let kind: String = row.get("principal_kind");
    Ok(Session {
        id: row.get("id"),
        principal_id: row.get("principal_id"),
        principal_kind: PrincipalKind::parse(&kind)
            .ok_or_else(|| StoreError::Unavailable(anyhow!("unknown principal kind: {kind}")))?,
        issued_at: row.get("issued_at"),
        expires_at: row.get("expires_at"),
        refresh_expires_at: row.get("refresh_expires_at"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        is_active: row.get("is_active"),
    })
}

fn count_from_row(row: &PgRow, column: &str) -> u32 {
    let value: i32 = row.get(column);
    u32::try_from(value).unwrap_or(0)
}
