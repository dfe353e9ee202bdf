//! Principal variants and role derivation.
//!
//! Two independent principal kinds share the auth surface: platform
//! administrators and coffee growers. They are modeled as a tagged union
//! resolved once at token-verification time; the role is a pure function of
//! the variant, so downstream checks never branch on storage details.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::AuthError;

/// Which credential store a principal lives in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    Admin,
    Grower,
}

impl PrincipalKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Grower => "grower",
        }
    }

    /// Parse the wire form used in token claims and session rows.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "grower" => Some(Self::Grower),
            _ => None,
        }
    }
}

/// Derived role classification, not a stored entity.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Moderator,
    CoffeeGrower,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::CoffeeGrower => "coffee_grower",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "super_admin" => Some(Self::SuperAdmin),
            "admin" => Some(Self::Admin),
            "moderator" => Some(Self::Moderator),
            "coffee_grower" => Some(Self::CoffeeGrower),
            _ => None,
        }
    }
}

/// Grower account status. Anything but `Active` blocks authentication.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GrowerStatus {
    Active,
    Inactive,
    Suspended,
}

impl GrowerStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }
}

/// National identification document types accepted for growers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationType {
    /// Cedula de ciudadania.
    Cc,
    /// Cedula de extranjeria.
    Ce,
    /// Tax identification number.
    Nit,
    Passport,
}

impl IdentificationType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cc => "cc",
            Self::Ce => "ce",
            Self::Nit => "nit",
            Self::Passport => "passport",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cc" => Some(Self::Cc),
            "ce" => Some(Self::Ce),
            "nit" => Some(Self::Nit),
            "passport" => Some(Self::Passport),
            _ => None,
        }
    }
}

/// Platform administrator record as stored in the credential store.
#[derive(Clone, Debug)]
pub struct AdminPrincipal {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub is_super_admin: bool,
    pub is_active: bool,
    pub two_factor_secret: Option<String>,
    pub two_factor_enabled: bool,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Coffee grower record. Growers may exist before credentials are
/// provisioned, so the password hash is optional.
#[derive(Clone, Debug)]
pub struct GrowerPrincipal {
    pub id: Uuid,
    pub identification_number: String,
    pub identification_type: IdentificationType,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub status: GrowerStatus,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Any authenticable identity.
#[derive(Clone, Debug)]
pub enum Principal {
    Admin(AdminPrincipal),
    Grower(GrowerPrincipal),
}

impl Principal {
    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::Admin(admin) => admin.id,
            Self::Grower(grower) => grower.id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Self::Admin(_) => PrincipalKind::Admin,
            Self::Grower(_) => PrincipalKind::Grower,
        }
    }

    /// Pure role derivation per variant.
    #[must_use]
    pub fn role(&self) -> Role {
        match self {
            Self::Admin(admin) if admin.is_super_admin => Role::SuperAdmin,
            Self::Admin(_) => Role::Admin,
            Self::Grower(_) => Role::CoffeeGrower,
        }
    }

    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        matches!(self, Self::Admin(admin) if admin.is_super_admin)
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Admin(admin) => Some(admin.email.as_str()),
            Self::Grower(grower) => grower.email.as_deref(),
        }
    }

    /// Stored hash, if credentials have been provisioned.
    #[must_use]
    pub fn password_hash(&self) -> Option<&str> {
        match self {
            Self::Admin(admin) => Some(admin.password_hash.as_str()),
            Self::Grower(grower) => grower.password_hash.as_deref(),
        }
    }

    #[must_use]
    pub fn failed_login_attempts(&self) -> u32 {
        match self {
            Self::Admin(admin) => admin.failed_login_attempts,
            Self::Grower(grower) => grower.failed_login_attempts,
        }
    }

    #[must_use]
    pub fn locked_until(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Admin(admin) => admin.locked_until,
            Self::Grower(grower) => grower.locked_until,
        }
    }

    /// Deactivated accounts never authenticate, regardless of lockout state
    /// or password correctness.
    ///
    /// # Errors
    /// Returns `AccountInactive` for deactivated admins and non-active growers.
    pub fn check_active(&self) -> Result<(), AuthError> {
        let active = match self {
            Self::Admin(admin) => admin.is_active,
            Self::Grower(grower) => grower.status == GrowerStatus::Active,
        };
        if active {
            Ok(())
        } else {
            Err(AuthError::AccountInactive)
        }
    }
}

/// Resolved caller attached to the request context for downstream handlers.
#[derive(Clone, Debug)]
pub struct PrincipalContext {
    pub principal_id: Uuid,
    pub kind: PrincipalKind,
    pub role: Role,
    pub is_super_admin: bool,
    pub email: Option<String>,
    pub session_id: Uuid,
}

impl PrincipalContext {
    /// Role membership with the super-admin bypass. An empty required set
    /// means the route only needs authentication.
    #[must_use]
    pub fn satisfies(&self, required: &[Role]) -> bool {
        if required.is_empty() || self.is_super_admin {
            return true;
        }
        required.contains(&self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(is_super_admin: bool, is_active: bool) -> AdminPrincipal {
        AdminPrincipal {
            id: Uuid::new_v4(),
            email: "admin@cafetal.app".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            display_name: "Admin".to_string(),
            is_super_admin,
            is_active,
            two_factor_secret: None,
            two_factor_enabled: false,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
        }
    }

    fn grower(status: GrowerStatus) -> GrowerPrincipal {
        GrowerPrincipal {
            id: Uuid::new_v4(),
            identification_number: "1045678901".to_string(),
            identification_type: IdentificationType::Cc,
            email: Some("maria@finca.co".to_string()),
            password_hash: Some("$argon2id$stub".to_string()),
            status,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
        }
    }

    #[test]
    fn role_derivation_per_variant() {
        assert_eq!(Principal::Admin(admin(true, true)).role(), Role::SuperAdmin);
        assert_eq!(Principal::Admin(admin(false, true)).role(), Role::Admin);
        assert_eq!(
            Principal::Grower(grower(GrowerStatus::Active)).role(),
            Role::CoffeeGrower
        );
    }

    #[test]
    fn inactive_accounts_cannot_authenticate() {
        assert!(Principal::Admin(admin(false, false)).check_active().is_err());
        assert!(Principal::Grower(grower(GrowerStatus::Suspended))
            .check_active()
            .is_err());
        assert!(Principal::Grower(grower(GrowerStatus::Inactive))
            .check_active()
            .is_err());
        assert!(Principal::Grower(grower(GrowerStatus::Active))
            .check_active()
            .is_ok());
    }

    #[test]
    fn super_admin_bypasses_any_required_set() {
        let context = PrincipalContext {
            principal_id: Uuid::new_v4(),
            kind: PrincipalKind::Admin,
            role: Role::Admin,
            is_super_admin: true,
            email: None,
            session_id: Uuid::new_v4(),
        };
        assert!(context.satisfies(&[Role::Moderator]));
        assert!(context.satisfies(&[Role::CoffeeGrower]));
    }

    #[test]
    fn plain_admin_needs_role_membership() {
        let context = PrincipalContext {
            principal_id: Uuid::new_v4(),
            kind: PrincipalKind::Admin,
            role: Role::Admin,
            is_super_admin: false,
            email: None,
            session_id: Uuid::new_v4(),
        };
        assert!(!context.satisfies(&[Role::Moderator]));
        assert!(context.satisfies(&[Role::Admin, Role::Moderator]));
        assert!(context.satisfies(&[]));
    }

    #[test]
    fn wire_forms_round_trip() {
        for role in [
            Role::SuperAdmin,
            Role::Admin,
            Role::Moderator,
            Role::CoffeeGrower,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        for kind in [PrincipalKind::Admin, PrincipalKind::Grower] {
            assert_eq!(PrincipalKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(Role::parse("root"), None);
        assert_eq!(GrowerStatus::parse("archived"), None);
    }
}
