//! HMAC-signed access and refresh tokens.
//!
//! Both token types are HS256 JWTs signed with the same symmetric secret from
//! configuration. Claims carry only identity, role, and session references;
//! never password hashes or two-factor secrets. Verification fails closed:
//! any malformed payload, bad signature, expired timestamp, or wrong token
//! type collapses into `InvalidToken`.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::AuthError;
use super::principal::{Principal, PrincipalKind, Role};
use super::session::Session;

const TYP_ACCESS: &str = "access";
const TYP_REFRESH: &str = "refresh";

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String,
    kind: String,
    role: String,
    su: bool,
    sid: String,
    iat: i64,
    exp: i64,
    typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaims {
    sub: String,
    sid: String,
    iat: i64,
    exp: i64,
    typ: String,
}

/// Freshly minted token pair for one session.
#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Verified access-token claims in typed form.
#[derive(Clone, Debug)]
pub struct AccessTokenData {
    pub principal_id: Uuid,
    pub kind: PrincipalKind,
    pub role: Role,
    pub is_super_admin: bool,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Verified refresh-token claims in typed form.
#[derive(Clone, Debug)]
pub struct RefreshTokenData {
    pub principal_id: Uuid,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
        }
    }

    /// Mint the access/refresh pair for a session. Token expiries mirror the
    /// session's own windows so the two never disagree.
    ///
    /// # Errors
    /// Returns `Unavailable` only on a signing failure, which does not depend
    /// on caller input.
    pub fn issue(&self, principal: &Principal, session: &Session) -> Result<TokenPair, AuthError> {
        let header = Header::new(Algorithm::HS256);

        let access = AccessClaims {
            sub: principal.id().to_string(),
            kind: principal.kind().as_str().to_string(),
            role: principal.role().as_str().to_string(),
            su: principal.is_super_admin(),
            sid: session.id.to_string(),
            iat: session.issued_at.timestamp(),
            exp: session.expires_at.timestamp(),
            typ: TYP_ACCESS.to_string(),
        };
        let refresh = RefreshClaims {
            sub: principal.id().to_string(),
            sid: session.id.to_string(),
            iat: session.issued_at.timestamp(),
            exp: session.refresh_expires_at.timestamp(),
            typ: TYP_REFRESH.to_string(),
        };

        let access_token = jsonwebtoken::encode(&header, &access, &self.encoding_key)
            .map_err(|err| AuthError::Unavailable(anyhow::anyhow!("sign access token: {err}")))?;
        let refresh_token = jsonwebtoken::encode(&header, &refresh, &self.encoding_key)
            .map_err(|err| AuthError::Unavailable(anyhow::anyhow!("sign refresh token: {err}")))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at: session.expires_at,
            refresh_expires_at: session.refresh_expires_at,
        })
    }

    /// # Errors
    /// `InvalidToken` for anything that is not a live, well-formed access token.
    pub fn verify_access(&self, token: &str) -> Result<AccessTokenData, AuthError> {
        let claims: AccessClaims = self.decode(token)?;
        if claims.typ != TYP_ACCESS {
            return Err(AuthError::InvalidToken);
        }
        Ok(AccessTokenData {
            principal_id: parse_uuid(&claims.sub)?,
            kind: PrincipalKind::parse(&claims.kind).ok_or(AuthError::InvalidToken)?,
            role: Role::parse(&claims.role).ok_or(AuthError::InvalidToken)?,
            is_super_admin: claims.su,
            session_id: parse_uuid(&claims.sid)?,
            expires_at: parse_timestamp(claims.exp)?,
        })
    }

    /// # Errors
    /// `InvalidToken` for anything that is not a live, well-formed refresh token.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshTokenData, AuthError> {
        let claims: RefreshClaims = self.decode(token)?;
        if claims.typ != TYP_REFRESH {
            return Err(AuthError::InvalidToken);
        }
        Ok(RefreshTokenData {
            principal_id: parse_uuid(&claims.sub)?,
            session_id: parse_uuid(&claims.sid)?,
            expires_at: parse_timestamp(claims.exp)?,
        })
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, token: &str) -> Result<T, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // No clock leeway: an expired token is expired.
        validation.leeway = 0;
        jsonwebtoken::decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

fn parse_uuid(value: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(value).map_err(|_| AuthError::InvalidToken)
}

fn parse_timestamp(value: i64) -> Result<DateTime<Utc>, AuthError> {
    Utc.timestamp_opt(value, 0)
        .single()
        .ok_or(AuthError::InvalidToken)
}
