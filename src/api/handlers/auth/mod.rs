//! Authentication and authorization for the Cafetal platform.
//!
//! Two principal kinds share this surface: platform administrators and
//! coffee growers. Credentials are Argon2id hashes, sessions are server-side
//! rows referenced from HS256 token claims, and refresh tokens rotate with a
//! strict single-winner guarantee.
//!
//! ## Lockout and rate limiting
//!
//! - **Account lockout:** 5 consecutive failures lock the account for
//!   15 minutes. The counter update is a single atomic store operation.
//! - **Client rate limit:** 10 login attempts per IP per minute, independent
//!   of the per-account counter.
//!
//! Both windows are configuration-driven; the numbers above are defaults.

pub(crate) mod admins;
mod audit;
mod error;
mod lockout;
pub(crate) mod login;
pub(crate) mod logout;
mod memory;
mod middleware;
mod password;
pub(crate) mod passwords;
mod postgres;
pub(crate) mod principal;
mod rate_limit;
pub(crate) mod refresh;
mod service;
mod session;
mod state;
mod store;
mod token;
pub(crate) mod types;
mod utils;
pub(crate) mod whoami;

pub use audit::{AuditEvent, AuditOutcome, AuditSink, LogAuditSink};
pub use error::AuthError;
pub use memory::{MemoryCredentialStore, MemorySessionRegistry};
pub use postgres::{PgCredentialStore, PgSessionRegistry};
pub use principal::{Principal, PrincipalContext, PrincipalKind, Role};
pub use rate_limit::{NoopRateLimiter, RateLimiter, SlidingWindowRateLimiter};
pub use service::{AuthService, ClientInfo};
pub use session::SessionRegistry;
pub use state::AuthConfig;
pub use store::CredentialStore;

#[cfg(test)]
mod tests;
