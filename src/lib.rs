//! # Cafetal Auth Service
//!
//! `cafetal` is the authentication and session authority for the Cafetal
//! farm-management platform. It serves two independent principal kinds:
//! platform **administrators** and **coffee growers**, each with their own
//! credential store.
//!
//! ## Credentials and sessions
//!
//! - Passwords are stored as Argon2id hashes; verification reads the
//!   parameters embedded in each hash, so cost changes roll out per password.
//! - Access and refresh tokens are HS256 JWTs referencing a server-side
//!   session row, which makes revocation effective before token expiry.
//! - Refresh tokens rotate: each one mints exactly one successor, concurrent
//!   presentations have a single winner.
//!
//! ## Abuse controls
//!
//! Accounts lock after repeated failures (default 5 failures, 15 minutes);
//! client IPs are rate limited independently. Login responses are uniform so
//! callers cannot distinguish unknown accounts, wrong passwords, or locked
//! accounts unless the deployment opts into lockout disclosure.

pub mod api;
pub mod cli;
