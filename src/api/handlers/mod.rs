//! API handlers for the Cafetal auth service.

pub mod auth;
pub mod health;
pub mod root;
