//! # Agencyhub Shared Library
//!
//! Domain types, persistence, and authentication logic used by the
//! Agencyhub API server.
//!
//! ## Module Organization
//!
//! - `db`: PostgreSQL pool and embedded migrations
//! - `auth`: JWT, password hashing, Google sign-in, roles and permissions
//! - `models`: Tenant-scoped entities and their SQL operations
//! - `events`: In-process activity feed for live dashboards

pub mod auth;
pub mod db;
pub mod events;
pub mod models;

/// Current version of the Agencyhub shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
