//! clubhub-server: HTTP API for university club management
//!
//! Accounts, club registration and review, memberships and in-club roles,
//! announcements, activities with registration, attendance sessions and an
//! operation audit trail, served over axum with a SQLite store.

pub mod audit;
pub mod auth;
pub mod db;
pub mod http;
pub mod models;

pub use auth::{PasswordHasher, TokenService};
pub use db::{create_pool, run_migrations, seed, SeedReport};
pub use http::{build_router, run_server, ApiError, AppState, ServerError};
