//! HTTP layer
//!
//! Axum server with:
//! - CORS (localhost only unless permissive)
//! - Request tracing
//! - Bearer authentication and an admin gate
//! - Enveloped JSON responses and errors
//! - Graceful shutdown

pub mod access;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use response::{ApiResult, Envelope};
pub use server::{build_router, run_server, AppState, ServerError, API_PREFIX};
