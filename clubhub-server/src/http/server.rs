//! Axum server setup
//!
//! Server skeleton with:
//! - Permissive or localhost-only CORS
//! - Request tracing
//! - Bearer auth and admin gate per route group
//! - Static files under /static
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::IntoResponse;
use axum::{Json, Router};
use clubhub_core::config::ServerSection;
use clubhub_core::ClubhubConfig;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::middleware::{require_admin, require_auth};
use super::response::Envelope;
use super::routes;
use crate::auth::{PasswordHasher, TokenService};

/// API prefix for every JSON route
pub const API_PREFIX: &str = "/api/v1";

/// Shared application state
pub struct AppState {
    pub pool: SqlitePool,
    pub tokens: TokenService,
    pub hasher: PasswordHasher,
    /// Directory uploaded images are written to
    pub upload_dir: PathBuf,
    /// URL prefix the upload directory is served under
    pub upload_url: String,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &ClubhubConfig) -> Self {
        Self {
            pool,
            tokens: TokenService::new(&config.auth.jwt_secret, config.auth.token_ttl_secs),
            hasher: PasswordHasher::new(config.auth.bcrypt_cost),
            upload_dir: config.upload_path(),
            upload_url: format!("/static/{}", config.server.upload_dir.trim_matches('/')),
        }
    }
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>, server: &ServerSection) -> Router {
    let public = Router::new()
        .merge(routes::accounts::public_routes())
        .merge(routes::catalog::public_routes());

    let authenticated = Router::new()
        .merge(routes::accounts::user_routes())
        .merge(routes::clubs::user_routes())
        .merge(routes::memberships::user_routes())
        .merge(routes::content::user_routes())
        .merge(routes::registrations::user_routes())
        .merge(routes::attendance::user_routes())
        .merge(routes::logs::user_routes())
        .merge(routes::upload::user_routes())
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    // Layers run outside-in: authentication first, then the admin check
    let admin = Router::new()
        .merge(routes::accounts::admin_routes())
        .merge(routes::catalog::admin_routes())
        .merge(routes::clubs::admin_routes())
        .merge(routes::memberships::admin_routes())
        .merge(routes::attendance::admin_routes())
        .merge(routes::logs::admin_routes())
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let api = public.merge(authenticated).merge(admin);

    Router::new()
        .merge(routes::health::router())
        .nest(API_PREFIX, api)
        .nest_service("/static", ServeDir::new(&server.public_dir))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(cors_layer(server.cors_permissive))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(permissive: bool) -> CorsLayer {
    if permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(Envelope::failure(StatusCode::NOT_FOUND.as_u16(), "route not found")),
    )
}

/// Run the HTTP server until Ctrl+C or SIGTERM.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool(&config.database.url).await?;
/// run_migrations(&pool).await?;
/// run_server(pool, &config).await?;
/// ```
pub async fn run_server(pool: SqlitePool, config: &ClubhubConfig) -> Result<(), ServerError> {
    let bind_addr: SocketAddr = config.server.bind_addr.parse()?;

    if config.uses_default_secret() {
        tracing::warn!("using the default JWT secret; set CLUBHUB_JWT_SECRET in production");
    }

    let state = Arc::new(AppState::new(pool, config));
    tokio::fs::create_dir_all(&state.upload_dir).await?;
    tracing::info!(upload_dir = %state.upload_dir.display(), "upload directory ready");

    let app = build_router(state, &config.server);

    // Bind listener
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    // Run with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid bind address: {0}")]
    BindAddr(#[from] std::net::AddrParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_url_follows_config() {
        let mut config = ClubhubConfig::default();
        config.server.upload_dir = "/images/".into();
        let pool = crate::db::create_memory_pool().await.unwrap();

        let state = AppState::new(pool, &config);
        assert_eq!(state.upload_url, "/static/images");
        assert!(state.upload_dir.ends_with("images"));
    }

    #[test]
    fn bad_bind_address_is_reported() {
        let err: ServerError = "not-an-addr".parse::<SocketAddr>().unwrap_err().into();
        assert!(err.to_string().starts_with("invalid bind address"));
    }
}
