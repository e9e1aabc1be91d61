//! Bearer authentication and the admin gate

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use super::error::ApiError;
use super::extractors::CurrentUser;
use super::server::AppState;
use crate::db::UserRepo;

/// Verify the bearer token and attach the caller to the request.
///
/// The user row is re-read so deleted accounts lose access immediately and
/// role changes apply without a new token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::Unauthorized("missing bearer token"))?;
    let claims = state.tokens.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        ApiError::Unauthorized("invalid or expired token")
    })?;

    let identity = UserRepo::new(&state.pool)
        .identity(claims.uid)
        .await?
        .ok_or(ApiError::Unauthorized("invalid or expired token"))?;

    req.extensions_mut().insert(CurrentUser(identity));
    Ok(next.run(req).await)
}

/// Reject callers without the admin system role. Runs after `require_auth`.
pub async fn require_admin(user: CurrentUser, req: Request, next: Next) -> Result<Response, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::forbidden("administrator privileges required"));
    }
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parses_bearer_scheme() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer  xyz")), Some("xyz"));
    }

    #[test]
    fn rejects_other_schemes() {
        assert_eq!(bearer_token(&headers("Basic dXNlcg==")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
