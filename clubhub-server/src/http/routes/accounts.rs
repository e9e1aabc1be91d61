//! Login, registration and profile endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use clubhub_core::SystemRole;
use serde::{Deserialize, Serialize};

use crate::db::{ProfileUpdate, User, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{CurrentUser, ValidJson, ValidQuery};
use crate::http::response::{ok, ApiResult};
use crate::http::server::AppState;
use crate::models::{optional_text, required_text, Account, Page, PageQuery, Password};

/// One message for unknown accounts and wrong passwords
const BAD_CREDENTIALS: &str = "invalid account or password";

#[derive(Deserialize)]
pub struct LoginRequest {
    pub account: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub account: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub college: Option<String>,
    pub student_no: Option<String>,
    pub phone: Option<String>,
}

impl ProfileRequest {
    fn validate(self) -> Result<ProfileUpdate, ApiError> {
        let field = |name: &'static str, value: Option<String>, max: usize| {
            value.map(|v| optional_text(name, &v, max)).transpose()
        };
        Ok(ProfileUpdate {
            name: self.name.map(|v| required_text("name", &v, 64)).transpose()?,
            gender: field("gender", self.gender, 16)?,
            college: field("college", self.college, 128)?,
            student_no: field("student_no", self.student_no, 32)?,
            phone: field("phone", self.phone, 32)?,
        })
    }
}

#[derive(Deserialize)]
pub struct PasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Deserialize, Default)]
pub struct UserSearch {
    pub keyword: Option<String>,
}

/// POST /public/login
async fn login(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let user = UserRepo::new(&state.pool)
        .find_by_account(req.account.trim())
        .await?
        .ok_or(ApiError::Unauthorized(BAD_CREDENTIALS))?;

    if !state.hasher.verify(&req.password, &user.password_hash).await? {
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
    }

    let token = state.tokens.issue(user.id, user.role)?;
    tracing::info!(user_id = user.id, "login");
    ok(LoginResponse { token, user })
}

/// POST /public/register
async fn register(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> ApiResult<User> {
    let account = Account::new(&req.account)?;
    let password = Password::new(&req.password)?;
    let name = required_text("name", &req.name, 64)?;

    let hash = state.hasher.hash(password.expose()).await?;
    let user = UserRepo::new(&state.pool)
        .create(account.as_str(), &hash, &name, SystemRole::User)
        .await?;
    tracing::info!(user_id = user.id, account = %account.as_str(), "registered account");
    ok(user)
}

/// GET /student/me
async fn me(State(state): State<Arc<AppState>>, user: CurrentUser) -> ApiResult<User> {
    ok(UserRepo::new(&state.pool).get(user.id).await?)
}

/// PUT /student/me
async fn update_me(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidJson(req): ValidJson<ProfileRequest>,
) -> ApiResult<User> {
    let update = req.validate()?;
    ok(UserRepo::new(&state.pool).update_profile(user.id, update).await?)
}

/// PUT /student/password
async fn change_password(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidJson(req): ValidJson<PasswordRequest>,
) -> ApiResult<()> {
    let users = UserRepo::new(&state.pool);
    let current = users.get(user.id).await?;
    if !state.hasher.verify(&req.old_password, &current.password_hash).await? {
        return Err(ApiError::bad_request("old password is incorrect"));
    }

    let password = Password::new(&req.new_password)?;
    let hash = state.hasher.hash(password.expose()).await?;
    users.update_password(user.id, &hash).await?;
    tracing::info!(user_id = user.id, "password changed");
    ok(())
}

/// GET /admin/users
async fn list_users(
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<UserSearch>,
) -> ApiResult<Page<User>> {
    let users = UserRepo::new(&state.pool)
        .list(search.keyword.as_deref(), page.into())
        .await?;
    ok(users)
}

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/public/login", post(login))
        .route("/public/register", post(register))
}

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/student/me", get(me).put(update_me))
        .route("/student/password", put(change_password))
}

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin/users", get(list_users))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_fields_are_trimmed_and_bounded() {
        let req = ProfileRequest {
            name: Some("  Ada ".into()),
            gender: None,
            college: Some("Engineering".into()),
            student_no: None,
            phone: Some("x".repeat(40)),
        };
        assert!(req.validate().is_err());

        let req = ProfileRequest {
            name: Some("  Ada ".into()),
            gender: None,
            college: None,
            student_no: Some(" 2025001 ".into()),
            phone: None,
        };
        let update = req.validate().unwrap();
        assert_eq!(update.name.as_deref(), Some("Ada"));
        assert_eq!(update.student_no.as_deref(), Some("2025001"));
        assert!(update.gender.is_none());
    }

    #[test]
    fn blank_name_is_rejected() {
        let req = ProfileRequest {
            name: Some("   ".into()),
            gender: None,
            college: None,
            student_no: None,
            phone: None,
        };
        assert!(matches!(req.validate(), Err(ApiError::Validation(_))));
    }
}
