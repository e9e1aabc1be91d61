//! Club registration, profile edits and administration

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{delete, get, post, put};
use axum::Router;
use clubhub_core::ClubStatus;
use serde::Deserialize;

use crate::audit::{self, ActionType};
use crate::db::{Club, ClubFilter, ClubRepo, ClubSummary, ClubUpdate, ManagedClub, NewClub, NewLog, UserRepo};
use crate::http::access::require_manager;
use crate::http::error::ApiError;
use crate::http::extractors::{CurrentUser, ValidJson, ValidPath, ValidQuery};
use crate::http::response::{ok, ApiResult};
use crate::http::server::AppState;
use crate::models::{optional_text, required_text, Page, PageQuery, ValidationError};

const MAX_NAME: usize = 64;
const MAX_LOGO: usize = 255;
const MAX_INTRO: usize = 2000;
const MAX_CONTACT: usize = 128;

#[derive(Deserialize)]
pub struct RegisterClubRequest {
    pub name: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub intro: String,
    #[serde(default)]
    pub contact: String,
    pub category_id: Option<i64>,
}

impl RegisterClubRequest {
    fn validate(self) -> Result<NewClub, ValidationError> {
        Ok(NewClub {
            name: required_text("name", &self.name, MAX_NAME)?,
            logo: optional_text("logo", &self.logo, MAX_LOGO)?,
            intro: optional_text("intro", &self.intro, MAX_INTRO)?,
            contact: optional_text("contact", &self.contact, MAX_CONTACT)?,
            category_id: self.category_id,
        })
    }
}

#[derive(Deserialize)]
pub struct UpdateClubRequest {
    pub name: Option<String>,
    pub logo: Option<String>,
    pub intro: Option<String>,
    pub contact: Option<String>,
    pub category_id: Option<i64>,
}

impl UpdateClubRequest {
    fn validate(self) -> Result<ClubUpdate, ValidationError> {
        let text = |field, value: Option<String>, max| {
            value.map(|v| optional_text(field, &v, max)).transpose()
        };
        Ok(ClubUpdate {
            name: self.name.map(|v| required_text("name", &v, MAX_NAME)).transpose()?,
            logo: text("logo", self.logo, MAX_LOGO)?,
            intro: text("intro", self.intro, MAX_INTRO)?,
            contact: text("contact", self.contact, MAX_CONTACT)?,
            category_id: self.category_id,
        })
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdminClubSearch {
    pub status: Option<ClubStatus>,
    pub category_id: Option<i64>,
    pub keyword: Option<String>,
}

/// POST /student/clubs
async fn register_club(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidJson(req): ValidJson<RegisterClubRequest>,
) -> ApiResult<Club> {
    let club = ClubRepo::new(&state.pool).register(user.id, req.validate()?).await?;
    tracing::info!(club_id = club.id, applicant = user.id, "club registration submitted");
    ok(club)
}

/// GET /leader/clubs
async fn my_managed_clubs(State(state): State<Arc<AppState>>, user: CurrentUser) -> ApiResult<Vec<ManagedClub>> {
    let clubs = ClubRepo::new(&state.pool);
    if user.is_admin() {
        return ok(clubs.all_as_admin().await?);
    }
    ok(clubs.managed_by(user.id).await?)
}

/// GET /leader/users/{userId}/clubs
async fn user_managed_clubs(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(target): ValidPath<i64>,
) -> ApiResult<Vec<ManagedClub>> {
    if target != user.id && !user.is_admin() {
        return Err(ApiError::forbidden("can only list your own clubs"));
    }
    let identity = UserRepo::new(&state.pool)
        .identity(target)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "user",
            id: target.to_string(),
        })?;

    let clubs = ClubRepo::new(&state.pool);
    if identity.is_admin() {
        return ok(clubs.all_as_admin().await?);
    }
    ok(clubs.managed_by(target).await?)
}

/// PUT /leader/clubs/{clubId}
async fn update_club(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
    ValidJson(req): ValidJson<UpdateClubRequest>,
) -> ApiResult<Club> {
    require_manager(&state.pool, &user, club_id).await?;
    let club = ClubRepo::new(&state.pool).update(club_id, req.validate()?).await?;

    audit::record(
        &state.pool,
        NewLog::by(&user, ActionType::ManageClub, club_id, format!("updated profile of club {}", club.name)),
    );
    ok(club)
}

/// GET /admin/clubs
async fn admin_list_clubs(
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<AdminClubSearch>,
) -> ApiResult<Page<ClubSummary>> {
    let filter = ClubFilter {
        status: search.status,
        category_id: search.category_id,
        keyword: search.keyword,
    };
    ok(ClubRepo::new(&state.pool).list(&filter, page.into()).await?)
}

async fn review(state: &AppState, user: &CurrentUser, club_id: i64, approve: bool) -> ApiResult<Club> {
    let club = ClubRepo::new(&state.pool).review(club_id, approve).await?;
    let verdict = if approve { "approved" } else { "rejected" };
    tracing::info!(club_id, verdict, "club reviewed");

    audit::record(
        &state.pool,
        NewLog::by(user, ActionType::ManageClub, club_id, format!("{} club {}", verdict, club.name)),
    );
    ok(club)
}

/// POST /admin/clubs/{clubId}/approve
async fn approve_club(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
) -> ApiResult<Club> {
    review(&state, &user, club_id, true).await
}

/// POST /admin/clubs/{clubId}/reject
async fn reject_club(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
) -> ApiResult<Club> {
    review(&state, &user, club_id, false).await
}

/// DELETE /admin/clubs/{clubId}
async fn dissolve_club(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
) -> ApiResult<()> {
    let repo = ClubRepo::new(&state.pool);
    let club = repo.get(club_id).await?;
    repo.dissolve(club_id).await?;
    tracing::info!(club_id, "club dissolved");

    // Logged under club 0: the club-scoped log view is unreachable once the club is gone
    audit::record(
        &state.pool,
        NewLog::by(&user, ActionType::ManageClub, 0, format!("dissolved club {} ({})", club.name, club_id)),
    );
    ok(())
}

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/student/clubs", post(register_club))
        .route("/leader/clubs", get(my_managed_clubs))
        .route("/leader/users/{userId}/clubs", get(user_managed_clubs))
        .route("/leader/clubs/{clubId}", put(update_club))
}

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/clubs", get(admin_list_clubs))
        .route("/admin/clubs/{clubId}/approve", post(approve_club))
        .route("/admin/clubs/{clubId}/reject", post(reject_club))
        .route("/admin/clubs/{clubId}", delete(dissolve_club))
}
