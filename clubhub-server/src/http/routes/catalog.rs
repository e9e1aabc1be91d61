//! Public catalog: approved clubs, public content and categories

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::NaiveDate;
use clubhub_core::ClubStatus;
use serde::Deserialize;

use crate::db::{
    ActivityFilter, ActivityRepo, ActivityWithClub, AnnouncementFilter, AnnouncementRepo,
    AnnouncementWithClub, Category, CategoryRepo, ClubDetail, ClubFilter, ClubRepo, ClubSummary,
    MembershipRepo,
};
use crate::http::extractors::{ValidJson, ValidPath, ValidQuery};
use crate::http::response::{ok, ApiResult};
use crate::http::server::AppState;
use crate::models::{required_text, Page, PageQuery};

/// Public activities shown on a club page
const RECENT_ACTIVITIES: i64 = 5;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClubSearch {
    pub category_id: Option<i64>,
    pub keyword: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementSearch {
    pub club_id: Option<i64>,
    pub keyword: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySearch {
    pub club_id: Option<i64>,
    pub keyword: Option<String>,
    /// `YYYY-MM-DD`
    pub start: Option<NaiveDate>,
    /// `YYYY-MM-DD`, inclusive
    pub end: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

/// GET /public/clubs
async fn list_clubs(
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<ClubSearch>,
) -> ApiResult<Page<ClubSummary>> {
    let filter = ClubFilter {
        status: Some(ClubStatus::Approved),
        category_id: search.category_id,
        keyword: search.keyword,
    };
    ok(ClubRepo::new(&state.pool).list(&filter, page.into()).await?)
}

/// GET /public/clubs/{clubId}
async fn club_detail(
    State(state): State<Arc<AppState>>,
    ValidPath(club_id): ValidPath<i64>,
) -> ApiResult<ClubDetail> {
    let clubs = ClubRepo::new(&state.pool);
    let club = clubs.get_approved(club_id).await?;
    let leaders = MembershipRepo::new(&state.pool).leaders(club_id).await?;
    let activities = ActivityRepo::new(&state.pool)
        .recent_public(club_id, RECENT_ACTIVITIES)
        .await?;
    let (member_count, history_member_count) = clubs.member_counts(club_id).await?;

    ok(ClubDetail {
        club,
        leaders,
        activities,
        member_count,
        history_member_count,
    })
}

/// GET /public/announcements
async fn list_announcements(
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<AnnouncementSearch>,
) -> ApiResult<Page<AnnouncementWithClub>> {
    let filter = AnnouncementFilter {
        club_id: search.club_id,
        keyword: search.keyword,
        public_only: true,
    };
    ok(AnnouncementRepo::new(&state.pool).list(&filter, page.into()).await?)
}

/// GET /public/activities
async fn list_activities(
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<ActivitySearch>,
) -> ApiResult<Page<ActivityWithClub>> {
    let filter = ActivityFilter {
        club_id: search.club_id,
        keyword: search.keyword,
        start: search.start,
        end: search.end,
        public_only: true,
    };
    ok(ActivityRepo::new(&state.pool).list(&filter, page.into()).await?)
}

/// GET /public/activities/{activityId}
async fn activity_detail(
    State(state): State<Arc<AppState>>,
    ValidPath(activity_id): ValidPath<i64>,
) -> ApiResult<ActivityWithClub> {
    ok(ActivityRepo::new(&state.pool).get_public(activity_id).await?)
}

/// GET /public/categories
async fn list_categories(
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<PageQuery>,
) -> ApiResult<Page<Category>> {
    ok(CategoryRepo::new(&state.pool).list(page.into()).await?)
}

/// POST /admin/categories
async fn create_category(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<CategoryRequest>,
) -> ApiResult<Category> {
    let name = required_text("name", &req.name, 32)?;
    let category = CategoryRepo::new(&state.pool).create(&name).await?;
    tracing::info!(category_id = category.id, "created category");
    ok(category)
}

/// DELETE /admin/categories/{id}
async fn delete_category(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<()> {
    CategoryRepo::new(&state.pool).delete(id).await?;
    tracing::info!(category_id = id, "deleted category");
    ok(())
}

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/public/clubs", get(list_clubs))
        .route("/public/clubs/{clubId}", get(club_detail))
        .route("/public/announcements", get(list_announcements))
        .route("/public/activities", get(list_activities))
        .route("/public/activities/{activityId}", get(activity_detail))
        .route("/public/categories", get(list_categories))
}

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/categories", post(create_category))
        .route("/admin/categories/{id}", delete(delete_category))
}
