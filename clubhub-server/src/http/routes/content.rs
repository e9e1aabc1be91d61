//! Club announcements and activities: member views and manager CRUD

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, put};
use axum::Router;
use chrono::{DateTime, NaiveDate, Utc};
use clubhub_core::Scope;
use serde::Deserialize;

use crate::audit::{self, ActionType};
use crate::db::{
    Activity, ActivityFilter, ActivityInput, ActivityRepo, ActivityWithClub, Announcement,
    AnnouncementFilter, AnnouncementInput, AnnouncementRepo, AnnouncementWithClub, DbError, NewLog,
    ParticipantRepo, ParticipantWithUser,
};
use crate::http::access::{require_manager, require_member};
use crate::http::extractors::{CurrentUser, ValidJson, ValidPath, ValidQuery};
use crate::http::response::{ok, ApiResult};
use crate::http::server::AppState;
use crate::models::{optional_text, required_text, Page, PageQuery, ValidationError};

#[derive(Deserialize, Default)]
pub struct KeywordQuery {
    pub keyword: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ActivitySearch {
    pub keyword: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct AnnouncementRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub scope: Scope,
}

impl AnnouncementRequest {
    fn validate(self) -> Result<AnnouncementInput, ValidationError> {
        Ok(AnnouncementInput {
            title: required_text("title", &self.title, 128)?,
            content: optional_text("content", &self.content, 10_000)?,
            scope: self.scope,
        })
    }
}

#[derive(Deserialize)]
pub struct ActivityRequest {
    pub subject: String,
    #[serde(default, rename = "time")]
    pub time_label: String,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub content: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_participants: i64,
    pub publish_at: Option<DateTime<Utc>>,
}

impl ActivityRequest {
    fn validate(self) -> Result<ActivityInput, ValidationError> {
        if let (Some(start), Some(end)) = (self.start_at, self.end_at) {
            if end < start {
                return Err(ValidationError::OutOfRange {
                    field: "end_at",
                    reason: "must not be before start_at",
                });
            }
        }
        if self.max_participants < 0 {
            return Err(ValidationError::OutOfRange {
                field: "max_participants",
                reason: "must be 0 (unlimited) or more",
            });
        }
        Ok(ActivityInput {
            subject: required_text("subject", &self.subject, 128)?,
            time_label: optional_text("time", &self.time_label, 128)?,
            place: optional_text("place", &self.place, 128)?,
            target: optional_text("target", &self.target, 128)?,
            scope: self.scope,
            content: optional_text("content", &self.content, 10_000)?,
            start_at: self.start_at,
            end_at: self.end_at,
            max_participants: self.max_participants,
            publish_at: self.publish_at,
        })
    }
}

/// Every announcement of the club, internal ones included.
async fn club_announcements(
    state: &AppState,
    club_id: i64,
    page: PageQuery,
    keyword: Option<String>,
) -> ApiResult<Page<AnnouncementWithClub>> {
    let filter = AnnouncementFilter {
        club_id: Some(club_id),
        keyword,
        public_only: false,
    };
    ok(AnnouncementRepo::new(&state.pool).list(&filter, page.into()).await?)
}

/// Every activity of the club, internal ones included.
async fn club_activities(
    state: &AppState,
    club_id: i64,
    page: PageQuery,
    search: ActivitySearch,
) -> ApiResult<Page<ActivityWithClub>> {
    let filter = ActivityFilter {
        club_id: Some(club_id),
        keyword: search.keyword,
        start: search.start,
        end: search.end,
        public_only: false,
    };
    ok(ActivityRepo::new(&state.pool).list(&filter, page.into()).await?)
}

/// GET /member/clubs/{clubId}/announcements
async fn member_announcements(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<KeywordQuery>,
) -> ApiResult<Page<AnnouncementWithClub>> {
    require_member(&state.pool, &user, club_id).await?;
    club_announcements(&state, club_id, page, search.keyword).await
}

/// GET /member/clubs/{clubId}/activities
async fn member_activities(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<ActivitySearch>,
) -> ApiResult<Page<ActivityWithClub>> {
    require_member(&state.pool, &user, club_id).await?;
    club_activities(&state, club_id, page, search).await
}

/// GET /leader/clubs/{clubId}/announcements
async fn leader_announcements(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<KeywordQuery>,
) -> ApiResult<Page<AnnouncementWithClub>> {
    require_manager(&state.pool, &user, club_id).await?;
    club_announcements(&state, club_id, page, search.keyword).await
}

/// POST /leader/clubs/{clubId}/announcements
async fn create_announcement(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
    ValidJson(req): ValidJson<AnnouncementRequest>,
) -> ApiResult<Announcement> {
    require_manager(&state.pool, &user, club_id).await?;
    let announcement = AnnouncementRepo::new(&state.pool)
        .create(club_id, req.validate()?)
        .await?;

    audit::record(
        &state.pool,
        NewLog::by(
            &user,
            ActionType::PublishAnnouncement,
            club_id,
            format!("published announcement {}", announcement.title),
        ),
    );
    ok(announcement)
}

/// PUT /leader/clubs/{clubId}/announcements/{id}
async fn update_announcement(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath((club_id, id)): ValidPath<(i64, i64)>,
    ValidJson(req): ValidJson<AnnouncementRequest>,
) -> ApiResult<Announcement> {
    require_manager(&state.pool, &user, club_id).await?;
    let announcement = AnnouncementRepo::new(&state.pool)
        .update(club_id, id, req.validate()?)
        .await?;

    audit::record(
        &state.pool,
        NewLog::by(
            &user,
            ActionType::PublishAnnouncement,
            club_id,
            format!("edited announcement {}", announcement.title),
        ),
    );
    ok(announcement)
}

/// DELETE /leader/clubs/{clubId}/announcements/{id}
async fn delete_announcement(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath((club_id, id)): ValidPath<(i64, i64)>,
) -> ApiResult<()> {
    require_manager(&state.pool, &user, club_id).await?;
    AnnouncementRepo::new(&state.pool).delete(club_id, id).await?;

    audit::record(
        &state.pool,
        NewLog::by(&user, ActionType::PublishAnnouncement, club_id, format!("deleted announcement {id}")),
    );
    ok(())
}

/// GET /leader/clubs/{clubId}/activities
async fn leader_activities(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<ActivitySearch>,
) -> ApiResult<Page<ActivityWithClub>> {
    require_manager(&state.pool, &user, club_id).await?;
    club_activities(&state, club_id, page, search).await
}

/// POST /leader/clubs/{clubId}/activities
async fn create_activity(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
    ValidJson(req): ValidJson<ActivityRequest>,
) -> ApiResult<Activity> {
    require_manager(&state.pool, &user, club_id).await?;
    let activity = ActivityRepo::new(&state.pool)
        .create(club_id, req.validate()?)
        .await?;
    tracing::info!(club_id, activity_id = activity.id, "activity created");

    audit::record(
        &state.pool,
        NewLog::by(&user, ActionType::ManageActivity, club_id, format!("created activity {}", activity.subject)),
    );
    ok(activity)
}

/// PUT /leader/clubs/{clubId}/activities/{id}
async fn update_activity(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath((club_id, id)): ValidPath<(i64, i64)>,
    ValidJson(req): ValidJson<ActivityRequest>,
) -> ApiResult<Activity> {
    require_manager(&state.pool, &user, club_id).await?;
    let activity = ActivityRepo::new(&state.pool)
        .update(club_id, id, req.validate()?)
        .await?;

    audit::record(
        &state.pool,
        NewLog::by(&user, ActionType::ManageActivity, club_id, format!("edited activity {}", activity.subject)),
    );
    ok(activity)
}

/// DELETE /leader/clubs/{clubId}/activities/{id}
async fn delete_activity(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath((club_id, id)): ValidPath<(i64, i64)>,
) -> ApiResult<()> {
    require_manager(&state.pool, &user, club_id).await?;
    ActivityRepo::new(&state.pool).delete(club_id, id).await?;
    tracing::info!(club_id, activity_id = id, "activity deleted");

    audit::record(
        &state.pool,
        NewLog::by(&user, ActionType::ManageActivity, club_id, format!("deleted activity {id}")),
    );
    ok(())
}

/// GET /leader/clubs/{clubId}/activities/{id}/participants
async fn participants(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath((club_id, id)): ValidPath<(i64, i64)>,
    ValidQuery(page): ValidQuery<PageQuery>,
) -> ApiResult<Page<ParticipantWithUser>> {
    require_manager(&state.pool, &user, club_id).await?;
    let activity = ActivityRepo::new(&state.pool).get(id).await?;
    if activity.club_id != club_id {
        return Err(DbError::not_found("activity", id).into());
    }
    ok(ParticipantRepo::new(&state.pool)
        .list_for_activity(id, page.into())
        .await?)
}

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/member/clubs/{clubId}/announcements", get(member_announcements))
        .route("/member/clubs/{clubId}/activities", get(member_activities))
        .route(
            "/leader/clubs/{clubId}/announcements",
            get(leader_announcements).post(create_announcement),
        )
        .route(
            "/leader/clubs/{clubId}/announcements/{id}",
            put(update_announcement).delete(delete_announcement),
        )
        .route(
            "/leader/clubs/{clubId}/activities",
            get(leader_activities).post(create_activity),
        )
        .route(
            "/leader/clubs/{clubId}/activities/{id}",
            put(update_activity).delete(delete_activity),
        )
        .route("/leader/clubs/{clubId}/activities/{id}/participants", get(participants))
}
