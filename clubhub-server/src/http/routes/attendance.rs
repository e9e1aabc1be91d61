//! Attendance sign-in / sign-out and attendance records
//!
//! Members open and close their own sessions, either for an activity they
//! registered for or for the club itself. Managers can force a sign-out or
//! delete a row; both are audited.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::Utc;
use clubhub_core::{close_session, force_close};
use serde::Deserialize;

use crate::audit::{self, ActionType};
use crate::db::{
    ActivityRepo, Attendance, AttendanceFilter, AttendanceRecord, AttendanceRepo, NewLog,
    ParticipantRepo, UserIdentity,
};
use crate::http::access::{require_approved, require_manager};
use crate::http::error::ApiError;
use crate::http::extractors::{CurrentUser, ValidPath, ValidQuery};
use crate::http::response::{ok, ApiResult};
use crate::http::server::AppState;
use crate::models::{Page, PageQuery};

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClubQuery {
    pub club_id: Option<i64>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<i64>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSearch {
    pub club_id: Option<i64>,
    pub user_id: Option<i64>,
}

/// Close the caller's latest open session in the scope.
///
/// `None` means the session was too short and has been discarded.
async fn sign_out(
    state: &AppState,
    user: &UserIdentity,
    club_id: i64,
    activity_id: Option<i64>,
) -> Result<Option<Attendance>, ApiError> {
    let repo = AttendanceRepo::new(&state.pool);
    let open = repo
        .latest_open(user.id, club_id, activity_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("no open sign-in to close"))?;

    let now = Utc::now();
    let closed = repo.close(open.id, close_session(open.signin_at, now), now).await?;
    match &closed {
        Some(row) => tracing::info!(
            attendance_id = row.id,
            minutes = row.duration_minutes,
            "signed out"
        ),
        None => tracing::info!(attendance_id = open.id, "sign-out under one minute discarded"),
    }
    Ok(closed)
}

/// POST /member/activities/{activityId}/signin
async fn activity_sign_in(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(activity_id): ValidPath<i64>,
) -> ApiResult<Attendance> {
    let activity = ActivityRepo::new(&state.pool).get(activity_id).await?;
    require_approved(&state.pool, &user, activity.club_id).await?;

    let registered = ParticipantRepo::new(&state.pool)
        .registration(user.id, activity_id)
        .await?
        .registered;
    if !registered {
        return Err(ApiError::bad_request("register for the activity before signing in"));
    }

    let attendance = AttendanceRepo::new(&state.pool)
        .open(user.id, activity.club_id, Some(activity_id))
        .await?;
    tracing::info!(attendance_id = attendance.id, activity_id, "signed in to activity");
    ok(attendance)
}

/// POST /member/activities/{activityId}/signout
async fn activity_sign_out(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(activity_id): ValidPath<i64>,
) -> ApiResult<Option<Attendance>> {
    let activity = ActivityRepo::new(&state.pool).get(activity_id).await?;
    require_approved(&state.pool, &user, activity.club_id).await?;
    ok(sign_out(&state, &user, activity.club_id, Some(activity_id)).await?)
}

/// POST /member/clubs/{clubId}/signin
async fn club_sign_in(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
) -> ApiResult<Attendance> {
    require_approved(&state.pool, &user, club_id).await?;
    let attendance = AttendanceRepo::new(&state.pool).open(user.id, club_id, None).await?;
    tracing::info!(attendance_id = attendance.id, club_id, "signed in to club");
    ok(attendance)
}

/// POST /member/clubs/{clubId}/signout
async fn club_sign_out(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
) -> ApiResult<Option<Attendance>> {
    require_approved(&state.pool, &user, club_id).await?;
    ok(sign_out(&state, &user, club_id, None).await?)
}

/// GET /member/attendance/my
async fn my_attendance(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(query): ValidQuery<ClubQuery>,
) -> ApiResult<Page<AttendanceRecord>> {
    let filter = AttendanceFilter {
        club_id: query.club_id,
        user_id: Some(user.id),
    };
    ok(AttendanceRepo::new(&state.pool).search(filter, page.into()).await?)
}

/// GET /leader/clubs/{clubId}/attendance
async fn club_attendance(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(query): ValidQuery<UserQuery>,
) -> ApiResult<Page<AttendanceRecord>> {
    require_manager(&state.pool, &user, club_id).await?;
    let filter = AttendanceFilter {
        club_id: Some(club_id),
        user_id: query.user_id,
    };
    ok(AttendanceRepo::new(&state.pool).search(filter, page.into()).await?)
}

/// DELETE /leader/attendance/{id}
async fn delete_attendance(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<()> {
    let repo = AttendanceRepo::new(&state.pool);
    let row = repo.get(id).await?;
    require_manager(&state.pool, &user, row.club_id).await?;
    repo.delete(id).await?;

    audit::record(
        &state.pool,
        NewLog::by(
            &user,
            ActionType::ModifyAttendance,
            row.club_id,
            format!("deleted attendance {id} of user {}", row.user_id),
        ),
    );
    ok(())
}

/// POST /leader/attendance/{id}/signout
async fn force_sign_out(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<Attendance> {
    let repo = AttendanceRepo::new(&state.pool);
    let row = repo.get(id).await?;
    require_manager(&state.pool, &user, row.club_id).await?;
    if !row.is_open() {
        return Err(ApiError::bad_request("attendance is already signed out"));
    }

    let now = Utc::now();
    let closed = repo
        .close(id, force_close(row.signin_at, now), now)
        .await?
        .ok_or_else(|| ApiError::internal("forced sign-out discarded the session"))?;

    audit::record(
        &state.pool,
        NewLog::by(
            &user,
            ActionType::ModifyAttendance,
            row.club_id,
            format!(
                "forced sign-out of attendance {id} for user {} ({} min)",
                row.user_id, closed.duration_minutes
            ),
        ),
    );
    ok(closed)
}

/// GET /admin/attendance
async fn admin_attendance(
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<AttendanceSearch>,
) -> ApiResult<Page<AttendanceRecord>> {
    let filter = AttendanceFilter {
        club_id: search.club_id,
        user_id: search.user_id,
    };
    ok(AttendanceRepo::new(&state.pool).search(filter, page.into()).await?)
}

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/member/activities/{activityId}/signin", post(activity_sign_in))
        .route("/member/activities/{activityId}/signout", post(activity_sign_out))
        .route("/member/clubs/{clubId}/signin", post(club_sign_in))
        .route("/member/clubs/{clubId}/signout", post(club_sign_out))
        .route("/member/attendance/my", get(my_attendance))
        .route("/leader/clubs/{clubId}/attendance", get(club_attendance))
        .route("/leader/attendance/{id}", delete(delete_attendance))
        .route("/leader/attendance/{id}/signout", post(force_sign_out))
}

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin/attendance", get(admin_attendance))
}
