//! Activity registration for approved club members

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Router;

use crate::db::{Activity, ActivityRepo, Participant, ParticipantRepo, Registration, UserIdentity};
use crate::http::access::require_approved;
use crate::http::error::ApiError;
use crate::http::extractors::{CurrentUser, ValidPath};
use crate::http::response::{ok, ApiResult};
use crate::http::server::AppState;

/// Load the activity and check the caller is an approved member of its club.
async fn member_activity(state: &AppState, user: &UserIdentity, activity_id: i64) -> Result<Activity, ApiError> {
    let activity = ActivityRepo::new(&state.pool).get(activity_id).await?;
    require_approved(&state.pool, user, activity.club_id).await?;
    Ok(activity)
}

/// POST /member/activities/{activityId}/register
async fn register(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(activity_id): ValidPath<i64>,
) -> ApiResult<Participant> {
    let activity = member_activity(&state, &user, activity_id).await?;
    let participant = ParticipantRepo::new(&state.pool).register(user.id, &activity).await?;
    tracing::info!(activity_id, user_id = user.id, "registered for activity");
    ok(participant)
}

/// GET /member/activities/{activityId}/register
async fn status(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(activity_id): ValidPath<i64>,
) -> ApiResult<Registration> {
    member_activity(&state, &user, activity_id).await?;
    ok(ParticipantRepo::new(&state.pool)
        .registration(user.id, activity_id)
        .await?)
}

/// DELETE /member/activities/{activityId}/register
async fn cancel(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(activity_id): ValidPath<i64>,
) -> ApiResult<Participant> {
    member_activity(&state, &user, activity_id).await?;
    let participant = ParticipantRepo::new(&state.pool).cancel(user.id, activity_id).await?;
    tracing::info!(activity_id, user_id = user.id, "registration cancelled");
    ok(participant)
}

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/member/activities/{activityId}/register",
        post(register).get(status).delete(cancel),
    )
}
