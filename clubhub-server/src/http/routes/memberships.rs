//! Membership applications, review, roles and removal

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::Router;
use clubhub_core::{check_removal, check_role_change, ClubRole, MembershipStatus};
use serde::Deserialize;

use crate::audit::{self, ActionType};
use crate::db::{
    ClubRepo, MemberFilter, MemberWithUser, Membership, MembershipRepo, MembershipWithClub, NewLog,
    UserIdentity,
};
use crate::http::access::{caller_in, require_manager};
use crate::http::error::ApiError;
use crate::http::extractors::{CurrentUser, ValidJson, ValidPath, ValidQuery};
use crate::http::response::{ok, ApiResult};
use crate::http::server::AppState;
use crate::models::{Page, PageQuery};

#[derive(Deserialize, Default)]
pub struct StatusQuery {
    pub status: Option<MembershipStatus>,
}

#[derive(Deserialize, Default)]
pub struct MemberSearch {
    pub role: Option<ClubRole>,
    pub status: Option<MembershipStatus>,
    pub keyword: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct KeywordQuery {
    pub keyword: Option<String>,
}

#[derive(Deserialize)]
pub struct RoleRequest {
    pub role: ClubRole,
}

/// What an application does given the applicant's existing row.
#[derive(Debug, PartialEq, Eq)]
enum ApplyOutcome {
    Insert,
    Unchanged,
    Reopen(i64),
}

fn apply_outcome(existing: Option<&Membership>) -> Result<ApplyOutcome, ApiError> {
    match existing {
        None => Ok(ApplyOutcome::Insert),
        Some(m) if m.status == MembershipStatus::Pending => Ok(ApplyOutcome::Unchanged),
        Some(m) if m.status.can_reapply() => Ok(ApplyOutcome::Reopen(m.id)),
        Some(_) => Err(ApiError::bad_request("already a member of this club")),
    }
}

/// POST /student/clubs/{clubId}/apply
async fn apply(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
) -> ApiResult<Membership> {
    ClubRepo::new(&state.pool).get_approved(club_id).await?;

    let memberships = MembershipRepo::new(&state.pool);
    let existing = memberships.find(user.id, club_id).await?;
    let membership = match (apply_outcome(existing.as_ref())?, existing) {
        (ApplyOutcome::Unchanged, Some(m)) => m,
        (ApplyOutcome::Reopen(id), _) => {
            memberships
                .set_state(id, MembershipStatus::Pending, ClubRole::Member)
                .await?
        }
        _ => {
            memberships
                .insert(user.id, club_id, MembershipStatus::Pending, ClubRole::Member)
                .await?
        }
    };
    tracing::info!(club_id, user_id = user.id, "membership application submitted");
    ok(membership)
}

/// POST /student/clubs/{clubId}/exit
async fn exit(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
) -> ApiResult<Membership> {
    let memberships = MembershipRepo::new(&state.pool);
    let membership = memberships
        .find(user.id, club_id)
        .await?
        .filter(|m| matches!(m.status, MembershipStatus::Approved | MembershipStatus::Pending))
        .ok_or_else(|| ApiError::bad_request("not a member of this club"))?;

    if membership.role == ClubRole::Leader {
        return Err(ApiError::bad_request(
            "the club leader must hand over leadership before leaving",
        ));
    }

    let membership = memberships
        .set_state(membership.id, MembershipStatus::Quit, ClubRole::Member)
        .await?;
    tracing::info!(club_id, user_id = user.id, "left club");
    ok(membership)
}

/// GET /student/memberships/my
async fn my_memberships(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidQuery(query): ValidQuery<StatusQuery>,
) -> ApiResult<Vec<MembershipWithClub>> {
    ok(MembershipRepo::new(&state.pool)
        .list_for_user(user.id, query.status)
        .await?)
}

/// GET /leader/clubs/{clubId}/users
async fn club_leaders(
    State(state): State<Arc<AppState>>,
    ValidPath(club_id): ValidPath<i64>,
) -> ApiResult<Vec<MemberWithUser>> {
    ClubRepo::new(&state.pool).get(club_id).await?;
    ok(MembershipRepo::new(&state.pool).leaders(club_id).await?)
}

/// GET /leader/clubs/{clubId}/members/users
async fn club_members(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<MemberSearch>,
) -> ApiResult<Page<MemberWithUser>> {
    require_manager(&state.pool, &user, club_id).await?;
    let filter = MemberFilter {
        role: search.role,
        status: search.status,
        keyword: search.keyword,
    };
    ok(MembershipRepo::new(&state.pool)
        .list_for_club(club_id, &filter, page.into())
        .await?)
}

/// GET /leader/clubs/{clubId}/memberships
async fn pending_applications(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(club_id): ValidPath<i64>,
    ValidQuery(page): ValidQuery<PageQuery>,
    ValidQuery(search): ValidQuery<KeywordQuery>,
) -> ApiResult<Page<MemberWithUser>> {
    require_manager(&state.pool, &user, club_id).await?;
    let filter = MemberFilter {
        role: None,
        status: Some(MembershipStatus::Pending),
        keyword: search.keyword,
    };
    ok(MembershipRepo::new(&state.pool)
        .list_for_club(club_id, &filter, page.into())
        .await?)
}

async fn review(
    state: &AppState,
    user: &UserIdentity,
    club_id: i64,
    id: i64,
    verdict: MembershipStatus,
) -> ApiResult<Membership> {
    require_manager(&state.pool, user, club_id).await?;

    let memberships = MembershipRepo::new(&state.pool);
    let application = memberships.get(id).await?;
    if application.club_id != club_id {
        return Err(ApiError::NotFound {
            resource: "membership",
            id: id.to_string(),
        });
    }

    let membership = memberships.review(id, verdict).await?;
    tracing::info!(club_id, membership_id = id, %verdict, "application reviewed");
    audit::record(
        &state.pool,
        NewLog::by(
            user,
            ActionType::ReviewApplication,
            club_id,
            format!("{verdict} application {id} of user {}", membership.user_id),
        ),
    );
    ok(membership)
}

/// POST /leader/clubs/{clubId}/memberships/{id}/approve
async fn approve(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath((club_id, id)): ValidPath<(i64, i64)>,
) -> ApiResult<Membership> {
    review(&state, &user, club_id, id, MembershipStatus::Approved).await
}

/// POST /leader/clubs/{clubId}/memberships/{id}/reject
async fn reject(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath((club_id, id)): ValidPath<(i64, i64)>,
) -> ApiResult<Membership> {
    review(&state, &user, club_id, id, MembershipStatus::Rejected).await
}

/// Approved membership of `user_id` in `club_id`.
async fn approved_membership(state: &AppState, user_id: i64, club_id: i64) -> Result<Membership, ApiError> {
    MembershipRepo::new(&state.pool)
        .find(user_id, club_id)
        .await?
        .filter(|m| m.status == MembershipStatus::Approved)
        .ok_or_else(|| ApiError::bad_request("user is not an approved member of this club"))
}

/// Write `role`, going through the leader hand-over when appointing a leader.
async fn assign_role(state: &AppState, membership: &Membership, role: ClubRole) -> Result<Membership, ApiError> {
    let repo = MembershipRepo::new(&state.pool);
    let updated = if role == ClubRole::Leader {
        repo.appoint_leader(membership.id).await?
    } else {
        repo.set_role(membership.id, role).await?
    };
    Ok(updated)
}

/// PUT|POST /leader/clubs/{clubId}/members/{userId}/role
async fn change_role(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath((club_id, target)): ValidPath<(i64, i64)>,
    ValidJson(req): ValidJson<RoleRequest>,
) -> ApiResult<Membership> {
    let caller = caller_in(&state.pool, &user, club_id).await?;
    let membership = approved_membership(&state, target, club_id).await?;
    check_role_change(caller, membership.role, req.role, target == user.id)?;

    let updated = assign_role(&state, &membership, req.role).await?;
    tracing::info!(club_id, user_id = target, from = %membership.role, to = %req.role, "role changed");
    audit::record(
        &state.pool,
        NewLog::by(
            &user,
            ActionType::ChangeRole,
            club_id,
            format!("changed role of user {target} from {} to {}", membership.role, req.role),
        ),
    );
    ok(updated)
}

/// DELETE /leader/clubs/{clubId}/members/{userId}
async fn remove_member(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath((club_id, target)): ValidPath<(i64, i64)>,
) -> ApiResult<()> {
    let caller = caller_in(&state.pool, &user, club_id).await?;
    let membership = MembershipRepo::new(&state.pool)
        .find(target, club_id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "membership",
            id: format!("{target}@{club_id}"),
        })?;
    check_removal(caller, membership.role)?;

    MembershipRepo::new(&state.pool).delete(membership.id).await?;
    tracing::info!(club_id, user_id = target, "member removed");
    audit::record(
        &state.pool,
        NewLog::by(
            &user,
            ActionType::RemoveMember,
            club_id,
            format!("removed user {target} ({})", membership.role),
        ),
    );
    ok(())
}

/// POST /admin/memberships/{id}/role
async fn admin_set_role(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(req): ValidJson<RoleRequest>,
) -> ApiResult<Membership> {
    let membership = MembershipRepo::new(&state.pool).get(id).await?;
    if membership.status != MembershipStatus::Approved {
        return Err(ApiError::bad_request("only approved memberships can hold a role"));
    }

    let updated = assign_role(&state, &membership, req.role).await?;
    tracing::info!(membership_id = id, to = %req.role, "role set by administrator");
    audit::record(
        &state.pool,
        NewLog::by(
            &user,
            ActionType::ChangeRole,
            membership.club_id,
            format!("set role of user {} to {}", membership.user_id, req.role),
        ),
    );
    ok(updated)
}

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/student/clubs/{clubId}/apply", post(apply))
        .route("/student/clubs/{clubId}/exit", post(exit))
        .route("/student/memberships/my", get(my_memberships))
        .route("/leader/clubs/{clubId}/users", get(club_leaders))
        .route(
            "/leader/clubs/{clubId}/members/{userId}/role",
            post(change_role).put(change_role),
        )
        .route(
            "/leader/clubs/{clubId}/members/{userId}",
            delete(remove_member),
        )
        .route("/leader/clubs/{clubId}/members/users", get(club_members))
        .route("/leader/clubs/{clubId}/memberships", get(pending_applications))
        .route("/leader/clubs/{clubId}/memberships/{id}/approve", post(approve))
        .route("/leader/clubs/{clubId}/memberships/{id}/reject", post(reject))
}

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin/memberships/{id}/role", post(admin_set_role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn membership(status: MembershipStatus) -> Membership {
        Membership {
            id: 9,
            user_id: 2,
            club_id: 1,
            status,
            role: ClubRole::Member,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn first_application_inserts() {
        assert_eq!(apply_outcome(None).unwrap(), ApplyOutcome::Insert);
    }

    #[test]
    fn pending_application_is_left_alone() {
        let m = membership(MembershipStatus::Pending);
        assert_eq!(apply_outcome(Some(&m)).unwrap(), ApplyOutcome::Unchanged);
    }

    #[test]
    fn rejected_or_quit_reopens() {
        for status in [MembershipStatus::Rejected, MembershipStatus::Quit] {
            let m = membership(status);
            assert_eq!(apply_outcome(Some(&m)).unwrap(), ApplyOutcome::Reopen(9));
        }
    }

    #[test]
    fn approved_member_cannot_reapply() {
        let m = membership(MembershipStatus::Approved);
        assert!(matches!(apply_outcome(Some(&m)), Err(ApiError::BadRequest(_))));
    }
}
