//! Club-scoped authorization for handlers

use clubhub_core::{Caller, RoleDenied};
use sqlx::SqlitePool;

use super::error::ApiError;
use crate::db::{MembershipRepo, UserIdentity};

/// Resolve what `user` may do in `club_id`. Only approved memberships count.
pub async fn caller_in(pool: &SqlitePool, user: &UserIdentity, club_id: i64) -> Result<Caller, ApiError> {
    if user.is_admin() {
        return Ok(Caller::Admin);
    }
    let role = MembershipRepo::new(pool).approved_role(user.id, club_id).await?;
    Ok(Caller::resolve(user.role, role))
}

/// Admin, or an approved leader/advisor of the club.
pub async fn require_manager(pool: &SqlitePool, user: &UserIdentity, club_id: i64) -> Result<Caller, ApiError> {
    let caller = caller_in(pool, user, club_id).await?;
    caller.require_manager()?;
    Ok(caller)
}

/// Admin, or any approved member of the club.
pub async fn require_member(pool: &SqlitePool, user: &UserIdentity, club_id: i64) -> Result<Caller, ApiError> {
    let caller = caller_in(pool, user, club_id).await?;
    if !caller.can_view_internal() {
        return Err(RoleDenied::NotMember.into());
    }
    Ok(caller)
}

/// An approved membership of the club, whatever the system role.
///
/// Self-service actions (registration, sign-in) need a real membership.
pub async fn require_approved(pool: &SqlitePool, user: &UserIdentity, club_id: i64) -> Result<(), ApiError> {
    MembershipRepo::new(pool)
        .approved_role(user.id, club_id)
        .await?
        .ok_or(RoleDenied::NotMember)?;
    Ok(())
}
