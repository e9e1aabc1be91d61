//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Uses JOINs for list operations (no N+1)
//! - Relies on UNIQUE / FOREIGN KEY constraints and maps violations to
//!   `DbError::Conflict` (no check-then-insert)
//! - Uses transactions for multi-step operations

pub mod activities;
pub mod announcements;
pub mod attendance;
pub mod categories;
pub mod clubs;
pub mod logs;
pub mod memberships;
pub mod participants;
pub mod users;

use std::future::Future;

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::models::{Page, Pagination};

pub use activities::{Activity, ActivityFilter, ActivityInput, ActivityRepo, ActivityWithClub};
pub use announcements::{
    Announcement, AnnouncementFilter, AnnouncementInput, AnnouncementRepo, AnnouncementWithClub,
};
pub use attendance::{Attendance, AttendanceFilter, AttendanceRecord, AttendanceRepo};
pub use categories::{Category, CategoryRepo};
pub use clubs::{Club, ClubDetail, ClubFilter, ClubRepo, ClubSummary, ClubUpdate, ManagedClub, NewClub};
pub use logs::{LogFilter, LogRepo, NewLog, OperationLog};
pub use memberships::{
    MemberFilter, MemberWithUser, Membership, MembershipRepo, MembershipWithClub,
};
pub use participants::{Participant, ParticipantRepo, ParticipantWithUser, Registration};
pub use users::{ProfileUpdate, User, UserIdentity, UserRepo};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    /// A constraint or state rule rejected the write
    #[error("{0}")]
    Conflict(&'static str),
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

/// Map a UNIQUE violation to `Conflict(reason)`, passing other errors through.
pub(crate) fn on_unique(reason: &'static str) -> impl FnOnce(sqlx::Error) -> DbError {
    move |e| match e.as_database_error() {
        Some(db) if db.is_unique_violation() => DbError::Conflict(reason),
        _ => DbError::Sqlx(e),
    }
}

/// Map a FOREIGN KEY violation to `Conflict(reason)`.
pub(crate) fn on_foreign_key(reason: &'static str) -> impl FnOnce(sqlx::Error) -> DbError {
    move |e| match e.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => DbError::Conflict(reason),
        _ => DbError::Sqlx(e),
    }
}

/// Build a page from rows carrying a `COUNT(*) OVER() AS total` column.
///
/// A page past the end has no row to carry the window count; `count` is only
/// awaited then, and should run `COUNT(*)` over the same filters.
pub(crate) async fn paged<T, C>(rows: Vec<SqliteRow>, page: Pagination, count: C) -> Result<Page<T>, DbError>
where
    T: for<'r> FromRow<'r, SqliteRow>,
    C: Future<Output = Result<i64, sqlx::Error>>,
{
    let total = match rows.first() {
        Some(row) => row.try_get::<i64, _>("total")?,
        None if page.offset() > 0 => count.await?,
        None => 0,
    };
    let list = rows
        .iter()
        .map(T::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(page.wrap(list, total))
}

/// `%keyword%` for LIKE filters; `None` for blank input.
pub(crate) fn like_pattern(keyword: Option<&str>) -> Option<String> {
    keyword
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| format!("%{}%", k))
}

/// Minimal user projection embedded in joined rows.
///
/// Reads the `user_*` columns of the enclosing query.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserBrief {
    #[sqlx(rename = "user_id")]
    pub id: i64,
    #[sqlx(rename = "user_account")]
    pub account: String,
    #[sqlx(rename = "user_name")]
    pub name: String,
    #[sqlx(rename = "user_student_no")]
    pub student_no: String,
    #[sqlx(rename = "user_phone")]
    pub phone: String,
    #[sqlx(rename = "user_college")]
    pub college: String,
}

/// Select list matching [`UserBrief`] for a `users` table aliased `u`.
pub(crate) const USER_BRIEF_COLUMNS: &str = "u.account AS user_account, u.name AS user_name, \
     u.student_no AS user_student_no, u.phone AS user_phone, u.college AS user_college";

/// Minimal club projection embedded in joined rows (`club_*` columns).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClubBrief {
    #[sqlx(rename = "club_id")]
    pub id: i64,
    #[sqlx(rename = "club_name")]
    pub name: String,
    #[sqlx(rename = "club_logo")]
    pub logo: String,
}

/// Select list matching [`ClubBrief`] for a `clubs` table aliased `c`.
pub(crate) const CLUB_BRIEF_COLUMNS: &str = "c.name AS club_name, c.logo AS club_logo";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_skips_blank() {
        assert_eq!(like_pattern(None), None);
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(Some(" chess ")), Some("%chess%".to_string()));
    }

    #[test]
    fn not_found_display() {
        let err = DbError::not_found("club", 7);
        assert_eq!(err.to_string(), "not found: club '7'");
    }
}
