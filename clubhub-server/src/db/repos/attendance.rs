//! Attendance sessions
//!
//! A row is open while `signout_at` is NULL. The partial unique index
//! `ux_attendances_open` keeps at most one open row per user and scope, where
//! the scope is an activity or, with `activity_id` NULL, the club itself.

use chrono::{DateTime, Utc};
use clubhub_core::SessionClose;
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::{on_unique, paged, ClubBrief, DbError, UserBrief, CLUB_BRIEF_COLUMNS, USER_BRIEF_COLUMNS};
use crate::models::{Page, Pagination};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Attendance {
    pub id: i64,
    pub user_id: i64,
    pub club_id: i64,
    pub activity_id: Option<i64>,
    pub signin_at: DateTime<Utc>,
    pub signout_at: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
    pub duration_hours: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attendance {
    pub fn is_open(&self) -> bool {
        self.signout_at.is_none()
    }
}

/// Attendance row joined with the member, the club and the activity subject
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AttendanceRecord {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub attendance: Attendance,
    #[sqlx(flatten)]
    pub user: UserBrief,
    #[sqlx(flatten)]
    pub club: ClubBrief,
    pub activity_subject: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttendanceFilter {
    pub club_id: Option<i64>,
    pub user_id: Option<i64>,
}

const COLUMNS: &str = "t.id, t.user_id, t.club_id, t.activity_id, t.signin_at, t.signout_at, \
     t.duration_minutes, t.duration_hours, t.created_at, t.updated_at";

const RETURNING: &str = "RETURNING id, user_id, club_id, activity_id, signin_at, signout_at, \
     duration_minutes, duration_hours, created_at, updated_at";

const SEARCH_FROM: &str = "FROM attendances t \
     JOIN users u ON u.id = t.user_id \
     JOIN clubs c ON c.id = t.club_id \
     LEFT JOIN activities a ON a.id = t.activity_id \
     WHERE 1 = 1";

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: AttendanceFilter) {
    if let Some(club_id) = filter.club_id {
        qb.push(" AND t.club_id = ").push_bind(club_id);
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND t.user_id = ").push_bind(user_id);
    }
}

pub struct AttendanceRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AttendanceRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Attendance, DbError> {
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM attendances t WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("attendance", id))
    }

    /// Open a session; a second open session in the same scope is a conflict.
    pub async fn open(
        &self,
        user_id: i64,
        club_id: i64,
        activity_id: Option<i64>,
    ) -> Result<Attendance, DbError> {
        let now = Utc::now();
        let attendance = sqlx::query_as(&format!(
            r#"
            INSERT INTO attendances (user_id, club_id, activity_id, signin_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            {RETURNING}
            "#
        ))
        .bind(user_id)
        .bind(club_id)
        .bind(activity_id)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(on_unique("already signed in"))?;
        Ok(attendance)
    }

    /// Most recent open session in the given scope.
    pub async fn latest_open(
        &self,
        user_id: i64,
        club_id: i64,
        activity_id: Option<i64>,
    ) -> Result<Option<Attendance>, DbError> {
        Ok(sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS} FROM attendances t
            WHERE t.user_id = ? AND t.club_id = ? AND t.activity_id IS ? AND t.signout_at IS NULL
            ORDER BY t.signin_at DESC, t.id DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(club_id)
        .bind(activity_id)
        .fetch_optional(self.pool)
        .await?)
    }

    /// Apply a close decision to an open row.
    ///
    /// Returns `None` when the session was discarded. A row that was closed
    /// in the meantime is a conflict.
    pub async fn close(
        &self,
        id: i64,
        outcome: SessionClose,
        now: DateTime<Utc>,
    ) -> Result<Option<Attendance>, DbError> {
        match outcome {
            SessionClose::Discard => {
                let result = sqlx::query("DELETE FROM attendances WHERE id = ? AND signout_at IS NULL")
                    .bind(id)
                    .execute(self.pool)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(DbError::Conflict("attendance is already signed out"));
                }
                Ok(None)
            }
            SessionClose::Complete { minutes, hours } => {
                let closed = sqlx::query_as(&format!(
                    r#"
                    UPDATE attendances
                    SET signout_at = ?, duration_minutes = ?, duration_hours = ?, updated_at = ?
                    WHERE id = ? AND signout_at IS NULL
                    {RETURNING}
                    "#
                ))
                .bind(now)
                .bind(minutes)
                .bind(hours)
                .bind(now)
                .bind(id)
                .fetch_optional(self.pool)
                .await?
                .ok_or(DbError::Conflict("attendance is already signed out"))?;
                Ok(Some(closed))
            }
        }
    }

    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM attendances WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("attendance", id));
        }
        Ok(())
    }

    /// Attendance rows, newest first, optionally narrowed to a club and/or user.
    pub async fn search(
        &self,
        filter: AttendanceFilter,
        page: Pagination,
    ) -> Result<Page<AttendanceRecord>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {COLUMNS}, {USER_BRIEF_COLUMNS}, {CLUB_BRIEF_COLUMNS}, \
             a.subject AS activity_subject, COUNT(*) OVER() AS total {SEARCH_FROM}"
        ));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY t.signin_at DESC, t.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(self.pool).await?;

        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT COUNT(*) {SEARCH_FROM}"));
        push_filters(&mut count, filter);
        paged(rows, page, count.build_query_scalar::<i64>().fetch_one(self.pool)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_memory_pool, run_migrations, ClubRepo, NewClub, UserRepo};
    use chrono::Duration;
    use clubhub_core::{close_session, force_close, SystemRole};

    async fn setup() -> (SqlitePool, i64, i64) {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let user = UserRepo::new(&pool)
            .create("amy", "h", "Amy", SystemRole::User)
            .await
            .unwrap()
            .id;
        let club = ClubRepo::new(&pool)
            .register(
                user,
                NewClub {
                    name: "Rowing".into(),
                    logo: String::new(),
                    intro: String::new(),
                    contact: String::new(),
                    category_id: None,
                },
            )
            .await
            .unwrap()
            .id;
        (pool, user, club)
    }

    #[tokio::test]
    async fn one_open_session_per_scope() {
        let (pool, user, club) = setup().await;
        let repo = AttendanceRepo::new(&pool);

        repo.open(user, club, None).await.unwrap();
        assert!(matches!(
            repo.open(user, club, None).await.unwrap_err(),
            DbError::Conflict("already signed in")
        ));
    }

    #[tokio::test]
    async fn short_session_is_discarded() {
        let (pool, user, club) = setup().await;
        let repo = AttendanceRepo::new(&pool);

        let open = repo.open(user, club, None).await.unwrap();
        let found = repo.latest_open(user, club, None).await.unwrap().unwrap();
        assert_eq!(found.id, open.id);

        let now = open.signin_at + Duration::seconds(30);
        let closed = repo.close(open.id, close_session(open.signin_at, now), now).await.unwrap();
        assert!(closed.is_none());
        assert!(repo.latest_open(user, club, None).await.unwrap().is_none());
        assert!(matches!(repo.get(open.id).await.unwrap_err(), DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn completed_session_stores_durations() {
        let (pool, user, club) = setup().await;
        let repo = AttendanceRepo::new(&pool);

        let open = repo.open(user, club, None).await.unwrap();
        let now = open.signin_at + Duration::minutes(90) + Duration::seconds(30);
        let closed = repo
            .close(open.id, close_session(open.signin_at, now), now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed.duration_minutes, 90);
        assert_eq!(closed.duration_hours, 1.51);
        assert!(!closed.is_open());

        // Closing twice is refused, even for a manager
        let err = repo
            .close(open.id, force_close(open.signin_at, now), now)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        // The scope is free again
        repo.open(user, club, None).await.unwrap();
    }

    #[tokio::test]
    async fn search_joins_user_and_club() {
        let (pool, user, club) = setup().await;
        let repo = AttendanceRepo::new(&pool);
        repo.open(user, club, None).await.unwrap();

        let filter = AttendanceFilter {
            user_id: Some(user),
            ..Default::default()
        };
        let page = repo.search(filter, Pagination::default()).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.list[0].user.name, "Amy");
        assert_eq!(page.list[0].club.name, "Rowing");
        assert!(page.list[0].activity_subject.is_none());

        let other = AttendanceFilter {
            club_id: Some(club + 1),
            ..Default::default()
        };
        assert!(repo.search(other, Pagination::default()).await.unwrap().list.is_empty());
    }
}
