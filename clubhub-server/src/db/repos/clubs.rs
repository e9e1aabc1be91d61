//! Clubs: registration, review, profile edits and dissolution

use chrono::{DateTime, Utc};
use clubhub_core::{ClubRole, ClubStatus, MembershipStatus};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::{like_pattern, on_unique, paged, Activity, DbError, MemberWithUser};
use crate::models::{Page, Pagination};

/// Club record with its category name
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Club {
    pub id: i64,
    pub name: String,
    pub logo: String,
    pub intro: String,
    pub contact: String,
    pub category_id: Option<i64>,
    pub category: Option<String>,
    pub status: ClubStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Club row for list pages
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClubSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub club: Club,
    pub leader_name: Option<String>,
    pub leader_phone: Option<String>,
    pub member_count: i64,
}

/// Public club page
#[derive(Debug, Clone, Serialize)]
pub struct ClubDetail {
    #[serde(flatten)]
    pub club: Club,
    pub leaders: Vec<MemberWithUser>,
    pub activities: Vec<Activity>,
    pub member_count: i64,
    /// Distinct users who were ever approved, including those who quit
    pub history_member_count: i64,
}

/// Club plus the caller's role in it (`admin` for administrators)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ManagedClub {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub club: Club,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct NewClub {
    pub name: String,
    pub logo: String,
    pub intro: String,
    pub contact: String,
    pub category_id: Option<i64>,
}

/// Editable club fields; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct ClubUpdate {
    pub name: Option<String>,
    pub logo: Option<String>,
    pub intro: Option<String>,
    pub contact: Option<String>,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ClubFilter {
    pub status: Option<ClubStatus>,
    pub category_id: Option<i64>,
    pub keyword: Option<String>,
}

const CLUB_COLUMNS: &str = "c.id, c.name, c.logo, c.intro, c.contact, c.category_id, \
     cc.name AS category, c.status, c.created_at, c.updated_at";

const CLUB_FROM: &str = "FROM clubs c LEFT JOIN club_categories cc ON cc.id = c.category_id";

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ClubFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND c.status = ").push_bind(status);
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND c.category_id = ").push_bind(category_id);
    }
    if let Some(like) = like_pattern(filter.keyword.as_deref()) {
        qb.push(" AND (c.name LIKE ")
            .push_bind(like.clone())
            .push(" OR c.intro LIKE ")
            .push_bind(like)
            .push(")");
    }
}

pub struct ClubRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ClubRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a pending club with `applicant` as its pending leader.
    pub async fn register(&self, applicant: i64, club: NewClub) -> Result<Club, DbError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let (club_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO clubs (name, logo, intro, contact, category_id, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&club.name)
        .bind(&club.logo)
        .bind(&club.intro)
        .bind(&club.contact)
        .bind(club.category_id)
        .bind(ClubStatus::Pending)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(club_write_error)?;

        sqlx::query(
            r#"
            INSERT INTO memberships (user_id, club_id, status, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(applicant)
        .bind(club_id)
        .bind(MembershipStatus::Pending)
        .bind(ClubRole::Leader)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get(club_id).await
    }

    pub async fn get(&self, id: i64) -> Result<Club, DbError> {
        sqlx::query_as(&format!("SELECT {CLUB_COLUMNS} {CLUB_FROM} WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("club", id))
    }

    /// Like [`get`](Self::get), but pending and rejected clubs are not found.
    pub async fn get_approved(&self, id: i64) -> Result<Club, DbError> {
        let club = self.get(id).await?;
        if club.status != ClubStatus::Approved {
            return Err(DbError::not_found("club", id));
        }
        Ok(club)
    }

    /// Club list with leader contact and member count.
    pub async fn list(&self, filter: &ClubFilter, page: Pagination) -> Result<Page<ClubSummary>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            r#"
            SELECT {CLUB_COLUMNS},
                (SELECT u.name FROM memberships m JOIN users u ON u.id = m.user_id
                  WHERE m.club_id = c.id AND m.role = 'leader' ORDER BY m.id LIMIT 1) AS leader_name,
                (SELECT u.phone FROM memberships m JOIN users u ON u.id = m.user_id
                  WHERE m.club_id = c.id AND m.role = 'leader' ORDER BY m.id LIMIT 1) AS leader_phone,
                (SELECT COUNT(*) FROM memberships m
                  WHERE m.club_id = c.id AND m.status = 'approved') AS member_count,
                COUNT(*) OVER() AS total
            {CLUB_FROM}
            WHERE 1 = 1
            "#
        ));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY c.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(self.pool).await?;

        let mut count: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT COUNT(*) {CLUB_FROM} WHERE 1 = 1"));
        push_filters(&mut count, filter);
        paged(rows, page, count.build_query_scalar::<i64>().fetch_one(self.pool)).await
    }

    /// Clubs where `user_id` is an approved leader or advisor.
    pub async fn managed_by(&self, user_id: i64) -> Result<Vec<ManagedClub>, DbError> {
        Ok(sqlx::query_as(&format!(
            r#"
            SELECT {CLUB_COLUMNS}, m.role AS role
            {CLUB_FROM}
            JOIN memberships m ON m.club_id = c.id
            WHERE m.user_id = ? AND m.status = 'approved' AND m.role IN ('leader', 'advisor')
            ORDER BY c.id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?)
    }

    /// Every club, tagged with the `admin` role.
    pub async fn all_as_admin(&self) -> Result<Vec<ManagedClub>, DbError> {
        Ok(sqlx::query_as(&format!(
            "SELECT {CLUB_COLUMNS}, 'admin' AS role {CLUB_FROM} ORDER BY c.id DESC"
        ))
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn update(&self, id: i64, update: ClubUpdate) -> Result<Club, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE clubs SET
                name = COALESCE(?, name),
                logo = COALESCE(?, logo),
                intro = COALESCE(?, intro),
                contact = COALESCE(?, contact),
                category_id = COALESCE(?, category_id),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.name)
        .bind(update.logo)
        .bind(update.intro)
        .bind(update.contact)
        .bind(update.category_id)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(club_write_error)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("club", id));
        }
        self.get(id).await
    }

    /// Approve or reject a pending club together with its applicant's
    /// leader membership.
    pub async fn review(&self, id: i64, approve: bool) -> Result<Club, DbError> {
        let (club_status, membership_status) = if approve {
            (ClubStatus::Approved, MembershipStatus::Approved)
        } else {
            (ClubStatus::Rejected, MembershipStatus::Rejected)
        };
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let current: Option<(ClubStatus,)> = sqlx::query_as("SELECT status FROM clubs WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        match current {
            None => return Err(DbError::not_found("club", id)),
            Some((ClubStatus::Pending,)) => {}
            Some(_) => return Err(DbError::Conflict("club has already been reviewed")),
        }

        sqlx::query("UPDATE clubs SET status = ?, updated_at = ? WHERE id = ?")
            .bind(club_status)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE memberships SET status = ?, updated_at = ?
            WHERE club_id = ? AND role = 'leader' AND status = 'pending'
            "#,
        )
        .bind(membership_status)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get(id).await
    }

    /// Delete a club and everything hanging off it in one transaction.
    pub async fn dissolve(&self, id: i64) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM clubs WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("club", id));
        }

        for table in [
            "activity_participants",
            "attendances",
            "activities",
            "announcements",
            "memberships",
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE club_id = ?"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM clubs WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// `(current approved members, distinct users ever approved)`
    pub async fn member_counts(&self, id: i64) -> Result<(i64, i64), DbError> {
        let counts = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'approved' THEN 1 ELSE 0 END), 0),
                COUNT(DISTINCT CASE WHEN status IN ('approved', 'quit') THEN user_id END)
            FROM memberships
            WHERE club_id = ?
            "#,
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(counts)
    }
}

/// Club writes can hit the unique name or the category foreign key.
fn club_write_error(e: sqlx::Error) -> DbError {
    match e.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => DbError::Conflict("category does not exist"),
        _ => on_unique("club name already exists")(e),
    }
}
