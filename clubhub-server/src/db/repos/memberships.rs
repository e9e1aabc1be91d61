//! Memberships: applications, review, roles and removal

use chrono::{DateTime, Utc};
use clubhub_core::{ClubRole, MembershipStatus};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::{
    like_pattern, on_unique, paged, ClubBrief, DbError, UserBrief, CLUB_BRIEF_COLUMNS,
    USER_BRIEF_COLUMNS,
};
use crate::models::{Page, Pagination};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Membership {
    pub id: i64,
    pub user_id: i64,
    pub club_id: i64,
    pub status: MembershipStatus,
    pub role: ClubRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership with the member's contact details
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MemberWithUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub membership: Membership,
    #[sqlx(flatten)]
    pub user: UserBrief,
}

/// Membership with the club it belongs to
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MembershipWithClub {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub membership: Membership,
    #[sqlx(flatten)]
    pub club: ClubBrief,
}

#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub role: Option<ClubRole>,
    pub status: Option<MembershipStatus>,
    pub keyword: Option<String>,
}

const MEMBERSHIP_COLUMNS: &str =
    "m.id, m.user_id, m.club_id, m.status, m.role, m.created_at, m.updated_at";

const MEMBER_FROM: &str = "FROM memberships m JOIN users u ON u.id = m.user_id WHERE 1 = 1";

fn push_member_filters(qb: &mut QueryBuilder<'_, Sqlite>, club_id: i64, filter: &MemberFilter) {
    qb.push(" AND m.club_id = ").push_bind(club_id);
    if let Some(role) = filter.role {
        qb.push(" AND m.role = ").push_bind(role);
    }
    if let Some(status) = filter.status {
        qb.push(" AND m.status = ").push_bind(status);
    }
    if let Some(like) = like_pattern(filter.keyword.as_deref()) {
        qb.push(" AND (u.name LIKE ")
            .push_bind(like.clone())
            .push(" OR u.student_no LIKE ")
            .push_bind(like.clone())
            .push(" OR u.phone LIKE ")
            .push_bind(like)
            .push(")");
    }
}

pub struct MembershipRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MembershipRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Membership, DbError> {
        sqlx::query_as(&format!("SELECT {MEMBERSHIP_COLUMNS} FROM memberships m WHERE m.id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("membership", id))
    }

    pub async fn find(&self, user_id: i64, club_id: i64) -> Result<Option<Membership>, DbError> {
        Ok(sqlx::query_as(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships m WHERE m.user_id = ? AND m.club_id = ?"
        ))
        .bind(user_id)
        .bind(club_id)
        .fetch_optional(self.pool)
        .await?)
    }

    /// Role held through an approved membership; other states confer nothing.
    pub async fn approved_role(&self, user_id: i64, club_id: i64) -> Result<Option<ClubRole>, DbError> {
        let row: Option<(ClubRole,)> = sqlx::query_as(
            "SELECT role FROM memberships WHERE user_id = ? AND club_id = ? AND status = 'approved'",
        )
        .bind(user_id)
        .bind(club_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|(role,)| role))
    }

    pub async fn insert(
        &self,
        user_id: i64,
        club_id: i64,
        status: MembershipStatus,
        role: ClubRole,
    ) -> Result<Membership, DbError> {
        let now = Utc::now();
        let membership = sqlx::query_as(
            r#"
            INSERT INTO memberships (user_id, club_id, status, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, user_id, club_id, status, role, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(club_id)
        .bind(status)
        .bind(role)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(on_unique("membership already exists"))?;
        Ok(membership)
    }

    /// Overwrite status and role of one membership.
    pub async fn set_state(
        &self,
        id: i64,
        status: MembershipStatus,
        role: ClubRole,
    ) -> Result<Membership, DbError> {
        sqlx::query_as(
            r#"
            UPDATE memberships SET status = ?, role = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, user_id, club_id, status, role, created_at, updated_at
            "#,
        )
        .bind(status)
        .bind(role)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("membership", id))
    }

    /// Move a pending membership to `status`; anything else is a conflict.
    pub async fn review(&self, id: i64, status: MembershipStatus) -> Result<Membership, DbError> {
        let updated: Option<Membership> = sqlx::query_as(
            r#"
            UPDATE memberships SET status = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            RETURNING id, user_id, club_id, status, role, created_at, updated_at
            "#,
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        match updated {
            Some(m) => Ok(m),
            None => {
                // Distinguish a missing row from one that was already reviewed.
                self.get(id).await?;
                Err(DbError::Conflict("application is not pending"))
            }
        }
    }

    pub async fn set_role(&self, id: i64, role: ClubRole) -> Result<Membership, DbError> {
        sqlx::query_as(
            r#"
            UPDATE memberships SET role = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, user_id, club_id, status, role, created_at, updated_at
            "#,
        )
        .bind(role)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("membership", id))
    }

    /// Make membership `id` the club's only leader, demoting any current
    /// leader to member in the same transaction.
    pub async fn appoint_leader(&self, id: i64) -> Result<Membership, DbError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let target: Option<(i64,)> = sqlx::query_as("SELECT club_id FROM memberships WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let (club_id,) = target.ok_or_else(|| DbError::not_found("membership", id))?;

        sqlx::query(
            r#"
            UPDATE memberships SET role = 'member', updated_at = ?
            WHERE club_id = ? AND role = 'leader' AND id != ?
            "#,
        )
        .bind(now)
        .bind(club_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let appointed = sqlx::query_as(
            r#"
            UPDATE memberships SET role = 'leader', updated_at = ?
            WHERE id = ?
            RETURNING id, user_id, club_id, status, role, created_at, updated_at
            "#,
        )
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(appointed)
    }

    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM memberships WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("membership", id));
        }
        Ok(())
    }

    /// The caller's memberships with club names, newest first.
    pub async fn list_for_user(
        &self,
        user_id: i64,
        status: Option<MembershipStatus>,
    ) -> Result<Vec<MembershipWithClub>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {MEMBERSHIP_COLUMNS}, {CLUB_BRIEF_COLUMNS} \
             FROM memberships m JOIN clubs c ON c.id = m.club_id WHERE m.user_id = "
        ));
        qb.push_bind(user_id);
        if let Some(status) = status {
            qb.push(" AND m.status = ").push_bind(status);
        }
        qb.push(" ORDER BY m.id DESC");

        Ok(qb.build_query_as().fetch_all(self.pool).await?)
    }

    /// Members of a club; keyword matches name, student number or phone.
    pub async fn list_for_club(
        &self,
        club_id: i64,
        filter: &MemberFilter,
        page: Pagination,
    ) -> Result<Page<MemberWithUser>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {MEMBERSHIP_COLUMNS}, {USER_BRIEF_COLUMNS}, COUNT(*) OVER() AS total {MEMBER_FROM}"
        ));
        push_member_filters(&mut qb, club_id, filter);
        qb.push(" ORDER BY m.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(self.pool).await?;

        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT COUNT(*) {MEMBER_FROM}"));
        push_member_filters(&mut count, club_id, filter);
        paged(rows, page, count.build_query_scalar::<i64>().fetch_one(self.pool)).await
    }

    /// Approved leaders and advisors of a club.
    pub async fn leaders(&self, club_id: i64) -> Result<Vec<MemberWithUser>, DbError> {
        Ok(sqlx::query_as(&format!(
            r#"
            SELECT {MEMBERSHIP_COLUMNS}, {USER_BRIEF_COLUMNS}
            FROM memberships m JOIN users u ON u.id = m.user_id
            WHERE m.club_id = ? AND m.status = 'approved' AND m.role IN ('leader', 'advisor')
            ORDER BY CASE m.role WHEN 'leader' THEN 0 ELSE 1 END, m.id
            "#
        ))
        .bind(club_id)
        .fetch_all(self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_memory_pool, run_migrations, ClubRepo, NewClub, UserRepo};
    use clubhub_core::SystemRole;

    struct Fixture {
        pool: SqlitePool,
        leader: i64,
        student: i64,
        club: i64,
    }

    async fn fixture() -> Fixture {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let users = UserRepo::new(&pool);
        let leader = users.create("leader", "h", "Lee", SystemRole::User).await.unwrap().id;
        let student = users.create("student", "h", "Stu", SystemRole::User).await.unwrap().id;
        let clubs = ClubRepo::new(&pool);
        let club = clubs
            .register(
                leader,
                NewClub {
                    name: "Chess".into(),
                    logo: String::new(),
                    intro: String::new(),
                    contact: String::new(),
                    category_id: None,
                },
            )
            .await
            .unwrap()
            .id;
        clubs.review(club, true).await.unwrap();
        Fixture {
            pool,
            leader,
            student,
            club,
        }
    }

    #[tokio::test]
    async fn unique_per_user_and_club() {
        let f = fixture().await;
        let repo = MembershipRepo::new(&f.pool);
        repo.insert(f.student, f.club, MembershipStatus::Pending, ClubRole::Member)
            .await
            .unwrap();
        let err = repo
            .insert(f.student, f.club, MembershipStatus::Pending, ClubRole::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn only_pending_can_be_reviewed() {
        let f = fixture().await;
        let repo = MembershipRepo::new(&f.pool);
        let m = repo
            .insert(f.student, f.club, MembershipStatus::Pending, ClubRole::Member)
            .await
            .unwrap();

        let approved = repo.review(m.id, MembershipStatus::Approved).await.unwrap();
        assert_eq!(approved.status, MembershipStatus::Approved);
        assert!(matches!(
            repo.review(m.id, MembershipStatus::Rejected).await.unwrap_err(),
            DbError::Conflict(_)
        ));
        assert!(matches!(
            repo.review(9_999, MembershipStatus::Approved).await.unwrap_err(),
            DbError::NotFound { .. }
        ));
        assert_eq!(
            repo.approved_role(f.student, f.club).await.unwrap(),
            Some(ClubRole::Member)
        );
    }

    #[tokio::test]
    async fn appoint_leader_demotes_previous() {
        let f = fixture().await;
        let repo = MembershipRepo::new(&f.pool);
        let m = repo
            .insert(f.student, f.club, MembershipStatus::Approved, ClubRole::Member)
            .await
            .unwrap();

        let appointed = repo.appoint_leader(m.id).await.unwrap();
        assert_eq!(appointed.role, ClubRole::Leader);
        assert_eq!(
            repo.approved_role(f.leader, f.club).await.unwrap(),
            Some(ClubRole::Member)
        );

        let leaders = repo.leaders(f.club).await.unwrap();
        assert_eq!(leaders.len(), 1);
        assert_eq!(leaders[0].user.id, f.student);
    }

    #[tokio::test]
    async fn member_list_filters() {
        let f = fixture().await;
        let repo = MembershipRepo::new(&f.pool);
        repo.insert(f.student, f.club, MembershipStatus::Pending, ClubRole::Member)
            .await
            .unwrap();

        let pending = MemberFilter {
            status: Some(MembershipStatus::Pending),
            ..Default::default()
        };
        let page = repo.list_for_club(f.club, &pending, Pagination::default()).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.list[0].user.name, "Stu");

        let by_name = MemberFilter {
            keyword: Some("Lee".into()),
            ..Default::default()
        };
        let page = repo.list_for_club(f.club, &by_name, Pagination::default()).await.unwrap();
        assert_eq!(page.list[0].membership.role, ClubRole::Leader);

        let mine = repo.list_for_user(f.leader, None).await.unwrap();
        assert_eq!(mine[0].club.name, "Chess");
    }
}
