//! Club announcements

use chrono::{DateTime, Utc};
use clubhub_core::Scope;
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::{like_pattern, paged, ClubBrief, DbError, CLUB_BRIEF_COLUMNS};
use crate::models::{Page, Pagination};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Announcement {
    pub id: i64,
    pub club_id: i64,
    pub title: String,
    pub content: String,
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AnnouncementWithClub {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub announcement: Announcement,
    #[sqlx(flatten)]
    pub club: ClubBrief,
}

#[derive(Debug, Clone)]
pub struct AnnouncementInput {
    pub title: String,
    pub content: String,
    pub scope: Scope,
}

#[derive(Debug, Clone, Default)]
pub struct AnnouncementFilter {
    pub club_id: Option<i64>,
    pub keyword: Option<String>,
    /// Restrict to public rows of approved clubs
    pub public_only: bool,
}

const COLUMNS: &str = "n.id, n.club_id, n.title, n.content, n.scope, n.created_at, n.updated_at";
const LIST_FROM: &str = "FROM announcements n JOIN clubs c ON c.id = n.club_id WHERE 1 = 1";

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &AnnouncementFilter) {
    if filter.public_only {
        qb.push(" AND n.scope = 'public' AND c.status = 'approved'");
    }
    if let Some(club_id) = filter.club_id {
        qb.push(" AND n.club_id = ").push_bind(club_id);
    }
    if let Some(like) = like_pattern(filter.keyword.as_deref()) {
        qb.push(" AND (n.title LIKE ")
            .push_bind(like.clone())
            .push(" OR n.content LIKE ")
            .push_bind(like)
            .push(")");
    }
}

pub struct AnnouncementRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AnnouncementRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filter: &AnnouncementFilter,
        page: Pagination,
    ) -> Result<Page<AnnouncementWithClub>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {COLUMNS}, {CLUB_BRIEF_COLUMNS}, COUNT(*) OVER() AS total {LIST_FROM}"
        ));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY n.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(self.pool).await?;

        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT COUNT(*) {LIST_FROM}"));
        push_filters(&mut count, filter);
        paged(rows, page, count.build_query_scalar::<i64>().fetch_one(self.pool)).await
    }

    pub async fn create(&self, club_id: i64, input: AnnouncementInput) -> Result<Announcement, DbError> {
        let now = Utc::now();
        Ok(sqlx::query_as(
            r#"
            INSERT INTO announcements (club_id, title, content, scope, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, club_id, title, content, scope, created_at, updated_at
            "#,
        )
        .bind(club_id)
        .bind(input.title)
        .bind(input.content)
        .bind(input.scope)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?)
    }

    /// Update an announcement of `club_id`; ids of other clubs are not found.
    pub async fn update(
        &self,
        club_id: i64,
        id: i64,
        input: AnnouncementInput,
    ) -> Result<Announcement, DbError> {
        sqlx::query_as(
            r#"
            UPDATE announcements SET title = ?, content = ?, scope = ?, updated_at = ?
            WHERE id = ? AND club_id = ?
            RETURNING id, club_id, title, content, scope, created_at, updated_at
            "#,
        )
        .bind(input.title)
        .bind(input.content)
        .bind(input.scope)
        .bind(Utc::now())
        .bind(id)
        .bind(club_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("announcement", id))
    }

    pub async fn delete(&self, club_id: i64, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = ? AND club_id = ?")
            .bind(id)
            .bind(club_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("announcement", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_memory_pool, run_migrations, ClubRepo, NewClub, UserRepo};
    use clubhub_core::SystemRole;

    #[tokio::test]
    async fn public_listing_hides_internal_and_unapproved() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let leader = UserRepo::new(&pool)
            .create("lead", "h", "Lead", SystemRole::User)
            .await
            .unwrap()
            .id;
        let clubs = ClubRepo::new(&pool);
        let new_club = |name: &str| NewClub {
            name: name.into(),
            logo: String::new(),
            intro: String::new(),
            contact: String::new(),
            category_id: None,
        };
        let open = clubs.register(leader, new_club("Open")).await.unwrap().id;
        let pending = clubs.register(leader, new_club("Pending")).await.unwrap().id;
        clubs.review(open, true).await.unwrap();

        let repo = AnnouncementRepo::new(&pool);
        let input = |title: &str, scope| AnnouncementInput {
            title: title.into(),
            content: String::new(),
            scope,
        };
        repo.create(open, input("welcome", Scope::Public)).await.unwrap();
        repo.create(open, input("dues", Scope::Internal)).await.unwrap();
        repo.create(pending, input("soon", Scope::Public)).await.unwrap();

        let public = AnnouncementFilter {
            public_only: true,
            ..Default::default()
        };
        let page = repo.list(&public, Pagination::default()).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.list[0].announcement.title, "welcome");
        assert_eq!(page.list[0].club.name, "Open");

        let club_view = AnnouncementFilter {
            club_id: Some(open),
            ..Default::default()
        };
        assert_eq!(repo.list(&club_view, Pagination::default()).await.unwrap().pagination.total, 2);
    }

    #[tokio::test]
    async fn update_is_scoped_to_club() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let leader = UserRepo::new(&pool)
            .create("lead", "h", "Lead", SystemRole::User)
            .await
            .unwrap()
            .id;
        let club = ClubRepo::new(&pool)
            .register(
                leader,
                NewClub {
                    name: "A".into(),
                    logo: String::new(),
                    intro: String::new(),
                    contact: String::new(),
                    category_id: None,
                },
            )
            .await
            .unwrap()
            .id;
        let repo = AnnouncementRepo::new(&pool);
        let created = repo
            .create(
                club,
                AnnouncementInput {
                    title: "t".into(),
                    content: "c".into(),
                    scope: Scope::Public,
                },
            )
            .await
            .unwrap();

        let err = repo
            .update(
                club + 1,
                created.id,
                AnnouncementInput {
                    title: "x".into(),
                    content: String::new(),
                    scope: Scope::Internal,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        repo.delete(club, created.id).await.unwrap();
    }
}
