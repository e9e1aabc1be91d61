//! Club activities

use chrono::{DateTime, NaiveDate, Utc};
use clubhub_core::Scope;
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::{like_pattern, paged, ClubBrief, DbError, CLUB_BRIEF_COLUMNS};
use crate::models::{Page, Pagination};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Activity {
    pub id: i64,
    pub club_id: i64,
    pub subject: String,
    /// Free-form schedule text shown next to the subject
    #[serde(rename = "time")]
    pub time_label: String,
    pub place: String,
    pub target: String,
    pub scope: Scope,
    pub content: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    /// 0 means unlimited
    pub max_participants: i64,
    pub publish_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    pub fn has_capacity_limit(&self) -> bool {
        self.max_participants > 0
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActivityWithClub {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub activity: Activity,
    #[sqlx(flatten)]
    pub club: ClubBrief,
}

#[derive(Debug, Clone)]
pub struct ActivityInput {
    pub subject: String,
    pub time_label: String,
    pub place: String,
    pub target: String,
    pub scope: Scope,
    pub content: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub max_participants: i64,
    pub publish_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub club_id: Option<i64>,
    pub keyword: Option<String>,
    /// Activities starting on or after this day
    pub start: Option<NaiveDate>,
    /// Activities ending on or before this day
    pub end: Option<NaiveDate>,
    /// Restrict to public rows of approved clubs
    pub public_only: bool,
}

const COLUMNS: &str = "a.id, a.club_id, a.subject, a.time_label, a.place, a.target, a.scope, \
     a.content, a.start_at, a.end_at, a.max_participants, a.publish_at, a.created_at, a.updated_at";

const LIST_FROM: &str = "FROM activities a JOIN clubs c ON c.id = a.club_id WHERE 1 = 1";

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ActivityFilter) {
    if filter.public_only {
        qb.push(" AND a.scope = 'public' AND c.status = 'approved'");
    }
    if let Some(club_id) = filter.club_id {
        qb.push(" AND a.club_id = ").push_bind(club_id);
    }
    if let Some(like) = like_pattern(filter.keyword.as_deref()) {
        qb.push(" AND (a.subject LIKE ")
            .push_bind(like.clone())
            .push(" OR a.place LIKE ")
            .push_bind(like)
            .push(")");
    }
    // Timestamps are stored as RFC 3339 text, so a day prefix compares correctly.
    // Rows without a timestamp are matched on their schedule text instead.
    if let Some(start) = filter.start {
        let day = start.format("%Y-%m-%d").to_string();
        qb.push(" AND ((a.start_at IS NOT NULL AND a.start_at >= ")
            .push_bind(day.clone())
            .push(") OR (a.start_at IS NULL AND a.time_label >= ")
            .push_bind(day)
            .push("))");
    }
    if let Some(next) = filter.end.and_then(|d| d.succ_opt()) {
        let day = next.format("%Y-%m-%d").to_string();
        qb.push(" AND ((a.end_at IS NOT NULL AND a.end_at < ")
            .push_bind(day.clone())
            .push(") OR (a.end_at IS NULL AND a.time_label < ")
            .push_bind(day)
            .push("))");
    }
}

const RETURNING: &str = "RETURNING id, club_id, subject, time_label, place, target, scope, \
     content, start_at, end_at, max_participants, publish_at, created_at, updated_at";

pub struct ActivityRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ActivityRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Activity, DbError> {
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM activities a WHERE a.id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("activity", id))
    }

    /// Public activity of an approved club; internal ones are not found.
    pub async fn get_public(&self, id: i64) -> Result<ActivityWithClub, DbError> {
        sqlx::query_as(&format!(
            "SELECT {COLUMNS}, {CLUB_BRIEF_COLUMNS} FROM activities a JOIN clubs c ON c.id = a.club_id \
             WHERE a.id = ? AND a.scope = 'public' AND c.status = 'approved'"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("activity", id))
    }

    /// Latest public activities of one club.
    pub async fn recent_public(&self, club_id: i64, limit: i64) -> Result<Vec<Activity>, DbError> {
        Ok(sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM activities a WHERE a.club_id = ? AND a.scope = 'public' \
             ORDER BY a.id DESC LIMIT ?"
        ))
        .bind(club_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn list(
        &self,
        filter: &ActivityFilter,
        page: Pagination,
    ) -> Result<Page<ActivityWithClub>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {COLUMNS}, {CLUB_BRIEF_COLUMNS}, COUNT(*) OVER() AS total {LIST_FROM}"
        ));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY a.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(self.pool).await?;

        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT COUNT(*) {LIST_FROM}"));
        push_filters(&mut count, filter);
        paged(rows, page, count.build_query_scalar::<i64>().fetch_one(self.pool)).await
    }

    pub async fn create(&self, club_id: i64, input: ActivityInput) -> Result<Activity, DbError> {
        let now = Utc::now();
        Ok(sqlx::query_as(&format!(
            r#"
            INSERT INTO activities (club_id, subject, time_label, place, target, scope, content,
                start_at, end_at, max_participants, publish_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            {RETURNING}
            "#
        ))
        .bind(club_id)
        .bind(input.subject)
        .bind(input.time_label)
        .bind(input.place)
        .bind(input.target)
        .bind(input.scope)
        .bind(input.content)
        .bind(input.start_at)
        .bind(input.end_at)
        .bind(input.max_participants)
        .bind(input.publish_at)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?)
    }

    /// Replace an activity of `club_id`; ids of other clubs are not found.
    pub async fn update(&self, club_id: i64, id: i64, input: ActivityInput) -> Result<Activity, DbError> {
        sqlx::query_as(&format!(
            r#"
            UPDATE activities SET subject = ?, time_label = ?, place = ?, target = ?, scope = ?,
                content = ?, start_at = ?, end_at = ?, max_participants = ?, publish_at = ?,
                updated_at = ?
            WHERE id = ? AND club_id = ?
            {RETURNING}
            "#
        ))
        .bind(input.subject)
        .bind(input.time_label)
        .bind(input.place)
        .bind(input.target)
        .bind(input.scope)
        .bind(input.content)
        .bind(input.start_at)
        .bind(input.end_at)
        .bind(input.max_participants)
        .bind(input.publish_at)
        .bind(Utc::now())
        .bind(id)
        .bind(club_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("activity", id))
    }

    pub async fn delete(&self, club_id: i64, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM activities WHERE id = ? AND club_id = ?")
            .bind(id)
            .bind(club_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("activity", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_memory_pool, run_migrations, ClubRepo, NewClub, UserRepo};
    use chrono::TimeZone;
    use clubhub_core::SystemRole;

    fn input(subject: &str, scope: Scope, start_day: u32) -> ActivityInput {
        let start = Utc.with_ymd_and_hms(2025, 3, start_day, 9, 0, 0).unwrap();
        ActivityInput {
            subject: subject.into(),
            time_label: "Saturday morning".into(),
            place: "Gym".into(),
            target: "all students".into(),
            scope,
            content: String::new(),
            start_at: Some(start),
            end_at: Some(start + chrono::Duration::hours(2)),
            max_participants: 0,
            publish_at: None,
        }
    }

    async fn approved_club(pool: &SqlitePool) -> i64 {
        let leader = UserRepo::new(pool)
            .create("lead", "h", "Lead", SystemRole::User)
            .await
            .unwrap()
            .id;
        let clubs = ClubRepo::new(pool);
        let id = clubs
            .register(
                leader,
                NewClub {
                    name: "Hiking".into(),
                    logo: String::new(),
                    intro: String::new(),
                    contact: String::new(),
                    category_id: None,
                },
            )
            .await
            .unwrap()
            .id;
        clubs.review(id, true).await.unwrap();
        id
    }

    #[tokio::test]
    async fn public_detail_hides_internal() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let club = approved_club(&pool).await;
        let repo = ActivityRepo::new(&pool);

        let open = repo.create(club, input("Trail day", Scope::Public, 1)).await.unwrap();
        let internal = repo.create(club, input("Planning", Scope::Internal, 2)).await.unwrap();

        let shown = repo.get_public(open.id).await.unwrap();
        assert_eq!(shown.club.name, "Hiking");
        assert!(matches!(
            repo.get_public(internal.id).await.unwrap_err(),
            DbError::NotFound { .. }
        ));
        assert_eq!(repo.recent_public(club, 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_date_range() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let club = approved_club(&pool).await;
        let repo = ActivityRepo::new(&pool);
        repo.create(club, input("early", Scope::Public, 1)).await.unwrap();
        repo.create(club, input("late", Scope::Public, 20)).await.unwrap();

        let filter = ActivityFilter {
            start: NaiveDate::from_ymd_opt(2025, 3, 10),
            public_only: true,
            ..Default::default()
        };
        let page = repo.list(&filter, Pagination::default()).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.list[0].activity.subject, "late");

        let filter = ActivityFilter {
            end: NaiveDate::from_ymd_opt(2025, 3, 1),
            ..Default::default()
        };
        let page = repo.list(&filter, Pagination::default()).await.unwrap();
        assert_eq!(page.list[0].activity.subject, "early");
    }

    #[tokio::test]
    async fn date_range_falls_back_to_schedule_text() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let club = approved_club(&pool).await;
        let repo = ActivityRepo::new(&pool);
        repo.create(club, input("early", Scope::Public, 1)).await.unwrap();
        repo.create(
            club,
            ActivityInput {
                time_label: "2025-03-15 14:00".into(),
                start_at: None,
                end_at: None,
                ..input("untimed", Scope::Public, 1)
            },
        )
        .await
        .unwrap();

        let after = ActivityFilter {
            start: NaiveDate::from_ymd_opt(2025, 3, 10),
            ..Default::default()
        };
        let page = repo.list(&after, Pagination::default()).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.list[0].activity.subject, "untimed");

        let before = ActivityFilter {
            end: NaiveDate::from_ymd_opt(2025, 3, 12),
            ..Default::default()
        };
        let page = repo.list(&before, Pagination::default()).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.list[0].activity.subject, "early");
    }

    #[tokio::test]
    async fn time_label_serializes_as_time() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let club = approved_club(&pool).await;
        let activity = ActivityRepo::new(&pool)
            .create(club, input("x", Scope::Public, 3))
            .await
            .unwrap();

        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json["time"], "Saturday morning");
        assert!(json.get("time_label").is_none());
    }
}
