//! Append-only operation log

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::{like_pattern, paged, DbError};
use crate::audit::ActionType;
use crate::models::{Page, Pagination};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OperationLog {
    pub id: i64,
    pub operator_id: i64,
    pub operator_name: String,
    pub action_type: ActionType,
    pub content: String,
    /// 0 for actions that are not tied to a club
    pub club_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLog {
    pub operator_id: i64,
    pub operator_name: String,
    pub action_type: ActionType,
    pub content: String,
    pub club_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub club_id: Option<i64>,
    pub action_type: Option<ActionType>,
    pub operator_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    /// Inclusive
    pub end_date: Option<NaiveDate>,
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &LogFilter) {
    if let Some(club_id) = filter.club_id {
        qb.push(" AND club_id = ").push_bind(club_id);
    }
    if let Some(action) = filter.action_type {
        qb.push(" AND action_type = ").push_bind(action);
    }
    if let Some(like) = like_pattern(filter.operator_name.as_deref()) {
        qb.push(" AND operator_name LIKE ").push_bind(like);
    }
    // created_at is RFC 3339 text; comparing against a bare day works lexically.
    if let Some(start) = filter.start_date {
        qb.push(" AND created_at >= ").push_bind(start.format("%Y-%m-%d").to_string());
    }
    if let Some(next) = filter.end_date.and_then(|d| d.succ_opt()) {
        qb.push(" AND created_at < ").push_bind(next.format("%Y-%m-%d").to_string());
    }
}

pub struct LogRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LogRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, log: &NewLog) -> Result<i64, DbError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO operation_logs (operator_id, operator_name, action_type, content, club_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(log.operator_id)
        .bind(&log.operator_name)
        .bind(log.action_type)
        .bind(&log.content)
        .bind(log.club_id)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    pub async fn list(&self, filter: &LogFilter, page: Pagination) -> Result<Page<OperationLog>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, operator_id, operator_name, action_type, content, club_id, created_at, \
             COUNT(*) OVER() AS total FROM operation_logs WHERE 1 = 1",
        );
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(self.pool).await?;

        let mut count: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM operation_logs WHERE 1 = 1");
        push_filters(&mut count, filter);
        paged(rows, page, count.build_query_scalar::<i64>().fetch_one(self.pool)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_memory_pool, run_migrations};

    fn entry(club_id: i64, action_type: ActionType, operator: &str) -> NewLog {
        NewLog {
            operator_id: 1,
            operator_name: operator.into(),
            action_type,
            content: "did something".into(),
            club_id,
        }
    }

    #[tokio::test]
    async fn filters_by_club_action_and_operator() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = LogRepo::new(&pool);
        repo.insert(&entry(1, ActionType::ChangeRole, "Alice")).await.unwrap();
        repo.insert(&entry(1, ActionType::RemoveMember, "Bob")).await.unwrap();
        repo.insert(&entry(2, ActionType::ChangeRole, "Alice")).await.unwrap();

        let club_one = LogFilter {
            club_id: Some(1),
            ..Default::default()
        };
        assert_eq!(repo.list(&club_one, Pagination::default()).await.unwrap().pagination.total, 2);

        let roles = LogFilter {
            action_type: Some(ActionType::ChangeRole),
            operator_name: Some("ali".into()),
            ..Default::default()
        };
        let page = repo.list(&roles, Pagination::default()).await.unwrap();
        assert_eq!(page.pagination.total, 2);
        assert!(page.list.iter().all(|l| l.action_type == ActionType::ChangeRole));
    }

    #[tokio::test]
    async fn date_range_is_inclusive_of_end_day() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = LogRepo::new(&pool);
        repo.insert(&entry(0, ActionType::ManageClub, "root")).await.unwrap();

        let today = Utc::now().date_naive();
        let same_day = LogFilter {
            start_date: Some(today),
            end_date: Some(today),
            ..Default::default()
        };
        assert_eq!(repo.list(&same_day, Pagination::default()).await.unwrap().list.len(), 1);

        let before = LogFilter {
            end_date: today.pred_opt(),
            ..Default::default()
        };
        assert!(repo.list(&before, Pagination::default()).await.unwrap().list.is_empty());
    }
}
