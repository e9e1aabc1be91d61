//! Club categories

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use super::{on_foreign_key, on_unique, paged, DbError};
use crate::models::{Page, Pagination};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

pub struct CategoryRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CategoryRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, page: Pagination) -> Result<Page<Category>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, created_at, COUNT(*) OVER() AS total
            FROM club_categories
            ORDER BY id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM club_categories")
            .fetch_one(self.pool);
        paged(rows, page, count).await
    }

    pub async fn create(&self, name: &str) -> Result<Category, DbError> {
        let now = Utc::now();
        let category = sqlx::query_as(
            r#"
            INSERT INTO club_categories (name, created_at, updated_at)
            VALUES (?, ?, ?)
            RETURNING id, name, created_at
            "#,
        )
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(on_unique("category name already exists"))?;

        Ok(category)
    }

    /// Insert unless a category of that name exists; returns the id either way.
    pub async fn ensure(&self, name: &str) -> Result<i64, DbError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT OR IGNORE INTO club_categories (name, created_at, updated_at) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM club_categories WHERE name = ?")
            .bind(name)
            .fetch_one(self.pool)
            .await?;
        Ok(id)
    }

    /// Delete a category; refused while clubs still reference it.
    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM club_categories WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(on_foreign_key("category is still used by clubs"))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("category", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_memory_pool, run_migrations};

    #[tokio::test]
    async fn create_list_delete() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = CategoryRepo::new(&pool);

        let sports = repo.create("Sports").await.unwrap();
        repo.create("Arts").await.unwrap();
        assert!(matches!(
            repo.create("Sports").await.unwrap_err(),
            DbError::Conflict(_)
        ));

        let page = repo.list(Pagination::default()).await.unwrap();
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.list[0].name, "Arts");

        repo.delete(sports.id).await.unwrap();
        assert!(matches!(
            repo.delete(sports.id).await.unwrap_err(),
            DbError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn page_past_the_end_keeps_total() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = CategoryRepo::new(&pool);
        for name in ["Sports", "Arts", "Music"] {
            repo.create(name).await.unwrap();
        }

        let first = repo.list(Pagination::new(1, 2)).await.unwrap();
        assert_eq!(first.pagination.total, 3);

        let past = repo.list(Pagination::new(3, 2)).await.unwrap();
        assert!(past.list.is_empty());
        assert_eq!(past.pagination.total, 3);
        assert_eq!(past.pagination.page, 3);
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = CategoryRepo::new(&pool);

        let first = repo.ensure("Music").await.unwrap();
        let second = repo.ensure("Music").await.unwrap();
        assert_eq!(first, second);
    }
}
