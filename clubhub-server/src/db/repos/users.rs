//! User accounts

use chrono::{DateTime, Utc};
use clubhub_core::SystemRole;
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::{like_pattern, on_unique, paged, DbError};
use crate::models::{Page, Pagination};

/// Keyword filter for the admin listing: account, name, student number or phone.
fn push_keyword(qb: &mut QueryBuilder<'_, Sqlite>, keyword: Option<&str>) {
    if let Some(like) = like_pattern(keyword) {
        qb.push(" AND (u.account LIKE ")
            .push_bind(like.clone())
            .push(" OR u.name LIKE ")
            .push_bind(like.clone())
            .push(" OR u.student_no LIKE ")
            .push_bind(like.clone())
            .push(" OR u.phone LIKE ")
            .push_bind(like)
            .push(")");
    }
}

/// User record joined with its system role code
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub account: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub gender: String,
    pub college: String,
    pub student_no: String,
    pub phone: String,
    pub role_id: i64,
    pub role: SystemRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What request authentication needs to know about a caller
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserIdentity {
    pub id: i64,
    pub name: String,
    pub role: SystemRole,
}

impl UserIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == SystemRole::Admin
    }
}

/// Editable profile fields; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub college: Option<String>,
    pub student_no: Option<String>,
    pub phone: Option<String>,
}

const USER_SELECT: &str = "SELECT u.id, u.account, u.password_hash, u.name, u.gender, u.college, \
     u.student_no, u.phone, u.role_id, r.code AS role, u.created_at, u.updated_at \
     FROM users u JOIN roles r ON r.id = u.role_id";

/// User repository
pub struct UserRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user with the given system role.
    pub async fn create(
        &self,
        account: &str,
        password_hash: &str,
        name: &str,
        role: SystemRole,
    ) -> Result<User, DbError> {
        let now = Utc::now();
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO users (account, password_hash, name, role_id, created_at, updated_at)
            VALUES (?, ?, ?, (SELECT id FROM roles WHERE code = ?), ?, ?)
            RETURNING id
            "#,
        )
        .bind(account)
        .bind(password_hash)
        .bind(name)
        .bind(role)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(on_unique("account already exists"))?;

        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<User, DbError> {
        sqlx::query_as(&format!("{USER_SELECT} WHERE u.id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn find_by_account(&self, account: &str) -> Result<Option<User>, DbError> {
        Ok(sqlx::query_as(&format!("{USER_SELECT} WHERE u.account = ?"))
            .bind(account)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Identity lookup used on every authenticated request.
    pub async fn identity(&self, id: i64) -> Result<Option<UserIdentity>, DbError> {
        Ok(sqlx::query_as(
            "SELECT u.id, u.name, r.code AS role FROM users u JOIN roles r ON r.id = u.role_id WHERE u.id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?)
    }

    pub async fn update_profile(&self, id: i64, update: ProfileUpdate) -> Result<User, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                gender = COALESCE(?, gender),
                college = COALESCE(?, college),
                student_no = COALESCE(?, student_no),
                phone = COALESCE(?, phone),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.name)
        .bind(update.gender)
        .bind(update.college)
        .bind(update.student_no)
        .bind(update.phone)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("user", id));
        }
        self.get(id).await
    }

    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("user", id));
        }
        Ok(())
    }

    /// Admin user listing; keyword matches account, name, student number or phone.
    pub async fn list(&self, keyword: Option<&str>, page: Pagination) -> Result<Page<User>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT u.id, u.account, u.password_hash, u.name, u.gender, u.college, \
             u.student_no, u.phone, u.role_id, r.code AS role, u.created_at, u.updated_at, \
             COUNT(*) OVER() AS total \
             FROM users u JOIN roles r ON r.id = u.role_id WHERE 1 = 1",
        );
        push_keyword(&mut qb, keyword);
        qb.push(" ORDER BY u.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(self.pool).await?;

        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM users u JOIN roles r ON r.id = u.role_id WHERE 1 = 1",
        );
        push_keyword(&mut count, keyword);
        paged(rows, page, count.build_query_scalar::<i64>().fetch_one(self.pool)).await
    }

    /// Whether the account name is taken.
    pub async fn exists_with_account(&self, account: &str) -> Result<bool, DbError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE account = ?)")
                .bind(account)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_memory_pool, run_migrations};

    async fn pool() -> SqlitePool {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn create_and_lookup() {
        let pool = pool().await;
        let repo = UserRepo::new(&pool);

        let user = repo.create("alice", "hash", "Alice", SystemRole::User).await.unwrap();
        assert_eq!(user.role, SystemRole::User);

        let found = repo.find_by_account("alice").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        let identity = repo.identity(user.id).await.unwrap().unwrap();
        assert!(!identity.is_admin());
        assert!(repo.exists_with_account("alice").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_account_conflicts() {
        let pool = pool().await;
        let repo = UserRepo::new(&pool);
        repo.create("bob", "h", "Bob", SystemRole::User).await.unwrap();

        let err = repo.create("bob", "h", "Bobby", SystemRole::User).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn profile_update_is_partial() {
        let pool = pool().await;
        let repo = UserRepo::new(&pool);
        let user = repo.create("carol", "h", "Carol", SystemRole::User).await.unwrap();

        let updated = repo
            .update_profile(
                user.id,
                ProfileUpdate {
                    phone: Some("555-0100".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Carol");
        assert_eq!(updated.phone, "555-0100");
    }

    #[tokio::test]
    async fn list_filters_by_keyword() {
        let pool = pool().await;
        let repo = UserRepo::new(&pool);
        repo.create("dave", "h", "Dave", SystemRole::User).await.unwrap();
        repo.create("erin", "h", "Erin", SystemRole::Admin).await.unwrap();

        let page = repo.list(Some("eri"), Pagination::default()).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.list[0].account, "erin");
    }
}
