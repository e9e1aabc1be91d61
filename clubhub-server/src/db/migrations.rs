//! Idempotent schema creation
//!
//! Every statement is `IF NOT EXISTS` / `OR IGNORE`, so running the
//! migrations on every startup is safe.

use anyhow::{Context, Result};
use clubhub_core::SystemRole;
use sqlx::SqlitePool;
use tracing::info;

const TABLES: &[(&str, &str)] = &[
    (
        "roles",
        r#"
        CREATE TABLE IF NOT EXISTS roles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            code TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    ),
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            gender TEXT NOT NULL DEFAULT '',
            college TEXT NOT NULL DEFAULT '',
            student_no TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            role_id INTEGER NOT NULL REFERENCES roles(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    ),
    (
        "club_categories",
        r#"
        CREATE TABLE IF NOT EXISTS club_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    ),
    (
        "clubs",
        r#"
        CREATE TABLE IF NOT EXISTS clubs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            logo TEXT NOT NULL DEFAULT '',
            intro TEXT NOT NULL DEFAULT '',
            contact TEXT NOT NULL DEFAULT '',
            category_id INTEGER REFERENCES club_categories(id),
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'approved', 'rejected')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    ),
    (
        "memberships",
        r#"
        CREATE TABLE IF NOT EXISTS memberships (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            club_id INTEGER NOT NULL REFERENCES clubs(id) ON DELETE CASCADE,
            status TEXT NOT NULL
                CHECK (status IN ('pending', 'approved', 'rejected', 'quit')),
            role TEXT NOT NULL DEFAULT 'member'
                CHECK (role IN ('member', 'advisor', 'leader')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (user_id, club_id)
        );
        "#,
    ),
    (
        "announcements",
        r#"
        CREATE TABLE IF NOT EXISTS announcements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            club_id INTEGER NOT NULL REFERENCES clubs(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            scope TEXT NOT NULL DEFAULT 'public'
                CHECK (scope IN ('public', 'internal')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    ),
    (
        "activities",
        r#"
        CREATE TABLE IF NOT EXISTS activities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            club_id INTEGER NOT NULL REFERENCES clubs(id) ON DELETE CASCADE,
            subject TEXT NOT NULL,
            time_label TEXT NOT NULL DEFAULT '',
            place TEXT NOT NULL DEFAULT '',
            target TEXT NOT NULL DEFAULT '',
            scope TEXT NOT NULL DEFAULT 'public'
                CHECK (scope IN ('public', 'internal')),
            content TEXT NOT NULL DEFAULT '',
            start_at TEXT,
            end_at TEXT,
            max_participants INTEGER NOT NULL DEFAULT 0 CHECK (max_participants >= 0),
            publish_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    ),
    (
        "activity_participants",
        r#"
        CREATE TABLE IF NOT EXISTS activity_participants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            activity_id INTEGER NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
            club_id INTEGER NOT NULL REFERENCES clubs(id) ON DELETE CASCADE,
            status TEXT NOT NULL CHECK (status IN ('confirmed', 'cancelled')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (user_id, activity_id)
        );
        "#,
    ),
    (
        "attendances",
        r#"
        CREATE TABLE IF NOT EXISTS attendances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            club_id INTEGER NOT NULL REFERENCES clubs(id) ON DELETE CASCADE,
            activity_id INTEGER REFERENCES activities(id) ON DELETE CASCADE,
            signin_at TEXT NOT NULL,
            signout_at TEXT,
            duration_minutes INTEGER NOT NULL DEFAULT 0,
            duration_hours REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    ),
    (
        "operation_logs",
        r#"
        CREATE TABLE IF NOT EXISTS operation_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            operator_id INTEGER NOT NULL,
            operator_name TEXT NOT NULL,
            action_type TEXT NOT NULL,
            content TEXT NOT NULL,
            club_id INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        "#,
    ),
];

const INDEXES: &[(&str, &str)] = &[
    (
        "ux_attendances_open",
        // One open session per user and scope; a club session has no activity.
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_attendances_open \
         ON attendances (user_id, club_id, IFNULL(activity_id, 0)) \
         WHERE signout_at IS NULL",
    ),
    (
        "ix_memberships_club",
        "CREATE INDEX IF NOT EXISTS ix_memberships_club ON memberships (club_id, status, role)",
    ),
    (
        "ix_attendances_user",
        "CREATE INDEX IF NOT EXISTS ix_attendances_user ON attendances (user_id, club_id)",
    ),
    (
        "ix_participants_activity",
        "CREATE INDEX IF NOT EXISTS ix_participants_activity \
         ON activity_participants (activity_id, status)",
    ),
    (
        "ix_operation_logs_club",
        "CREATE INDEX IF NOT EXISTS ix_operation_logs_club ON operation_logs (club_id, created_at)",
    ),
];

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for (table, ddl) in TABLES {
        sqlx::query(*ddl)
            .execute(pool)
            .await
            .with_context(|| format!("failed to create {} table", table))?;
    }

    for (index, ddl) in INDEXES {
        sqlx::query(*ddl)
            .execute(pool)
            .await
            .with_context(|| format!("failed to create index {}", index))?;
    }

    let now = chrono::Utc::now();
    for role in SystemRole::ALL {
        sqlx::query(
            "INSERT OR IGNORE INTO roles (name, code, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(role.display_name())
        .bind(role.as_str())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .with_context(|| format!("failed to insert role {}", role))?;
    }

    info!(tables = TABLES.len(), "database schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_memory_pool;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let (roles,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM roles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(roles, 2);
    }

    #[tokio::test]
    async fn status_check_constraint() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO clubs (name, status, created_at, updated_at) VALUES ('x', 'archived', '', '')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
