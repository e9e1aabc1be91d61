//! Activity registrations

use chrono::{DateTime, Utc};
use clubhub_core::ParticipantStatus;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use super::{paged, Activity, DbError, UserBrief, USER_BRIEF_COLUMNS};
use crate::models::{Page, Pagination};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Participant {
    pub id: i64,
    pub user_id: i64,
    pub activity_id: i64,
    pub club_id: i64,
    pub status: ParticipantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Participant {
    pub fn is_confirmed(&self) -> bool {
        self.status == ParticipantStatus::Confirmed
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ParticipantWithUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub participant: Participant,
    #[sqlx(flatten)]
    pub user: UserBrief,
}

/// Registration state of the caller for one activity
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Registration {
    pub registered: bool,
}

const RETURNING: &str = "RETURNING id, user_id, activity_id, club_id, status, created_at, updated_at";

pub struct ParticipantRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ParticipantRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, user_id: i64, activity_id: i64) -> Result<Option<Participant>, DbError> {
        Ok(sqlx::query_as(
            r#"
            SELECT id, user_id, activity_id, club_id, status, created_at, updated_at
            FROM activity_participants
            WHERE user_id = ? AND activity_id = ?
            "#,
        )
        .bind(user_id)
        .bind(activity_id)
        .fetch_optional(self.pool)
        .await?)
    }

    pub async fn registration(&self, user_id: i64, activity_id: i64) -> Result<Registration, DbError> {
        let registered = self
            .find(user_id, activity_id)
            .await?
            .is_some_and(|p| p.is_confirmed());
        Ok(Registration { registered })
    }

    /// Confirm a registration, reviving a cancelled one.
    ///
    /// The capacity check and the write share a transaction.
    pub async fn register(&self, user_id: i64, activity: &Activity) -> Result<Participant, DbError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<Participant> = sqlx::query_as(
            r#"
            SELECT id, user_id, activity_id, club_id, status, created_at, updated_at
            FROM activity_participants
            WHERE user_id = ? AND activity_id = ?
            "#,
        )
        .bind(user_id)
        .bind(activity.id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(current) = existing.filter(Participant::is_confirmed) {
            tx.commit().await?;
            return Ok(current);
        }

        if activity.has_capacity_limit() {
            let (confirmed,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM activity_participants WHERE activity_id = ? AND status = 'confirmed'",
            )
            .bind(activity.id)
            .fetch_one(&mut *tx)
            .await?;
            if confirmed >= activity.max_participants {
                return Err(DbError::Conflict("activity is full"));
            }
        }

        let now = Utc::now();
        let participant = sqlx::query_as(&format!(
            r#"
            INSERT INTO activity_participants (user_id, activity_id, club_id, status, created_at, updated_at)
            VALUES (?, ?, ?, 'confirmed', ?, ?)
            ON CONFLICT (user_id, activity_id)
            DO UPDATE SET status = 'confirmed', updated_at = excluded.updated_at
            {RETURNING}
            "#
        ))
        .bind(user_id)
        .bind(activity.id)
        .bind(activity.club_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(participant)
    }

    /// Cancel a confirmed registration.
    pub async fn cancel(&self, user_id: i64, activity_id: i64) -> Result<Participant, DbError> {
        sqlx::query_as(&format!(
            r#"
            UPDATE activity_participants SET status = 'cancelled', updated_at = ?
            WHERE user_id = ? AND activity_id = ? AND status = 'confirmed'
            {RETURNING}
            "#
        ))
        .bind(Utc::now())
        .bind(user_id)
        .bind(activity_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(DbError::Conflict("no confirmed registration for this activity"))
    }

    pub async fn list_for_activity(
        &self,
        activity_id: i64,
        page: Pagination,
    ) -> Result<Page<ParticipantWithUser>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT p.id, p.user_id, p.activity_id, p.club_id, p.status, p.created_at, p.updated_at,
                   {USER_BRIEF_COLUMNS}, COUNT(*) OVER() AS total
            FROM activity_participants p
            JOIN users u ON u.id = p.user_id
            WHERE p.activity_id = ?
            ORDER BY p.id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(activity_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM activity_participants p JOIN users u ON u.id = p.user_id \
             WHERE p.activity_id = ?",
        )
        .bind(activity_id)
        .fetch_one(self.pool);
        paged(rows, page, count).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        create_memory_pool, run_migrations, ActivityInput, ActivityRepo, ClubRepo, NewClub, UserRepo,
    };
    use clubhub_core::{Scope, SystemRole};

    async fn setup(max_participants: i64) -> (SqlitePool, Activity, Vec<i64>) {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let users = UserRepo::new(&pool);
        let mut ids = Vec::new();
        for account in ["lead", "amy", "bob"] {
            ids.push(users.create(account, "h", account, SystemRole::User).await.unwrap().id);
        }
        let club = ClubRepo::new(&pool)
            .register(
                ids[0],
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
        let activity = ActivityRepo::new(&pool)
            .create(
                club,
                ActivityInput {
                    subject: "Blitz night".into(),
                    time_label: String::new(),
                    place: String::new(),
                    target: String::new(),
                    scope: Scope::Public,
                    content: String::new(),
                    start_at: None,
                    end_at: None,
                    max_participants,
                    publish_at: None,
                },
            )
            .await
            .unwrap();
        (pool, activity, ids)
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let (pool, activity, ids) = setup(1).await;
        let repo = ParticipantRepo::new(&pool);

        repo.register(ids[1], &activity).await.unwrap();
        // Registering twice is a no-op
        repo.register(ids[1], &activity).await.unwrap();
        assert!(matches!(
            repo.register(ids[2], &activity).await.unwrap_err(),
            DbError::Conflict("activity is full")
        ));

        repo.cancel(ids[1], activity.id).await.unwrap();
        repo.register(ids[2], &activity).await.unwrap();
        // The freed seat is taken again, so re-confirming is refused
        assert!(matches!(
            repo.register(ids[1], &activity).await.unwrap_err(),
            DbError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn cancel_requires_confirmed() {
        let (pool, activity, ids) = setup(0).await;
        let repo = ParticipantRepo::new(&pool);

        assert!(matches!(
            repo.cancel(ids[1], activity.id).await.unwrap_err(),
            DbError::Conflict(_)
        ));
        repo.register(ids[1], &activity).await.unwrap();
        assert!(repo.registration(ids[1], activity.id).await.unwrap().registered);

        let cancelled = repo.cancel(ids[1], activity.id).await.unwrap();
        assert_eq!(cancelled.status, ParticipantStatus::Cancelled);
        assert!(!repo.registration(ids[1], activity.id).await.unwrap().registered);
        assert!(repo.cancel(ids[1], activity.id).await.is_err());

        let revived = repo.register(ids[1], &activity).await.unwrap();
        assert_eq!(revived.id, cancelled.id);
        assert!(revived.is_confirmed());
    }

    #[tokio::test]
    async fn lists_participants_with_users() {
        let (pool, activity, ids) = setup(0).await;
        let repo = ParticipantRepo::new(&pool);
        repo.register(ids[1], &activity).await.unwrap();
        repo.register(ids[2], &activity).await.unwrap();

        let page = repo.list_for_activity(activity.id, Pagination::default()).await.unwrap();
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.list[0].user.account, "bob");
    }
}
