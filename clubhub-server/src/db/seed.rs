//! Idempotent seed data
//!
//! Creates the administrator account and, when `demo_data` is on, a set of
//! categories, demo leaders, approved clubs and public activities. Rows that
//! already exist (matched by their natural key) are left alone.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clubhub_core::config::SeedSection;
use clubhub_core::{Scope, SystemRole};
use sqlx::SqlitePool;
use tracing::info;

use super::{ActivityInput, ActivityRepo, CategoryRepo, ProfileUpdate, UserRepo};
use crate::auth::PasswordHasher;

/// Password of every demo leader account
pub const DEMO_PASSWORD: &str = "123456";

const CATEGORIES: &[&str] = &[
    "Literature",
    "Music",
    "Volunteering",
    "Social Practice",
    "Esports",
    "Photography",
    "Entrepreneurship",
];

/// (name, intro, index into CATEGORIES)
const CLUBS: &[(&str, &str, usize)] = &[
    ("Literature Society", "Reading circles and writing workshops.", 0),
    ("Poetry Club", "Classical poetry appreciation and composition.", 0),
    ("Guitar Club", "Guitar practice and stage performance.", 1),
    ("Choir", "Multi-part choral training and concerts.", 1),
    ("Volunteer Association", "Campus and community volunteer work.", 2),
    ("Red Cross Chapter", "First aid training and charity events.", 2),
    ("Social Research Club", "Field surveys and report writing.", 3),
    ("Innovation Lab", "Hands-on projects with industry partners.", 3),
    ("Esports Club", "Team training and tournament organisation.", 4),
    ("Board Game Club", "Strategy games and a campus league.", 4),
    ("Photography Association", "Photo walks and editing sessions.", 5),
    ("Founders Union", "Startup thinking and pitch practice.", 6),
];

const ACTIVITY_FORMATS: &[&str] = &["Talk", "Recruitment", "Contest"];

/// What a seed run inserted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub admin_created: bool,
    pub categories: usize,
    pub leaders_created: usize,
    pub clubs_created: usize,
    pub activities_created: usize,
}

pub async fn seed(pool: &SqlitePool, settings: &SeedSection, hasher: &PasswordHasher) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    let users = UserRepo::new(pool);

    if !users.exists_with_account(&settings.admin_account).await? {
        let hash = hasher
            .hash(&settings.admin_password)
            .await
            .context("failed to hash admin password")?;
        users
            .create(&settings.admin_account, &hash, "Administrator", SystemRole::Admin)
            .await
            .context("failed to create admin account")?;
        report.admin_created = true;
        info!(account = %settings.admin_account, "created admin account");
    }

    if !settings.demo_data {
        return Ok(report);
    }

    let categories = CategoryRepo::new(pool);
    let mut category_ids = Vec::with_capacity(CATEGORIES.len());
    for name in CATEGORIES {
        category_ids.push(categories.ensure(name).await?);
    }
    report.categories = category_ids.len();

    let demo_hash = hasher
        .hash(DEMO_PASSWORD)
        .await
        .context("failed to hash demo password")?;

    let mut leader_ids = Vec::with_capacity(CLUBS.len());
    for i in 1..=CLUBS.len() {
        let account = format!("leader{:02}", i);
        let id = match users.find_by_account(&account).await? {
            Some(user) => user.id,
            None => {
                let user = users
                    .create(&account, &demo_hash, &format!("Leader {:02}", i), SystemRole::User)
                    .await
                    .with_context(|| format!("failed to create {}", account))?;
                users
                    .update_profile(
                        user.id,
                        ProfileUpdate {
                            gender: Some("M".into()),
                            college: Some("School of Information".into()),
                            student_no: Some(format!("2025{:04}", i)),
                            phone: Some(format!("138{:08}", 10_000 + i)),
                            ..Default::default()
                        },
                    )
                    .await?;
                report.leaders_created += 1;
                user.id
            }
        };
        leader_ids.push(id);
    }

    let activities = ActivityRepo::new(pool);
    let now = Utc::now();
    for ((name, intro, category), leader) in CLUBS.iter().zip(&leader_ids) {
        let (club_id, created) = ensure_club(pool, name, intro, category_ids[*category]).await?;
        if created {
            report.clubs_created += 1;
        }

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO memberships (user_id, club_id, status, role, created_at, updated_at)
            VALUES (?, ?, 'approved', 'leader', ?, ?)
            "#,
        )
        .bind(leader)
        .bind(club_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        for (j, kind) in ACTIVITY_FORMATS.iter().enumerate() {
            let subject = format!("{}: {} #{}", kind, name, j + 1);
            let (exists,): (bool,) = sqlx::query_as(
                "SELECT EXISTS (SELECT 1 FROM activities WHERE club_id = ? AND subject = ?)",
            )
            .bind(club_id)
            .bind(&subject)
            .fetch_one(pool)
            .await?;
            if exists {
                continue;
            }

            let start = now + Duration::days(7 * (j as i64 + 1));
            activities
                .create(
                    club_id,
                    ActivityInput {
                        subject,
                        time_label: start.format("%Y-%m-%d %H:%M").to_string(),
                        place: "Student Activity Center".into(),
                        target: "All students".into(),
                        scope: Scope::Public,
                        content: String::new(),
                        start_at: Some(start),
                        end_at: Some(start + Duration::hours(2)),
                        max_participants: 0,
                        publish_at: Some(now),
                    },
                )
                .await?;
            report.activities_created += 1;
        }
    }

    info!(
        leaders = report.leaders_created,
        clubs = report.clubs_created,
        activities = report.activities_created,
        "seeded demo data"
    );
    Ok(report)
}

/// Approved club by name, inserting it when missing.
async fn ensure_club(pool: &SqlitePool, name: &str, intro: &str, category_id: i64) -> Result<(i64, bool)> {
    let now = Utc::now();
    let inserted = sqlx::query(
        r#"
        INSERT OR IGNORE INTO clubs (name, intro, category_id, status, created_at, updated_at)
        VALUES (?, ?, ?, 'approved', ?, ?)
        "#,
    )
    .bind(name)
    .bind(intro)
    .bind(category_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .with_context(|| format!("failed to insert club {}", name))?
    .rows_affected()
        > 0;

    let (id,): (i64,) = sqlx::query_as("SELECT id FROM clubs WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok((id, inserted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_memory_pool, run_migrations};
    use crate::auth;

    fn settings(demo_data: bool) -> SeedSection {
        SeedSection {
            admin_account: "admin".into(),
            admin_password: "123456".into(),
            demo_data,
        }
    }

    #[tokio::test]
    async fn seed_twice_inserts_once() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let hasher = PasswordHasher::new(auth::MIN_COST);

        let first = seed(&pool, &settings(true), &hasher).await.unwrap();
        assert!(first.admin_created);
        assert_eq!(first.clubs_created, CLUBS.len());
        assert_eq!(first.activities_created, CLUBS.len() * ACTIVITY_FORMATS.len());

        let second = seed(&pool, &settings(true), &hasher).await.unwrap();
        assert_eq!(
            second,
            SeedReport {
                categories: CATEGORIES.len(),
                ..Default::default()
            }
        );

        let (leaders,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM memberships WHERE role = 'leader' AND status = 'approved'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(leaders, CLUBS.len() as i64);
    }

    #[tokio::test]
    async fn admin_only_without_demo_data() {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let hasher = PasswordHasher::new(auth::MIN_COST);

        let report = seed(&pool, &settings(false), &hasher).await.unwrap();
        assert!(report.admin_created);
        assert_eq!(report.clubs_created, 0);

        let admin = UserRepo::new(&pool).find_by_account("admin").await.unwrap().unwrap();
        assert_eq!(admin.role, SystemRole::Admin);
        assert!(hasher.verify("123456", &admin.password_hash).await.unwrap());
    }
}
