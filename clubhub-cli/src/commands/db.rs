//! Database maintenance: migrations and seed data

use anyhow::{Context, Result};
use clap::Parser;
use clubhub_core::ClubhubConfig;
use clubhub_server::db::{create_pool_with_options, run_migrations, seed};
use clubhub_server::PasswordHasher;
use sqlx::SqlitePool;

#[derive(Parser, Debug)]
pub struct DbArgs {
    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

#[derive(Parser, Debug)]
pub struct SeedArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// Only create the admin account
    #[arg(long)]
    pub no_demo: bool,
}

/// Connect and bring the schema up to date.
pub async fn open_database(config: &ClubhubConfig) -> Result<SqlitePool> {
    let pool = create_pool_with_options(&config.database.url, config.database.max_connections)
        .await
        .with_context(|| format!("failed to open database {}", config.database.url))?;
    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrate(args: &DbArgs, mut config: ClubhubConfig) -> Result<()> {
    if let Some(url) = &args.database_url {
        config.database.url = url.clone();
    }
    let pool = open_database(&config).await?;
    pool.close().await;

    println!("Migrations applied to {}", config.database.url);
    Ok(())
}

pub async fn run_seed(args: &SeedArgs, mut config: ClubhubConfig) -> Result<()> {
    if let Some(url) = &args.db.database_url {
        config.database.url = url.clone();
    }
    if args.no_demo {
        config.seed.demo_data = false;
    }

    let pool = open_database(&config).await?;
    let hasher = PasswordHasher::new(config.auth.bcrypt_cost);
    let report = seed(&pool, &config.seed, &hasher).await?;
    pool.close().await;

    println!(
        "Seed complete: admin {}, {} categories, {} leaders, {} clubs, {} activities created",
        if report.admin_created { "created" } else { "already present" },
        report.categories,
        report.leaders_created,
        report.clubs_created,
        report.activities_created,
    );
    Ok(())
}
