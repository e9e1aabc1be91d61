//! HTTP server command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use clubhub_core::ClubhubConfig;
use clubhub_server::db::seed;
use clubhub_server::{run_server, PasswordHasher};

use super::db::open_database;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides config/environment)
    #[arg(long, short = 'b', env = "CLUBHUB_BIND_ADDR")]
    pub bind: Option<String>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Directory served under /static (uploads land in a sub-directory)
    #[arg(long, env = "CLUBHUB_PUBLIC_DIR")]
    pub public_dir: Option<PathBuf>,

    /// Skip the startup seed
    #[arg(long)]
    pub no_seed: bool,
}

impl ServeArgs {
    fn apply(&self, config: &mut ClubhubConfig) {
        if let Some(bind) = &self.bind {
            config.server.bind_addr = bind.clone();
        }
        if self.cors_permissive {
            config.server.cors_permissive = true;
        }
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Some(dir) = &self.public_dir {
            config.server.public_dir = dir.clone();
        }
    }
}

/// Run the HTTP server until shutdown
pub async fn run(args: &ServeArgs, mut config: ClubhubConfig) -> Result<()> {
    args.apply(&mut config);
    tracing::info!(bind = %config.server.bind_addr, database = %config.database.url, "starting clubhub");

    let pool = open_database(&config).await?;
    if !args.no_seed {
        let report = seed(&pool, &config.seed, &PasswordHasher::new(config.auth.bcrypt_cost)).await?;
        tracing::info!(?report, "seed checked");
    }

    run_server(pool, &config).await.context("server error")?;
    Ok(())
}
