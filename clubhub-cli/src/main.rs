//! clubhub CLI - university club management backend
//!
//! - `serve`: run the HTTP API (migrates and seeds on startup)
//! - `migrate`: create or update the database schema
//! - `seed`: insert the admin account and demo data
//! - `config`: write or inspect the configuration file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clubhub_core::ClubhubConfig;

mod commands;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "clubhub",
    author,
    version,
    about = "Backend for university club management: accounts, clubs, activities and attendance"
)]
struct Cli {
    /// Config file (default: ./clubhub.toml when present)
    #[arg(long, short = 'c', global = true, env = "CLUBHUB_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (requires the telemetry feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Apply database migrations
    Migrate(commands::db::DbArgs),
    /// Insert the admin account and demo data (idempotent)
    Seed(commands::db::SeedArgs),
    /// Manage the configuration file (init, show)
    Config(commands::config::ConfigArgs),
}

impl Cli {
    fn load_config(&self) -> Result<ClubhubConfig> {
        ClubhubConfig::load(self.config.as_deref()).context("failed to load configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_setup::init(&tracing_setup::TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
    })?;

    let result = match &cli.command {
        Commands::Serve(args) => commands::serve::run(args, cli.load_config()?).await,
        Commands::Migrate(args) => commands::db::run_migrate(args, cli.load_config()?).await,
        Commands::Seed(args) => commands::db::run_seed(args, cli.load_config()?).await,
        Commands::Config(args) => commands::config::run(args, cli.config.as_deref()),
    };

    tracing_setup::shutdown_otel();
    result
}
