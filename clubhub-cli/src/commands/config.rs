//! `clubhub config` - write and inspect the configuration file

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use clubhub_core::config::DEFAULT_CONFIG_FILE;
use clubhub_core::ClubhubConfig;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a commented default config file
    Init(InitArgs),
    /// Print the effective config (file + environment) with secrets masked
    Show,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Where to write (default: --config, else ./clubhub.toml)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Force overwrite existing config
    #[arg(long, short)]
    pub force: bool,
}

pub fn run(args: &ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    match &args.command {
        ConfigCommands::Init(init) => run_init(init, config_path),
        ConfigCommands::Show => run_show(config_path),
    }
}

fn run_init(args: &InitArgs, config_path: Option<&Path>) -> Result<()> {
    let path = args
        .path
        .as_deref()
        .or(config_path)
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

    if path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let body = ClubhubConfig::default_toml()?;
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn run_show(config_path: Option<&Path>) -> Result<()> {
    let config = ClubhubConfig::load(config_path).context("failed to load configuration")?;
    print!("{}", config.redacted().to_toml()?);
    Ok(())
}
