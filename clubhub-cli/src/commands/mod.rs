//! Subcommand implementations

pub mod config;
pub mod db;
pub mod serve;
