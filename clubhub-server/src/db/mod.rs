//! Database layer - connection pool, schema, seed data and repositories
//!
//! # Design Principles
//!
//! - Connection pool - no Arc<Mutex<Connection>>
//! - All list operations use JOINs - no N+1 queries
//! - Rely on DB constraints, handle conflicts - no check-then-insert
//! - Transactions for multi-step operations

pub mod migrations;
pub mod pool;
pub mod repos;
pub mod seed;

pub use migrations::run_migrations;
pub use pool::{create_memory_pool, create_pool, create_pool_with_options};
pub use repos::*;
pub use seed::{seed, SeedReport};
