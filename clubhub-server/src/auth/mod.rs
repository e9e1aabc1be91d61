//! Authentication primitives: bcrypt password hashing and HS256 bearer tokens.

pub mod jwt;
pub mod password;

pub use jwt::{Claims, TokenService};
pub use password::{PasswordHasher, MAX_COST, MIN_COST};

/// Authentication failure
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
