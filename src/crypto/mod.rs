//! Account credentials: password hashing and JWT bearer tokens.

pub mod password;
pub mod tokens;

pub use password::*;
pub use tokens::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    HashFailed(String),

    #[error("Stored password hash is malformed")]
    MalformedHash,

    #[error("Password rejected: {0}")]
    WeakPassword(String),

    #[error("JWT secret must be at least {min} bytes")]
    SecretTooShort { min: usize },

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token encoding failed: {0}")]
    TokenEncoding(String),
}
