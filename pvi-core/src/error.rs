//! Error types for pvi-core

use thiserror::Error;

/// Main error type for the pvi-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A mutation was rejected before reaching storage
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// User not found
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Intended task not found
    #[error("intended task not found: {0}")]
    TaskNotFound(i64),

    /// Log entry not found
    #[error("log entry not found: {0}")]
    LogNotFound(i64),

    /// The caller tried to touch a row owned by another user
    #[error("{entity} {id} is not owned by user {user_id}")]
    NotOwner {
        entity: &'static str,
        id: i64,
        user_id: String,
    },

    /// A shared lock was poisoned by a panicking holder
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// Stored data could not be decoded
    #[error("corrupt {column} value: {value}")]
    Corrupt { column: &'static str, value: String },
}

/// Result type alias for pvi-core
pub type Result<T> = std::result::Result<T, Error>;
