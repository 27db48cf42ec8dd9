//! Common error types for Trialist

use thiserror::Error;

/// Common result type for Trialist operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Trialist tools
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or run parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored data that violates the expected survey or stream shape
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
