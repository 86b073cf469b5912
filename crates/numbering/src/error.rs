//! Error types for the numbering service

use thiserror::Error;

use crate::format::FormatError;

/// Error type for numbering operations
#[derive(Error, Debug)]
pub enum NumberingError {
    /// Database connection or operation error, including exhausted retries
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Label rendering error
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for numbering operations
pub type Result<T> = std::result::Result<T, NumberingError>;
