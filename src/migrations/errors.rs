//! # Migration Errors

use thiserror::Error;

/// Result type for schema migrations
pub type MigrationResult<T> = Result<T, MigrationError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    /// Target version is neither 0 nor a known migration
    #[error("Unknown schema version: {0}")]
    UnknownVersion(u32),

    /// A migration's statement failed; earlier migrations stay applied
    #[error("Migration {version} failed: {message}")]
    Statement { version: u32, message: String },

    /// The version ledger could not be read or written
    #[error("Migration ledger error: {0}")]
    Ledger(String),
}
