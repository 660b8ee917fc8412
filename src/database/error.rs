//! Error types for database provisioning.

use thiserror::Error;

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Errors raised while creating databases on a provisioned server.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Nothing usable was left of the name after sanitizing.
    #[error("Database name '{raw}' contains no letters, digits or underscores")]
    InvalidName {
        /// The name as supplied.
        raw: String,
    },

    /// The server connection string could not be parsed.
    #[error("Invalid server connection string: {reason}")]
    InvalidConnectionString {
        /// Reason for failure.
        reason: String,
    },

    /// Could not connect to the server.
    #[error("Failed to connect to database server: {0}")]
    Connect(#[source] sqlx::Error),

    /// The server rejected the statement.
    #[error("Statement failed: {0}")]
    Statement(#[source] sqlx::Error),

    /// Any other executor failure (used by non-sqlx executors).
    #[error("Statement execution failed: {reason}")]
    Execution {
        /// Reason for failure.
        reason: String,
    },
}
