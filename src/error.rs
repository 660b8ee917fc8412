//! Shared error types.
//!
//! Component errors live next to their components (`container::error`,
//! `database::error`, `lookup::error`); this module holds the errors that
//! cut across them.

use thiserror::Error;

/// Errors raised while resolving configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting is present but cannot be parsed.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Environment variable name.
        key: String,
        /// What was wrong with it.
        message: String,
    },
}
