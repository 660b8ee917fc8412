//! Named and per-branch databases on a provisioned server.
//!
//! Database names come from branch names and caller queries, so they are
//! sanitized before they reach any statement: every character that is not a
//! letter, digit or underscore is dropped. The transform is lossy and
//! deterministic, so `feature/a-b` and `featureab` map to the same database.
//! Callers that care about collisions validate names first.

pub mod error;
pub mod executor;

use std::sync::Arc;

pub use error::{DatabaseError, Result};
pub use executor::{MySqlExecutor, ServerAddress, StatementExecutor};

/// Prefix for databases derived from a branch name.
pub const BRANCH_DATABASE_PREFIX: &str = "branch_";

/// Keep only letters, digits and underscores.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Creates databases idempotently on a database server.
#[derive(Clone)]
pub struct DatabaseProvisioner {
    executor: Arc<dyn StatementExecutor>,
}

impl DatabaseProvisioner {
    pub fn new(executor: Arc<dyn StatementExecutor>) -> Self {
        Self { executor }
    }

    /// Provisioner talking to MySQL servers through sqlx.
    pub fn mysql() -> Self {
        Self::new(Arc::new(MySqlExecutor))
    }

    /// Ensure a database named after `raw_name` exists; returns the
    /// sanitized name.
    pub async fn get_or_create_named_database(
        &self,
        server_connection: &str,
        raw_name: &str,
    ) -> Result<String> {
        let name = sanitize(raw_name);
        if name.is_empty() {
            return Err(DatabaseError::InvalidName {
                raw: raw_name.to_string(),
            });
        }

        tracing::debug!(database = %name, "Creating database if missing");
        self.executor
            .execute(
                server_connection,
                &format!("CREATE DATABASE IF NOT EXISTS `{name}`"),
            )
            .await?;

        Ok(name)
    }

    /// Ensure the database for `branch_name` exists; returns its sanitized
    /// name (`branch_<branch>`).
    pub async fn get_or_create_branch_database(
        &self,
        server_connection: &str,
        branch_name: &str,
    ) -> Result<String> {
        self.get_or_create_named_database(
            server_connection,
            &format!("{BRANCH_DATABASE_PREFIX}{branch_name}"),
        )
        .await
    }
}
