//! Prefixed-URL front end for the lookup registry.
//!
//! Callers that only understand connection URLs hand over `sf:<query>`; the
//! driver strips the prefix, resolves the query through the registry and
//! opens a MySQL connection to the result.

use std::sync::Arc;

use sqlx::mysql::MySqlConnection;
use thiserror::Error;

use crate::database::{DatabaseError, MySqlExecutor};
use crate::lookup::{ConnectionLookupRegistry, LookupError};

/// URL prefix this driver claims.
pub const URL_PREFIX: &str = "sf:";

/// Errors from [`DelegatingDriver::connect`].
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Resolves `sf:` URLs through a [`ConnectionLookupRegistry`].
pub struct DelegatingDriver {
    registry: Arc<ConnectionLookupRegistry>,
}

impl DelegatingDriver {
    pub fn new(registry: Arc<ConnectionLookupRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionLookupRegistry> {
        &self.registry
    }

    /// Whether `url` carries the prefix and a non-empty query after it.
    pub fn accepts_url(url: &str) -> bool {
        url.len() > URL_PREFIX.len() && url.starts_with(URL_PREFIX)
    }

    /// The query part of an accepted URL.
    pub fn query_for(url: &str) -> Option<&str> {
        if Self::accepts_url(url) {
            Some(&url[URL_PREFIX.len()..])
        } else {
            None
        }
    }

    /// Connection string for `url`.
    ///
    /// `None` when the URL is not ours or no lookup knows the query.
    pub async fn resolve(&self, url: &str) -> Result<Option<String>, LookupError> {
        let Some(query) = Self::query_for(url) else {
            tracing::debug!(url = %url, "Not a delegating URL");
            return Ok(None);
        };

        match self.registry.lookup(query).await? {
            Some(result) => Ok(Some(result.into_connection_string())),
            None => {
                tracing::warn!(query = %query, "No connection available for query");
                Ok(None)
            }
        }
    }

    /// Open a connection for `url`.
    ///
    /// `None` under the same conditions as [`resolve`](Self::resolve).
    pub async fn connect(&self, url: &str) -> Result<Option<MySqlConnection>, DriverError> {
        let Some(connection_string) = self.resolve(url).await? else {
            return Ok(None);
        };
        Ok(Some(MySqlExecutor::connect(&connection_string).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticLookup;

    #[test]
    fn test_accepts_url() {
        assert!(DelegatingDriver::accepts_url("sf:orders"));
        assert!(DelegatingDriver::accepts_url("sf:branch"));
        assert!(!DelegatingDriver::accepts_url("sf:"));
        assert!(!DelegatingDriver::accepts_url("mysql://h/db"));
        assert!(!DelegatingDriver::accepts_url("xsf:orders"));
        assert!(!DelegatingDriver::accepts_url(""));
    }

    #[test]
    fn test_query_for() {
        assert_eq!(DelegatingDriver::query_for("sf:orders"), Some("orders"));
        assert_eq!(DelegatingDriver::query_for("sf:"), None);
        assert_eq!(DelegatingDriver::query_for("jdbc:mysql:x"), None);
    }

    #[tokio::test]
    async fn test_resolve_through_registry() {
        let registry = Arc::new(ConnectionLookupRegistry::explicit_only());
        registry
            .register(Arc::new(StaticLookup::answering("orders", "mysql://h:1/orders")))
            .await;
        let driver = DelegatingDriver::new(registry);

        assert_eq!(
            driver.resolve("sf:orders").await.unwrap().as_deref(),
            Some("mysql://h:1/orders")
        );
        assert_eq!(driver.resolve("sf:unknown").await.unwrap(), None);
        assert_eq!(driver.resolve("mysql://h:1/orders").await.unwrap(), None);
    }

    #[test]
    fn test_failing_lookup_error_propagates() {
        let registry = Arc::new(ConnectionLookupRegistry::explicit_only());
        tokio_test::block_on(registry.register(Arc::new(StaticLookup::failing("boom"))));
        let driver = DelegatingDriver::new(registry);

        let err = tokio_test::block_on(driver.resolve("sf:orders")).unwrap_err();
        assert!(matches!(err, LookupError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_connect_without_answer_is_none() {
        let driver = DelegatingDriver::new(Arc::new(ConnectionLookupRegistry::explicit_only()));
        assert!(driver.connect("sf:orders").await.unwrap().is_none());
        assert!(driver.connect("other").await.unwrap().is_none());
    }
}
