//! Query → connection string resolution.
//!
//! A [`ConnectionLookupRegistry`] holds an ordered list of
//! [`ConnectionLookup`] strategies. Lookups try explicitly registered
//! strategies first, then strategies produced by a [`LookupDiscovery`], and
//! remember the first answer per query.

pub mod discovery;
pub mod error;
pub mod per_application;
pub mod registry;

use std::sync::Arc;

use async_trait::async_trait;

pub use discovery::{InventoryDiscovery, LookupDiscovery, LookupPlugin, NoDiscovery};
pub use error::LookupError;
pub use per_application::{BRANCH_QUERY, PerApplicationLookup, append_database_name};
pub use registry::ConnectionLookupRegistry;

/// A strategy that may know the connection string for a query.
#[async_trait]
pub trait ConnectionLookup: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Connection string for `query`, or `None` if this strategy does not
    /// handle it.
    ///
    /// May be expensive (provisioning a server, for instance); the registry
    /// imposes no timeout.
    async fn find(&self, query: &str) -> Result<Option<String>, LookupError>;
}

/// A resolved query: which strategy answered and what it answered.
#[derive(Clone)]
pub struct LookupResult {
    lookup: Arc<dyn ConnectionLookup>,
    connection_string: String,
}

impl LookupResult {
    pub fn new(lookup: Arc<dyn ConnectionLookup>, connection_string: String) -> Self {
        Self {
            lookup,
            connection_string,
        }
    }

    /// The strategy that produced this result.
    pub fn lookup(&self) -> &Arc<dyn ConnectionLookup> {
        &self.lookup
    }

    /// The resolved connection string.
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn into_connection_string(self) -> String {
        self.connection_string
    }
}

impl std::fmt::Debug for LookupResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupResult")
            .field("lookup", &self.lookup.name())
            .field("connection_string", &self.connection_string)
            .finish()
    }
}
