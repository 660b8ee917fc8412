//! Ordered, memoizing registry of lookup strategies.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::lookup::discovery::{InventoryDiscovery, LookupDiscovery, NoDiscovery};
use crate::lookup::{ConnectionLookup, LookupError, LookupResult};

/// Registry of [`ConnectionLookup`] strategies.
///
/// Resolution order for a query:
///
/// 1. a previously memoized result;
/// 2. registered strategies, in registration order;
/// 3. strategies from the discovery, enumerated afresh.
///
/// The first `Some` answer is memoized for the query and never replaced.
/// Misses and errors are not memoized.
///
/// Registration publishes a new snapshot of the list, so lookups already
/// iterating keep the list they started with.
pub struct ConnectionLookupRegistry {
    lookups: RwLock<Arc<Vec<Arc<dyn ConnectionLookup>>>>,
    results: RwLock<HashMap<String, LookupResult>>,
    discovery: Arc<dyn LookupDiscovery>,
}

impl ConnectionLookupRegistry {
    pub fn new(discovery: Arc<dyn LookupDiscovery>) -> Self {
        Self {
            lookups: RwLock::new(Arc::new(Vec::new())),
            results: RwLock::new(HashMap::new()),
            discovery,
        }
    }

    /// Registry that falls back to compile-time registered plugins.
    pub fn with_inventory(config: Config) -> Self {
        Self::new(Arc::new(InventoryDiscovery::new(config)))
    }

    /// Registry that only consults registered strategies.
    pub fn explicit_only() -> Self {
        Self::new(Arc::new(NoDiscovery))
    }

    /// Append a strategy. Returns `false` if this exact instance is already
    /// registered.
    pub async fn register(&self, lookup: Arc<dyn ConnectionLookup>) -> bool {
        let mut guard = self.lookups.write().await;
        if guard.iter().any(|l| Arc::ptr_eq(l, &lookup)) {
            return false;
        }

        tracing::debug!(lookup = lookup.name(), "Registering connection lookup");
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(lookup);
        *guard = Arc::new(next);
        true
    }

    /// Remove a strategy. Returns `false` if it was not registered.
    ///
    /// Results it already produced stay memoized.
    pub async fn deregister(&self, lookup: &Arc<dyn ConnectionLookup>) -> bool {
        let mut guard = self.lookups.write().await;
        if !guard.iter().any(|l| Arc::ptr_eq(l, lookup)) {
            return false;
        }

        tracing::debug!(lookup = lookup.name(), "Deregistering connection lookup");
        let next: Vec<_> = guard
            .iter()
            .filter(|l| !Arc::ptr_eq(l, lookup))
            .cloned()
            .collect();
        *guard = Arc::new(next);
        true
    }

    /// Number of registered strategies.
    pub async fn len(&self) -> usize {
        self.lookups.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.lookups.read().await.is_empty()
    }

    /// Resolve `query`, or `None` if no strategy knows it.
    ///
    /// A strategy error aborts the lookup and is returned as is; strategies
    /// after it are not consulted.
    pub async fn lookup(&self, query: &str) -> Result<Option<LookupResult>, LookupError> {
        if let Some(hit) = self.results.read().await.get(query) {
            return Ok(Some(hit.clone()));
        }

        let snapshot = Arc::clone(&*self.lookups.read().await);
        if let Some(found) = self.first_answer(snapshot.iter(), query).await? {
            return Ok(Some(self.remember(query, found).await));
        }

        let discovered = self.discovery.discover();
        if let Some(found) = self.first_answer(discovered.iter(), query).await? {
            return Ok(Some(self.remember(query, found).await));
        }

        tracing::debug!(query = %query, "No connection lookup answered");
        Ok(None)
    }

    /// Memoized result for `query`, without consulting any strategy.
    pub async fn cached(&self, query: &str) -> Option<LookupResult> {
        self.results.read().await.get(query).cloned()
    }

    async fn first_answer<'a>(
        &self,
        lookups: impl Iterator<Item = &'a Arc<dyn ConnectionLookup>>,
        query: &str,
    ) -> Result<Option<LookupResult>, LookupError> {
        for lookup in lookups {
            if let Some(connection_string) = lookup.find(query).await? {
                tracing::debug!(lookup = lookup.name(), query = %query, "Connection lookup answered");
                return Ok(Some(LookupResult::new(
                    Arc::clone(lookup),
                    connection_string,
                )));
            }
        }
        Ok(None)
    }

    /// First writer wins; a racing lookup gets the stored result back.
    async fn remember(&self, query: &str, found: LookupResult) -> LookupResult {
        self.results
            .write()
            .await
            .entry(query.to_string())
            .or_insert(found)
            .clone()
    }
}
