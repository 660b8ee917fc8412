//! Discovery of lookup strategies that were not registered explicitly.
//!
//! Strategies publish themselves at compile time:
//!
//! ```rust,ignore
//! inventory::submit! {
//!     LookupPlugin { name: "my-lookup", build: |config| Ok(Arc::new(MyLookup::new(config))) }
//! }
//! ```
//!
//! The registry asks its discovery for the set again every time no registered
//! strategy answers. Factories that hold process-wide state (an application
//! identity, a server cache) hand out a shared instance instead of building
//! a new one on each call.

use std::sync::Arc;

use crate::config::Config;
use crate::lookup::{ConnectionLookup, LookupError};

/// Builds a discovered strategy from the process configuration.
pub type LookupFactory = fn(&Config) -> Result<Arc<dyn ConnectionLookup>, LookupError>;

/// A compile-time registered lookup strategy.
pub struct LookupPlugin {
    /// Name used in logs.
    pub name: &'static str,
    /// Factory invoked on every discovery.
    pub build: LookupFactory,
}

inventory::collect!(LookupPlugin);

/// Source of strategies consulted after the registered ones.
pub trait LookupDiscovery: Send + Sync {
    /// Enumerate strategies. Called on every registry miss.
    fn discover(&self) -> Vec<Arc<dyn ConnectionLookup>>;
}

/// Discovers every [`LookupPlugin`] linked into the binary.
pub struct InventoryDiscovery {
    config: Config,
}

impl InventoryDiscovery {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl LookupDiscovery for InventoryDiscovery {
    fn discover(&self) -> Vec<Arc<dyn ConnectionLookup>> {
        let mut lookups = Vec::new();
        for plugin in inventory::iter::<LookupPlugin> {
            match (plugin.build)(&self.config) {
                Ok(lookup) => lookups.push(lookup),
                Err(e) => {
                    tracing::warn!(plugin = plugin.name, "Skipping lookup plugin: {}", e);
                }
            }
        }
        lookups
    }
}

/// Discovers nothing; only registered strategies are consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiscovery;

impl LookupDiscovery for NoDiscovery {
    fn discover(&self) -> Vec<Arc<dyn ConnectionLookup>> {
        Vec::new()
    }
}
