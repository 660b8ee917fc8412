//! Single-flight cache of provisioned database servers.
//!
//! Keyed by application identity (exact string equality). A miss runs the
//! provisioning workflow; concurrent callers for the same identity wait on
//! that one run and share its outcome, success or failure. Successful
//! results are kept, failures are not, so the next call after a failure
//! provisions from scratch.
//!
//! # Memory
//!
//! By default entries are never evicted: the cache lives as long as the
//! process and grows by one entry per distinct identity. Long-lived hosts
//! can bound it with a capacity or time-to-live, which only changes
//! retention, never the single-flight behaviour.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::container::config::{ProvisionedServer, ProvisioningRequest};
use crate::container::error::ProvisionError;
use crate::container::workflow::ProvisioningWorkflow;

/// Retention options for [`ContainerLifecycleCache`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheRetention {
    /// Maximum number of identities kept.
    pub max_capacity: Option<u64>,
    /// How long an entry lives after it was provisioned.
    pub time_to_live: Option<Duration>,
}

/// Per-identity cache in front of a [`ProvisioningWorkflow`].
pub struct ContainerLifecycleCache {
    servers: Cache<String, ProvisionedServer>,
    workflow: Arc<ProvisioningWorkflow>,
}

impl ContainerLifecycleCache {
    /// Process-lifetime cache with no eviction.
    pub fn new(workflow: Arc<ProvisioningWorkflow>) -> Self {
        Self::with_retention(workflow, CacheRetention::default())
    }

    /// Cache with explicit retention bounds.
    pub fn with_retention(workflow: Arc<ProvisioningWorkflow>, retention: CacheRetention) -> Self {
        let mut builder = Cache::builder();
        if let Some(capacity) = retention.max_capacity {
            builder = builder.max_capacity(capacity);
        }
        if let Some(ttl) = retention.time_to_live {
            builder = builder.time_to_live(ttl);
        }

        Self {
            servers: builder.build(),
            workflow,
        }
    }

    /// Return the server for `identity`, provisioning it on a miss.
    ///
    /// Errors are shared between every caller that was waiting on the failed
    /// attempt, hence the `Arc`.
    pub async fn get_or_create(
        &self,
        identity: &str,
        request: ProvisioningRequest,
    ) -> Result<ProvisionedServer, Arc<ProvisionError>> {
        let workflow = Arc::clone(&self.workflow);
        let key = identity.to_string();

        self.servers
            .try_get_with(key.clone(), async move {
                tracing::debug!(identity = %key, "No cached server, provisioning");
                workflow.provision(&key, &request).await
            })
            .await
    }

    /// Cached server for `identity`, without provisioning.
    pub async fn get(&self, identity: &str) -> Option<ProvisionedServer> {
        self.servers.get(identity).await
    }
}
