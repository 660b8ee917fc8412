//! On-demand database server containers.
//!
//! Provisions one database server container per application identity and
//! hands back a server-level connection string.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                       ContainerLifecycleCache                            │
//! │   get_or_create(identity, request)                                       │
//! │         │  hit ──────────────────────────────────────▶ ProvisionedServer  │
//! │         ▼  miss (single flight per identity)                             │
//! │   ┌──────────────────────────────────────────────────────────────────┐   │
//! │   │                    ProvisioningWorkflow                          │   │
//! │   │  reachable ─▶ image ─▶ create ─▶ start ─▶ endpoint ─▶ wait ready │   │
//! │   └──────────────────────────────────────────────────────────────────┘   │
//! │         │                                                                │
//! │         ▼                                                                │
//! │   dyn ContainerRuntime  (DockerRuntime over bollard, FakeRuntime)        │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use branchdb::container::{
//!     ContainerLifecycleCache, ContainerSpecification, DatabaseCredentials, DockerRuntime,
//!     ProvisioningRequest, ProvisioningWorkflow,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = Arc::new(DockerRuntime::new(false));
//! let cache = ContainerLifecycleCache::new(Arc::new(ProvisioningWorkflow::new(runtime)));
//!
//! let credentials = DatabaseCredentials::default();
//! let request = ProvisioningRequest {
//!     specification: ContainerSpecification::mysql("mysql", "5.7", &credentials),
//!     credentials,
//! };
//!
//! let server = cache.get_or_create("acme-widgets", request).await?;
//! println!("server at {}", server.connection_string);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod detect;
pub mod docker;
pub mod error;
pub mod progress;
pub mod runtime;
pub mod workflow;

pub use cache::{CacheRetention, ContainerLifecycleCache};
pub use config::{
    ContainerEndpoint, ContainerSpecification, DatabaseCredentials, HostPort, PortMapping,
    ProvisionedServer, ProvisioningRequest, ReadinessPolicy, assemble_connection_string,
};
pub use docker::DockerRuntime;
pub use error::{ProvisionError, Result};
pub use progress::{LogProgress, NoopProgress, ProgressMonitor, ProvisioningStatus};
pub use runtime::{ContainerInspection, ContainerRuntime, PortBindingInfo, RuntimeError};
pub use workflow::ProvisioningWorkflow;
