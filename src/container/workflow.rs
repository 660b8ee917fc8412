//! Container provisioning workflow.
//!
//! One attempt runs these steps strictly in order:
//!
//! ```text
//! ensure runtime reachable ─▶ ensure image present ─▶ create container
//!        (5%)                     (45%, pull)          (75%, conflict = ok)
//!                                                            │
//!   ready (100%) ◀── wait ready ◀── discover endpoint ◀── start container
//!                  (bounded TCP poll)      (90%)         (85%, not modified = ok)
//! ```
//!
//! Only the readiness poll retries. Exhausting it is logged and the
//! best-known endpoint is still returned; the caller's real connection is
//! where an unready server shows up.

use std::sync::Arc;

use tokio::net::TcpStream;

use crate::container::config::{
    ContainerEndpoint, ContainerSpecification, ProvisionedServer, ProvisioningRequest,
    ReadinessPolicy, assemble_connection_string,
};
use crate::container::error::{ProvisionError, Result};
use crate::container::progress::{NoopProgress, ProgressMonitor, ProvisioningStatus, TOTAL_WORK};
use crate::container::runtime::{ContainerRuntime, RuntimeError};

/// Drives a container runtime through one provisioning attempt.
pub struct ProvisioningWorkflow {
    runtime: Arc<dyn ContainerRuntime>,
    readiness: ReadinessPolicy,
    progress: Arc<dyn ProgressMonitor>,
}

impl ProvisioningWorkflow {
    /// Create a workflow with the default readiness policy and no progress
    /// observer.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            readiness: ReadinessPolicy::default(),
            progress: Arc::new(NoopProgress),
        }
    }

    /// Override the readiness bounds.
    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    /// Report progress to `progress`.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressMonitor>) -> Self {
        self.progress = progress;
        self
    }

    /// Run the workflow for an application identity.
    pub async fn provision(
        &self,
        identity: &str,
        request: &ProvisioningRequest,
    ) -> Result<ProvisionedServer> {
        let spec = &request.specification;
        let container_name = spec.container_name(identity);

        tracing::info!(identity = %identity, container = %container_name, "Provisioning database server");

        self.report(ProvisioningStatus::ConnectingToRuntime);
        self.runtime
            .ensure_reachable()
            .await
            .map_err(|e| ProvisionError::RuntimeUnavailable {
                reason: e.to_string(),
            })?;

        self.ensure_image(spec).await?;
        self.report(ProvisioningStatus::ImageReady);

        self.create_container(&container_name, spec).await?;
        self.report(ProvisioningStatus::ContainerCreated);

        self.start_container(&container_name).await?;
        self.report(ProvisioningStatus::ContainerStarted);

        let endpoint = self.discover_endpoint(&container_name, spec).await?;
        self.report(ProvisioningStatus::EndpointDiscovered);

        if self.wait_ready(&endpoint).await {
            tracing::info!(container = %container_name, endpoint = %endpoint, "Database server ready");
        } else {
            tracing::warn!(
                container = %container_name,
                endpoint = %endpoint,
                attempts = self.readiness.attempts,
                waited_at_most = ?self.readiness.worst_case(),
                "Database server did not accept connections in time, continuing anyway"
            );
        }
        self.report(ProvisioningStatus::Ready);

        let connection_string =
            assemble_connection_string(&spec.scheme, &endpoint, &request.credentials);

        Ok(ProvisionedServer {
            container_name,
            endpoint,
            connection_string,
        })
    }

    fn report(&self, status: ProvisioningStatus) {
        self.progress.status_changed(status);
        self.progress.work_changed(status.percent(), TOTAL_WORK);
    }

    /// Pull the image unless it is already present.
    async fn ensure_image(&self, spec: &ContainerSpecification) -> Result<()> {
        let present = self
            .runtime
            .has_image(&spec.image, &spec.tag)
            .await
            .map_err(|e| ProvisionError::ImageLookupFailed {
                image: spec.image_reference(),
                reason: e.to_string(),
            })?;

        if present {
            tracing::debug!(image = %spec.image_reference(), "Image exists locally");
            return Ok(());
        }

        tracing::info!(
            image = %spec.image_reference(),
            "Pulling image (this may take a while)"
        );
        self.runtime
            .pull_image(&spec.image, &spec.tag)
            .await
            .map_err(|e| ProvisionError::ImagePullFailed {
                image: spec.image_reference(),
                reason: e.to_string(),
            })?;

        tracing::info!(image = %spec.image_reference(), "Pulled image");
        Ok(())
    }

    /// Create the container; a name conflict means it already exists.
    async fn create_container(&self, name: &str, spec: &ContainerSpecification) -> Result<()> {
        match self.runtime.create_container(name, spec).await {
            Ok(()) => {
                tracing::info!(container = %name, "Created container");
                Ok(())
            }
            Err(RuntimeError::Conflict { .. }) => {
                tracing::debug!(container = %name, "Container already exists, continuing");
                Ok(())
            }
            Err(e) => Err(ProvisionError::ContainerCreationFailed {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Start the container; "not modified" means it is already running.
    async fn start_container(&self, name: &str) -> Result<()> {
        match self.runtime.start_container(name).await {
            Ok(()) => {
                tracing::info!(container = %name, "Started container");
                Ok(())
            }
            Err(RuntimeError::NotModified) => {
                tracing::debug!(container = %name, "Container already started, continuing");
                Ok(())
            }
            Err(e) => Err(ProvisionError::ContainerStartFailed {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Read back where the server is reachable.
    ///
    /// The host port may have been chosen by the runtime, so it always comes
    /// from inspection. Without a published port or a host address the
    /// container's own IP and port are used.
    async fn discover_endpoint(
        &self,
        name: &str,
        spec: &ContainerSpecification,
    ) -> Result<ContainerEndpoint> {
        let mapping = spec.primary_port().ok_or_else(|| ProvisionError::NoPorts {
            image: spec.image_reference(),
        })?;

        let inspection = self.runtime.inspect_container(name).await.map_err(|e| {
            ProvisionError::InspectFailed {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?;

        let published = inspection
            .binding_for(mapping.container_port)
            .and_then(|binding| {
                let port = binding.host_port?;
                let host = binding
                    .host_ip
                    .clone()
                    .filter(|ip| !is_wildcard(ip))
                    .or_else(|| self.runtime.host_address())?;
                Some(ContainerEndpoint { host, port })
            });

        if let Some(endpoint) = published {
            tracing::debug!(container = %name, endpoint = %endpoint, "Found published server port");
            return Ok(endpoint);
        }

        match inspection.ip_address {
            Some(ip) => {
                tracing::debug!(container = %name, ip = %ip, "Using container IP");
                Ok(ContainerEndpoint {
                    host: ip,
                    port: mapping.container_port,
                })
            }
            None => Err(ProvisionError::NoEndpoint {
                name: name.to_string(),
            }),
        }
    }

    /// Poll the endpoint with TCP connects until one succeeds or the attempts
    /// run out. Returns whether the server accepted a connection.
    async fn wait_ready(&self, endpoint: &ContainerEndpoint) -> bool {
        let addr = endpoint.to_string();

        for attempt in 1..=self.readiness.attempts {
            if tcp_check(&addr, self.readiness).await {
                tracing::debug!(endpoint = %addr, attempt, "Readiness check passed");
                return true;
            }
            tracing::trace!(endpoint = %addr, attempt, "Readiness check failed");

            if attempt < self.readiness.attempts {
                tokio::time::sleep(self.readiness.interval).await;
            }
        }

        false
    }
}

/// Single TCP connect attempt bounded by the policy's connect timeout.
async fn tcp_check(addr: &str, readiness: ReadinessPolicy) -> bool {
    matches!(
        tokio::time::timeout(readiness.connect_timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

fn is_wildcard(ip: &str) -> bool {
    matches!(ip, "" | "0.0.0.0" | "::" | "[::]")
}
