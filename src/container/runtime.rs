//! Container runtime client seam.
//!
//! The provisioning workflow only talks to this trait. [`DockerRuntime`]
//! implements it on top of the Docker Engine API; tests use the in-memory
//! fake from [`crate::testing`].
//!
//! [`DockerRuntime`]: crate::container::docker::DockerRuntime

use async_trait::async_trait;
use thiserror::Error;

use crate::container::config::ContainerSpecification;

/// Errors returned by a container runtime call.
///
/// Conflict-style answers are separate variants so callers can decide which
/// ones are benign for the operation at hand.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// The runtime cannot be reached at all.
    #[error("{reason}")]
    Unavailable {
        /// Why, including any platform hint.
        reason: String,
    },

    /// The request conflicts with existing state (e.g. name already in use).
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// The request was a no-op (e.g. container already started).
    #[error("not modified")]
    NotModified,

    /// The referenced object does not exist.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Any other failure.
    #[error("{message}")]
    Api { message: String },
}

/// One published port as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBindingInfo {
    /// Port inside the container.
    pub container_port: u16,
    /// Host interface the port is bound on, if reported.
    pub host_ip: Option<String>,
    /// Host port, if the port is published.
    pub host_port: Option<u16>,
}

/// Network facts read back from a container after it started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerInspection {
    /// Published port bindings.
    pub port_bindings: Vec<PortBindingInfo>,
    /// Container IP on its network, if any.
    pub ip_address: Option<String>,
}

impl ContainerInspection {
    /// The binding for a container port that actually has a host port.
    pub fn binding_for(&self, container_port: u16) -> Option<&PortBindingInfo> {
        self.port_bindings
            .iter()
            .find(|b| b.container_port == container_port && b.host_port.is_some())
    }
}

/// Operations the provisioning workflow needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Make sure the runtime is installed and answering requests.
    async fn ensure_reachable(&self) -> Result<(), RuntimeError>;

    /// Whether `name:tag` is present locally.
    async fn has_image(&self, name: &str, tag: &str) -> Result<bool, RuntimeError>;

    /// Pull `name:tag`, returning once the pull has completed.
    async fn pull_image(&self, name: &str, tag: &str) -> Result<(), RuntimeError>;

    /// Create a container named `name`.
    ///
    /// Returns [`RuntimeError::Conflict`] when the name is already taken.
    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerSpecification,
    ) -> Result<(), RuntimeError>;

    /// Start a container.
    ///
    /// Returns [`RuntimeError::NotModified`] when it is already running.
    async fn start_container(&self, name: &str) -> Result<(), RuntimeError>;

    /// Read back bound ports and the container IP.
    async fn inspect_container(&self, name: &str) -> Result<ContainerInspection, RuntimeError>;

    /// Host address at which published ports are reachable, if the runtime
    /// exposes one.
    fn host_address(&self) -> Option<String>;
}
