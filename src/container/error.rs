//! Error types for container provisioning.

use thiserror::Error;

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Errors that abort a provisioning attempt.
///
/// Benign conflicts (container already exists, already started) never show
/// up here; the workflow treats them as success.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The container runtime could not be reached.
    #[error("Container runtime not available: {reason}")]
    RuntimeUnavailable {
        /// Reason why the runtime is unavailable.
        reason: String,
    },

    /// Listing local images failed.
    #[error("Failed to look up image '{image}': {reason}")]
    ImageLookupFailed {
        /// Image reference.
        image: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to pull the image.
    #[error("Failed to pull image '{image}': {reason}")]
    ImagePullFailed {
        /// Image reference.
        image: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to create the container.
    #[error("Failed to create container '{name}': {reason}")]
    ContainerCreationFailed {
        /// Container name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to start the container.
    #[error("Failed to start container '{name}': {reason}")]
    ContainerStartFailed {
        /// Container name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to read back the container's network settings.
    #[error("Failed to inspect container '{name}': {reason}")]
    InspectFailed {
        /// Container name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// The container exposes neither a bound host port nor an internal IP.
    #[error("Container '{name}' has no reachable endpoint")]
    NoEndpoint {
        /// Container name.
        name: String,
    },

    /// The specification has no port to expose.
    #[error("Container specification for image '{image}' declares no ports")]
    NoPorts {
        /// Image reference.
        image: String,
    },
}
