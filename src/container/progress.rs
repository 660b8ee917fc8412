//! Progress reporting for the provisioning workflow.

/// Total units of work reported through [`ProgressMonitor::work_changed`].
pub const TOTAL_WORK: u32 = 100;

/// Checkpoints the workflow reports, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStatus {
    /// Connecting to the container runtime.
    ConnectingToRuntime,
    /// Image is present locally (pulled if needed).
    ImageReady,
    /// Container exists.
    ContainerCreated,
    /// Container is running.
    ContainerStarted,
    /// Host and port are known.
    EndpointDiscovered,
    /// Readiness poll finished; the server endpoint is returned.
    Ready,
}

impl ProvisioningStatus {
    /// Stable status code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectingToRuntime => "connecting-to-runtime",
            Self::ImageReady => "image-ready",
            Self::ContainerCreated => "container-created",
            Self::ContainerStarted => "container-started",
            Self::EndpointDiscovered => "endpoint-discovered",
            Self::Ready => "ready",
        }
    }

    /// Percent complete once this checkpoint is reached.
    pub fn percent(&self) -> u32 {
        match self {
            Self::ConnectingToRuntime => 5,
            Self::ImageReady => 45,
            Self::ContainerCreated => 75,
            Self::ContainerStarted => 85,
            Self::EndpointDiscovered => 90,
            Self::Ready => 100,
        }
    }
}

impl std::fmt::Display for ProvisioningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observer for provisioning progress.
pub trait ProgressMonitor: Send + Sync {
    fn status_changed(&self, status: ProvisioningStatus);
    fn work_changed(&self, completed: u32, total: u32);
}

/// Discards all progress. The default observer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressMonitor for NoopProgress {
    fn status_changed(&self, _status: ProvisioningStatus) {}
    fn work_changed(&self, _completed: u32, _total: u32) {}
}

/// Forwards progress to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressMonitor for LogProgress {
    fn status_changed(&self, status: ProvisioningStatus) {
        tracing::info!(status = %status, "Provisioning status changed");
    }

    fn work_changed(&self, completed: u32, total: u32) {
        tracing::debug!(completed, total, "Provisioning progress");
    }
}
