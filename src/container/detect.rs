//! Docker detection with platform-specific guidance.
//!
//! Before the first provisioning call the runtime checks that Docker is
//! installed (binary on `PATH`) and running (daemon answers a ping). When it
//! is not, the error carries an install or start hint for the host platform
//! instead of a bare socket error. Setting `BYPASS_INSTALLATION` skips the
//! binary check and connects directly, which is what CI hosts exposing a
//! remote `DOCKER_HOST` without a local CLI need.

/// Docker daemon availability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockerStatus {
    /// Binary found and daemon responding to ping.
    Available,
    /// `docker` binary not found on PATH.
    NotInstalled,
    /// Binary found but daemon not responding.
    NotRunning,
}

impl DockerStatus {
    /// Human-readable status string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DockerStatus::Available => "available",
            DockerStatus::NotInstalled => "not installed",
            DockerStatus::NotRunning => "not running",
        }
    }
}

/// Host platform for install guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOS,
    Linux,
    Windows,
}

impl Platform {
    /// Detect the current platform.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOS,
            "windows" => Platform::Windows,
            _ => Platform::Linux,
        }
    }

    /// Installation instructions for Docker on this platform.
    pub fn install_hint(&self) -> &'static str {
        match self {
            Platform::MacOS => {
                "Install Docker Desktop: https://docs.docker.com/desktop/install/mac-install/"
            }
            Platform::Linux => "Install Docker Engine: https://docs.docker.com/engine/install/",
            Platform::Windows => {
                "Install Docker Desktop: https://docs.docker.com/desktop/install/windows-install/"
            }
        }
    }

    /// Instructions to start the Docker daemon on this platform.
    pub fn start_hint(&self) -> &'static str {
        match self {
            Platform::MacOS => "Start Docker Desktop from Applications, or run: open -a Docker",
            Platform::Linux => "Start the Docker daemon: sudo systemctl start docker",
            Platform::Windows => "Start Docker Desktop from the Start menu",
        }
    }
}

/// Explain a non-available status, or `None` when Docker is usable.
pub fn guidance(status: DockerStatus, platform: Platform) -> Option<String> {
    match status {
        DockerStatus::Available => None,
        DockerStatus::NotInstalled => Some(format!(
            "Docker is {}. {} (or set BYPASS_INSTALLATION to connect without the docker CLI)",
            status.as_str(),
            platform.install_hint()
        )),
        DockerStatus::NotRunning => Some(format!(
            "Docker is {}. {}",
            status.as_str(),
            platform.start_hint()
        )),
    }
}

/// Check if the `docker` binary exists on PATH.
pub fn docker_binary_exists() -> bool {
    #[cfg(unix)]
    {
        std::process::Command::new("which")
            .arg("docker")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }
    #[cfg(windows)]
    {
        std::process::Command::new("where")
            .arg("docker")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }
}
