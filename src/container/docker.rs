//! [`ContainerRuntime`] backed by the Docker Engine API.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, StartContainerOptions,
};
use bollard::image::{CreateImageOptions, ListImagesOptions};
use bollard::models::{ContainerInspectResponse, HostConfig, PortBinding};
use futures::StreamExt;
use tokio::sync::RwLock;

use crate::container::config::{ContainerSpecification, HostPort};
use crate::container::detect::{DockerStatus, Platform, docker_binary_exists, guidance};
use crate::container::runtime::{
    ContainerInspection, ContainerRuntime, PortBindingInfo, RuntimeError,
};

const LOCAL_HOST_ADDRESS: &str = "127.0.0.1";

/// Connect to the Docker daemon.
///
/// Tries bollard's defaults first (which honour `DOCKER_HOST`), then the
/// rootless and Docker Desktop sockets that the defaults do not try.
pub async fn connect_docker() -> Result<Docker, RuntimeError> {
    let mut last_error = match Docker::connect_with_defaults() {
        Ok(docker) => match docker.ping().await {
            Ok(_) => return Ok(docker),
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    #[cfg(unix)]
    for socket in fallback_sockets() {
        if !socket.exists() {
            continue;
        }
        let Some(path) = socket.to_str() else {
            continue;
        };
        match Docker::connect_with_socket(path, 120, bollard::API_DEFAULT_VERSION) {
            Ok(docker) => match docker.ping().await {
                Ok(_) => {
                    tracing::debug!(socket = %path, "Connected to Docker through fallback socket");
                    return Ok(docker);
                }
                Err(e) => last_error = e.to_string(),
            },
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(RuntimeError::Unavailable { reason: last_error })
}

/// Socket paths outside bollard's default lookup.
#[cfg(unix)]
fn fallback_sockets() -> Vec<PathBuf> {
    let mut sockets = Vec::new();
    if let Some(runtime_dir) = std::env::var_os("XDG_RUNTIME_DIR") {
        sockets.push(PathBuf::from(runtime_dir).join("docker.sock"));
    }
    if let Some(home) = dirs::home_dir() {
        sockets.push(home.join(".docker").join("run").join("docker.sock"));
    }
    sockets
}

/// Host at which published ports are reachable for a given `DOCKER_HOST`.
///
/// A TCP daemon publishes ports on its own address; local sockets and named
/// pipes publish on the loopback interface.
pub fn docker_host_address(docker_host: Option<&str>) -> String {
    docker_host
        .and_then(|raw| url::Url::parse(raw).ok())
        .filter(|url| matches!(url.scheme(), "tcp" | "http" | "https"))
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| LOCAL_HOST_ADDRESS.to_string())
}

/// Map a bollard error onto the runtime error taxonomy.
fn classify(error: bollard::errors::Error) -> RuntimeError {
    match error {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message,
        } => RuntimeError::Conflict { message },
        bollard::errors::Error::DockerResponseServerError {
            status_code: 304, ..
        } => RuntimeError::NotModified,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message,
        } => RuntimeError::NotFound { message },
        other => RuntimeError::Api {
            message: other.to_string(),
        },
    }
}

/// Docker-backed container runtime.
///
/// Connects lazily on the first [`ensure_reachable`](ContainerRuntime::ensure_reachable)
/// call and reuses the connection afterwards.
pub struct DockerRuntime {
    docker: RwLock<Option<Docker>>,
    bypass_installation: bool,
    host_address: String,
}

impl DockerRuntime {
    /// Create a runtime that will connect on first use.
    pub fn new(bypass_installation: bool) -> Self {
        let docker_host = std::env::var("DOCKER_HOST").ok();
        Self {
            docker: RwLock::new(None),
            bypass_installation,
            host_address: docker_host_address(docker_host.as_deref()),
        }
    }

    async fn client(&self) -> Result<Docker, RuntimeError> {
        self.docker
            .read()
            .await
            .clone()
            .ok_or_else(|| RuntimeError::Unavailable {
                reason: "Docker client not connected".to_string(),
            })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ensure_reachable(&self) -> Result<(), RuntimeError> {
        if self.docker.read().await.is_some() {
            return Ok(());
        }

        let mut slot = self.docker.write().await;
        if slot.is_some() {
            return Ok(());
        }

        let platform = Platform::current();
        if !self.bypass_installation && !docker_binary_exists() {
            return Err(RuntimeError::Unavailable {
                reason: guidance(DockerStatus::NotInstalled, platform).unwrap_or_default(),
            });
        }

        let docker = connect_docker().await.map_err(|e| {
            if self.bypass_installation {
                e
            } else {
                RuntimeError::Unavailable {
                    reason: format!(
                        "{} ({e})",
                        guidance(DockerStatus::NotRunning, platform).unwrap_or_default()
                    ),
                }
            }
        })?;

        *slot = Some(docker);
        tracing::debug!(
            bypass_installation = self.bypass_installation,
            "Connected to Docker"
        );
        Ok(())
    }

    async fn has_image(&self, name: &str, tag: &str) -> Result<bool, RuntimeError> {
        let docker = self.client().await?;

        let mut filters = HashMap::new();
        filters.insert("reference".to_string(), vec![name.to_string()]);
        let images = docker
            .list_images(Some(ListImagesOptions {
                all: false,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(classify)?;

        let wanted = format!("{name}:{tag}");
        let qualified = format!("/{wanted}");
        Ok(images.iter().any(|image| {
            image
                .repo_tags
                .iter()
                .any(|t| *t == wanted || t.ends_with(&qualified))
        }))
    }

    async fn pull_image(&self, name: &str, tag: &str) -> Result<(), RuntimeError> {
        let docker = self.client().await?;

        let options = CreateImageOptions {
            from_image: name.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };

        let mut stream = docker.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            let info = result.map_err(classify)?;
            if let Some(error) = info.error {
                return Err(RuntimeError::Api { message: error });
            }
            if let Some(status) = info.status {
                tracing::trace!(image = %name, tag = %tag, "Pull status: {}", status);
            }
        }

        Ok(())
    }

    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerSpecification,
    ) -> Result<(), RuntimeError> {
        let docker = self.client().await?;

        let mut port_bindings = HashMap::new();
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        for mapping in &spec.ports {
            let key = format!("{}/tcp", mapping.container_port);
            let host_port = match mapping.host_port {
                HostPort::Auto => None,
                HostPort::Fixed(port) => Some(port.to_string()),
            };
            port_bindings.insert(
                key.clone(),
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port,
                }]),
            );
            exposed_ports.insert(key, HashMap::new());
        }

        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            auto_remove: Some(false),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image_reference()),
            env: if env.is_empty() { None } else { Some(env) },
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.to_string(),
            ..Default::default()
        };

        docker
            .create_container(Some(options), config)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<(), RuntimeError> {
        let docker = self.client().await?;
        docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(classify)
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerInspection, RuntimeError> {
        let docker = self.client().await?;
        let response = docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(classify)?;
        Ok(inspection_from(response))
    }

    fn host_address(&self) -> Option<String> {
        Some(self.host_address.clone())
    }
}

/// Flatten the parts of an inspect response the workflow cares about.
fn inspection_from(response: ContainerInspectResponse) -> ContainerInspection {
    let Some(settings) = response.network_settings else {
        return ContainerInspection::default();
    };

    let mut port_bindings = Vec::new();
    for (key, bindings) in settings.ports.unwrap_or_default() {
        let Some(container_port) = key
            .split('/')
            .next()
            .and_then(|port| port.parse::<u16>().ok())
        else {
            continue;
        };

        match bindings {
            Some(bindings) if !bindings.is_empty() => {
                for binding in bindings {
                    port_bindings.push(PortBindingInfo {
                        container_port,
                        host_ip: binding.host_ip.filter(|ip| !ip.is_empty()),
                        host_port: binding.host_port.and_then(|p| p.parse().ok()),
                    });
                }
            }
            _ => port_bindings.push(PortBindingInfo {
                container_port,
                host_ip: None,
                host_port: None,
            }),
        }
    }
    port_bindings.sort_by_key(|b| b.container_port);

    let ip_address = settings
        .ip_address
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            settings.networks.and_then(|networks| {
                networks
                    .into_values()
                    .find_map(|endpoint| endpoint.ip_address.filter(|ip| !ip.is_empty()))
            })
        });

    ContainerInspection {
        port_bindings,
        ip_address,
    }
}

#[cfg(test)]
mod tests {
    use bollard::models::{EndpointSettings, NetworkSettings};

    use super::*;

    #[test]
    fn test_docker_host_address() {
        assert_eq!(docker_host_address(None), "127.0.0.1");
        assert_eq!(
            docker_host_address(Some("unix:///var/run/docker.sock")),
            "127.0.0.1"
        );
        assert_eq!(
            docker_host_address(Some("tcp://192.168.99.100:2376")),
            "192.168.99.100"
        );
        assert_eq!(docker_host_address(Some("not a url")), "127.0.0.1");
    }

    #[test]
    fn test_classify_conflicts() {
        let conflict = classify(bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message: "name in use".to_string(),
        });
        assert!(matches!(conflict, RuntimeError::Conflict { .. }));

        let not_modified = classify(bollard::errors::Error::DockerResponseServerError {
            status_code: 304,
            message: String::new(),
        });
        assert!(matches!(not_modified, RuntimeError::NotModified));

        let other = classify(bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: "boom".to_string(),
        });
        assert!(matches!(other, RuntimeError::Api { .. }));
    }

    #[test]
    fn test_inspection_reads_bound_port() {
        let mut ports = HashMap::new();
        ports.insert(
            "3306/tcp".to_string(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some("49153".to_string()),
            }]),
        );
        let response = ContainerInspectResponse {
            network_settings: Some(NetworkSettings {
                ports: Some(ports),
                ip_address: Some("172.17.0.2".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let inspection = inspection_from(response);
        let binding = inspection.binding_for(3306).unwrap();
        assert_eq!(binding.host_port, Some(49153));
        assert_eq!(inspection.ip_address.as_deref(), Some("172.17.0.2"));
    }

    #[test]
    fn test_inspection_falls_back_to_network_ip() {
        let mut ports = HashMap::new();
        ports.insert("3306/tcp".to_string(), None);
        let mut networks = HashMap::new();
        networks.insert(
            "bridge".to_string(),
            EndpointSettings {
                ip_address: Some("172.18.0.4".to_string()),
                ..Default::default()
            },
        );
        let response = ContainerInspectResponse {
            network_settings: Some(NetworkSettings {
                ports: Some(ports),
                ip_address: Some(String::new()),
                networks: Some(networks),
                ..Default::default()
            }),
            ..Default::default()
        };

        let inspection = inspection_from(response);
        assert!(inspection.binding_for(3306).is_none());
        assert_eq!(inspection.ip_address.as_deref(), Some("172.18.0.4"));
    }
}
