//! In-memory stand-ins for the external systems the engine talks to.
//!
//! Provides:
//! - [`FakeRuntime`]: a container runtime that keeps images and containers in memory
//! - [`RecordingExecutor`]: a statement executor that records instead of executing
//! - [`StaticLookup`]: a lookup strategy with a fixed answer
//! - [`StaticDiscovery`]: a discovery that hands out a fixed set of lookups
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use branchdb::container::ProvisioningWorkflow;
//! use branchdb::testing::FakeRuntime;
//!
//! # async fn example() {
//! let runtime = Arc::new(FakeRuntime::new().with_image("mysql", "5.7"));
//! let workflow = ProvisioningWorkflow::new(runtime.clone());
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::container::{
    ContainerInspection, ContainerRuntime, ContainerSpecification, PortBindingInfo, RuntimeError,
};
use crate::database::{DatabaseError, StatementExecutor};
use crate::lookup::{ConnectionLookup, LookupDiscovery, LookupError};

/// A host port nothing is listening on, picked by binding and releasing it.
fn unused_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .unwrap_or(1)
}

struct FakeContainer {
    container_port: u16,
    started: bool,
}

#[derive(Default)]
struct FakeState {
    images: HashSet<(String, String)>,
    containers: HashMap<String, FakeContainer>,
    create_failure: Option<String>,
}

/// Container runtime backed by in-memory state.
///
/// Behaves like Docker where the provisioning workflow cares: creating an
/// existing container is a conflict, starting a running one is not
/// modified, and every inspection reports the same host port bound on the
/// wildcard address.
pub struct FakeRuntime {
    state: Mutex<FakeState>,
    host_port: Option<u16>,
    container_ip: Option<String>,
    host_address: Option<String>,
    unreachable: Option<String>,
    pull_failure: Option<String>,
    latency: Option<Duration>,
    pulls: AtomicU32,
    create_calls: AtomicU32,
}

impl FakeRuntime {
    /// Reachable runtime with no images, publishing on an unused port.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            host_port: Some(unused_port()),
            container_ip: None,
            host_address: Some("127.0.0.1".to_string()),
            unreachable: None,
            pull_failure: None,
            latency: None,
            pulls: AtomicU32::new(0),
            create_calls: AtomicU32::new(0),
        }
    }

    /// Publish the server port on `port`.
    pub fn with_host_port(mut self, port: u16) -> Self {
        self.host_port = Some(port);
        self
    }

    /// Report no published ports at all.
    pub fn without_published_ports(mut self) -> Self {
        self.host_port = None;
        self
    }

    /// Report `ip` as the container's network address.
    pub fn with_container_ip(mut self, ip: &str) -> Self {
        self.container_ip = Some(ip.to_string());
        self
    }

    /// Expose no host address for published ports.
    pub fn without_host_address(mut self) -> Self {
        self.host_address = None;
        self
    }

    /// Pretend `name:tag` is already present.
    pub fn with_image(self, name: &str, tag: &str) -> Self {
        self.lock()
            .images
            .insert((name.to_string(), tag.to_string()));
        self
    }

    /// Fail every pull with `message`.
    pub fn failing_pull(mut self, message: &str) -> Self {
        self.pull_failure = Some(message.to_string());
        self
    }

    /// Fail the reachability check with `message`.
    pub fn unreachable(mut self, message: &str) -> Self {
        self.unreachable = Some(message.to_string());
        self
    }

    /// Fail container creation with `message`.
    pub fn failing_create(self, message: &str) -> Self {
        self.set_create_failure(Some(message));
        self
    }

    /// Delay every container creation by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Change (or clear) the creation failure while in use.
    pub fn set_create_failure(&self, message: Option<&str>) {
        self.lock().create_failure = message.map(str::to_string);
    }

    /// Number of pulls performed.
    pub fn pulls(&self) -> u32 {
        self.pulls.load(Ordering::SeqCst)
    }

    /// Number of create requests received, including conflicting and
    /// failing ones.
    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of containers that exist.
    pub fn container_count(&self) -> usize {
        self.lock().containers.len()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ensure_reachable(&self) -> Result<(), RuntimeError> {
        match &self.unreachable {
            Some(reason) => Err(RuntimeError::Unavailable {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn has_image(&self, name: &str, tag: &str) -> Result<bool, RuntimeError> {
        Ok(self
            .lock()
            .images
            .contains(&(name.to_string(), tag.to_string())))
    }

    async fn pull_image(&self, name: &str, tag: &str) -> Result<(), RuntimeError> {
        if let Some(message) = &self.pull_failure {
            return Err(RuntimeError::Api {
                message: message.clone(),
            });
        }
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.lock()
            .images
            .insert((name.to_string(), tag.to_string()));
        Ok(())
    }

    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerSpecification,
    ) -> Result<(), RuntimeError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        if let Some(message) = &state.create_failure {
            return Err(RuntimeError::Api {
                message: message.clone(),
            });
        }
        if state.containers.contains_key(name) {
            return Err(RuntimeError::Conflict {
                message: format!("container name {name} is already in use"),
            });
        }

        let container_port = spec
            .primary_port()
            .map(|mapping| mapping.container_port)
            .unwrap_or_default();
        state.containers.insert(
            name.to_string(),
            FakeContainer {
                container_port,
                started: false,
            },
        );
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        match state.containers.get_mut(name) {
            None => Err(RuntimeError::NotFound {
                message: format!("no such container: {name}"),
            }),
            Some(container) if container.started => Err(RuntimeError::NotModified),
            Some(container) => {
                container.started = true;
                Ok(())
            }
        }
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerInspection, RuntimeError> {
        let state = self.lock();
        let container = state
            .containers
            .get(name)
            .ok_or_else(|| RuntimeError::NotFound {
                message: format!("no such container: {name}"),
            })?;

        let port_bindings = self
            .host_port
            .map(|port| PortBindingInfo {
                container_port: container.container_port,
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(port),
            })
            .into_iter()
            .collect();

        Ok(ContainerInspection {
            port_bindings,
            ip_address: self.container_ip.clone(),
        })
    }

    fn host_address(&self) -> Option<String> {
        self.host_address.clone()
    }
}

/// Statement executor that records `(server connection, sql)` pairs.
#[derive(Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<(String, String)>>,
    failure: Option<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record statements, then fail each one with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            statements: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    /// Statements received so far.
    pub fn statements(&self) -> Vec<(String, String)> {
        self.statements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl StatementExecutor for RecordingExecutor {
    async fn execute(&self, server_connection: &str, sql: &str) -> crate::database::Result<()> {
        self.statements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((server_connection.to_string(), sql.to_string()));

        match &self.failure {
            Some(reason) => Err(DatabaseError::Execution {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Lookup strategy with a fixed answer for one query.
pub struct StaticLookup {
    name: String,
    query: Option<String>,
    answer: Result<String, String>,
    calls: AtomicU32,
}

impl StaticLookup {
    /// Answer `query` with `connection_string`; miss everything else.
    pub fn answering(query: &str, connection_string: &str) -> Self {
        Self {
            name: format!("static:{query}"),
            query: Some(query.to_string()),
            answer: Ok(connection_string.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    /// Answer every query with `connection_string`.
    pub fn answering_all(connection_string: &str) -> Self {
        Self {
            name: "static:*".to_string(),
            query: None,
            answer: Ok(connection_string.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    /// Fail every query with `reason`.
    pub fn failing(reason: &str) -> Self {
        Self {
            name: "static:failing".to_string(),
            query: None,
            answer: Err(reason.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of `find` calls received.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionLookup for StaticLookup {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, query: &str) -> Result<Option<String>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.query.as_deref().is_some_and(|q| q != query) {
            return Ok(None);
        }
        match &self.answer {
            Ok(connection_string) => Ok(Some(connection_string.clone())),
            Err(reason) => Err(LookupError::Failed {
                lookup: self.name.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

/// Discovery that returns the same lookups every time and counts calls.
pub struct StaticDiscovery {
    lookups: Vec<Arc<StaticLookup>>,
    discoveries: AtomicU32,
}

impl StaticDiscovery {
    pub fn new(lookups: Vec<Arc<StaticLookup>>) -> Self {
        Self {
            lookups,
            discoveries: AtomicU32::new(0),
        }
    }

    /// Number of times the discovery ran.
    pub fn discoveries(&self) -> u32 {
        self.discoveries.load(Ordering::SeqCst)
    }
}

impl LookupDiscovery for StaticDiscovery {
    fn discover(&self) -> Vec<Arc<dyn ConnectionLookup>> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        self.lookups
            .iter()
            .map(|lookup| Arc::clone(lookup) as Arc<dyn ConnectionLookup>)
            .collect()
    }
}
