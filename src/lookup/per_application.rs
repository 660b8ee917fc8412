//! One database server per application, one database per branch.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;

use crate::config::{Config, ContainerConfig};
use crate::container::{
    CacheRetention, ContainerLifecycleCache, ContainerSpecification, DockerRuntime,
    NoopProgress, ProgressMonitor, ProvisioningRequest, ProvisioningWorkflow,
};
use crate::database::DatabaseProvisioner;
use crate::lookup::discovery::LookupPlugin;
use crate::lookup::{ConnectionLookup, LookupError};
use crate::naming::NameResolver;

/// Query that selects the database for the current branch.
pub const BRANCH_QUERY: &str = "branch";

/// Insert `/database` after the authority of a server connection string,
/// keeping any `?query` at the end.
///
/// `mysql://h:1?user=root` + `db` → `mysql://h:1/db?user=root`.
pub fn append_database_name(connection: &str, database: &str) -> String {
    match connection.find('?') {
        Some(idx) if idx > 0 => format!(
            "{}/{}{}",
            &connection[..idx],
            database,
            &connection[idx..]
        ),
        _ => format!("{connection}/{database}"),
    }
}

/// Resolves queries against a per-application database server container.
///
/// The application identity picks (and if needed provisions) the server; the
/// query picks the database on it: [`BRANCH_QUERY`] means the current
/// branch's `branch_<name>` database, anything else names the database
/// directly. Answers every query.
pub struct PerApplicationLookup {
    names: NameResolver,
    servers: ContainerLifecycleCache,
    databases: DatabaseProvisioner,
    container: ContainerConfig,
}

impl PerApplicationLookup {
    pub fn new(
        names: NameResolver,
        servers: ContainerLifecycleCache,
        databases: DatabaseProvisioner,
        container: ContainerConfig,
    ) -> Self {
        Self {
            names,
            servers,
            databases,
            container,
        }
    }

    /// Docker-backed lookup built from configuration.
    ///
    /// `config.application_name`, when set, overrides whatever name `names`
    /// would derive.
    pub fn from_config(
        config: &Config,
        names: NameResolver,
        progress: Arc<dyn ProgressMonitor>,
    ) -> Self {
        let names = match &config.application_name {
            Some(name) => names.with_application_name(Some(name.clone())),
            None => names,
        };

        let container = config.container.clone();
        let runtime = Arc::new(DockerRuntime::new(container.bypass_installation));
        let workflow = ProvisioningWorkflow::new(runtime)
            .with_readiness(container.readiness)
            .with_progress(progress);
        let servers = ContainerLifecycleCache::with_retention(
            Arc::new(workflow),
            CacheRetention {
                max_capacity: container.cache_capacity,
                time_to_live: container.cache_ttl,
            },
        );

        Self::new(names, servers, DatabaseProvisioner::mysql(), container)
    }

    /// Application identity this lookup provisions servers for.
    pub fn application_identity(&self) -> String {
        self.names.resolve_application_identity()
    }

    fn request(&self) -> ProvisioningRequest {
        let credentials = self.container.credentials();
        ProvisioningRequest {
            specification: ContainerSpecification::mysql(
                &self.container.image_name,
                &self.container.image_tag,
                &credentials,
            ),
            credentials,
        }
    }
}

#[async_trait]
impl ConnectionLookup for PerApplicationLookup {
    fn name(&self) -> &str {
        "per-application"
    }

    async fn find(&self, query: &str) -> Result<Option<String>, LookupError> {
        let identity = self.application_identity();

        let server = self
            .servers
            .get_or_create(&identity, self.request())
            .await
            .map_err(|source| LookupError::Provision {
                identity: identity.clone(),
                source,
            })?;

        let database = if query == BRANCH_QUERY {
            let branch = self.names.resolve_database_name();
            self.databases
                .get_or_create_branch_database(&server.connection_string, &branch)
                .await?
        } else {
            self.databases
                .get_or_create_named_database(&server.connection_string, query)
                .await?
        };

        tracing::debug!(identity = %identity, database = %database, "Resolved per-application database");
        Ok(Some(append_database_name(
            &server.connection_string,
            &database,
        )))
    }
}

static SHARED: OnceLock<Arc<PerApplicationLookup>> = OnceLock::new();

/// Process-wide instance handed out by plugin discovery.
///
/// Built from the first configuration it sees. Every later call returns the
/// same instance, so all discoveries share one application identity and one
/// server cache.
pub fn shared(config: &Config) -> Arc<PerApplicationLookup> {
    Arc::clone(SHARED.get_or_init(|| {
        Arc::new(PerApplicationLookup::from_config(
            config,
            NameResolver::from_current_dir(),
            Arc::new(NoopProgress),
        ))
    }))
}

fn build_plugin(config: &Config) -> Result<Arc<dyn ConnectionLookup>, LookupError> {
    Ok(shared(config))
}

inventory::submit! {
    LookupPlugin {
        name: "per-application",
        build: build_plugin,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::container::ReadinessPolicy;
    use crate::testing::{FakeRuntime, RecordingExecutor};

    fn lookup_over(
        runtime: Arc<FakeRuntime>,
        executor: Arc<RecordingExecutor>,
        names: NameResolver,
    ) -> PerApplicationLookup {
        let workflow = ProvisioningWorkflow::new(runtime).with_readiness(ReadinessPolicy {
            attempts: 1,
            interval: Duration::from_millis(1),
            connect_timeout: Duration::from_millis(50),
        });
        PerApplicationLookup::new(
            names,
            ContainerLifecycleCache::new(Arc::new(workflow)),
            DatabaseProvisioner::new(executor),
            ContainerConfig::default(),
        )
    }

    fn named(name: &str) -> NameResolver {
        let dir = std::env::temp_dir();
        NameResolver::new(dir)
            .with_executable_path(None)
            .with_application_name(Some(name.to_string()))
    }

    #[test]
    fn test_shared_instance_keeps_identity() {
        let first = shared(&Config::default());
        let second = shared(&Config::default());

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.application_identity(), second.application_identity());
    }

    #[test]
    fn test_append_database_name() {
        assert_eq!(
            append_database_name("mysql://h:1?user=root", "db"),
            "mysql://h:1/db?user=root"
        );
        assert_eq!(append_database_name("mysql://h:1", "db"), "mysql://h:1/db");
        assert_eq!(append_database_name("?x", "db"), "?x/db");
    }

    #[tokio::test]
    async fn test_named_query_creates_database() {
        let runtime = Arc::new(FakeRuntime::new().with_host_port(41000));
        let executor = Arc::new(RecordingExecutor::new());
        let lookup = lookup_over(runtime.clone(), executor.clone(), named("shop"));

        let conn = lookup.find("orders").await.unwrap();

        assert_eq!(
            conn.as_deref(),
            Some("mysql://127.0.0.1:41000/orders?user=root")
        );
        assert_eq!(
            executor.statements(),
            vec![(
                "mysql://127.0.0.1:41000?user=root".to_string(),
                "CREATE DATABASE IF NOT EXISTS `orders`".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_branch_query_uses_fallback_branch() {
        let runtime = Arc::new(FakeRuntime::new().with_host_port(41001));
        let executor = Arc::new(RecordingExecutor::new());
        let lookup = lookup_over(runtime, executor.clone(), named("shop"));

        let conn = lookup.find(BRANCH_QUERY).await.unwrap().unwrap();

        assert_eq!(conn, "mysql://127.0.0.1:41001/branch_master?user=root");
        assert_eq!(
            executor.statements()[0].1,
            "CREATE DATABASE IF NOT EXISTS `branch_master`"
        );
    }

    #[tokio::test]
    async fn test_server_is_provisioned_once_per_identity() {
        let runtime = Arc::new(FakeRuntime::new());
        let executor = Arc::new(RecordingExecutor::new());
        let lookup = lookup_over(runtime.clone(), executor.clone(), named("shop"));

        lookup.find("a").await.unwrap();
        lookup.find("b").await.unwrap();

        assert_eq!(runtime.create_calls(), 1);
        assert_eq!(executor.statements().len(), 2);
    }

    #[tokio::test]
    async fn test_provisioning_failure_surfaces() {
        let runtime = Arc::new(FakeRuntime::new().unreachable("daemon down"));
        let executor = Arc::new(RecordingExecutor::new());
        let lookup = lookup_over(runtime, executor.clone(), named("shop"));

        let err = lookup.find("orders").await.unwrap_err();

        assert!(matches!(err, LookupError::Provision { ref identity, .. } if identity == "shop"));
        assert!(executor.statements().is_empty());
    }

    #[tokio::test]
    async fn test_unusable_database_name_fails() {
        let runtime = Arc::new(FakeRuntime::new());
        let executor = Arc::new(RecordingExecutor::new());
        let lookup = lookup_over(runtime, executor, named("shop"));

        let err = lookup.find("/-/").await.unwrap_err();
        assert!(matches!(err, LookupError::Database(_)));
    }
}
