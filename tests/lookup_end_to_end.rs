//! End-to-end resolution tests.
//!
//! Drive the delegating driver, the registry and the per-application lookup
//! together against in-memory fakes. Each test builds a throwaway git
//! checkout in a tempdir so identity and branch derivation run for real.

use std::sync::Arc;
use std::time::Duration;

use git2::Repository;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use tempfile::TempDir;

use branchdb::config::ContainerConfig;
use branchdb::container::{ContainerLifecycleCache, ProvisioningWorkflow, ReadinessPolicy};
use branchdb::database::DatabaseProvisioner;
use branchdb::driver::DelegatingDriver;
use branchdb::lookup::{
    ConnectionLookup, ConnectionLookupRegistry, LookupError, PerApplicationLookup,
};
use branchdb::naming::NameResolver;
use branchdb::testing::{FakeRuntime, RecordingExecutor, StaticLookup};

const PORT: u16 = 43306;

fn checkout(branch: &str, remote: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    repo.set_head(&format!("refs/heads/{branch}")).unwrap();
    repo.remote("origin", remote).unwrap();
    dir
}

struct Harness {
    runtime: Arc<FakeRuntime>,
    executor: Arc<RecordingExecutor>,
    driver: DelegatingDriver,
}

async fn harness(checkout: &TempDir, container: ContainerConfig) -> Harness {
    let runtime = Arc::new(FakeRuntime::new().with_host_port(PORT));
    let executor = Arc::new(RecordingExecutor::new());

    let workflow = ProvisioningWorkflow::new(runtime.clone()).with_readiness(ReadinessPolicy {
        attempts: 1,
        interval: Duration::from_millis(1),
        connect_timeout: Duration::from_millis(50),
    });
    let lookup = PerApplicationLookup::new(
        NameResolver::new(checkout.path()).with_executable_path(None),
        ContainerLifecycleCache::new(Arc::new(workflow)),
        DatabaseProvisioner::new(executor.clone()),
        container,
    );

    let registry = Arc::new(ConnectionLookupRegistry::explicit_only());
    registry.register(Arc::new(lookup)).await;

    Harness {
        runtime,
        executor,
        driver: DelegatingDriver::new(registry),
    }
}

#[tokio::test]
async fn branch_query_resolves_to_branch_database() {
    let repo = checkout("feature/login", "git@github.com:acme/shop.git");
    let h = harness(&repo, ContainerConfig::default()).await;

    let conn = h.driver.resolve("sf:branch").await.unwrap();

    assert_eq!(
        conn.as_deref(),
        Some("mysql://127.0.0.1:43306/branch_featurelogin?user=root")
    );
    assert_eq!(
        h.executor.statements(),
        vec![(
            "mysql://127.0.0.1:43306?user=root".to_string(),
            "CREATE DATABASE IF NOT EXISTS `branch_featurelogin`".to_string()
        )]
    );
    assert_eq!(h.runtime.container_count(), 1);
}

#[tokio::test]
async fn named_query_with_application_user() {
    let repo = checkout("main", "https://github.com/acme/shop.git");
    let container = ContainerConfig {
        root_password: Some(SecretString::from("root-secret")),
        application_user: Some("shop".to_string()),
        application_password: Some(SecretString::from("p@ss word")),
        ..ContainerConfig::default()
    };
    let h = harness(&repo, container).await;

    let conn = h.driver.resolve("sf:reports").await.unwrap().unwrap();

    assert_eq!(
        conn,
        "mysql://127.0.0.1:43306/reports?user=shop&password=p%40ss%20word"
    );
}

#[tokio::test]
async fn repeated_lookups_are_memoized() {
    let repo = checkout("main", "https://github.com/acme/shop.git");
    let h = harness(&repo, ContainerConfig::default()).await;

    let first = h.driver.resolve("sf:branch").await.unwrap();
    let second = h.driver.resolve("sf:branch").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.executor.statements().len(), 1);
    assert_eq!(h.runtime.create_calls(), 1);
}

#[tokio::test]
async fn queries_share_one_server() {
    let repo = checkout("main", "https://github.com/acme/shop.git");
    let h = harness(&repo, ContainerConfig::default()).await;

    h.driver.resolve("sf:branch").await.unwrap();
    h.driver.resolve("sf:orders").await.unwrap();
    h.driver.resolve("sf:billing").await.unwrap();

    assert_eq!(h.runtime.create_calls(), 1);
    let created: Vec<String> = h
        .executor
        .statements()
        .into_iter()
        .map(|(_, sql)| sql)
        .collect();
    assert_eq!(
        created,
        vec![
            "CREATE DATABASE IF NOT EXISTS `branch_main`",
            "CREATE DATABASE IF NOT EXISTS `orders`",
            "CREATE DATABASE IF NOT EXISTS `billing`",
        ]
    );
}

#[tokio::test]
async fn earlier_registration_shadows_per_application_lookup() {
    let repo = checkout("main", "https://github.com/acme/shop.git");
    let runtime = Arc::new(FakeRuntime::new());
    let workflow = ProvisioningWorkflow::new(runtime.clone());
    let per_application = PerApplicationLookup::new(
        NameResolver::new(repo.path()).with_executable_path(None),
        ContainerLifecycleCache::new(Arc::new(workflow)),
        DatabaseProvisioner::new(Arc::new(RecordingExecutor::new())),
        ContainerConfig::default(),
    );

    let registry = Arc::new(ConnectionLookupRegistry::explicit_only());
    registry
        .register(Arc::new(StaticLookup::answering("orders", "mysql://fixed/orders")))
        .await;
    registry.register(Arc::new(per_application)).await;

    let result = registry.lookup("orders").await.unwrap().unwrap();

    assert_eq!(result.connection_string(), "mysql://fixed/orders");
    assert_eq!(result.lookup().name(), "static:orders");
    assert_eq!(runtime.create_calls(), 0);
}

#[tokio::test]
async fn provisioning_failure_is_retried_on_next_lookup() {
    let repo = checkout("main", "https://github.com/acme/shop.git");
    let h = harness(&repo, ContainerConfig::default()).await;
    h.runtime.set_create_failure(Some("no space left on device"));

    let err = h.driver.resolve("sf:branch").await.unwrap_err();
    assert!(matches!(err, LookupError::Provision { ref identity, .. } if identity == "acme-shop"));

    h.runtime.set_create_failure(None);
    let conn = h.driver.resolve("sf:branch").await.unwrap();

    assert_eq!(
        conn.as_deref(),
        Some("mysql://127.0.0.1:43306/branch_main?user=root")
    );
    assert_eq!(h.runtime.create_calls(), 2);
}
