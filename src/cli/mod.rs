//! CLI command handling.
//!
//! Provides subcommands for:
//! - Resolving a delegating URL to a connection string (`resolve`)
//! - Showing the identity derived for a checkout (`identity`)

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ColorChoice, Parser, Subcommand};

use crate::config::Config;
use crate::container::LogProgress;
use crate::driver::DelegatingDriver;
use crate::lookup::{ConnectionLookupRegistry, PerApplicationLookup};
use crate::naming::NameResolver;

#[derive(Parser, Debug)]
#[command(name = "branchdb")]
#[command(about = "Per-application, per-branch MySQL databases on demand")]
#[command(
    long_about = "Resolves sf:<query> URLs to MySQL connection strings, starting a database server container for the application when needed.\nExamples:\n  branchdb resolve sf:branch  # Database for the current branch\n  branchdb identity  # Show application and database names"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Skip container runtime detection and connect directly (same as BYPASS_INSTALLATION)
    #[arg(long, global = true)]
    pub bypass_installation: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a delegating URL and print the connection string
    #[command(long_about = "Resolves a URL such as sf:branch or sf:orders.\nExample: branchdb resolve sf:branch --path ~/src/shop")]
    Resolve {
        /// URL to resolve (sf:<query>)
        url: String,

        /// Directory inside the application's checkout (defaults to the working directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Print the application identity and database name for a checkout
    Identity {
        /// Directory inside the application's checkout (defaults to the working directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn name_resolver(path: Option<PathBuf>, config: &Config) -> NameResolver {
    let resolver = match path {
        Some(path) => NameResolver::new(path),
        None => NameResolver::from_current_dir(),
    };
    resolver.with_application_name(config.application_name.clone())
}

/// Resolve `url` and print its connection string.
pub async fn run_resolve_command(
    url: &str,
    path: Option<PathBuf>,
    config: Config,
) -> anyhow::Result<()> {
    if !DelegatingDriver::accepts_url(url) {
        anyhow::bail!(
            "'{}' is not a delegating URL (expected {}<query>)",
            url,
            crate::driver::URL_PREFIX
        );
    }

    let names = name_resolver(path, &config);
    let lookup = Arc::new(PerApplicationLookup::from_config(
        &config,
        names,
        Arc::new(LogProgress),
    ));

    let registry = Arc::new(ConnectionLookupRegistry::with_inventory(config));
    registry.register(lookup).await;

    let driver = DelegatingDriver::new(registry);
    match driver.resolve(url).await? {
        Some(connection_string) => {
            println!("{connection_string}");
            Ok(())
        }
        None => anyhow::bail!("No connection lookup knows '{}'", url),
    }
}

/// Print the derived identity and database name.
pub fn run_identity_command(path: Option<PathBuf>, config: &Config) -> anyhow::Result<()> {
    let names = name_resolver(path, config);
    println!("application: {}", names.resolve_application_identity());
    println!("database:    {}", names.resolve_database_name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolve() {
        let cli = Cli::try_parse_from(["branchdb", "resolve", "sf:branch", "--path", "/src/shop"])
            .unwrap();

        match cli.command {
            Command::Resolve { url, path } => {
                assert_eq!(url, "sf:branch");
                assert_eq!(path, Some(PathBuf::from("/src/shop")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_bypass_flag_is_global() {
        let cli =
            Cli::try_parse_from(["branchdb", "identity", "--bypass-installation"]).unwrap();
        assert!(cli.bypass_installation);
        assert!(matches!(cli.command, Command::Identity { path: None }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["branchdb"]).is_err());
    }

    #[tokio::test]
    async fn test_resolve_rejects_foreign_url() {
        let err = run_resolve_command("mysql://h/db", None, Config::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a delegating URL"));
    }
}
