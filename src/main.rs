//! branchdb - main entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use branchdb::cli::{Cli, Command, run_identity_command, run_resolve_command};
use branchdb::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout carries only the answer
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("branchdb=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::from_env()?;
    if cli.bypass_installation {
        config.container.bypass_installation = true;
    }

    match cli.command {
        Command::Resolve { url, path } => run_resolve_command(&url, path, config).await,
        Command::Identity { path } => run_identity_command(path, &config),
    }
}
