//! Configuration resolved from the process environment.
//!
//! Every option has a documented default so an empty environment yields a
//! working configuration. Call [`Config::from_env`] after loading any `.env`
//! file (the binary does this through `dotenvy`).

mod container;
pub(crate) mod helpers;

pub use container::{ContainerConfig, DEFAULT_IMAGE_NAME, DEFAULT_IMAGE_TAG};

use crate::config::helpers::non_empty_env;
use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Explicit application identity (`APPLICATION_NAME`); overrides any
    /// identity derived from the checkout.
    pub application_name: Option<String>,
    /// Database server container settings.
    pub container: ContainerConfig,
}

impl Config {
    /// Resolve the full configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            application_name: non_empty_env("APPLICATION_NAME")?,
            container: ContainerConfig::resolve()?,
        })
    }
}
