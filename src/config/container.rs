use std::time::Duration;

use secrecy::SecretString;

use crate::config::helpers::{flag_env, non_empty_env, parse_env, parse_optional_env};
use crate::container::{DatabaseCredentials, ReadinessPolicy};
use crate::error::ConfigError;

pub const DEFAULT_IMAGE_NAME: &str = "mysql";
pub const DEFAULT_IMAGE_TAG: &str = "5.7";

/// Database server container configuration.
///
/// Controls which image backs the per-application server, the credentials
/// baked into it, and how long provisioning waits for it to accept
/// connections.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Image to run (`MYSQL_IMAGE_NAME`).
    pub image_name: String,
    /// Image tag (`MYSQL_IMAGE_TAG`).
    pub image_tag: String,
    /// Root password; `None` starts the server with an empty root password.
    pub root_password: Option<SecretString>,
    /// Application-scoped user name.
    pub application_user: Option<String>,
    /// Application-scoped user password.
    pub application_password: Option<SecretString>,
    /// Skip runtime detection and connect to the runtime directly.
    pub bypass_installation: bool,
    /// Readiness polling bounds.
    pub readiness: ReadinessPolicy,
    /// Optional capacity bound for the container lifecycle cache.
    pub cache_capacity: Option<u64>,
    /// Optional time-to-live for container lifecycle entries.
    pub cache_ttl: Option<Duration>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image_name: DEFAULT_IMAGE_NAME.to_string(),
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            root_password: None,
            application_user: None,
            application_password: None,
            bypass_installation: false,
            readiness: ReadinessPolicy::default(),
            cache_capacity: None,
            cache_ttl: None,
        }
    }
}

impl ContainerConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let readiness = ReadinessPolicy {
            attempts: parse_optional_env("READINESS_ATTEMPTS", defaults.readiness.attempts)?,
            interval: Duration::from_millis(parse_optional_env(
                "READINESS_INTERVAL_MS",
                defaults.readiness.interval.as_millis() as u64,
            )?),
            connect_timeout: Duration::from_millis(parse_optional_env(
                "READINESS_CONNECT_TIMEOUT_MS",
                defaults.readiness.connect_timeout.as_millis() as u64,
            )?),
        };

        if readiness.attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "READINESS_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            image_name: non_empty_env("MYSQL_IMAGE_NAME")?.unwrap_or(defaults.image_name),
            image_tag: non_empty_env("MYSQL_IMAGE_TAG")?.unwrap_or(defaults.image_tag),
            root_password: non_empty_env("ROOT_PASSWORD")?.map(SecretString::from),
            application_user: non_empty_env("APPLICATION_USER_NAME")?,
            application_password: non_empty_env("APPLICATION_USER_PASSWORD")?
                .map(SecretString::from),
            bypass_installation: flag_env("BYPASS_INSTALLATION", defaults.bypass_installation)?,
            readiness,
            cache_capacity: parse_env("CONTAINER_CACHE_CAPACITY")?,
            cache_ttl: parse_env::<u64>("CONTAINER_CACHE_TTL_SECS")?.map(Duration::from_secs),
        })
    }

    /// Credentials to bake into the container and embed in connection strings.
    pub fn credentials(&self) -> DatabaseCredentials {
        DatabaseCredentials {
            root_password: self.root_password.clone(),
            application_user: self.application_user.clone(),
            application_password: self.application_password.clone(),
        }
    }
}
