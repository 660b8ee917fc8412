//! Specification and result types for database server containers.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

/// Port the MySQL server listens on inside the container.
pub const MYSQL_PORT: u16 = 3306;

/// Connection-string scheme for MySQL servers.
pub const MYSQL_SCHEME: &str = "mysql";

/// Host side of a port mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostPort {
    /// Let the runtime pick a free host port.
    #[default]
    Auto,
    /// Bind a specific host port.
    Fixed(u16),
}

/// A single container port → host port mapping (TCP).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// Port inside the container.
    pub container_port: u16,
    /// Port on the host.
    pub host_port: HostPort,
}

/// What to run for a database server.
///
/// Built fresh for every provisioning call and not mutated afterwards.
#[derive(Debug, Clone)]
pub struct ContainerSpecification {
    /// Image name without tag (e.g. `mysql`).
    pub image: String,
    /// Image tag (e.g. `5.7`).
    pub tag: String,
    /// Port mappings; the first one is the server port.
    pub ports: Vec<PortMapping>,
    /// Environment variables: (name, value).
    pub env: Vec<(String, String)>,
    /// Scheme used when assembling connection strings.
    pub scheme: String,
}

impl ContainerSpecification {
    /// A MySQL server with the given credentials baked into its environment.
    pub fn mysql(
        image: impl Into<String>,
        tag: impl Into<String>,
        credentials: &DatabaseCredentials,
    ) -> Self {
        Self {
            image: image.into(),
            tag: tag.into(),
            ports: vec![PortMapping {
                container_port: MYSQL_PORT,
                host_port: HostPort::Auto,
            }],
            env: credentials.mysql_environment(),
            scheme: MYSQL_SCHEME.to_string(),
        }
    }

    /// `image:tag` reference.
    pub fn image_reference(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    /// The server port mapping.
    pub fn primary_port(&self) -> Option<&PortMapping> {
        self.ports.first()
    }

    /// Deterministic container name for an application identity.
    ///
    /// Characters the runtime rejects in container names are replaced with
    /// `-`; the identity itself is left untouched for cache keying.
    pub fn container_name(&self, identity: &str) -> String {
        let base = self.image.rsplit('/').next().unwrap_or(&self.image);
        let suffix: String = identity
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        format!("{base}-{suffix}")
    }
}

/// Credentials for the provisioned server.
#[derive(Debug, Clone, Default)]
pub struct DatabaseCredentials {
    /// Root password; `None` means an empty root password.
    pub root_password: Option<SecretString>,
    /// Application-scoped user name.
    pub application_user: Option<String>,
    /// Application-scoped user password.
    pub application_password: Option<SecretString>,
}

impl DatabaseCredentials {
    /// The application user pair, only when both halves are configured.
    pub fn application_pair(&self) -> Option<(&str, &str)> {
        match (&self.application_user, &self.application_password) {
            (Some(user), Some(password)) => Some((user.as_str(), password.expose_secret())),
            _ => None,
        }
    }

    /// Environment understood by the official MySQL image.
    pub fn mysql_environment(&self) -> Vec<(String, String)> {
        let mut env = Vec::with_capacity(3);
        match &self.root_password {
            Some(password) => env.push((
                "MYSQL_ROOT_PASSWORD".to_string(),
                password.expose_secret().to_string(),
            )),
            None => env.push(("MYSQL_ALLOW_EMPTY_PASSWORD".to_string(), "yes".to_string())),
        }
        if let Some((user, password)) = self.application_pair() {
            env.push(("MYSQL_USER".to_string(), user.to_string()));
            env.push(("MYSQL_PASSWORD".to_string(), password.to_string()));
        }
        env
    }
}

/// Everything the provisioning workflow needs besides the identity.
#[derive(Debug, Clone)]
pub struct ProvisioningRequest {
    pub specification: ContainerSpecification,
    pub credentials: DatabaseCredentials,
}

/// Resolved address of a running, reachable container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEndpoint {
    /// Host address to connect to.
    pub host: String,
    /// Port to connect to.
    pub port: u16,
}

impl std::fmt::Display for ContainerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A provisioned database server: where it is and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedServer {
    /// Container name the server runs in.
    pub container_name: String,
    /// Network endpoint.
    pub endpoint: ContainerEndpoint,
    /// Server-level connection string (no database selected).
    pub connection_string: String,
}

/// Bounds for the TCP readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Maximum connect attempts.
    pub attempts: u32,
    /// Delay between failed attempts.
    pub interval: Duration,
    /// Timeout for a single connect attempt.
    pub connect_timeout: Duration,
}

impl ReadinessPolicy {
    /// Longest a full readiness wait can take: every connect attempt running
    /// into its timeout, plus the pauses between attempts.
    pub fn worst_case(&self) -> Duration {
        let pauses = self.attempts.saturating_sub(1);
        self.connect_timeout
            .saturating_mul(self.attempts)
            .saturating_add(self.interval.saturating_mul(pauses))
    }
}

impl Default for ReadinessPolicy {
    /// 25 attempts, 500ms apart, 2s per connect.
    ///
    /// Refused connects give up after roughly 12.5s; connects that hang until
    /// their timeout stretch that to [`worst_case`](Self::worst_case), 62s.
    fn default() -> Self {
        Self {
            attempts: 25,
            interval: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

/// Build a server connection string.
///
/// An application user/password pair wins over root; root gets a password
/// parameter only when one is configured.
pub fn assemble_connection_string(
    scheme: &str,
    endpoint: &ContainerEndpoint,
    credentials: &DatabaseCredentials,
) -> String {
    let mut connection = format!("{}://{}:{}", scheme, endpoint.host, endpoint.port);

    if let Some((user, password)) = credentials.application_pair() {
        connection.push_str("?user=");
        connection.push_str(&urlencoding::encode(user));
        connection.push_str("&password=");
        connection.push_str(&urlencoding::encode(password));
    } else {
        connection.push_str("?user=root");
        if let Some(password) = &credentials.root_password {
            connection.push_str("&password=");
            connection.push_str(&urlencoding::encode(password.expose_secret()));
        }
    }

    connection
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> ContainerEndpoint {
        ContainerEndpoint {
            host: "10.0.0.5".to_string(),
            port: 3306,
        }
    }

    #[test]
    fn test_default_readiness_worst_case() {
        let policy = ReadinessPolicy::default();
        assert_eq!(policy.interval * policy.attempts, Duration::from_millis(12_500));
        assert_eq!(policy.worst_case(), Duration::from_secs(62));

        let single = ReadinessPolicy {
            attempts: 1,
            interval: Duration::from_secs(9),
            connect_timeout: Duration::from_millis(50),
        };
        assert_eq!(single.worst_case(), Duration::from_millis(50));
    }

    #[test]
    fn test_connection_string_with_application_user() {
        let credentials = DatabaseCredentials {
            root_password: Some(SecretString::from("secret")),
            application_user: Some("app".to_string()),
            application_password: Some(SecretString::from("pw")),
        };

        let connection = assemble_connection_string("mysql", &endpoint(), &credentials);
        assert_eq!(connection, "mysql://10.0.0.5:3306?user=app&password=pw");
    }

    #[test]
    fn test_connection_string_with_root_password() {
        let credentials = DatabaseCredentials {
            root_password: Some(SecretString::from("secret")),
            ..Default::default()
        };

        let connection = assemble_connection_string("mysql", &endpoint(), &credentials);
        assert!(connection.ends_with("?user=root&password=secret"));
    }

    #[test]
    fn test_connection_string_without_credentials() {
        let connection =
            assemble_connection_string("mysql", &endpoint(), &DatabaseCredentials::default());
        assert!(connection.ends_with("?user=root"));
    }

    #[test]
    fn test_application_user_without_password_falls_back_to_root() {
        let credentials = DatabaseCredentials {
            application_user: Some("app".to_string()),
            ..Default::default()
        };

        let connection = assemble_connection_string("mysql", &endpoint(), &credentials);
        assert!(connection.ends_with("?user=root"));
    }

    #[test]
    fn test_password_is_percent_encoded() {
        let credentials = DatabaseCredentials {
            root_password: Some(SecretString::from("a&b=c")),
            ..Default::default()
        };

        let connection = assemble_connection_string("mysql", &endpoint(), &credentials);
        assert!(connection.ends_with("&password=a%26b%3Dc"));
    }

    #[test]
    fn test_mysql_environment() {
        let empty = DatabaseCredentials::default().mysql_environment();
        assert_eq!(
            empty,
            vec![("MYSQL_ALLOW_EMPTY_PASSWORD".to_string(), "yes".to_string())]
        );

        let full = DatabaseCredentials {
            root_password: Some(SecretString::from("r")),
            application_user: Some("app".to_string()),
            application_password: Some(SecretString::from("pw")),
        }
        .mysql_environment();
        assert_eq!(full.len(), 3);
        assert!(full.contains(&("MYSQL_ROOT_PASSWORD".to_string(), "r".to_string())));
        assert!(full.contains(&("MYSQL_USER".to_string(), "app".to_string())));
    }

    #[test]
    fn test_container_name() {
        let spec = ContainerSpecification::mysql("library/mysql", "5.7", &Default::default());

        assert_eq!(spec.container_name("acme-widgets"), "mysql-acme-widgets");
        assert_eq!(spec.container_name("my app/x"), "mysql-my-app-x");
        assert_eq!(spec.image_reference(), "library/mysql:5.7");
    }
}
