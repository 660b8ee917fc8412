//! One-shot statement execution against a database server.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;

use crate::database::error::{DatabaseError, Result};

/// Executes a single statement on a fresh connection.
///
/// Implementations must release the connection whether or not the
/// statement succeeds.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn execute(&self, server_connection: &str, sql: &str) -> Result<()>;
}

/// Connection settings parsed from a `mysql://host:port[/db]?user=..&password=..`
/// string.
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<SecretString>,
    pub database: Option<String>,
}

impl ServerAddress {
    /// Parse an assembled connection string.
    pub fn parse(connection: &str) -> Result<Self> {
        let url = url::Url::parse(connection).map_err(|e| DatabaseError::InvalidConnectionString {
            reason: e.to_string(),
        })?;

        let host = url
            .host_str()
            .ok_or_else(|| DatabaseError::InvalidConnectionString {
                reason: "missing host".to_string(),
            })?
            .to_string();
        let port = url.port().unwrap_or(crate::container::config::MYSQL_PORT);

        let mut user = None;
        let mut password = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "user" => user = Some(value.into_owned()),
                "password" => password = Some(SecretString::from(value.into_owned())),
                _ => {}
            }
        }
        if user.is_none() && !url.username().is_empty() {
            user = Some(url.username().to_string());
        }

        let database = url
            .path()
            .trim_start_matches('/')
            .split('/')
            .next()
            .filter(|db| !db.is_empty())
            .map(str::to_string);

        Ok(Self {
            host,
            port,
            user: user.unwrap_or_else(|| "root".to_string()),
            password,
            database,
        })
    }

    /// sqlx connect options for this address.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user);
        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }
        if let Some(database) = &self.database {
            options = options.database(database);
        }
        options
    }
}

/// [`StatementExecutor`] over a MySQL server using sqlx.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlExecutor;

impl MySqlExecutor {
    /// Open a connection for an assembled connection string.
    pub async fn connect(connection: &str) -> Result<MySqlConnection> {
        let address = ServerAddress::parse(connection)?;
        MySqlConnection::connect_with(&address.connect_options())
            .await
            .map_err(DatabaseError::Connect)
    }
}

#[async_trait]
impl StatementExecutor for MySqlExecutor {
    async fn execute(&self, server_connection: &str, sql: &str) -> Result<()> {
        let mut connection = Self::connect(server_connection).await?;

        let outcome = sqlx::Executor::execute(&mut connection, sqlx::raw_sql(sql))
            .await
            .map(|_| ())
            .map_err(DatabaseError::Statement);

        if let Err(e) = connection.close().await {
            tracing::debug!("Error closing database connection: {}", e);
        }

        outcome
    }
}
