//! Explicit store configuration.
//!
//! The workflow store never reads process-wide settings. Hosts build a
//! [`StoreConfig`] (directly, or from `FLOWSTORE_*` environment variables via
//! [`StoreConfig::from_env`]), validate it, and pass it to the services at
//! construction. Credentials are wrapped in [`SecretString`] so they never
//! appear in `Debug` output or logs.

use crate::kv::domain::KEY_SEPARATOR;
use secrecy::{ExposeSecret, SecretString};
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "flowstore";

/// Default upper bound on pooled `PostgreSQL` connections.
pub const DEFAULT_POOL_MAX_SIZE: u32 = 10;

/// Default time to wait for a pooled connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while building or validating configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more settings are missing or inconsistent.
    #[error("invalid store configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// An environment variable holds a value that cannot be parsed.
    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidVar {
        /// Variable name.
        name: String,
        /// Offending raw value.
        value: String,
    },
}

/// Top-level configuration of a workflow store.
#[derive(Debug)]
pub struct StoreConfig {
    /// Prefix segment applied to every stored key.
    pub namespace: String,
    /// Backing store selection.
    pub backend: BackendConfig,
}

/// Backing store selection.
#[derive(Debug)]
pub enum BackendConfig {
    /// Process-local in-memory records.
    Memory,
    /// `PostgreSQL` table of key/field/value rows.
    Postgres(PostgresConfig),
}

/// Connection settings for the `PostgreSQL` adapter.
///
/// Either `url` or both `host` and `port` must be set.
#[derive(Debug)]
pub struct PostgresConfig {
    /// Full connection URL; takes precedence over the individual parts.
    pub url: Option<SecretString>,
    /// Server host name.
    pub host: Option<String>,
    /// Server port.
    pub port: Option<u16>,
    /// Login role.
    pub user: Option<String>,
    /// Login password.
    pub password: Option<SecretString>,
    /// Database name.
    pub database: Option<String>,
    /// Upper bound on pooled connections.
    pub pool_max_size: u32,
    /// Time to wait for a pooled connection.
    pub connect_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            backend: BackendConfig::Memory,
        }
    }
}

impl StoreConfig {
    /// Creates an in-memory configuration under `namespace`.
    #[must_use]
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            backend: BackendConfig::Memory,
        }
    }

    /// Creates a `PostgreSQL` configuration under the default namespace.
    #[must_use]
    pub fn postgres(config: PostgresConfig) -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            backend: BackendConfig::Postgres(config),
        }
    }

    /// Replaces the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Loads configuration from `FLOWSTORE_*` environment variables.
    ///
    /// In local development, load a `.env` file before calling this.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable cannot be parsed or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// Recognized variables: `FLOWSTORE_NAMESPACE`, `FLOWSTORE_BACKEND`
    /// (`memory` or `postgres`), `FLOWSTORE_DATABASE_URL`,
    /// `FLOWSTORE_PG_HOST`, `FLOWSTORE_PG_PORT`, `FLOWSTORE_PG_USER`,
    /// `FLOWSTORE_PG_PASSWORD`, `FLOWSTORE_PG_DATABASE`,
    /// `FLOWSTORE_PG_POOL_MAX_SIZE` and `FLOWSTORE_PG_CONNECT_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable cannot be parsed or the
    /// resulting configuration is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace =
            lookup("FLOWSTORE_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_owned());
        let backend_name = lookup("FLOWSTORE_BACKEND").unwrap_or_else(|| "memory".to_owned());

        let backend = match backend_name.trim().to_ascii_lowercase().as_str() {
            "memory" => BackendConfig::Memory,
            "postgres" | "postgresql" => BackendConfig::Postgres(postgres_from_lookup(&lookup)?),
            _ => {
                return Err(ConfigError::InvalidVar {
                    name: "FLOWSTORE_BACKEND".to_owned(),
                    value: backend_name,
                });
            }
        };

        let config = Self { namespace, backend };
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration and reports every problem found.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing each problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        if self.namespace.is_empty() {
            problems.push("namespace must be present.".to_owned());
        }
        if self.namespace.contains(KEY_SEPARATOR) {
            problems.push(format!("namespace must not contain '{KEY_SEPARATOR}'."));
        }
        if let BackendConfig::Postgres(postgres) = &self.backend {
            problems.extend(postgres.problems());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl PostgresConfig {
    /// Creates settings from a full connection URL.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(SecretString::from(url.into())),
            ..Self::default()
        }
    }

    /// Creates settings from a host and port.
    #[must_use]
    pub fn from_host(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Self::default()
        }
    }

    /// Returns the connection URL, assembling it from parts when no URL is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when neither a URL nor a host and
    /// port are configured.
    pub fn connection_url(&self) -> Result<SecretString, ConfigError> {
        if let Some(url) = &self.url {
            return Ok(SecretString::from(url.expose_secret().to_owned()));
        }

        let (Some(host), Some(port)) = (&self.host, self.port) else {
            return Err(ConfigError::Invalid(self.problems()));
        };

        let invalid =
            |part: &str| ConfigError::Invalid(vec![format!("{part} is not valid in a URL.")]);
        let mut url = Url::parse("postgres://localhost").map_err(|_| invalid("scheme"))?;
        match host.parse::<IpAddr>() {
            Ok(ip) => url.set_ip_host(ip),
            Err(_) => url.set_host(Some(host)).map_err(|_| ()),
        }
        .map_err(|()| invalid("host"))?;
        url.set_port(Some(port)).map_err(|()| invalid("port"))?;
        if let Some(user) = &self.user {
            url.set_username(user).map_err(|()| invalid("user"))?;
            if let Some(password) = &self.password {
                url.set_password(Some(password.expose_secret()))
                    .map_err(|()| invalid("password"))?;
            }
        }
        if let Some(database) = &self.database {
            url.set_path(&format!("/{database}"));
        }
        Ok(SecretString::from(String::from(url)))
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.url.is_none() {
            if self.host.is_none() {
                problems.push("host must be present.".to_owned());
            }
            if self.port.is_none() {
                problems.push("port must be present.".to_owned());
            }
        }
        if self.pool_max_size == 0 {
            problems.push("pool_max_size must be positive.".to_owned());
        }
        problems
    }
}

fn postgres_from_lookup<F>(lookup: &F) -> Result<PostgresConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let port = parse_var(lookup, "FLOWSTORE_PG_PORT")?;
    let pool_max_size =
        parse_var(lookup, "FLOWSTORE_PG_POOL_MAX_SIZE")?.unwrap_or(DEFAULT_POOL_MAX_SIZE);
    let connect_timeout = parse_var::<u64, F>(lookup, "FLOWSTORE_PG_CONNECT_TIMEOUT_SECS")?
        .map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_secs);

    Ok(PostgresConfig {
        url: lookup("FLOWSTORE_DATABASE_URL").map(SecretString::from),
        host: lookup("FLOWSTORE_PG_HOST"),
        port,
        user: lookup("FLOWSTORE_PG_USER"),
        password: lookup("FLOWSTORE_PG_PASSWORD").map(SecretString::from),
        database: lookup("FLOWSTORE_PG_DATABASE"),
        pool_max_size,
        connect_timeout,
    })
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidVar {
                name: name.to_owned(),
                value: raw.clone(),
            })
        })
        .transpose()
}
