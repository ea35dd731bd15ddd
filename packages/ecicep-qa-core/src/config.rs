//! Process configuration.
//!
//! Both structs are built once at start-up and validated eagerly, so a
//! missing variable fails before any network or database activity.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{QaError, Result};

/// Default timeout for page loads and JSON reads.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for form posts.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default PostgreSQL port.
pub const DEFAULT_PG_PORT: u16 = 5432;

/// Connection settings for the application under test.
#[derive(Clone)]
pub struct HarnessConfig {
    /// Root URL of the running application
    pub base_url: Url,
    /// Login name
    pub username: String,
    /// Login password
    pub password: String,
    /// Timeout for GET requests
    pub read_timeout: Duration,
    /// Timeout for form posts
    pub submit_timeout: Duration,
}

impl HarnessConfig {
    /// Reads `BASE_URL`, `USERNAME` and `PASSWORD` from the process
    /// environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`HarnessConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_parts(lookup("BASE_URL"), lookup("USERNAME"), lookup("PASSWORD"))
    }

    /// Validates already-collected values (e.g. from CLI flags with
    /// environment fallbacks). Empty strings count as missing.
    pub fn from_parts(
        base_url: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let base_url = required("BASE_URL", base_url)?;
        let username = required("USERNAME", username)?;
        let password = required("PASSWORD", password)?;
        Ok(Self {
            base_url: parse_base_url(&base_url)?,
            username,
            password,
            read_timeout: DEFAULT_READ_TIMEOUT,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        })
    }

    /// Overrides both request timeouts.
    pub fn with_timeouts(mut self, read: Duration, submit: Duration) -> Self {
        self.read_timeout = read;
        self.submit_timeout = submit;
        self
    }
}

impl fmt::Debug for HarnessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarnessConfig")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("read_timeout", &self.read_timeout)
            .field("submit_timeout", &self.submit_timeout)
            .finish()
    }
}

/// Database settings, either a full URL or discrete libpq-style values.
#[derive(Clone, PartialEq)]
pub enum DbConfig {
    /// `DATABASE_URL`
    Url(String),
    /// `PGHOST`, `PGPORT`, `PGUSER`, `PGPASSWORD`, `PGDATABASE`
    Params {
        host: String,
        port: u16,
        user: String,
        password: Option<String>,
        database: String,
    },
}

impl DbConfig {
    /// Reads the database settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// `DATABASE_URL` wins when set; otherwise `PGUSER` and `PGDATABASE`
    /// are required and host/port default to `localhost:5432`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = non_empty(lookup("DATABASE_URL")) {
            return Ok(DbConfig::Url(url));
        }
        let port = match non_empty(lookup("PGPORT")) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| QaError::Config(format!("PGPORT '{}' is not a port: {}", raw, e)))?,
            None => DEFAULT_PG_PORT,
        };
        Ok(DbConfig::Params {
            host: non_empty(lookup("PGHOST")).unwrap_or_else(|| "localhost".to_string()),
            port,
            user: required("PGUSER", lookup("PGUSER"))?,
            password: non_empty(lookup("PGPASSWORD")),
            database: required("PGDATABASE", lookup("PGDATABASE"))?,
        })
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbConfig::Url(_) => f.debug_tuple("Url").field(&"<redacted>").finish(),
            DbConfig::Params {
                host,
                port,
                user,
                database,
                ..
            } => f
                .debug_struct("Params")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("password", &"<redacted>")
                .field("database", database)
                .finish(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(name: &str, value: Option<String>) -> Result<String> {
    non_empty(value)
        .ok_or_else(|| QaError::Config(format!("required environment variable {} is not set", name)))
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| QaError::Config(format!("BASE_URL '{}' is not a URL: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(QaError::Config(format!(
            "BASE_URL must use http or https, got '{}'",
            other
        ))),
    }
}
