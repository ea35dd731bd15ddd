//! Connection factory and per-operation store.

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::{debug, warn};

use ecicep_qa_core::form::FullRecord;
use ecicep_qa_core::{DbConfig, QaError, Result, Run};

use crate::inspect::{inspect, SchemaReport};
use crate::verifier::{first_sector_id, verify_full_record};

/// Builds connect options from the process configuration.
pub fn connect_options(config: &DbConfig) -> Result<PgConnectOptions> {
    match config {
        DbConfig::Url(url) => PgConnectOptions::from_str(url)
            .map_err(|e| QaError::Config(format!("DATABASE_URL is not usable: {}", e))),
        DbConfig::Params {
            host,
            port,
            user,
            password,
            database,
        } => {
            let mut options = PgConnectOptions::new()
                .host(host)
                .port(*port)
                .username(user)
                .database(database);
            if let Some(password) = password {
                options = options.password(password);
            }
            Ok(options)
        }
    }
}

/// Opens one connection.
pub async fn connect(options: &PgConnectOptions) -> Result<PgConnection> {
    PgConnection::connect_with(options)
        .await
        .map_err(|e| QaError::Database(format!("Failed to connect: {}", e)))
}

/// Closes a connection, logging rather than failing if the goodbye fails.
pub async fn close(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        warn!("Failed to close database connection cleanly: {}", e);
    }
}

/// Database handle that opens a fresh connection for every logical
/// operation and closes it on every exit path.
#[derive(Clone)]
pub struct PgStore {
    options: PgConnectOptions,
}

impl PgStore {
    /// Creates a store without connecting.
    ///
    /// # Arguments
    /// * `config` - `DATABASE_URL` or the `PG*` parameters
    ///
    /// # Returns
    /// The store, or [`QaError::Config`] if the URL cannot be parsed.
    pub fn new(config: &DbConfig) -> Result<Self> {
        Ok(Self {
            options: connect_options(config)?,
        })
    }

    /// First sector id, used as the full form's `sector_id`.
    pub async fn first_sector_id(&self) -> Result<String> {
        let mut conn = connect(&self.options).await?;
        let result = first_sector_id(&mut conn).await;
        close(conn).await;
        result
    }

    /// Checks the five tables touched by a full-form save.
    pub async fn verify_full_record(
        &self,
        scenario: &str,
        run: &Run,
        record: &FullRecord,
    ) -> Result<()> {
        debug!("Verifying persisted full record for {}", run);
        let mut conn = connect(&self.options).await?;
        let result = verify_full_record(&mut conn, scenario, run, record).await;
        close(conn).await;
        result
    }

    /// Collects the REM P schema report.
    pub async fn inspect(&self) -> Result<SchemaReport> {
        let mut conn = connect(&self.options).await?;
        let result = inspect(&mut conn).await;
        close(conn).await;
        result
    }
}
