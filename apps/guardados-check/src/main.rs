//! Independent-save regression check.
//!
//! Registers three fresh patients through the web form (agreement only,
//! control only, full form) and confirms the full form in the database.

use std::time::Duration;

use anyhow::Context;
use chrono::{Local, Utc};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ecicep_qa_client::AppSession;
use ecicep_qa_core::run::scenario_seeds;
use ecicep_qa_core::{DbConfig, HarnessConfig};
use ecicep_qa_runtime::{Identities, ScenarioRunner};
use ecicep_qa_store::PgStore;

/// Command-line arguments for the regression check.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root URL of the application under test
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Login name
    #[arg(long, env = "USERNAME")]
    username: Option<String>,

    /// Login password
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// PostgreSQL URL; PGHOST/PGPORT/PGUSER/PGPASSWORD/PGDATABASE otherwise
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Timeout for page loads and lookups in milliseconds
    #[arg(long, default_value_t = 15000)]
    read_timeout_ms: u64,

    /// Timeout for form posts in milliseconds
    #[arg(long, default_value_t = 20000)]
    submit_timeout_ms: u64,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = HarnessConfig::from_parts(args.base_url, args.username, args.password)?
        .with_timeouts(
            Duration::from_millis(args.read_timeout_ms),
            Duration::from_millis(args.submit_timeout_ms),
        );
    let db_config = match args.database_url {
        Some(url) if !url.is_empty() => DbConfig::Url(url),
        _ => DbConfig::from_env()?,
    };

    let base = u64::try_from(Utc::now().timestamp()).context("system clock is before 1970")?;
    let identities = Identities::from_seeds(scenario_seeds(base, &mut rand::thread_rng()))?;
    info!(
        "Identities: acuerdos {}, control {}, completo {}",
        identities.agreement, identities.control, identities.full
    );

    let store = PgStore::new(&db_config)?;
    let sector_id = store
        .first_sector_id()
        .await
        .context("could not pick a sector for the full form")?;

    let session = AppSession::new(&config)?;
    let mut runner = ScenarioRunner::new(&session, &store, Local::now().date_naive());
    let report = runner
        .run(&config.username, &config.password, &identities, &sector_id)
        .await?;

    println!("{}", report);
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
