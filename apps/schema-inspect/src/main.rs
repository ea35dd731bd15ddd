//! Prints what the ECICEP database holds for REM P 2025 reporting.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ecicep_qa_core::DbConfig;
use ecicep_qa_store::PgStore;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PostgreSQL URL; PGHOST/PGPORT/PGUSER/PGPASSWORD/PGDATABASE otherwise
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let db_config = match args.database_url {
        Some(url) if !url.is_empty() => DbConfig::Url(url),
        _ => DbConfig::from_env()?,
    };
    let report = PgStore::new(&db_config)?.inspect().await?;
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
