//! REM P 2025 report smoke test.
//!
//! Logs in and checks that both report sections answer with their headline
//! totals.

use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ecicep_qa_client::{AppSession, Section};
use ecicep_qa_core::HarnessConfig;

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

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 15000)]
    read_timeout_ms: u64,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let read_timeout = Duration::from_millis(args.read_timeout_ms);
    let config = HarnessConfig::from_parts(args.base_url, args.username, args.password)?
        .with_timeouts(read_timeout, read_timeout);

    let session = AppSession::new(&config)?;
    session.login(&config.username, &config.password).await?;
    info!("Authenticated against {}", session.base_url());

    let mut failed = Vec::new();
    for section in [Section::A, Section::B] {
        match session.fetch_report(section).await {
            Ok((body, totals)) => {
                println!("✅ {} respondió correctamente", section.name());
                for total in &totals {
                    println!("   {}", total);
                }
                println!();
                println!("   Estructura completa:");
                println!("{}", section.preview(&body));
                println!();
            }
            Err(e) => {
                error!("{} failed: {}", section.name(), e);
                failed.push(section.name());
            }
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("report sections failed: {}", failed.join(", "));
    }
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
