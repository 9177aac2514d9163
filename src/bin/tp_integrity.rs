//! Run the database consistency checks and, with `--base-url`, the HTTP
//! smoke checks against a running server. Exits 1 when any check fails.

use anyhow::{Context, Result};
use clap::Parser;

use tierphysio_manager::config::AppConfig;
use tierphysio_manager::database::Database;
use tierphysio_manager::integrity::{run_database_checks, run_http_smoke};

#[derive(Parser)]
#[command(name = "tp-integrity")]
#[command(about = "Check a Tierphysio Manager installation for consistency")]
struct Cli {
    /// Base URL of a running server, e.g. http://127.0.0.1:8080
    #[arg(long)]
    base_url: Option<String>,

    /// Override the configured database URL
    #[arg(long)]
    database_url: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;
    let database_url = cli.database_url.unwrap_or_else(|| config.database_url.clone());
    let database = Database::new(&database_url)
        .await
        .with_context(|| format!("failed to open {}", database_url))?;

    let mut report = run_database_checks(&database).await?;
    if let Some(base_url) = cli.base_url.as_deref() {
        report.extend(run_http_smoke(base_url).await?);
    }
    database.close().await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}
