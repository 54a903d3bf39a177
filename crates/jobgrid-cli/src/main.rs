use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use jobgrid_ingest::{ImportRecord, Importer};
use jobgrid_store::{PgStore, Store, MIGRATOR};
use jobgrid_web::AppConfig;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "jobgrid-cli")]
#[command(about = "JobGrid command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP API server.
    Serve,
    /// Import a JSON batch of job records from a file.
    Import { file: PathBuf },
    /// Deactivate jobs whose expiry has passed.
    Sweep,
    /// Apply database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => jobgrid_web::serve_from_env().await?,
        Commands::Import { file } => {
            let config = AppConfig::from_env();
            let store = PgStore::connect(&config.database_url).await?;
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let batch: Vec<ImportRecord> = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", file.display()))?;

            let report = Importer::new(Arc::new(store)).run(batch).await?;
            println!(
                "import complete: total={} inserted={} deduplicated={} errors={}",
                report.total,
                report.inserted,
                report.deduplicated,
                report.errors.len()
            );
            for line in &report.errors {
                eprintln!("error: {line}");
            }
            for line in &report.warnings {
                eprintln!("warning: {line}");
            }
        }
        Commands::Sweep => {
            let config = AppConfig::from_env();
            let store = PgStore::connect(&config.database_url).await?;
            let deactivated = store.deactivate_expired(Utc::now()).await?;
            println!("sweep complete: deactivated={deactivated}");
        }
        Commands::Migrate => {
            let config = AppConfig::from_env();
            let store = PgStore::connect(&config.database_url).await?;
            MIGRATOR.run(store.pool()).await.context("applying migrations")?;
            println!("migrations applied");
        }
    }

    Ok(())
}
