//! Raga ingestion CLI
//!
//! Ingests local files into the configured vector index and prints a summary.

use anyhow::Context;
use clap::Parser;
use raga_common::config::AppConfig;
use raga_common::embeddings::create_embedder;
use raga_common::index::create_index;
use raga_common::observability::init_tracing;
use raga_common::VERSION;
use raga_ingestion::IngestionCoordinator;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "ingest")]
#[command(about = "Ingest documents into the Raga vector index", long_about = None)]
struct Cli {
    /// Files to ingest (pdf, txt, docx, csv)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Configuration file to use instead of the config/ directory
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&config.observability);
    config.validate()?;

    info!("Raga ingest v{}", VERSION);

    let embedder = create_embedder(&config.embedding)?;
    let index = create_index(&config.index, config.embedding.dimension)?;
    let coordinator = IngestionCoordinator::from_config(&config, embedder, index)?;

    let files: Vec<(PathBuf, String)> = cli
        .files
        .into_iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            (path, name)
        })
        .collect();

    let summary = coordinator.ingest_all(&files).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
