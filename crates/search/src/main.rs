//! Raga query CLI
//!
//! Runs one query through the cached pipeline and prints the JSON response.

use anyhow::Context;
use clap::Parser;
use raga_common::cache::create_cache;
use raga_common::config::AppConfig;
use raga_common::embeddings::create_embedder;
use raga_common::index::create_index;
use raga_common::llm::create_language_model;
use raga_common::observability::init_tracing;
use raga_common::rerank::create_reranker;
use raga_search::{QueryOrchestrator, REFUSAL};

#[derive(Parser)]
#[command(name = "query")]
#[command(about = "Ask a question against the ingested documents", long_about = None)]
struct Cli {
    /// Question text
    text: String,

    /// Candidates fetched from the index
    #[arg(long)]
    top_k: Option<usize>,

    /// Contexts kept after reranking
    #[arg(long)]
    rerank_top_n: Option<usize>,

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

    let orchestrator = QueryOrchestrator::from_config(
        &config,
        create_embedder(&config.embedding)?,
        create_index(&config.index, config.embedding.dimension)?,
        create_reranker(&config.rerank)?,
        create_language_model(&config.llm, REFUSAL)?,
        create_cache(&config.cache).await?,
    );

    let top_k = cli.top_k.unwrap_or(config.query.top_k);
    let rerank_top_n = cli.rerank_top_n.unwrap_or(config.query.rerank_top_n);

    let response = orchestrator.query(&cli.text, top_k, rerank_top_n).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}
