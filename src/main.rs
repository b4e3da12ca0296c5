use hindsight::cli::{Cli, Commands};
use hindsight::config::Config;
use hindsight::embedding::EmbedderRegistry;
use hindsight::error::{HindsightError, Result};
use hindsight::history::HistoryRecord;
use hindsight::index::VectorStore;
use hindsight::llm::OllamaClient;
use hindsight::retrieval::RetrievalEngine;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::RwLock;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    let config = Config::load_or_default(cli.config.as_deref())?;

    // The registry is built once here and consulted for the configured
    // backend; unknown names fail before any work is done.
    let registry = EmbedderRegistry::with_defaults();
    let embedder = registry.get(&config.embedding.backend, &config.embedding.model)?;

    let store = VectorStore::new(
        config.indexing.vector_dim,
        config.indexing.hnsw_ef_construction,
        config.indexing.hnsw_m,
        Some(config.snapshot_path()),
    )
    .map_err(|e| HindsightError::Index(e.to_string()))?;

    let answerer = OllamaClient::new(
        &config.llm.base_url,
        &config.llm.model,
        config.llm.temperature,
        config.llm.timeout_secs,
    )
    .map_err(|e| HindsightError::Answer(e.to_string()))?;

    let engine = RetrievalEngine::new(
        embedder,
        Arc::new(RwLock::new(store)),
        answerer,
        config.retrieval.top_k,
        config.embedding.batch_size,
    );

    match cli.command {
        Commands::Import { file } => cmd_import(&engine, &file).await,
        Commands::Search { query, top_k, json } => cmd_search(&engine, &query, top_k, json).await,
        Commands::Ask { question, json } => cmd_ask(&engine, &question, json).await,
        Commands::Stats => cmd_stats(&engine).await,
        Commands::Clear => cmd_clear(&engine).await,
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "hindsight=debug"
    } else {
        "hindsight=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn cmd_import(
    engine: &RetrievalEngine<OllamaClient>,
    file: &std::path::Path,
) -> Result<()> {
    let handle = std::fs::File::open(file).map_err(|e| HindsightError::Io {
        source: e,
        context: format!("Failed to open import file: {:?}", file),
    })?;

    let mut records: Vec<HistoryRecord> = Vec::new();
    for (line_no, line) in std::io::BufReader::new(handle).lines().enumerate() {
        let line = line.map_err(|e| HindsightError::Io {
            source: e,
            context: format!("Failed to read import file: {:?}", file),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: HistoryRecord =
            serde_json::from_str(&line).map_err(|e| HindsightError::Json {
                source: e,
                context: format!("Malformed record on line {}", line_no + 1),
            })?;
        records.push(record);
    }

    let indexed = engine.index_records(&records).await?;
    println!("Indexed {} history records", indexed);
    Ok(())
}

async fn cmd_search(
    engine: &RetrievalEngine<OllamaClient>,
    query: &str,
    top_k: usize,
    json: bool,
) -> Result<()> {
    let results = engine.similarity_search(query, top_k).await?;

    if json {
        let out = serde_json::to_string_pretty(&results).map_err(|e| HindsightError::Json {
            source: e,
            context: "Failed to serialize search results".to_string(),
        })?;
        println!("{}", out);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results. Is any history imported?");
        return Ok(());
    }

    for (i, candidate) in results.iter().enumerate() {
        let meta = &candidate.metadata;
        println!(
            "{}. {} ({})",
            i + 1,
            if meta.title.is_empty() {
                &meta.url
            } else {
                &meta.title
            },
            meta.effective_domain()
        );
        println!(
            "   {} | {} visits | relevance {:.1} | distance {:.3}",
            meta.url, meta.visit_count, candidate.relevance, candidate.distance
        );
    }
    Ok(())
}

async fn cmd_ask(
    engine: &RetrievalEngine<OllamaClient>,
    question: &str,
    json: bool,
) -> Result<()> {
    let result = engine.answer_question(question).await;

    if json {
        let out = serde_json::to_string_pretty(&result).map_err(|e| HindsightError::Json {
            source: e,
            context: "Failed to serialize QA result".to_string(),
        })?;
        println!("{}", out);
        return Ok(());
    }

    println!("{}", result.answer.trim());
    if !result.sources.is_empty() {
        println!("\nSources:");
        for source in &result.sources {
            println!(
                "- {} ({}) {}",
                if source.title.is_empty() {
                    &source.url
                } else {
                    &source.title
                },
                source.domain,
                source.url
            );
        }
    }
    Ok(())
}

async fn cmd_stats(engine: &RetrievalEngine<OllamaClient>) -> Result<()> {
    let (count, context) = engine.overview().await;
    let summary = &context.browsing_summary;

    println!("Indexed documents: {}", count);
    println!("Total visits:      {}", summary.total_visits);
    println!("Unique domains:    {}", summary.unique_domains);
    if !summary.top_domains.is_empty() {
        println!("\nTop domains:");
        for (domain, dstats) in summary.top_domains.iter().take(10) {
            println!("  {}: {} visits", domain, dstats.total_visits);
        }
    }
    Ok(())
}

async fn cmd_clear(engine: &RetrievalEngine<OllamaClient>) -> Result<()> {
    engine.clear().await?;
    println!("Index cleared");
    Ok(())
}
