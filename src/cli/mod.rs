//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "hindsight",
    version,
    about = "Ask questions about your browsing history",
    long_about = "Hindsight indexes your browsing history into a local vector store and answers \
                  natural-language questions about it: semantic search, temporal filtering \
                  (\"last friday\", \"this week\"), per-domain visit statistics, and grounded \
                  answers from a local Ollama model."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/hindsight/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import history records from a JSON-lines file produced by a history extractor
    Import {
        /// Path to the JSON-lines file (one record per line: url, title,
        /// text, domain, visit_count, visit_time)
        file: PathBuf,
    },

    /// Semantic search over indexed pages (no LLM involved)
    Search {
        /// Search query text
        query: String,

        /// Maximum number of results to return
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Ask a question about your browsing history
    Ask {
        /// Question to ask
        question: String,

        /// Show the full result in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics: document count and top domains
    Stats,

    /// Remove all indexed documents
    Clear,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
