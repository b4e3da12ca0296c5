//! Hindsight - Ask questions about your browsing history
//!
//! A local-first question answering engine over personal browsing history:
//! pages are embedded into a local vector index, queries are parsed for
//! temporal intent, candidates are re-ranked with multi-signal relevance
//! scoring, and a statistics-enriched context is assembled for a local LLM.

pub mod cli;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod history;
pub mod index;
pub mod llm;
pub mod retrieval;
pub mod scoring;
pub mod stats;
pub mod temporal;

pub use error::{HindsightError, Result};
