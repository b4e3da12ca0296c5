//! Retrieval types and reranking
//!
//! The index returns candidates ordered by embedding distance only; the
//! functions here attach composite relevance scores and define the final
//! ordering used everywhere downstream.

mod engine;

pub use engine::RetrievalEngine;

use crate::context::QuestionType;
use crate::history::DocMetadata;
use crate::scoring::{score_document, QueryTerms};
use crate::stats::EnhancedContext;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A retrieved document with its semantic distance and composite relevance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub metadata: DocMetadata,
    /// Embedding distance from the query; smaller is more similar
    pub distance: f32,
    /// Composite relevance score; higher is better
    pub relevance: f64,
}

/// A cited source in a QA answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub content: String,
    pub url: String,
    pub title: String,
    pub visit_time: String,
    pub domain: String,
}

impl SourceInfo {
    pub fn from_document(text: &str, metadata: &DocMetadata) -> Self {
        Self {
            content: text.to_string(),
            url: metadata.url.clone(),
            title: metadata.title.clone(),
            visit_time: metadata.visit_time.clone(),
            domain: metadata.effective_domain(),
        }
    }
}

/// Result of a question-answering run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaResult {
    pub answer: String,
    pub question_type: QuestionType,
    pub confidence: f32,
    pub sources: Vec<SourceInfo>,
    pub enhanced_context: Option<EnhancedContext>,
}

/// The retrieval seam consumed by answer generation: one concrete engine
/// implements it, test doubles can too.
pub trait Retriever: Send + Sync {
    fn fetch(
        &self,
        query: &str,
        top_k: usize,
    ) -> impl std::future::Future<Output = crate::Result<Vec<Candidate>>> + Send;
}

/// Score every candidate against the query and sort: relevance descending,
/// ties by distance ascending, residual ties stable in retrieval order.
pub fn rerank_candidates(candidates: &mut [Candidate], terms: &QueryTerms) {
    for candidate in candidates.iter_mut() {
        candidate.relevance = score_document(&candidate.text, &candidate.metadata, terms);
    }

    candidates.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(Ordering::Equal)
            .then(a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str, title: &str, text: &str, distance: f32) -> Candidate {
        Candidate {
            text: text.to_string(),
            metadata: DocMetadata {
                url: url.to_string(),
                title: title.to_string(),
                domain: String::new(),
                visit_count: 1,
                visit_time: String::new(),
            },
            distance,
            relevance: 0.0,
        }
    }

    #[test]
    fn test_rerank_promotes_lexical_match_over_distance() {
        let mut candidates = vec![
            candidate("https://other.com", "Unrelated", "nothing here", 0.1),
            candidate(
                "https://github.com",
                "GitHub",
                "github hosts repositories",
                0.8,
            ),
        ];

        let terms = QueryTerms::new("github repositories");
        rerank_candidates(&mut candidates, &terms);

        assert_eq!(candidates[0].metadata.url, "https://github.com");
        assert!(candidates[0].relevance > candidates[1].relevance);
    }

    #[test]
    fn test_rerank_ties_broken_by_distance() {
        let mut candidates = vec![
            candidate("https://a.com", "", "", 0.5),
            candidate("https://b.com", "", "", 0.2),
        ];

        let terms = QueryTerms::new("zzz");
        rerank_candidates(&mut candidates, &terms);

        // identical relevance, closer document first
        assert_eq!(candidates[0].metadata.url, "https://b.com");
    }

    #[test]
    fn test_source_info_never_has_blank_domain() {
        let meta = DocMetadata {
            url: "https://github.com/torvalds".to_string(),
            title: "Linus".to_string(),
            domain: String::new(),
            visit_count: 1,
            visit_time: String::new(),
        };
        let source = SourceInfo::from_document("text", &meta);
        assert_eq!(source.domain, "github.com");
    }
}
