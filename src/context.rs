//! Question classification and context window optimization
//!
//! The LLM context is a fixed budget: duplicate retrievals are dropped and
//! each surviving document is truncated to a length suited to the kind of
//! question being asked. Statistical questions need metadata more than prose,
//! so they get short excerpts; semantic "what is" questions get the longest.

use crate::history::DocMetadata;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// Category of a question, inferred from keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Statistical,
    Comparative,
    Semantic,
    Temporal,
    Factual,
}

impl QuestionType {
    /// Per-document excerpt budget in characters.
    pub fn excerpt_budget(self) -> usize {
        match self {
            QuestionType::Statistical => 300,
            QuestionType::Temporal => 500,
            QuestionType::Comparative => 400,
            QuestionType::Semantic => 1000,
            QuestionType::Factual => 600,
        }
    }

    /// Retrieval depth adjustment: broader questions fetch more documents.
    pub fn adaptive_k(self, base_k: usize) -> usize {
        match self {
            QuestionType::Statistical | QuestionType::Factual => base_k,
            QuestionType::Temporal => base_k + 2,
            QuestionType::Comparative => base_k + 3,
            QuestionType::Semantic => (base_k + 5).min(10),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Statistical => "statistical",
            QuestionType::Comparative => "comparative",
            QuestionType::Semantic => "semantic",
            QuestionType::Temporal => "temporal",
            QuestionType::Factual => "factual",
        }
    }
}

const STATISTICAL_MARKERS: &[&str] = &[
    "how many",
    "how much",
    "count",
    "total",
    "most visited",
    "top",
    "number of",
];
const COMPARATIVE_MARKERS: &[&str] = &[
    "compare",
    "vs",
    "versus",
    "more than",
    "better than",
    "difference between",
];
const SEMANTIC_MARKERS: &[&str] = &[
    "what is", "what are", "explain", "describe", "topics", "research", "learn",
];
const TEMPORAL_MARKERS: &[&str] = &[
    "yesterday",
    "last week",
    "when",
    "today",
    "this week",
    "this month",
];

/// Classify a question by keyword markers, checked in priority order;
/// first category with a hit wins, default is factual.
pub fn classify_question(question: &str) -> QuestionType {
    let lower = question.to_lowercase();

    let hit = |markers: &[&str]| markers.iter().any(|m| lower.contains(*m));

    if hit(STATISTICAL_MARKERS) {
        QuestionType::Statistical
    } else if hit(COMPARATIVE_MARKERS) {
        QuestionType::Comparative
    } else if hit(SEMANTIC_MARKERS) {
        QuestionType::Semantic
    } else if hit(TEMPORAL_MARKERS) {
        QuestionType::Temporal
    } else {
        QuestionType::Factual
    }
}

const FINGERPRINT_CHARS: usize = 100;

/// Deduplicate candidates and truncate their text to the question type's
/// excerpt budget.
///
/// The duplicate fingerprint is `(url, first 100 chars of text)`, keeping
/// the first occurrence and preserving order. Truncation is a hard character
/// cutoff, not word-boundary aware.
pub fn optimize_context(
    documents: Vec<String>,
    metadatas: Vec<DocMetadata>,
    question_type: QuestionType,
) -> (Vec<String>, Vec<DocMetadata>) {
    let budget = question_type.excerpt_budget();

    let mut seen: AHashSet<(String, String)> = AHashSet::new();
    let mut out_docs = Vec::with_capacity(documents.len());
    let mut out_metas = Vec::with_capacity(metadatas.len());

    for (doc, meta) in documents.into_iter().zip(metadatas.into_iter()) {
        let fingerprint = (meta.url.clone(), truncate_chars(&doc, FINGERPRINT_CHARS));
        if !seen.insert(fingerprint) {
            continue;
        }
        out_docs.push(truncate_chars(&doc, budget));
        out_metas.push(meta);
    }

    (out_docs, out_metas)
}

/// Truncate to at most `limit` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(url: &str) -> DocMetadata {
        DocMetadata {
            url: url.to_string(),
            title: String::new(),
            domain: String::new(),
            visit_count: 1,
            visit_time: String::new(),
        }
    }

    #[test]
    fn test_classification_priority() {
        assert_eq!(
            classify_question("How many times did I visit GitHub?"),
            QuestionType::Statistical
        );
        assert_eq!(
            classify_question("Compare my GitHub and LinkedIn usage"),
            QuestionType::Comparative
        );
        assert_eq!(classify_question("What is GitHub?"), QuestionType::Semantic);
        assert_eq!(
            classify_question("Which sites did I read yesterday?"),
            QuestionType::Temporal
        );
        assert_eq!(
            classify_question("Show me my browsing"),
            QuestionType::Factual
        );
        // statistical outranks temporal when both match
        assert_eq!(
            classify_question("How many sites did I visit yesterday?"),
            QuestionType::Statistical
        );
    }

    #[test]
    fn test_adaptive_k() {
        assert_eq!(QuestionType::Statistical.adaptive_k(5), 5);
        assert_eq!(QuestionType::Temporal.adaptive_k(5), 7);
        assert_eq!(QuestionType::Comparative.adaptive_k(5), 8);
        assert_eq!(QuestionType::Semantic.adaptive_k(5), 10);
        assert_eq!(QuestionType::Semantic.adaptive_k(8), 10); // capped
        assert_eq!(QuestionType::Factual.adaptive_k(5), 5);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let text = "GitHub is a web-based platform for version control.".to_string();
        let docs = vec![text.clone(), "other page".to_string(), text.clone()];
        let metas = vec![
            meta("https://github.com"),
            meta("https://other.com"),
            meta("https://github.com"),
        ];

        let (docs, metas) = optimize_context(docs, metas, QuestionType::Factual);
        assert_eq!(docs.len(), 2);
        assert_eq!(metas[0].url, "https://github.com");
        assert_eq!(metas[1].url, "https://other.com");
    }

    #[test]
    fn test_same_url_different_text_survives() {
        let docs = vec!["a".repeat(150), "b".repeat(150)];
        let metas = vec![meta("https://github.com"), meta("https://github.com")];

        let (docs, _) = optimize_context(docs, metas, QuestionType::Factual);
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_truncation_budgets() {
        let long = "x".repeat(2000);
        for (qtype, budget) in [
            (QuestionType::Statistical, 300),
            (QuestionType::Temporal, 500),
            (QuestionType::Comparative, 400),
            (QuestionType::Semantic, 1000),
            (QuestionType::Factual, 600),
        ] {
            let (docs, _) =
                optimize_context(vec![long.clone()], vec![meta("https://a.com")], qtype);
            assert_eq!(docs[0].chars().count(), budget);
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "héllo wörld".repeat(50);
        let t = truncate_chars(&s, 100);
        assert_eq!(t.chars().count(), 100);
    }
}
