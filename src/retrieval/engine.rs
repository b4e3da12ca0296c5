//! Retrieval orchestrator
//!
//! Composes the pipeline for a query: temporal parsing, embedding, index
//! query with over-fetch, multi-signal reranking, context optimization,
//! statistics aggregation, prompt assembly, answer generation, and post-hoc
//! source filtering. Expected upstream absences (empty index, no candidates)
//! produce a "no data" result; external-call failures degrade to an
//! apologetic answer with empty sources. Neither is surfaced as an error.

use crate::context::{classify_question, optimize_context, QuestionType};
use crate::embedding::EmbeddingProvider;
use crate::error::{HindsightError, Result};
use crate::history::{DocMetadata, HistoryRecord};
use crate::index::VectorStore;
use crate::llm::{build_qa_prompt, AnswerProvider, CONNECTION_APOLOGY};
use crate::retrieval::{rerank_candidates, Candidate, QaResult, Retriever, SourceInfo};
use crate::scoring::{overfetch_limit, score_document, QueryTerms};
use crate::stats::{aggregate, format_context_for_prompt, EnhancedContext};
use crate::temporal::parse_temporal_reference;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Answer returned when the index holds nothing relevant.
const NO_DATA_ANSWER: &str = "No browsing history data found for your question. \
     Import your history first, or try rephrasing the question.";

/// Maximum number of cited sources in a QA result.
const MAX_SOURCES: usize = 5;

/// The retrieval and question-answering engine.
///
/// The vector store sits behind a `RwLock`: queries share the read side,
/// upserts take the write side, so a query never observes a half-applied
/// upsert.
pub struct RetrievalEngine<A: AnswerProvider> {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<RwLock<VectorStore>>,
    answerer: A,
    base_top_k: usize,
    batch_size: usize,
}

impl<A: AnswerProvider> RetrievalEngine<A> {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<RwLock<VectorStore>>,
        answerer: A,
        base_top_k: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            answerer,
            base_top_k: base_top_k.max(1),
            batch_size: batch_size.max(1),
        }
    }

    /// Embed and upsert a batch of history records.
    ///
    /// Returns the number of records indexed. Records with no text are
    /// embedded from their title (or URL as a last resort) so batch
    /// alignment is preserved.
    pub async fn index_records(&self, records: &[HistoryRecord]) -> Result<usize> {
        let mut indexed = 0;

        for chunk in records.chunks(self.batch_size) {
            let texts: Vec<String> = chunk.iter().map(embeddable_text).collect();
            let embeddings = self
                .embedder
                .embed_batch(&texts)
                .map_err(|e| HindsightError::Embedding(e.to_string()))?;

            let documents: Vec<String> = chunk.iter().map(|r| r.text.clone()).collect();
            let metadatas: Vec<DocMetadata> = chunk.iter().map(DocMetadata::from).collect();

            let mut store = self.store.write().await;
            store
                .add(documents, embeddings, metadatas)
                .map_err(|e| HindsightError::Index(e.to_string()))?;
            indexed += chunk.len();
        }

        tracing::info!("Indexed {} history records", indexed);
        Ok(indexed)
    }

    /// Plain similarity search: temporal stripping, embedding, over-fetched
    /// index query, reranking, top-k. No LLM involved.
    pub async fn similarity_search(&self, query: &str, top_k: usize) -> Result<Vec<Candidate>> {
        let now = chrono::Local::now().naive_local();
        self.similarity_search_at(query, top_k, now).await
    }

    /// Search anchored at an explicit `now`, for deterministic tests.
    pub async fn similarity_search_at(
        &self,
        query: &str,
        top_k: usize,
        now: NaiveDateTime,
    ) -> Result<Vec<Candidate>> {
        let (residual, _) = parse_temporal_reference(query, now);
        let query_text = effective_query(&residual, query);

        let embedding = self
            .embedder
            .embed(query_text)
            .map_err(|e| HindsightError::Embedding(e.to_string()))?;

        let hits = {
            let store = self.store.read().await;
            store
                .query(&embedding, overfetch_limit(top_k))
                .map_err(|e| HindsightError::Index(e.to_string()))?
        };

        let mut candidates: Vec<Candidate> = hits
            .into_iter()
            .map(|hit| Candidate {
                text: hit.text,
                metadata: hit.metadata,
                distance: hit.distance,
                relevance: 0.0,
            })
            .collect();

        let terms = QueryTerms::new(query_text);
        rerank_candidates(&mut candidates, &terms);
        candidates.truncate(top_k);

        Ok(candidates)
    }

    /// Answer a question over the indexed history.
    ///
    /// Never fails for expected upstream conditions; the result always
    /// carries a user-facing answer.
    pub async fn answer_question(&self, question: &str) -> QaResult {
        let now = chrono::Local::now().naive_local();
        self.answer_question_at(question, now).await
    }

    /// QA anchored at an explicit `now`, for deterministic tests.
    pub async fn answer_question_at(&self, question: &str, now: NaiveDateTime) -> QaResult {
        let question_type = classify_question(question);
        let (residual, temporal_filter) = parse_temporal_reference(question, now);
        let query_text = effective_query(&residual, question);
        let top_k = question_type.adaptive_k(self.base_top_k);

        tracing::debug!(
            "QA: type={}, k={}, temporal={}, residual=\"{}\"",
            question_type.as_str(),
            top_k,
            temporal_filter.is_some(),
            query_text
        );

        let candidates = match self
            .similarity_search_at(question, top_k, now)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!("Retrieval failed: {}", e);
                return degraded_result(
                    format!(
                        "Sorry, I encountered an error while processing your question: {}",
                        e
                    ),
                    question_type,
                );
            }
        };

        if candidates.is_empty() {
            return QaResult {
                answer: NO_DATA_ANSWER.to_string(),
                question_type,
                confidence: 0.0,
                sources: Vec::new(),
                enhanced_context: None,
            };
        }

        let (texts, metadatas): (Vec<String>, Vec<DocMetadata>) = candidates
            .into_iter()
            .map(|c| (c.text, c.metadata))
            .unzip();
        let (texts, metadatas) = optimize_context(texts, metadatas, question_type);

        let context = aggregate(texts, metadatas, temporal_filter);
        let formatted = format_context_for_prompt(&context);
        let prompt = build_qa_prompt(&formatted, question);

        if !self.answerer.health_check().await {
            return degraded_result(CONNECTION_APOLOGY.to_string(), question_type);
        }

        let answer = match self.answerer.generate(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Answer generation failed: {}", e);
                return degraded_result(
                    format!(
                        "Sorry, I encountered an error while processing your question: {}",
                        e
                    ),
                    question_type,
                );
            }
        };

        // Sources are re-scored against the original question, not the
        // temporally stripped residual: "github yesterday" should still cite
        // github pages.
        let sources = filter_sources(&context, question);
        let confidence = confidence_for(&sources);

        QaResult {
            answer,
            question_type,
            confidence,
            sources,
            enhanced_context: Some(context),
        }
    }

    /// Index overview: live document count plus full-index domain statistics.
    pub async fn overview(&self) -> (usize, EnhancedContext) {
        let store = self.store.read().await;
        let (texts, metas): (Vec<String>, Vec<DocMetadata>) = store
            .live_documents()
            .into_iter()
            .map(|(text, meta)| (text.to_string(), meta.clone()))
            .unzip();
        (store.count(), aggregate(texts, metas, None))
    }

    /// The configured answer provider.
    pub fn answerer(&self) -> &A {
        &self.answerer
    }

    /// Remove everything from the index.
    pub async fn clear(&self) -> Result<()> {
        let mut store = self.store.write().await;
        store
            .clear()
            .map_err(|e| HindsightError::Index(e.to_string()))
    }
}

impl<A: AnswerProvider> Retriever for RetrievalEngine<A> {
    async fn fetch(&self, query: &str, top_k: usize) -> Result<Vec<Candidate>> {
        self.similarity_search(query, top_k).await
    }
}

/// Keep the top cited sources by relevance against the original question:
/// positive scores only, at most [`MAX_SOURCES`]. When nothing scores
/// positive, fall back to the single best source so an answered question
/// never cites nothing.
fn filter_sources(context: &EnhancedContext, original_question: &str) -> Vec<SourceInfo> {
    let terms = QueryTerms::new(original_question);

    let mut scored: Vec<(f64, &(String, DocMetadata))> = context
        .documents
        .iter()
        .map(|pair| (score_document(&pair.0, &pair.1, &terms), pair))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let positive: Vec<SourceInfo> = scored
        .iter()
        .filter(|(score, _)| *score > 0.0)
        .take(MAX_SOURCES)
        .map(|(_, (text, meta))| SourceInfo::from_document(text, meta))
        .collect();

    if positive.is_empty() {
        scored
            .first()
            .map(|(_, (text, meta))| vec![SourceInfo::from_document(text, meta)])
            .unwrap_or_default()
    } else {
        positive
    }
}

fn confidence_for(sources: &[SourceInfo]) -> f32 {
    if sources.is_empty() {
        0.0
    } else {
        (0.4 + 0.1 * sources.len() as f32).min(0.9)
    }
}

fn degraded_result(answer: String, question_type: QuestionType) -> QaResult {
    QaResult {
        answer,
        question_type,
        confidence: 0.0,
        sources: Vec::new(),
        enhanced_context: None,
    }
}

/// The residual query, unless temporal stripping consumed the entire
/// question ("what did I do yesterday" can strip to almost nothing).
fn effective_query<'a>(residual: &'a str, original: &'a str) -> &'a str {
    let trimmed = residual.trim();
    if trimmed.is_empty() {
        original
    } else {
        residual
    }
}

fn embeddable_text(record: &HistoryRecord) -> String {
    if !record.text.trim().is_empty() {
        record.text.clone()
    } else if !record.title.trim().is_empty() {
        record.title.clone()
    } else {
        record.url.clone()
    }
}
