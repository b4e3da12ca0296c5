//! Browsing statistics aggregation and prompt context formatting
//!
//! Statistical questions ("how many times did I visit github?") cannot be
//! answered from document text alone, so the retrieved candidate set is
//! aggregated into per-domain visit totals and summary counts that are fed
//! to the model alongside the documents themselves.

use crate::history::DocMetadata;
use crate::temporal::TemporalFilter;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-domain accumulation over the candidate set in scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainStats {
    pub total_visits: i64,
    pub urls: Vec<String>,
    pub titles: Vec<String>,
    pub visit_times: Vec<String>,
}

/// Summary counts over the candidate set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowsingSummary {
    pub total_visits: i64,
    pub unique_domains: usize,
    pub total_urls: usize,
    /// Domains ordered by total visits descending, ties in encounter order
    pub top_domains: Vec<(String, DomainStats)>,
    /// The window the candidates were restricted to, if any
    pub temporal_period: Option<TemporalFilter>,
}

/// Aggregated context handed to prompt formatting and returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedContext {
    pub browsing_summary: BrowsingSummary,
    pub domain_stats: HashMap<String, DomainStats>,
    /// The (document text, metadata) pairs that survived temporal
    /// restriction, in their incoming order
    pub documents: Vec<(String, DocMetadata)>,
}

/// Aggregate per-domain statistics over a candidate set, optionally
/// restricted to a temporal window.
///
/// Entries whose `visit_time` is missing or unparsable are kept when a
/// filter is applied: over-including is better than silently dropping data.
pub fn aggregate(
    documents: Vec<String>,
    metadatas: Vec<DocMetadata>,
    temporal_filter: Option<TemporalFilter>,
) -> EnhancedContext {
    let retained: Vec<(String, DocMetadata)> = documents
        .into_iter()
        .zip(metadatas)
        .filter(|(_, meta)| match (&temporal_filter, meta.parsed_visit_time()) {
            (Some(filter), Some(t)) => filter.contains(t),
            // no filter, or a filter with an unparsable timestamp: keep
            _ => true,
        })
        .collect();

    let mut domain_stats: HashMap<String, DomainStats> = HashMap::new();
    let mut encounter_order: Vec<String> = Vec::new();
    let mut total_visits = 0i64;
    let mut urls_seen: AHashSet<String> = AHashSet::new();

    for (_, meta) in &retained {
        let domain = meta.effective_domain();
        let visits = meta.visit_count.max(1);
        total_visits += visits;
        urls_seen.insert(meta.url.clone());

        let entry = domain_stats.entry(domain.clone()).or_insert_with(|| {
            encounter_order.push(domain.clone());
            DomainStats::default()
        });
        entry.total_visits += visits;
        entry.urls.push(meta.url.clone());
        entry.titles.push(meta.title.clone());
        entry.visit_times.push(meta.visit_time.clone());
    }

    // Stable sort keeps encounter order for equal visit totals
    let mut top_domains: Vec<(String, DomainStats)> = encounter_order
        .into_iter()
        .filter_map(|d| domain_stats.get(&d).cloned().map(|s| (d, s)))
        .collect();
    top_domains.sort_by(|a, b| b.1.total_visits.cmp(&a.1.total_visits));

    EnhancedContext {
        browsing_summary: BrowsingSummary {
            total_visits,
            unique_domains: domain_stats.len(),
            total_urls: urls_seen.len(),
            top_domains,
            temporal_period: temporal_filter,
        },
        domain_stats,
        documents: retained,
    }
}

const TOP_DOMAINS_IN_PROMPT: usize = 10;

/// Render the aggregated context into the text block embedded in the QA
/// prompt: summary counts, top domains, then per-document details.
pub fn format_context_for_prompt(context: &EnhancedContext) -> String {
    let summary = &context.browsing_summary;
    let mut out = String::new();

    out.push_str("BROWSING SUMMARY:\n");
    out.push_str(&format!("Total visits: {}\n", summary.total_visits));
    out.push_str(&format!("Unique domains: {}\n", summary.unique_domains));
    out.push_str(&format!("Total URLs: {}\n", summary.total_urls));
    if let Some(period) = &summary.temporal_period {
        out.push_str(&format!(
            "Time period: {} to {}\n",
            period.start.format("%Y-%m-%d %H:%M:%S"),
            period.end.format("%Y-%m-%d %H:%M:%S"),
        ));
    }

    out.push_str("\nTOP DOMAINS BY VISITS:\n");
    for (domain, dstats) in summary.top_domains.iter().take(TOP_DOMAINS_IN_PROMPT) {
        out.push_str(&format!("- {}: {} visits\n", domain, dstats.total_visits));
    }

    out.push_str("\nRELEVANT DOCUMENTS:\n");
    for (i, (text, meta)) in context.documents.iter().enumerate() {
        out.push_str(&format!(
            "\n[{}] {} ({})\n",
            i + 1,
            if meta.title.is_empty() {
                "(untitled)"
            } else {
                &meta.title
            },
            meta.effective_domain(),
        ));
        out.push_str(&format!("URL: {}\n", meta.url));
        out.push_str(&format!("Visits: {} visits\n", meta.visit_count));
        if !meta.visit_time.is_empty() {
            out.push_str(&format!("Last visit: {}\n", meta.visit_time));
        }
        out.push_str(&format!("Content: {}\n", text));
    }

    out
}
