//! Browsing history data model
//!
//! The extraction and fetch pipeline (browser SQLite readers, HTTP fetchers)
//! lives outside this crate; it produces [`HistoryRecord`]s which are the
//! sole input to indexing. [`DocMetadata`] is the primitive-only projection
//! stored alongside each document in the vector index: the index contract
//! only admits strings/numbers/bools, so missing timestamps are coerced to
//! the empty string rather than a null.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Sentinel domain used when neither metadata nor the URL yields one.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// A visited page as produced by the history extraction + content fetch
/// pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Page URL; the unique key in the index
    pub url: String,

    /// Page title
    #[serde(default)]
    pub title: String,

    /// Extracted page text
    #[serde(default)]
    pub text: String,

    /// Page domain; derived from the URL when the producer leaves it empty
    #[serde(default)]
    pub domain: String,

    /// Number of recorded visits (>= 1)
    #[serde(default = "default_visit_count")]
    pub visit_count: u32,

    /// Last visit time, if the browser recorded one
    #[serde(default)]
    pub visit_time: Option<NaiveDateTime>,
}

fn default_visit_count() -> u32 {
    1
}

/// Primitive-only document metadata as stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMetadata {
    pub url: String,
    pub title: String,
    pub domain: String,
    pub visit_count: i64,
    /// ISO-8601 local timestamp, or empty string when unknown
    pub visit_time: String,
}

impl DocMetadata {
    /// Parse the stored visit time back into a timestamp.
    ///
    /// Returns `None` for empty or malformed values; callers that filter on
    /// time treat that as "keep" (fail open).
    pub fn parsed_visit_time(&self) -> Option<NaiveDateTime> {
        if self.visit_time.is_empty() {
            return None;
        }
        NaiveDateTime::parse_from_str(&self.visit_time, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&self.visit_time, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok()
    }

    /// Resolve the effective domain: the stored one, or the URL authority,
    /// or the `"unknown"` sentinel. Never returns an empty string so answers
    /// do not surface blank domains.
    pub fn effective_domain(&self) -> String {
        if !self.domain.is_empty() {
            return self.domain.clone();
        }
        extract_domain(&self.url).unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
    }
}

impl From<&HistoryRecord> for DocMetadata {
    fn from(record: &HistoryRecord) -> Self {
        Self {
            url: record.url.clone(),
            title: record.title.clone(),
            domain: if record.domain.is_empty() {
                extract_domain(&record.url).unwrap_or_default()
            } else {
                record.domain.clone()
            },
            visit_count: record.visit_count.max(1) as i64,
            visit_time: record
                .visit_time
                .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
                .unwrap_or_default(),
        }
    }
}

/// Extract the authority (host) component from a URL.
///
/// Handles the common `scheme://host/path` shape plus bare `host/path`
/// strings; userinfo and port are stripped.
pub fn extract_domain(url: &str) -> Option<String> {
    let rest = match url.find("://") {
        Some(pos) => &url[pos + 3..],
        None => url,
    };
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}
