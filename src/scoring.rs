//! Multi-signal relevance scoring
//!
//! The similarity index retrieves by embedding distance alone, which misses
//! lexically obvious matches ("github" in the URL) and ignores visit
//! frequency. The scorer re-ranks an over-fetched candidate pool with
//! independent additive signals: body/title keyword hits, domain and URL
//! relevance, a logarithmic visit-count boost, and a phrase-proximity bonus.
//! Scores are unnormalized; higher is better.

use crate::history::DocMetadata;
use ahash::AHashSet;

/// Score added per distinct query keyword found in the document body.
const BODY_MATCH_WEIGHT: f64 = 3.0;
/// Score added per distinct query keyword found in the title.
const TITLE_MATCH_WEIGHT: f64 = 5.0;
/// Score added once when a well-known service keyword matches the URL/domain.
const SERVICE_MATCH_WEIGHT: f64 = 20.0;
/// Cap for generic keyword-in-URL/domain relevance (not summed per keyword).
const URL_MATCH_WEIGHT: f64 = 10.0;
/// Multiplier for the ln(visit_count) frequency boost.
const VISIT_BOOST_WEIGHT: f64 = 2.0;
/// Score added once when two important keywords co-occur within
/// [`PROXIMITY_CHARS`] characters of each other in the body.
const PROXIMITY_BONUS: f64 = 15.0;
const PROXIMITY_CHARS: usize = 100;

/// Over-fetch factor applied to the requested result count so reranking has
/// room to promote lexically relevant but embedding-distant documents.
const OVERFETCH_MULTIPLIER: usize = 3;
const OVERFETCH_CAP: usize = 50;

/// Well-known services whose presence in a URL or domain is a strong signal
/// that the document is exactly what the user asked about.
const KNOWN_SERVICES: &[&str] = &[
    "github",
    "gitlab",
    "stackoverflow",
    "google",
    "youtube",
    "linkedin",
    "reddit",
    "twitter",
    "facebook",
    "instagram",
    "amazon",
    "netflix",
    "wikipedia",
    "gmail",
    "medium",
    "spotify",
    "slack",
    "discord",
    "notion",
    "figma",
];

/// Query stop words removed before the phrase-proximity check. Body/title
/// matching still uses the full keyword set.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "that", "this", "these", "those", "what", "which", "who",
    "when", "where", "why", "how", "did", "does", "do", "was", "were", "are", "is", "be", "been",
    "have", "has", "had", "can", "could", "will", "would", "should", "about", "into", "over",
    "many", "much", "most", "more", "some", "any", "all", "you", "your", "my", "me", "i", "times",
    "time", "visit", "visited", "visits", "site", "sites", "website", "websites", "page", "pages",
];

/// A query broken down once into the lexical forms the scorer consumes.
#[derive(Debug, Clone)]
pub struct QueryTerms {
    /// The whole query, lower-cased
    pub lower: String,
    /// Distinct lower-cased, punctuation-stripped tokens of length > 1,
    /// in first-occurrence order
    pub keywords: Vec<String>,
    /// Keywords surviving stop-word removal, length > 2; used for the
    /// proximity bonus
    pub important: Vec<String>,
}

impl QueryTerms {
    pub fn new(query: &str) -> Self {
        let lower = query.to_lowercase();

        let mut seen: AHashSet<&str> = AHashSet::new();
        let mut keywords = Vec::new();
        for token in lower.split(|c: char| !c.is_alphanumeric()) {
            if token.len() > 1 && seen.insert(token) {
                keywords.push(token.to_string());
            }
        }

        let important = keywords
            .iter()
            .filter(|kw| kw.len() > 2 && !STOP_WORDS.contains(&kw.as_str()))
            .cloned()
            .collect();

        Self {
            lower,
            keywords,
            important,
        }
    }
}

/// Size of the candidate pool to fetch from the index before reranking.
pub fn overfetch_limit(top_k: usize) -> usize {
    (top_k * OVERFETCH_MULTIPLIER).min(OVERFETCH_CAP).max(top_k)
}

/// Compute the composite relevance score of one document against a query.
///
/// Signals are independent and additive; adding a matching keyword never
/// lowers the score.
pub fn score_document(text: &str, metadata: &DocMetadata, terms: &QueryTerms) -> f64 {
    let text_lower = text.to_lowercase();
    let title_lower = metadata.title.to_lowercase();
    let url_lower = metadata.url.to_lowercase();
    let domain_lower = metadata.effective_domain().to_lowercase();

    let mut score = 0.0;

    for kw in &terms.keywords {
        if text_lower.contains(kw.as_str()) {
            score += BODY_MATCH_WEIGHT;
        }
        if title_lower.contains(kw.as_str()) {
            score += TITLE_MATCH_WEIGHT;
        }
    }

    score += domain_relevance(&url_lower, &domain_lower, terms);
    score += VISIT_BOOST_WEIGHT * (metadata.visit_count.max(1) as f64).ln();

    if proximity_hit(&text_lower, &terms.important) {
        score += PROXIMITY_BONUS;
    }

    score
}

/// URL/domain signal: a curated service-name match is worth +20 once; any
/// other keyword appearing in the URL or domain is worth +10, capped rather
/// than summed across keywords.
fn domain_relevance(url_lower: &str, domain_lower: &str, terms: &QueryTerms) -> f64 {
    for kw in &terms.keywords {
        if KNOWN_SERVICES.contains(&kw.as_str())
            && (url_lower.contains(kw.as_str()) || domain_lower.contains(kw.as_str()))
        {
            return SERVICE_MATCH_WEIGHT;
        }
    }

    let generic_hit = terms
        .keywords
        .iter()
        .any(|kw| url_lower.contains(kw.as_str()) || domain_lower.contains(kw.as_str()));
    if generic_hit {
        URL_MATCH_WEIGHT
    } else {
        0.0
    }
}

/// Whether any two important keywords both occur in the text within
/// [`PROXIMITY_CHARS`] of each other, by first-occurrence offset.
fn proximity_hit(text_lower: &str, important: &[String]) -> bool {
    if important.len() < 2 {
        return false;
    }

    let mut offsets: Vec<usize> = important
        .iter()
        .filter_map(|kw| text_lower.find(kw.as_str()))
        .collect();
    if offsets.len() < 2 {
        return false;
    }

    offsets.sort_unstable();
    offsets
        .windows(2)
        .any(|pair| pair[1] - pair[0] <= PROXIMITY_CHARS)
}
