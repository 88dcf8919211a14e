//! Search evidence: raw collaborator documents, classified documents and batches.
//!
//! Every [`SearchDocument`] is classified exactly once, when it is built from a
//! [`RawDocument`]. Its [`ExtractionTier`] is derived from the provenance label
//! alone through a [`TierCatalog`] and is never changed afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{SourceName, Timestamp};

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

/// Extraction fidelity of a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionTier {
    /// Full-text local capture (slow, high quality).
    Deep,
    /// Truncated aggregator snippet (fast, low detail).
    Api,
    /// Provenance not present in the tier catalog.
    Unknown,
}

impl std::fmt::Display for ExtractionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExtractionTier::Deep => "deep",
            ExtractionTier::Api => "api",
            ExtractionTier::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Lookup from provenance label to [`ExtractionTier`].
///
/// Matching is case-insensitive on the trimmed label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierCatalog {
    /// Labels of full-text capture sources.
    pub deep: Vec<String>,
    /// Labels of snippet-style aggregator sources.
    pub api: Vec<String>,
}

impl Default for TierCatalog {
    fn default() -> Self {
        Self {
            deep: vec!["La República".into(), "El Comercio".into(), "Infobae".into()],
            api: vec!["NewsAPI".into(), "TheNewsAPI".into()],
        }
    }
}

impl TierCatalog {
    /// Classifies a provenance label.
    pub fn classify(&self, provenance: &SourceName) -> ExtractionTier {
        if contains_label(&self.deep, provenance.as_str()) {
            ExtractionTier::Deep
        } else if contains_label(&self.api, provenance.as_str()) {
            ExtractionTier::Api
        } else {
            ExtractionTier::Unknown
        }
    }
}

pub(crate) fn contains_label(labels: &[String], label: &str) -> bool {
    let label = label.trim().to_lowercase();
    labels.iter().any(|l| l.trim().to_lowercase() == label)
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// One document exactly as the search collaborator returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDocument {
    pub title: String,
    pub content: String,
    pub source: String,
    pub url: String,
    pub date: String,
    #[serde(alias = "method")]
    pub extraction_method: String,
}

/// One classified, immutable search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    title: String,
    body: String,
    provenance: SourceName,
    published: Option<Timestamp>,
    url: String,
    tier: ExtractionTier,
    extraction_method: Option<String>,
}

impl SearchDocument {
    /// Builds a document from a raw collaborator result.
    ///
    /// `fallback_source` labels documents whose own `source` field is blank
    /// (typically the name of the source that returned them).
    pub fn from_raw(raw: RawDocument, fallback_source: &SourceName, tiers: &TierCatalog) -> Self {
        let provenance = SourceName::new(raw.source).unwrap_or_else(|| fallback_source.clone());
        let tier = tiers.classify(&provenance);
        let title = if raw.title.trim().is_empty() {
            "(untitled)".to_string()
        } else {
            raw.title.trim().to_string()
        };
        let extraction_method = Some(raw.extraction_method.trim().to_string())
            .filter(|m| !m.is_empty() && m != "unknown");
        Self {
            title,
            body: raw.content,
            provenance,
            published: Timestamp::parse_published(&raw.date),
            url: raw.url,
            tier,
            extraction_method,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn provenance(&self) -> &SourceName {
        &self.provenance
    }

    pub fn published(&self) -> Option<Timestamp> {
        self.published
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn tier(&self) -> ExtractionTier {
        self.tier
    }

    pub fn extraction_method(&self) -> Option<&str> {
        self.extraction_method.as_deref()
    }

    /// Length of the body in characters.
    pub fn content_length(&self) -> usize {
        self.body.chars().count()
    }

    /// Canonical batch ordering: tier (`deep`, `api`, `unknown`), then newest
    /// first (undated last), then provenance label. URL and title make the
    /// order total so batches are deterministic regardless of arrival order.
    pub fn batch_order(a: &SearchDocument, b: &SearchDocument) -> std::cmp::Ordering {
        a.tier
            .cmp(&b.tier)
            .then_with(|| b.published.cmp(&a.published))
            .then_with(|| a.provenance.cmp(&b.provenance))
            .then_with(|| a.url.cmp(&b.url))
            .then_with(|| a.title.cmp(&b.title))
    }
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// Number of documents per extraction tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub deep: usize,
    pub api: usize,
    pub unknown: usize,
}

impl TierCounts {
    /// Counts the tiers of a document list.
    pub fn tally<'a>(documents: impl IntoIterator<Item = &'a SearchDocument>) -> Self {
        let mut counts = Self::default();
        for doc in documents {
            match doc.tier() {
                ExtractionTier::Deep => counts.deep += 1,
                ExtractionTier::Api => counts.api += 1,
                ExtractionTier::Unknown => counts.unknown += 1,
            }
        }
        counts
    }

    pub fn total(self) -> usize {
        self.deep + self.api + self.unknown
    }
}

/// The aggregator's output for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBatch {
    /// The query that produced this batch.
    pub query: String,
    /// Documents in canonical batch order (see [`SearchDocument::batch_order`]).
    pub documents: Vec<SearchDocument>,
    pub tier_counts: TierCounts,
    pub elapsed: Duration,
    /// `true` if one or more sources did not respond within the budget.
    pub partial_failure: bool,
    /// Sources that answered in time (possibly with zero documents).
    pub responded_sources: Vec<SourceName>,
    /// Sources that timed out or failed.
    pub absent_sources: Vec<SourceName>,
}

impl SearchBatch {
    /// Assembles a batch, sorting documents into canonical order and tallying tiers.
    pub fn assemble(
        query: impl Into<String>,
        mut documents: Vec<SearchDocument>,
        elapsed: Duration,
        mut responded_sources: Vec<SourceName>,
        mut absent_sources: Vec<SourceName>,
    ) -> Self {
        documents.sort_by(SearchDocument::batch_order);
        responded_sources.sort();
        absent_sources.sort();
        let tier_counts = TierCounts::tally(&documents);
        Self {
            query: query.into(),
            documents,
            tier_counts,
            elapsed,
            partial_failure: !absent_sources.is_empty(),
            responded_sources,
            absent_sources,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Compact description of the batch for progress events.
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            query: self.query.clone(),
            total_documents: self.documents.len(),
            tier_counts: self.tier_counts,
            elapsed_ms: u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX),
            partial_failure: self.partial_failure,
            absent_sources: self.absent_sources.clone(),
        }
    }
}

/// Event-sized view of a [`SearchBatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub query: String,
    pub total_documents: usize,
    pub tier_counts: TierCounts,
    pub elapsed_ms: u64,
    pub partial_failure: bool,
    pub absent_sources: Vec<SourceName>,
}
