//! Source aggregator: concurrent fan-out to every search source under a single
//! timeout ceiling.
//!
//! Each source gets its own task. Whatever has completed when the ceiling
//! expires is kept and the rest are aborted and reported absent; sources that
//! fail are reported absent as well. The call fails only when no source
//! answered at all.

use std::sync::Arc;
use std::time::Duration;

use pipeline::{NewsroomError, SearchBatch, SearchDocument, SearchSource, SourceName, TierCatalog};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Failure of a whole fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregatorError {
    #[error("No search source responded for query '{query}' ({sources_attempted} attempted)")]
    SearchUnavailable { query: String, sources_attempted: usize },
}

impl From<AggregatorError> for NewsroomError {
    fn from(err: AggregatorError) -> Self {
        match err {
            AggregatorError::SearchUnavailable {
                query,
                sources_attempted,
            } => NewsroomError::SearchUnavailable {
                query,
                sources_attempted,
            },
        }
    }
}

/// Fans one query out to every configured search source.
pub struct SourceAggregator {
    sources: Vec<Arc<dyn SearchSource>>,
    tiers: TierCatalog,
}

impl SourceAggregator {
    /// Creates an aggregator; `tiers` classifies returned documents.
    pub fn new(sources: Vec<Arc<dyn SearchSource>>, tiers: TierCatalog) -> Self {
        Self { sources, tiers }
    }

    /// Number of sources queried per search.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Queries every source concurrently and merges what arrives within
    /// `timeout_budget`.
    ///
    /// At most `per_source` documents are kept from each source.
    #[instrument(skip(self), fields(sources = self.sources.len()))]
    pub async fn search(
        &self,
        query: &str,
        per_source: usize,
        timeout_budget: Duration,
    ) -> Result<SearchBatch, AggregatorError> {
        let started = Instant::now();
        let deadline = started + timeout_budget;

        let mut tasks = JoinSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            let source = Arc::clone(source);
            let query = query.to_string();
            tasks.spawn(async move {
                let outcome = source.fetch(&query, per_source).await;
                (index, outcome)
            });
        }

        let mut responded = vec![false; self.sources.len()];
        let mut documents = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, Ok(raw))))) => {
                    let name = self.sources[index].name();
                    debug!(source = %name, returned = raw.len(), "Search source responded");
                    responded[index] = true;
                    documents.extend(
                        raw.into_iter()
                            .take(per_source)
                            .map(|doc| SearchDocument::from_raw(doc, name, &self.tiers)),
                    );
                }
                Ok(Some(Ok((index, Err(err))))) => {
                    warn!(source = %self.sources[index].name(), error = %err, "Search source failed");
                }
                Ok(Some(Err(join_err))) => {
                    warn!(error = %join_err, "Search source task aborted");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = tasks.len(),
                        budget_secs = timeout_budget.as_secs(),
                        "Search timeout budget exhausted; abandoning slow sources"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        let (responded_sources, absent_sources): (Vec<SourceName>, Vec<SourceName>) = {
            let mut present = Vec::new();
            let mut absent = Vec::new();
            for (source, ok) in self.sources.iter().zip(&responded) {
                if *ok {
                    present.push(source.name().clone());
                } else {
                    absent.push(source.name().clone());
                }
            }
            (present, absent)
        };

        if responded_sources.is_empty() {
            return Err(AggregatorError::SearchUnavailable {
                query: query.to_string(),
                sources_attempted: self.sources.len(),
            });
        }

        let batch = SearchBatch::assemble(
            query,
            documents,
            started.elapsed(),
            responded_sources,
            absent_sources,
        );

        info!(
            documents = batch.len(),
            deep = batch.tier_counts.deep,
            api = batch.tier_counts.api,
            unknown = batch.tier_counts.unknown,
            partial_failure = batch.partial_failure,
            elapsed_ms = u64::try_from(batch.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Search completed"
        );
        if batch.tier_counts.deep == 0 && batch.tier_counts.api > 0 {
            warn!("Only snippet-tier documents arrived; full-text sources returned nothing");
        }

        Ok(batch)
    }
}
