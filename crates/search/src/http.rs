//! HTTP client for the scraper service.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{RawDocument, SearchSource, SearchSourceError, SourceName, MAX_RESULTS_PER_SOURCE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Label of the unfiltered source used when no source labels are configured.
pub const AGGREGATE_SOURCE_NAME: &str = "scraper";

const USER_AGENT: &str = concat!("newsroom/", env!("CARGO_PKG_VERSION"));

/// Scraper service connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub base_url: String,
    /// Per-request ceiling. The aggregator's budget still applies on top.
    pub request_timeout_secs: u64,
    /// Source labels to query individually.
    pub sources: Vec<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: 90,
            sources: vec![
                "La República".to_string(),
                "El Comercio".to_string(),
                "Infobae".to_string(),
                "NewsAPI".to_string(),
                "TheNewsAPI".to_string(),
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<RawDocument>,
}

/// Clamps a requested result count to what the service accepts.
pub fn clamp_max_results(requested: usize) -> usize {
    requested.clamp(1, MAX_RESULTS_PER_SOURCE)
}

fn parse_response(source_name: &SourceName, body: &str) -> Result<Vec<RawDocument>, SearchSourceError> {
    serde_json::from_str::<SearchResponse>(body)
        .map(|r| r.results)
        .map_err(|e| SearchSourceError::Malformed {
            source_name: source_name.clone(),
            message: e.to_string(),
        })
}

/// One labelled view of the scraper service.
pub struct HttpSearchSource {
    client: Client,
    name: SourceName,
    /// Value of the `source` query parameter; `None` queries every source.
    filter: Option<String>,
    endpoint: String,
}

impl HttpSearchSource {
    /// Creates a source; `filter` restricts results to one source label.
    pub fn new(client: Client, base_url: &str, name: SourceName, filter: Option<String>) -> Self {
        Self {
            client,
            name,
            filter,
            endpoint: format!("{}/api/search", base_url.trim_end_matches('/')),
        }
    }

    fn query_params(&self, query: &str, max_results: usize) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", query.to_string()),
            ("max_results", clamp_max_results(max_results).to_string()),
        ];
        if let Some(filter) = &self.filter {
            params.push(("source", filter.clone()));
        }
        params
    }
}

#[async_trait]
impl SearchSource for HttpSearchSource {
    fn name(&self) -> &SourceName {
        &self.name
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<Vec<RawDocument>, SearchSourceError> {
        debug!(source = %self.name, query, "Querying search source");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query_params(query, max_results))
            .send()
            .await
            .map_err(|e| SearchSourceError::Unreachable {
                source_name: self.name.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(source = %self.name, status = status.as_u16(), "Search source returned an error status");
            return Err(SearchSourceError::Status {
                source_name: self.name.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| SearchSourceError::Unreachable {
            source_name: self.name.clone(),
            message: e.to_string(),
        })?;
        parse_response(&self.name, &body)
    }
}

/// Builds one source per configured label sharing a single HTTP client.
pub fn build_sources(settings: &SearchSettings) -> Result<Vec<HttpSearchSource>, reqwest::Error> {
    let client = Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .user_agent(USER_AGENT)
        .build()?;

    let labelled: Vec<SourceName> = settings.sources.iter().filter_map(SourceName::new).collect();
    if labelled.is_empty() {
        return Ok(SourceName::new(AGGREGATE_SOURCE_NAME)
            .into_iter()
            .map(|name| HttpSearchSource::new(client.clone(), &settings.base_url, name, None))
            .collect());
    }
    Ok(labelled
        .into_iter()
        .map(|name| {
            let filter = Some(name.as_str().to_string());
            HttpSearchSource::new(client.clone(), &settings.base_url, name, filter)
        })
        .collect())
}
