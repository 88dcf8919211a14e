//! Port traits implemented by infrastructure crates.
//!
//! ## Architectural Layer
//!
//! **Port definitions.** The orchestrator depends only on these traits; the
//! `llm` and `search` crates implement them over HTTP and tests implement them
//! with scripted fakes.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{EventEnvelope, RawDocument, RetryPolicy, SourceName};

// ---------------------------------------------------------------------------
// Reasoning service
// ---------------------------------------------------------------------------

/// The three roles the pipeline asks the reasoning service to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Decides what to search for.
    Researcher,
    /// Judges the evidence and renders the narrative verdict.
    Analyst,
    /// Writes the article.
    Writer,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentRole::Researcher => "researcher",
            AgentRole::Analyst => "analyst",
            AgentRole::Writer => "writer",
        };
        f.write_str(s)
    }
}

/// System-level context for one reasoning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleContext {
    pub role: AgentRole,
    /// Role description sent as the system message.
    pub instructions: String,
}

impl RoleContext {
    pub fn new(role: AgentRole, instructions: impl Into<String>) -> Self {
        Self {
            role,
            instructions: instructions.into(),
        }
    }
}

/// Failure of a single reasoning call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReasoningError {
    #[error("Reasoning service timed out after {after:?}")]
    ServiceTimeout { after: Duration },

    #[error("Reasoning service error: {message}")]
    ServiceError {
        message: String,
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// Server-provided back-off hint.
        retry_after: Option<Duration>,
    },
}

impl ReasoningError {
    /// Convenience constructor for errors without an HTTP status.
    pub fn service(message: impl Into<String>) -> Self {
        ReasoningError::ServiceError {
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    /// Timeouts, transport errors, 429 and 5xx are retryable; other 4xx are not.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            ReasoningError::ServiceTimeout { .. } => RetryPolicy::Retryable { after: None },
            ReasoningError::ServiceError {
                status, retry_after, ..
            } => match status {
                None => RetryPolicy::Retryable { after: *retry_after },
                Some(429) => RetryPolicy::Retryable { after: *retry_after },
                Some(s) if *s >= 500 => RetryPolicy::Retryable { after: *retry_after },
                Some(_) => RetryPolicy::NonRetryable,
            },
        }
    }
}

/// Text-completion capability.
///
/// Implementations must be safe to call again with the same inputs after a
/// retryable failure.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(&self, role: &RoleContext, prompt: &str) -> Result<String, ReasoningError>;
}

// ---------------------------------------------------------------------------
// Search sources
// ---------------------------------------------------------------------------

/// Failure of one search source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchSourceError {
    #[error("Search source '{source_name}' is unreachable: {message}")]
    Unreachable { source_name: SourceName, message: String },

    #[error("Search source '{source_name}' returned status {status}")]
    Status { source_name: SourceName, status: u16 },

    #[error("Search source '{source_name}' returned an unreadable response: {message}")]
    Malformed { source_name: SourceName, message: String },
}

impl SearchSourceError {
    /// The aggregator never retries within one call; this informs callers
    /// that run their own retry loop.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            SearchSourceError::Unreachable { .. } => RetryPolicy::Retryable { after: None },
            SearchSourceError::Status { status, .. } if *status == 429 || *status >= 500 => {
                RetryPolicy::Retryable { after: None }
            }
            _ => RetryPolicy::NonRetryable,
        }
    }
}

/// One searchable content source.
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Label used for absent-source reporting and as fallback provenance.
    fn name(&self) -> &SourceName;

    /// Returns up to `max_results` documents for `query`.
    ///
    /// A source may return more; the aggregator enforces the cap.
    async fn fetch(&self, query: &str, max_results: usize) -> Result<Vec<RawDocument>, SearchSourceError>;
}

// ---------------------------------------------------------------------------
// Event listeners
// ---------------------------------------------------------------------------

/// Delivery failure reported by an event listener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    /// The listener is gone for good and should be unsubscribed.
    #[error("Listener disconnected")]
    Disconnected,

    #[error("Listener failed: {0}")]
    Failed(String),
}

/// Receiver of pipeline progress events.
///
/// Called synchronously from the session's task: implementations must not
/// block. Hand the event off to a channel or buffer instead.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &EventEnvelope) -> Result<(), ListenerError>;
}
