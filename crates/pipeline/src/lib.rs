//! Core domain for the Newsroom article pipeline.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, verification rule and error type used throughout the pipeline.
//! Infrastructure crates implement the port traits defined here; they never add
//! domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`SessionId`, `SourceName`) |
//! | [`types`] | Shared value types (`Timestamp`, `TemporalReference`) |
//! | [`errors`] | Session-level error taxonomy and retry policy |
//! | [`evidence`] | Raw and classified search documents, search batches |
//! | [`verification`] | Mechanical verification rules and the `Verdict` |
//! | [`article`] | Finished articles and Markdown normalisation |
//! | [`session`] | Session state machine and iteration history |
//! | [`events`] | Progress events |
//! | [`ports`] | Reasoning, search and listener traits |
//! | [`config`] | Pipeline tuning parameters |

pub mod article;
pub mod config;
pub mod errors;
pub mod events;
pub mod evidence;
pub mod identifiers;
pub mod ports;
pub mod session;
pub mod types;
pub mod verification;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use article::{normalize_markdown, Article, ArticleSection};
pub use config::{PipelineConfig, MAX_RESULTS_PER_SOURCE};
pub use errors::{NewsroomError, RetryPolicy};
pub use events::{EventEnvelope, PipelineEvent};
pub use evidence::{
    BatchSummary, ExtractionTier, RawDocument, SearchBatch, SearchDocument, TierCatalog,
    TierCounts,
};
pub use identifiers::{SessionId, SourceName};
pub use ports::{
    AgentRole, EventListener, ListenerError, ReasoningError, ReasoningService, RoleContext,
    SearchSource, SearchSourceError,
};
pub use session::{Iteration, Session, SessionStatus, Stage, TransitionError};
pub use types::{excerpt, TemporalReference, Timestamp, DEFAULT_STALENESS_DAYS};
pub use verification::{
    evaluate, retain_current, NarrativeOutcome, ProvenanceCatalog, ProvenanceCategory, RuleId,
    RuleViolation, Verdict, VerdictOutcome,
};
