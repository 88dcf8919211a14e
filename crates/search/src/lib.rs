//! Newsroom search adapter.
//!
//! Implements [`pipeline::SearchSource`] over the scraper service's HTTP API:
//!
//! ```text
//! GET {base_url}/api/search?q=<query>&max_results=<1..=20>[&source=<label>]
//! → { "results": [ { "title", "content", "source", "url", "date", "method" } ] }
//! ```
//!
//! One [`HttpSearchSource`] is created per configured source label so the
//! aggregator can fan out and time each source independently. With no labels
//! configured, a single unfiltered source covers the whole service.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Query encoding, transport and response decoding live
//! here. Tier classification and result merging belong to the orchestrator.

pub mod http;

pub use http::{build_sources, HttpSearchSource, SearchSettings};
