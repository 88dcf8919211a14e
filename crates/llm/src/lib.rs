//! Newsroom reasoning-service adapter.
//!
//! Implements [`pipeline::ReasoningService`] for any server speaking the
//! OpenAI chat-completions protocol (hosted APIs and local proxies alike).
//! Additional providers are added as new modules in this crate without any
//! changes to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, response parsing
//! and status classification live here. Retrying is the orchestrator's job:
//! this adapter makes exactly one request per call and reports whether the
//! failure is worth retrying through [`pipeline::ReasoningError::retry_policy`].

pub mod openai;

pub use openai::{LlmSettings, OpenAiCompatibleProvider, RoleSampling};
