//! Newsroom pipeline orchestration.
//!
//! This crate provides the event channel, the source aggregator, the
//! verification gate and the `PipelineExecutor` that drives the
//! research → verify → write loop, plus the `SessionManager` the transport
//! layer talks to.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** These components sequence calls between business
//! logic in the [`pipeline`] crate and the port traits it defines (reasoning
//! service, search sources, event listeners). The mechanical verification
//! rules live in [`pipeline::verification`]; nothing here adds domain rules of
//! its own.
//!
//! ## Dependency Order
//!
//! | Module | Depends on |
//! |--------|------------|
//! | [`events`] | `pipeline` only |
//! | [`aggregator`] | search sources |
//! | [`gate`] | reasoning service, verification rules |
//! | [`executor`] | all of the above |
//! | [`sessions`] | executor |

pub mod aggregator;
pub mod events;
pub mod executor;
pub mod gate;
pub mod prompts;
pub mod retry;
pub mod sessions;

#[cfg(test)]
mod testing;

pub use aggregator::{AggregatorError, SourceAggregator};
pub use events::{ChannelListener, EventChannel, SubscriptionId, DEFAULT_REPLAY_CAPACITY};
pub use executor::{final_verdict, CancelHandle, PipelineExecutor};
pub use gate::VerificationGate;
pub use retry::{complete_with_retry, ReasoningFailure, RetryConfig};
pub use sessions::{SessionManager, SessionManagerError};
