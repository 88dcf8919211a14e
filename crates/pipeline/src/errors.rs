//! Top-level error and retry-policy types for the newsroom pipeline domain.
//!
//! [`NewsroomError`] covers conditions that end a session in the `failed`
//! state. It is never thrown back to the caller of the orchestrator: it is
//! recorded on the [`crate::Session`] so every outcome can be inspected
//! uniformly. Component-level errors (reasoning service, search sources,
//! listeners) are defined next to the port they belong to in [`crate::ports`].
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Stage;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by component error types to let the orchestrator decide whether to
/// re-invoke an operation with the same inputs before escalating.
///
/// - `Retryable` errors: service timeouts, rate limiting, 5xx responses,
///   transport failures.
/// - `NonRetryable` errors: rejected requests (4xx other than 429), malformed
///   responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried; the stage fails.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Session-level errors
// ---------------------------------------------------------------------------

/// Reasons a session ends in the `failed` state.
///
/// Stage-local transient errors are retried before they are converted into one
/// of these variants; once here, the condition is terminal for the session.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NewsroomError {
    /// The reasoning service kept timing out until the retry budget was spent.
    #[error("Reasoning service timed out during {stage} after {attempts} attempt(s)")]
    ServiceTimeout {
        /// Stage whose reasoning call timed out.
        stage: Stage,
        /// Number of attempts made, including the first.
        attempts: u32,
    },

    /// The reasoning service returned an error that could not be retried away.
    #[error("Reasoning service failed during {stage}: {message}")]
    ServiceError {
        /// Stage whose reasoning call failed.
        stage: Stage,
        /// Description of the last failure.
        message: String,
    },

    /// Not a single search source responded within the timeout budget.
    #[error("No search source responded for query '{query}' ({sources_attempted} attempted)")]
    SearchUnavailable {
        /// The query that was dispatched.
        query: String,
        /// Number of sources the aggregator dispatched to.
        sources_attempted: usize,
    },

    /// Verification never approved within the iteration budget.
    #[error("Verification did not approve within {max_iterations} iteration(s); last feedback: {last_feedback}")]
    MaxIterationsExceeded {
        /// The configured iteration ceiling.
        max_iterations: u32,
        /// Feedback attached to the final rejection.
        last_feedback: String,
    },

    /// The writing stage produced nothing usable as an article.
    #[error("Writing stage produced an empty draft")]
    EmptyDraft,

    /// The session was cancelled between iterations.
    #[error("Session cancelled")]
    Cancelled,

    /// The session exceeded its global wall-clock ceiling.
    #[error("Session exceeded its wall-clock ceiling of {ceiling_secs}s")]
    DeadlineExceeded {
        /// The ceiling that was exceeded, in seconds.
        ceiling_secs: u64,
    },

    /// The orchestrator attempted a transition the state machine does not have.
    #[error("Invalid state transition: {message}")]
    InvalidTransition {
        /// The refused transition.
        message: String,
    },

    /// The pipeline configuration is invalid.
    ///
    /// Produced at load time, or when a session is started with parameters
    /// that can never succeed (e.g. zero iterations).
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_are_human_readable() {
        let err = NewsroomError::MaxIterationsExceeded {
            max_iterations: 3,
            last_feedback: "need an international-agency source".into(),
        };
        assert_eq!(
            err.to_string(),
            "Verification did not approve within 3 iteration(s); last feedback: need an international-agency source"
        );

        let err = NewsroomError::ServiceTimeout {
            stage: Stage::Write,
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "Reasoning service timed out during write after 3 attempt(s)"
        );
    }

    #[test]
    fn test_error_serialises_with_kind_tag() {
        let json = serde_json::to_value(NewsroomError::Cancelled).unwrap();
        assert_eq!(json["kind"], "cancelled");
    }

    #[test]
    fn test_retry_policy_is_retryable() {
        assert!(RetryPolicy::Retryable { after: None }.is_retryable());
        assert!(!RetryPolicy::NonRetryable.is_retryable());
    }
}
