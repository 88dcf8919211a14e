//! Session state: the orchestrator's state machine, status and audit trail.
//!
//! A [`Session`] is owned exclusively by the orchestrator running it. Status
//! moves monotonically `pending → running → {succeeded, failed}` and the
//! iteration history is append-only: every research/verify(/write) pass is
//! recorded, including the ones that led to a retry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Article, NewsroomError, SearchBatch, SessionId, TemporalReference, Timestamp, Verdict};

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Research,
    Verify,
    Write,
    DoneOk,
    DoneFail,
}

impl Stage {
    /// Returns `true` for `DoneOk` and `DoneFail`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::DoneOk | Stage::DoneFail)
    }

    /// Whether the state machine has an edge from `self` to `next`.
    pub fn can_transition_to(self, next: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (Init, Research)
                | (Init, DoneFail)
                | (Research, Verify)
                | (Research, DoneFail)
                | (Verify, Write)
                | (Verify, Research)
                | (Verify, DoneFail)
                | (Write, DoneOk)
                | (Write, DoneFail)
        )
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Research => "research",
            Stage::Verify => "verify",
            Stage::Write => "write",
            Stage::DoneOk => "done_ok",
            Stage::DoneFail => "done_fail",
        };
        f.write_str(s)
    }
}

/// Externally visible lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Succeeded | SessionStatus::Failed)
    }
}

/// A state-machine edge the session refused to take.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("No transition from {from} to {to}")]
    InvalidEdge { from: Stage, to: Stage },

    #[error("Iteration budget of {max_iterations} already used")]
    IterationBudgetExhausted { max_iterations: u32 },
}

impl From<TransitionError> for NewsroomError {
    fn from(err: TransitionError) -> Self {
        NewsroomError::InvalidTransition {
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Iterations
// ---------------------------------------------------------------------------

/// One pass through research → verify (→ write).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    /// 1-based index within the session.
    pub index: u32,
    /// The search query chosen by the research stage.
    pub query: String,
    pub batch: SearchBatch,
    pub verdict: Verdict,
    /// Present only when the verdict approved and the writing stage succeeded.
    pub draft: Option<Article>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One article-generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    topic: String,
    created_at: Timestamp,
    temporal_reference: TemporalReference,
    max_iterations: u32,
    status: SessionStatus,
    stage: Stage,
    iterations: Vec<Iteration>,
    article: Option<Article>,
    failure: Option<NewsroomError>,
}

impl Session {
    /// Creates a pending session with a fresh identifier.
    pub fn new(topic: impl Into<String>, temporal_reference: TemporalReference, max_iterations: u32) -> Self {
        Self::with_id(SessionId::new_random(), topic, temporal_reference, max_iterations)
    }

    /// Creates a pending session with a caller-chosen identifier.
    pub fn with_id(
        id: SessionId,
        topic: impl Into<String>,
        temporal_reference: TemporalReference,
        max_iterations: u32,
    ) -> Self {
        Self {
            id,
            topic: topic.into(),
            created_at: Timestamp::now(),
            temporal_reference,
            max_iterations,
            status: SessionStatus::Pending,
            stage: Stage::Init,
            iterations: Vec::new(),
            article: None,
            failure: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn temporal_reference(&self) -> TemporalReference {
        self.temporal_reference
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The append-only audit trail.
    pub fn iterations(&self) -> &[Iteration] {
        &self.iterations
    }

    pub fn iteration_count(&self) -> u32 {
        u32::try_from(self.iterations.len()).unwrap_or(u32::MAX)
    }

    /// The final article; only set on `succeeded` sessions.
    pub fn article(&self) -> Option<&Article> {
        self.article.as_ref()
    }

    /// Why the session failed; only set on `failed` sessions.
    pub fn failure(&self) -> Option<&NewsroomError> {
        self.failure.as_ref()
    }

    /// Moves the state machine along a non-terminal edge.
    ///
    /// The first successful transition out of `Init` also moves the status
    /// from `pending` to `running`.
    pub fn enter(&mut self, next: Stage) -> Result<(), TransitionError> {
        if next.is_terminal() || !self.stage.can_transition_to(next) {
            return Err(TransitionError::InvalidEdge {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        if self.status == SessionStatus::Pending {
            self.status = SessionStatus::Running;
        }
        Ok(())
    }

    /// Appends a completed iteration to the history.
    pub fn record_iteration(&mut self, iteration: Iteration) -> Result<(), TransitionError> {
        if self.iteration_count() >= self.max_iterations {
            return Err(TransitionError::IterationBudgetExhausted {
                max_iterations: self.max_iterations,
            });
        }
        self.iterations.push(iteration);
        Ok(())
    }

    /// `WRITE → DONE_OK`: records the final article.
    pub fn succeed(&mut self, article: Article) -> Result<(), TransitionError> {
        if !self.stage.can_transition_to(Stage::DoneOk) {
            return Err(TransitionError::InvalidEdge {
                from: self.stage,
                to: Stage::DoneOk,
            });
        }
        self.stage = Stage::DoneOk;
        self.status = SessionStatus::Succeeded;
        self.article = Some(article);
        Ok(())
    }

    /// Any state → `DONE_FAIL` with the reason recorded.
    ///
    /// Returns `false` (and changes nothing) if the session is already terminal:
    /// no transition ever leaves a terminal state.
    pub fn fail(&mut self, reason: NewsroomError) -> bool {
        if self.stage.is_terminal() {
            return false;
        }
        self.stage = Stage::DoneFail;
        self.status = SessionStatus::Failed;
        self.failure = Some(reason);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(max: u32) -> Session {
        Session::new("topic", TemporalReference::parse("2026-01-04").unwrap(), max)
    }

    #[test]
    fn test_new_session_is_pending_in_init() {
        let s = session(3);
        assert_eq!(s.status(), SessionStatus::Pending);
        assert_eq!(s.stage(), Stage::Init);
        assert_eq!(s.iteration_count(), 0);
    }

    #[test]
    fn test_enter_research_marks_running() {
        let mut s = session(3);
        s.enter(Stage::Research).unwrap();
        assert_eq!(s.status(), SessionStatus::Running);
    }

    #[test]
    fn test_invalid_edges_are_refused() {
        let mut s = session(3);
        assert!(s.enter(Stage::Write).is_err());
        s.enter(Stage::Research).unwrap();
        assert!(s.enter(Stage::Write).is_err());
        assert!(s.enter(Stage::DoneOk).is_err());
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let mut s = session(3);
        s.enter(Stage::Research).unwrap();
        assert!(s.fail(NewsroomError::Cancelled));
        assert!(!s.fail(NewsroomError::EmptyDraft));
        assert_eq!(s.failure(), Some(&NewsroomError::Cancelled));
        assert!(s.enter(Stage::Research).is_err());
        assert_eq!(s.status(), SessionStatus::Failed);
    }

    #[test]
    fn test_backtracking_edge_exists() {
        assert!(Stage::Verify.can_transition_to(Stage::Research));
        assert!(!Stage::Write.can_transition_to(Stage::Research));
        assert!(!Stage::DoneOk.can_transition_to(Stage::DoneFail));
    }
}
