//! Progress events published by the orchestrator.
//!
//! Events are serialised with an internal `type` tag so the transport layer
//! can forward them as-is:
//!
//! ```json
//! {"sequence":3,"emitted_at":"2026-01-04T10:00:02Z","event":{"type":"search_completed",...}}
//! ```

use serde::{Deserialize, Serialize};

use crate::{Article, BatchSummary, SessionId, Stage, Timestamp, Verdict};

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageEntered {
        session_id: SessionId,
        stage: Stage,
        /// 1-based iteration the stage belongs to.
        iteration: u32,
    },
    SearchCompleted {
        session_id: SessionId,
        iteration: u32,
        batch_summary: BatchSummary,
    },
    VerdictRendered {
        session_id: SessionId,
        iteration: u32,
        verdict: Verdict,
    },
    /// Emitted after a rejection, before research starts again.
    Backtracking {
        session_id: SessionId,
        /// The iteration that was rejected.
        iteration: u32,
        feedback: String,
    },
    ArticleReady {
        session_id: SessionId,
        article: Article,
    },
    SessionFailed {
        session_id: SessionId,
        /// Human-readable reason.
        reason: String,
    },
}

impl PipelineEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            PipelineEvent::StageEntered { session_id, .. }
            | PipelineEvent::SearchCompleted { session_id, .. }
            | PipelineEvent::VerdictRendered { session_id, .. }
            | PipelineEvent::Backtracking { session_id, .. }
            | PipelineEvent::ArticleReady { session_id, .. }
            | PipelineEvent::SessionFailed { session_id, .. } => *session_id,
        }
    }

    /// The `type` tag this event serialises with.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::StageEntered { .. } => "stage_entered",
            PipelineEvent::SearchCompleted { .. } => "search_completed",
            PipelineEvent::VerdictRendered { .. } => "verdict_rendered",
            PipelineEvent::Backtracking { .. } => "backtracking",
            PipelineEvent::ArticleReady { .. } => "article_ready",
            PipelineEvent::SessionFailed { .. } => "session_failed",
        }
    }

    /// Returns `true` for the last event a session ever emits.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEvent::ArticleReady { .. } | PipelineEvent::SessionFailed { .. }
        )
    }
}

/// A [`PipelineEvent`] with its per-session position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Starts at 0 and increases by one per event within a session.
    pub sequence: u64,
    pub emitted_at: Timestamp,
    pub event: PipelineEvent,
}
