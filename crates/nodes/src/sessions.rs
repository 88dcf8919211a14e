//! Transport-facing session management.
//!
//! [`SessionManager`] starts each session on its own tokio task and keeps the
//! handle until the caller collects the finished [`Session`] with
//! [`SessionManager::wait`]. Live status is derived from the session's own
//! event stream.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use pipeline::{
    EventEnvelope, EventListener, ListenerError, PipelineEvent, Session, SessionId, SessionStatus,
    TemporalReference, Timestamp,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::events::SubscriptionId;
use crate::executor::{CancelHandle, PipelineExecutor};

/// Errors returned to the transport layer.
#[derive(Debug, Error)]
pub enum SessionManagerError {
    #[error("Unknown session {0}")]
    UnknownSession(SessionId),

    #[error("Topic must not be empty")]
    EmptyTopic,

    #[error("Session {session_id} task ended abnormally: {message}")]
    TaskFailed { session_id: SessionId, message: String },
}

/// Tracks a session's status from the events it emits.
struct StatusTracker {
    status: RwLock<SessionStatus>,
}

impl EventListener for StatusTracker {
    fn on_event(&self, envelope: &EventEnvelope) -> Result<(), ListenerError> {
        let next = match envelope.event {
            PipelineEvent::ArticleReady { .. } => SessionStatus::Succeeded,
            PipelineEvent::SessionFailed { .. } => SessionStatus::Failed,
            _ => SessionStatus::Running,
        };
        let mut status = self.status.write();
        if !status.is_terminal() {
            *status = next;
        }
        Ok(())
    }
}

struct SessionEntry {
    cancel: CancelHandle,
    tracker: Arc<StatusTracker>,
    handle: JoinHandle<Session>,
}

/// Runs sessions on their own tasks and hands them back once finished.
pub struct SessionManager {
    executor: Arc<PipelineExecutor>,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl SessionManager {
    /// Creates a manager running every session on `executor`.
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        Self {
            executor,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a session whose temporal reference is today's date.
    pub fn start(&self, topic: &str) -> Result<SessionId, SessionManagerError> {
        self.start_with_reference(topic, TemporalReference::from_timestamp(Timestamp::now()))
    }

    /// Starts a session reasoning about a caller-chosen "today".
    pub fn start_with_reference(
        &self,
        topic: &str,
        reference: TemporalReference,
    ) -> Result<SessionId, SessionManagerError> {
        self.start_session(topic, reference, self.executor.config().max_iterations)
    }

    /// Starts a session with an explicit iteration budget.
    pub fn start_session(
        &self,
        topic: &str,
        reference: TemporalReference,
        max_iterations: u32,
    ) -> Result<SessionId, SessionManagerError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SessionManagerError::EmptyTopic);
        }

        let session = Session::new(topic, reference, max_iterations);
        let session_id = session.id();
        let tracker = Arc::new(StatusTracker {
            status: RwLock::new(SessionStatus::Pending),
        });
        self.executor.events().subscribe(session_id, tracker.clone());

        let cancel = CancelHandle::new();
        let executor = Arc::clone(&self.executor);
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move { executor.run_session(session, &task_cancel).await });

        info!(%session_id, topic, %reference, max_iterations, "Session started");
        self.sessions.lock().insert(
            session_id,
            SessionEntry {
                cancel,
                tracker,
                handle,
            },
        );
        Ok(session_id)
    }

    /// Registers a listener; earlier events of the session are replayed to it.
    pub fn subscribe(
        &self,
        session_id: SessionId,
        listener: Arc<dyn EventListener>,
    ) -> Result<SubscriptionId, SessionManagerError> {
        if !self.sessions.lock().contains_key(&session_id) {
            return Err(SessionManagerError::UnknownSession(session_id));
        }
        Ok(self.executor.events().subscribe(session_id, listener))
    }

    /// Requests cancellation. Takes effect before the session's next iteration.
    pub fn cancel(&self, session_id: SessionId) -> Result<(), SessionManagerError> {
        let sessions = self.sessions.lock();
        let entry = sessions
            .get(&session_id)
            .ok_or(SessionManagerError::UnknownSession(session_id))?;
        entry.cancel.cancel();
        info!(%session_id, "Session cancellation requested");
        Ok(())
    }

    /// Latest status seen on the session's event stream.
    pub fn status(&self, session_id: SessionId) -> Option<SessionStatus> {
        self.sessions
            .lock()
            .get(&session_id)
            .map(|entry| *entry.tracker.status.read())
    }

    /// Waits for the session to finish and hands it over to the caller.
    ///
    /// The session is forgotten afterwards, together with its event log.
    pub async fn wait(&self, session_id: SessionId) -> Result<Session, SessionManagerError> {
        let entry = self
            .sessions
            .lock()
            .remove(&session_id)
            .ok_or(SessionManagerError::UnknownSession(session_id))?;
        let result = entry.handle.await;
        self.executor.events().remove(session_id);
        result.map_err(|err| {
            warn!(%session_id, error = %err, "Session task ended abnormally");
            SessionManagerError::TaskFailed {
                session_id,
                message: err.to_string(),
            }
        })
    }

    /// Ids of sessions that have not been collected yet.
    pub fn active_sessions(&self) -> Vec<SessionId> {
        self.sessions.lock().keys().copied().collect()
    }
}
