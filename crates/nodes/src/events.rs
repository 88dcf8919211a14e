//! Event channel: per-session ordered delivery of [`PipelineEvent`]s.
//!
//! Each session has a topic holding a bounded replay log and its listeners.
//! Emission appends to the log and delivers to every listener while holding
//! the topic's lock, and subscription replays the log under the same lock.
//! A listener therefore sees every event of its session exactly in sequence
//! order, whether it subscribed before or after the session started.
//!
//! Emission never fails from the producer's point of view: listener errors
//! are logged and swallowed, and listeners that report
//! [`ListenerError::Disconnected`] are dropped.
//!
//! The first terminal event (`article_ready` or `session_failed`) closes the
//! topic. Later events for that session are discarded.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use pipeline::{EventEnvelope, EventListener, ListenerError, PipelineEvent, SessionId, Timestamp};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Events retained per session for replay to late subscribers.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1024;

/// Handle returned by [`EventChannel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    listener: Arc<dyn EventListener>,
}

#[derive(Default)]
struct Topic {
    log: VecDeque<EventEnvelope>,
    listeners: Vec<Subscription>,
    next_sequence: u64,
    closed: bool,
}

impl Topic {
    /// Delivers to every listener, dropping the disconnected ones.
    fn deliver(&mut self, session_id: SessionId, envelope: &EventEnvelope) {
        self.listeners.retain(|sub| match sub.listener.on_event(envelope) {
            Ok(()) => true,
            Err(ListenerError::Disconnected) => {
                debug!(%session_id, subscription = sub.id.0, "Listener disconnected; unsubscribing");
                false
            }
            Err(err) => {
                warn!(%session_id, subscription = sub.id.0, error = %err, "Event listener failed");
                true
            }
        });
    }
}

/// Registry of per-session event topics.
pub struct EventChannel {
    topics: RwLock<HashMap<SessionId, Arc<Mutex<Topic>>>>,
    next_subscription: AtomicU64,
    replay_capacity: usize,
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl EventChannel {
/// Creates a channel keeping [`DEFAULT_REPLAY_CAPACITY`] events per session.
    pub fn new() -> Self {
        Self::with_replay_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Creates a channel keeping at most `replay_capacity` events per session.
    pub fn with_replay_capacity(replay_capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            next_subscription: AtomicU64::new(0),
            replay_capacity: replay_capacity.max(1),
        }
    }

    fn topic(&self, session_id: SessionId) -> Arc<Mutex<Topic>> {
        if let Some(topic) = self.topics.read().get(&session_id) {
            return Arc::clone(topic);
        }
        Arc::clone(self.topics.write().entry(session_id).or_default())
    }

    /// Publishes an event to its session's listeners.
    ///
    /// Returns the assigned sequence number, or `None` if the session's
    /// topic is closed and the event was discarded.
    pub fn emit(&self, event: PipelineEvent) -> Option<u64> {
        let session_id = event.session_id();
        let topic = self.topic(session_id);
        let mut topic = topic.lock();
        if topic.closed {
            debug!(%session_id, kind = event.kind(), "Event discarded after session end");
            return None;
        }

        let sequence = topic.next_sequence;
        topic.next_sequence += 1;
        let terminal = event.is_terminal();
        let envelope = EventEnvelope {
            sequence,
            emitted_at: Timestamp::now(),
            event,
        };

        topic.deliver(session_id, &envelope);
        if topic.log.len() == self.replay_capacity {
            topic.log.pop_front();
        }
        topic.log.push_back(envelope);
        if terminal {
            topic.closed = true;
        }
        Some(sequence)
    }

    /// Registers a listener and replays the session's retained events to it.
    pub fn subscribe(&self, session_id: SessionId, listener: Arc<dyn EventListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let topic = self.topic(session_id);
        let mut topic = topic.lock();

        for envelope in &topic.log {
            match listener.on_event(envelope) {
                Ok(()) => {}
                Err(ListenerError::Disconnected) => {
                    debug!(%session_id, subscription = id.0, "Listener disconnected during replay");
                    return id;
                }
                Err(err) => {
                    warn!(%session_id, subscription = id.0, error = %err, "Event listener failed during replay");
                }
            }
        }

        topic.listeners.push(Subscription { id, listener });
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, session_id: SessionId, subscription: SubscriptionId) -> bool {
        let Some(topic) = self.topics.read().get(&session_id).cloned() else {
            return false;
        };
        let mut topic = topic.lock();
        let before = topic.listeners.len();
        topic.listeners.retain(|s| s.id != subscription);
        topic.listeners.len() != before
    }

    /// Discards every later event for the session.
    pub fn close(&self, session_id: SessionId) {
        self.topic(session_id).lock().closed = true;
    }

    /// The retained events of a session, oldest first.
    pub fn history(&self, session_id: SessionId) -> Vec<EventEnvelope> {
        match self.topics.read().get(&session_id) {
            Some(topic) => topic.lock().log.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Drops a session's topic, its log and its listeners.
    pub fn remove(&self, session_id: SessionId) {
        self.topics.write().remove(&session_id);
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// Forwards events into an unbounded tokio channel.
///
/// Reports [`ListenerError::Disconnected`] once the receiver is dropped.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<EventEnvelope>,
}

impl ChannelListener {
    pub fn new(tx: mpsc::UnboundedSender<EventEnvelope>) -> Self {
        Self { tx }
    }

    /// Creates a listener together with the receiving end.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<EventEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventListener for ChannelListener {
    fn on_event(&self, event: &EventEnvelope) -> Result<(), ListenerError> {
        self.tx
            .send(event.clone())
            .map_err(|_| ListenerError::Disconnected)
    }
}
