//! End-to-end sessions driven through `SessionManager` and `PipelineExecutor`
//! with scripted reasoning and in-memory search sources.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nodes::{ChannelListener, EventChannel, PipelineExecutor, SessionManager};
use parking_lot::Mutex;
use pipeline::{
    AgentRole, EventEnvelope, NewsroomError, PipelineConfig, PipelineEvent, RawDocument, ReasoningError,
    ReasoningService, RoleContext, RuleId, SearchSource, SearchSourceError, SessionStatus, SourceName,
    TemporalReference,
};
use pretty_assertions::assert_eq;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Answers each role from its own queue; an exhausted queue repeats the last answer.
struct Oracle {
    researcher: Mutex<VecDeque<String>>,
    analyst: Mutex<VecDeque<String>>,
    writer: Mutex<VecDeque<String>>,
}

impl Oracle {
    fn new(researcher: &[&str], analyst: &[&str], writer: &[&str]) -> Self {
        let queue = |items: &[&str]| Mutex::new(items.iter().map(|s| s.to_string()).collect());
        Self {
            researcher: queue(researcher),
            analyst: queue(analyst),
            writer: queue(writer),
        }
    }
}

#[async_trait]
impl ReasoningService for Oracle {
    async fn complete(&self, role: &RoleContext, _prompt: &str) -> Result<String, ReasoningError> {
        let queue = match role.role {
            AgentRole::Researcher => &self.researcher,
            AgentRole::Analyst => &self.analyst,
            AgentRole::Writer => &self.writer,
        };
        let mut queue = queue.lock();
        let answer = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        answer.ok_or_else(|| ReasoningError::service("no scripted answer"))
    }
}

/// Returns documents whose provenance depends on the query wording.
struct WireSource {
    name: SourceName,
    delay: Duration,
}

impl WireSource {
    fn new(name: &str) -> Self {
        Self {
            name: SourceName::new(name).unwrap(),
            delay: Duration::ZERO,
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

fn doc(source: &str, date: &str, n: usize) -> RawDocument {
    RawDocument {
        title: format!("{source} #{n}"),
        content: format!("Coverage by {source}."),
        source: source.to_string(),
        url: format!("https://news.example/{source}/{n}"),
        date: date.to_string(),
        extraction_method: "css".to_string(),
    }
}

#[async_trait]
impl SearchSource for WireSource {
    fn name(&self) -> &SourceName {
        &self.name
    }

    async fn fetch(&self, query: &str, _max_results: usize) -> Result<Vec<RawDocument>, SearchSourceError> {
        tokio::time::sleep(self.delay).await;
        let mut docs = vec![doc("El Comercio", "2025-12-28", 1), doc("Infobae", "2025-12-29", 2)];
        if query.contains("official") {
            docs.push(doc("FIFA", "2025-12-30", 3));
            docs.push(doc("Reuters", "2025-12-31", 4));
        }
        Ok(docs)
    }
}

const ARTICLE: &str = "# X qualifies\n\n**X secured qualification on Sunday.**\n\n## Details\n\nOfficials confirmed the result.\n\n**Sources**: FIFA, Reuters, El Comercio\n";

fn reference() -> TemporalReference {
    TemporalReference::parse("2026-01-04").unwrap()
}

fn manager(oracle: Oracle, sources: Vec<WireSource>, config: PipelineConfig) -> SessionManager {
    let executor = PipelineExecutor::new(
        Arc::new(oracle),
        sources
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn SearchSource>)
            .collect(),
        Arc::new(EventChannel::new()),
        config,
    )
    .unwrap();
    SessionManager::new(Arc::new(executor))
}

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<EventEnvelope>) -> Vec<EventEnvelope> {
    let mut out = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        out.push(envelope);
    }
    out
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn rejected_then_approved_session_succeeds_with_two_iterations() {
    let oracle = Oracle::new(
        &["X local coverage", "X official wire coverage"],
        &[
            "Only local outlets. VERDICT: REJECTED - triangulation",
            "Balanced and current. VERDICT: APPROVED",
        ],
        &[ARTICLE],
    );
    let manager = manager(oracle, vec![WireSource::new("El Comercio")], PipelineConfig::default());

    let id = manager.start_session("X", reference(), 3).unwrap();
    assert_eq!(manager.active_sessions(), vec![id]);
    let (listener, mut rx) = ChannelListener::pair();
    manager.subscribe(id, Arc::new(listener)).unwrap();
    let session = manager.wait(id).await.unwrap();
    assert!(manager.active_sessions().is_empty());

    assert_eq!(session.status(), SessionStatus::Succeeded);
    assert_eq!(session.iteration_count(), 2);
    let first = &session.iterations()[0];
    assert!(!first.verdict.is_approved());
    assert!(first.verdict.violates(RuleId::Triangulation));
    assert!(first.draft.is_none());
    let second = &session.iterations()[1];
    assert!(second.verdict.is_approved());
    assert!(second.draft.is_some());

    let article = session.article().unwrap();
    assert_eq!(article.title, "X qualifies");
    assert!(!article.sections.is_empty());

    let events = drain(&mut rx);
    let verdicts = events
        .iter()
        .filter(|e| matches!(e.event, PipelineEvent::VerdictRendered { .. }))
        .count();
    assert_eq!(verdicts, 2);
    assert!(events
        .iter()
        .any(|e| matches!(e.event, PipelineEvent::Backtracking { iteration: 1, .. })));
    assert!(matches!(
        events.last().map(|e| &e.event),
        Some(PipelineEvent::ArticleReady { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn iteration_count_never_exceeds_budget() {
    for max_iterations in 1..=4 {
        let oracle = Oracle::new(&["X local coverage"], &["VERDICT: APPROVED"], &[ARTICLE]);
        let manager = manager(oracle, vec![WireSource::new("El Comercio")], PipelineConfig::default());
        let id = manager.start_session("X", reference(), max_iterations).unwrap();
        let session = manager.wait(id).await.unwrap();

        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.iteration_count(), max_iterations);
        assert!(matches!(
            session.failure(),
            Some(NewsroomError::MaxIterationsExceeded { max_iterations: m, .. }) if *m == max_iterations
        ));
    }
}

#[tokio::test(start_paused = true)]
async fn slow_source_degrades_batch_without_failing_session() {
    let oracle = Oracle::new(&["X official wire coverage"], &["VERDICT: APPROVED"], &[ARTICLE]);
    let config = PipelineConfig {
        search_timeout_secs: 60,
        ..PipelineConfig::default()
    };
    let manager = manager(
        oracle,
        vec![
            WireSource::new("NewsAPI").delayed(Duration::from_secs(3)),
            WireSource::new("La República").delayed(Duration::from_secs(600)),
        ],
        config,
    );

    let id = manager.start_session("X", reference(), 3).unwrap();
    let (listener, mut rx) = ChannelListener::pair();
    manager.subscribe(id, Arc::new(listener)).unwrap();
    let session = manager.wait(id).await.unwrap();

    assert_eq!(session.status(), SessionStatus::Succeeded);
    let batch = &session.iterations()[0].batch;
    assert!(batch.partial_failure);
    assert_eq!(batch.absent_sources, vec![SourceName::new("La República").unwrap()]);

    let summary = drain(&mut rx)
        .into_iter()
        .find_map(|e| match e.event {
            PipelineEvent::SearchCompleted { batch_summary, .. } => Some(batch_summary),
            _ => None,
        })
        .unwrap();
    assert!(summary.partial_failure);
}

#[tokio::test(start_paused = true)]
async fn failed_session_reports_reason_to_subscribers() {
    let oracle = Oracle::new(&["X"], &["VERDICT: APPROVED"], &[ARTICLE]);
    let config = PipelineConfig {
        search_timeout_secs: 5,
        ..PipelineConfig::default()
    };
    let manager = manager(
        oracle,
        vec![WireSource::new("Infobae").delayed(Duration::from_secs(30))],
        config,
    );

    let id = manager.start_session("X", reference(), 3).unwrap();
    let (listener, mut rx) = ChannelListener::pair();
    manager.subscribe(id, Arc::new(listener)).unwrap();
    let session = manager.wait(id).await.unwrap();

    assert!(matches!(session.failure(), Some(NewsroomError::SearchUnavailable { .. })));
    let last = drain(&mut rx).pop().unwrap();
    let json = serde_json::to_value(&last).unwrap();
    assert_eq!(json["event"]["type"], "session_failed");
    assert_eq!(
        json["event"]["reason"],
        "No search source responded for query 'X' (1 attempted)"
    );
}
