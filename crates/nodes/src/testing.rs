//! Scripted collaborators shared by the unit tests of this crate.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pipeline::{
    AgentRole, EventEnvelope, EventListener, ListenerError, RawDocument, ReasoningError,
    ReasoningService, RoleContext, SearchSource, SearchSourceError, SourceName,
};

pub(crate) const APPROVED_NARRATIVE: &str = "Sources are balanced and current.\nVERDICT: APPROVED";

pub(crate) const DRAFT: &str = "# Peru reaches the playoff\n\n\
**Peru secured its playoff place on Tuesday.**\n\n\
## The facts\n\n\
The match ended 2-0.\n\n\
**Sources**: FIFA, Reuters, El Comercio\n";

/// Reasoning service answering from per-role scripts, then per-role defaults.
pub(crate) struct ScriptedReasoning {
    scripts: Mutex<HashMap<AgentRole, VecDeque<Result<String, ReasoningError>>>>,
    defaults: HashMap<AgentRole, String>,
    prompts: Mutex<Vec<(AgentRole, String)>>,
    delay: Option<Duration>,
}

impl ScriptedReasoning {
    pub(crate) fn new() -> Self {
        let defaults = HashMap::from([
            (AgentRole::Researcher, "world cup playoff".to_string()),
            (AgentRole::Analyst, APPROVED_NARRATIVE.to_string()),
            (AgentRole::Writer, DRAFT.to_string()),
        ]);
        Self {
            scripts: Mutex::new(HashMap::new()),
            defaults,
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub(crate) fn push(self, role: AgentRole, response: Result<String, ReasoningError>) -> Self {
        self.scripts.lock().entry(role).or_default().push_back(response);
        self
    }

    pub(crate) fn with_default(mut self, role: AgentRole, text: &str) -> Self {
        self.defaults.insert(role, text.to_string());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self, role: AgentRole) -> usize {
        self.prompts.lock().iter().filter(|(r, _)| *r == role).count()
    }

    pub(crate) fn prompts(&self, role: AgentRole) -> Vec<String> {
        self.prompts
            .lock()
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoning {
    async fn complete(&self, role: &RoleContext, prompt: &str) -> Result<String, ReasoningError> {
        self.prompts.lock().push((role.role, prompt.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self
            .scripts
            .lock()
            .get_mut(&role.role)
            .and_then(|queue| queue.pop_front());
        match scripted {
            Some(response) => response,
            None => Ok(self.defaults.get(&role.role).cloned().unwrap_or_default()),
        }
    }
}

/// Search source returning a fixed document list, optionally late or failing.
pub(crate) struct StaticSource {
    name: SourceName,
    documents: Vec<RawDocument>,
    delay: Duration,
    failure: Option<SearchSourceError>,
}

impl StaticSource {
    pub(crate) fn new(name: &str, documents: Vec<RawDocument>) -> Self {
        Self {
            name: SourceName::new(name).unwrap(),
            documents,
            delay: Duration::ZERO,
            failure: None,
        }
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn failing(mut self, status: u16) -> Self {
        self.failure = Some(SearchSourceError::Status {
            source_name: self.name.clone(),
            status,
        });
        self
    }
}

#[async_trait]
impl SearchSource for StaticSource {
    fn name(&self) -> &SourceName {
        &self.name
    }

    async fn fetch(&self, _query: &str, _max_results: usize) -> Result<Vec<RawDocument>, SearchSourceError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.documents.clone()),
        }
    }
}

pub(crate) fn raw(source: &str, date: &str, url: &str) -> RawDocument {
    RawDocument {
        title: format!("{source} coverage"),
        content: format!("Report from {source}."),
        source: source.to_string(),
        url: url.to_string(),
        date: date.to_string(),
        extraction_method: String::new(),
    }
}

/// One current document from each triangulation category.
pub(crate) fn triangulated_sources() -> Vec<StaticSource> {
    vec![
        StaticSource::new("El Comercio", vec![raw("El Comercio", "2025-12-20", "https://elcomercio.pe/1")]),
        StaticSource::new("NewsAPI", vec![
            raw("Reuters", "2025-12-21", "https://reuters.com/1"),
            raw("FIFA", "2025-12-22", "https://fifa.com/1"),
        ]),
    ]
}

/// Listener that keeps every envelope it receives.
#[derive(Default)]
pub(crate) struct RecordingListener {
    envelopes: Mutex<Vec<EventEnvelope>>,
}

impl RecordingListener {
    pub(crate) fn envelopes(&self) -> Vec<EventEnvelope> {
        self.envelopes.lock().clone()
    }

    pub(crate) fn kinds(&self) -> Vec<&'static str> {
        self.envelopes.lock().iter().map(|e| e.event.kind()).collect()
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &EventEnvelope) -> Result<(), ListenerError> {
        self.envelopes.lock().push(event.clone());
        Ok(())
    }
}
