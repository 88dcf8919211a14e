//! The pipeline executor: drives one session through
//! `INIT → RESEARCH → VERIFY (→ RESEARCH …) → WRITE → DONE_OK | DONE_FAIL`.
//!
//! ## Invariants
//!
//! - Every iteration is appended to the session history before the next
//!   transition is decided, including rejected ones.
//! - An approved verdict always leads to `WRITE` in the same iteration.
//! - The iteration count never exceeds the session's budget; running out of
//!   iterations ends the session with `MaxIterationsExceeded`.
//! - Failures never escape as errors: they end up on the returned
//!   [`Session`].
//!
//! Every transition publishes one event before the executor proceeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pipeline::{
    retain_current, Article, Iteration, NewsroomError, PipelineConfig, PipelineEvent, ReasoningService,
    SearchBatch, SearchSource, Session, Stage, TemporalReference, Verdict,
};
use tracing::{info, instrument, warn};

use crate::aggregator::SourceAggregator;
use crate::events::EventChannel;
use crate::gate::VerificationGate;
use crate::prompts;
use crate::retry::{complete_with_retry, RetryConfig};

/// Cooperative cancellation flag, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// A handle that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation before the next iteration.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`CancelHandle::cancel`] was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives sessions through research, verification and writing.
pub struct PipelineExecutor {
    reasoning: Arc<dyn ReasoningService>,
    aggregator: SourceAggregator,
    gate: VerificationGate,
    events: Arc<EventChannel>,
    retry: RetryConfig,
    config: PipelineConfig,
}

impl PipelineExecutor {
    /// Builds an executor. Fails if `config` does not validate.
    pub fn new(
        reasoning: Arc<dyn ReasoningService>,
        sources: Vec<Arc<dyn SearchSource>>,
        events: Arc<EventChannel>,
        config: PipelineConfig,
    ) -> Result<Self, NewsroomError> {
        config.validate()?;
        let retry = RetryConfig::from_pipeline(&config);
        let aggregator = SourceAggregator::new(sources, config.tiers.clone());
        let gate = VerificationGate::new(
            Arc::clone(&reasoning),
            retry.clone(),
            config.provenance.clone(),
            config.staleness_days,
        );
        Ok(Self {
            reasoning,
            aggregator,
            gate,
            events,
            retry,
            config,
        })
    }

    /// The validated configuration the executor runs with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The channel every session's events are published on.
    pub fn events(&self) -> &Arc<EventChannel> {
        &self.events
    }

    /// Runs a new session to completion.
    ///
    /// The session id is unknown to anyone else, so its event log is dropped
    /// once the session ends.
    pub async fn run(&self, topic: &str, reference: TemporalReference, max_iterations: u32) -> Session {
        let session = Session::new(topic, reference, max_iterations);
        let session = self.run_session(session, &CancelHandle::new()).await;
        self.events.remove(session.id());
        session
    }

    /// Runs a prepared session to a terminal state.
    ///
    /// The session's event log is kept for late subscribers; the caller
    /// releases it with [`EventChannel::remove`].
    #[instrument(
        skip_all,
        fields(session_id = %session.id(), topic = session.topic(), max_iterations = session.max_iterations())
    )]
    pub async fn run_session(&self, mut session: Session, cancel: &CancelHandle) -> Session {
        if session.max_iterations() == 0 {
            self.fail(
                &mut session,
                NewsroomError::ConfigurationError {
                    message: "max_iterations must be at least 1".into(),
                },
            );
            return session;
        }

        let ceiling = self.config.session_deadline(session.max_iterations());
        let outcome = tokio::time::timeout(ceiling, self.drive(&mut session, cancel)).await;
        let result = outcome.unwrap_or_else(|_| {
            Err(NewsroomError::DeadlineExceeded {
                ceiling_secs: ceiling.as_secs(),
            })
        });
        if let Err(reason) = result {
            self.fail(&mut session, reason);
        }
        session
    }

    async fn drive(&self, session: &mut Session, cancel: &CancelHandle) -> Result<(), NewsroomError> {
        let topic = session.topic().to_string();
        let reference = session.temporal_reference();
        let mut feedback: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(NewsroomError::Cancelled);
            }
            let iteration = session.iteration_count() + 1;

            self.transition(session, Stage::Research, iteration)?;
            let research_topic = match &feedback {
                Some(f) => prompts::refined_topic(&topic, f),
                None => topic.clone(),
            };
            let query = self.research(&research_topic, reference).await?;
            let batch = self
                .aggregator
                .search(&query, self.config.results_per_source, self.config.search_timeout())
                .await?;
            self.events.emit(PipelineEvent::SearchCompleted {
                session_id: session.id(),
                iteration,
                batch_summary: batch.summary(),
            });

            self.transition(session, Stage::Verify, iteration)?;
            let verdict = self
                .gate
                .verify(&batch, &topic, reference)
                .await
                .map_err(|f| f.into_newsroom_error(Stage::Verify))?;
            self.events.emit(PipelineEvent::VerdictRendered {
                session_id: session.id(),
                iteration,
                verdict: verdict.clone(),
            });

            if verdict.is_approved() {
                self.transition(session, Stage::Write, iteration)?;
                let written = self.write(&topic, reference, &verdict.analysis, &batch).await;
                session.record_iteration(Iteration {
                    index: iteration,
                    query,
                    batch,
                    verdict,
                    draft: written.as_ref().ok().cloned(),
                })?;
                let article = written?;
                session.succeed(article.clone())?;
                info!(iteration, title = %article.title, "Article ready");
                self.events.emit(PipelineEvent::ArticleReady {
                    session_id: session.id(),
                    article,
                });
                return Ok(());
            }

            let rejection = verdict.feedback.clone();
            session.record_iteration(Iteration {
                index: iteration,
                query,
                batch,
                verdict,
                draft: None,
            })?;

            if session.iteration_count() >= session.max_iterations() {
                return Err(NewsroomError::MaxIterationsExceeded {
                    max_iterations: session.max_iterations(),
                    last_feedback: rejection,
                });
            }

            info!(iteration, feedback = %rejection, "Verification rejected; backtracking");
            self.events.emit(PipelineEvent::Backtracking {
                session_id: session.id(),
                iteration,
                feedback: rejection.clone(),
            });
            feedback = Some(rejection);
        }
    }

    fn transition(&self, session: &mut Session, stage: Stage, iteration: u32) -> Result<(), NewsroomError> {
        session.enter(stage)?;
        info!(%stage, iteration, "Stage entered");
        self.events.emit(PipelineEvent::StageEntered {
            session_id: session.id(),
            stage,
            iteration,
        });
        Ok(())
    }

    async fn research(&self, topic: &str, reference: TemporalReference) -> Result<String, NewsroomError> {
        let prompt = prompts::research_prompt(topic, reference);
        let response = complete_with_retry(self.reasoning.as_ref(), &prompts::researcher_role(), &prompt, &self.retry)
            .await
            .map_err(|f| f.into_newsroom_error(Stage::Research))?;
        Ok(prompts::parse_search_query(&response, topic))
    }

    async fn write(
        &self,
        topic: &str,
        reference: TemporalReference,
        analysis: &str,
        batch: &SearchBatch,
    ) -> Result<Article, NewsroomError> {
        let documents = retain_current(&batch.documents, reference, self.config.staleness_days);
        let prompt = prompts::writer_prompt(topic, reference, analysis, &documents);
        let draft = complete_with_retry(self.reasoning.as_ref(), &prompts::writer_role(), &prompt, &self.retry)
            .await
            .map_err(|f| f.into_newsroom_error(Stage::Write))?;
        Article::from_markdown(&draft, topic).ok_or(NewsroomError::EmptyDraft)
    }

    fn fail(&self, session: &mut Session, reason: NewsroomError) {
        if !session.fail(reason.clone()) {
            return;
        }
        warn!(
            session_id = %session.id(),
            iterations = session.iteration_count(),
            reason = %reason,
            "Session failed"
        );
        self.events.emit(PipelineEvent::SessionFailed {
            session_id: session.id(),
            reason: reason.to_string(),
        });
    }
}

/// The verdict that ended a session, if it ended on one.
pub fn final_verdict(session: &Session) -> Option<&Verdict> {
    session.iterations().last().map(|it| &it.verdict)
}
