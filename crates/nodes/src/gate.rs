//! Verification gate: asks the analyst for a narrative verdict over the
//! current documents, then applies the mechanical rules from
//! [`pipeline::verification`].

use std::sync::Arc;

use pipeline::{
    evaluate, retain_current, ProvenanceCatalog, ReasoningService, SearchBatch, TemporalReference, Verdict,
};
use tracing::{debug, info, instrument};

use crate::prompts;
use crate::retry::{complete_with_retry, ReasoningFailure, RetryConfig};

/// Decides whether a batch is good enough to write from.
pub struct VerificationGate {
    reasoning: Arc<dyn ReasoningService>,
    retry: RetryConfig,
    provenance: ProvenanceCatalog,
    staleness_days: u64,
}

impl VerificationGate {
    /// Creates a gate that consults the analyst through `reasoning`.
    pub fn new(
        reasoning: Arc<dyn ReasoningService>,
        retry: RetryConfig,
        provenance: ProvenanceCatalog,
        staleness_days: u64,
    ) -> Self {
        Self {
            reasoning,
            retry,
            provenance,
            staleness_days,
        }
    }

    /// Renders the verdict for one batch.
    ///
    /// The analyst is not consulted when every document is stale: the
    /// temporal rule rejects on its own.
    #[instrument(skip(self, batch), fields(documents = batch.len(), reference = %reference))]
    pub async fn verify(
        &self,
        batch: &SearchBatch,
        topic: &str,
        reference: TemporalReference,
    ) -> Result<Verdict, ReasoningFailure> {
        let current = retain_current(&batch.documents, reference, self.staleness_days);
        let narrative = if current.is_empty() {
            debug!("No current documents; skipping analyst");
            String::new()
        } else {
            let prompt = prompts::analyst_prompt(topic, reference, &current);
            complete_with_retry(self.reasoning.as_ref(), &prompts::analyst_role(), &prompt, &self.retry).await?
        };

        let verdict = evaluate(batch, reference, &narrative, &self.provenance, self.staleness_days);
        info!(
            outcome = ?verdict.outcome,
            violations = ?verdict.violations,
            retained = verdict.retained_documents,
            excluded = verdict.excluded_documents,
            "Verdict rendered"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{raw, ScriptedReasoning};
    use pipeline::{AgentRole, RuleId, SearchDocument, SourceName, TierCatalog};

    fn gate(reasoning: Arc<ScriptedReasoning>) -> VerificationGate {
        let retry = RetryConfig {
            attempts: 2,
            attempt_timeout: Duration::from_secs(5),
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
        };
        VerificationGate::new(reasoning, retry, ProvenanceCatalog::default(), 730)
    }

    fn batch(docs: &[(&str, &str)]) -> SearchBatch {
        let fallback = SourceName::new("fallback").unwrap();
        let documents = docs
            .iter()
            .map(|(source, date)| {
                SearchDocument::from_raw(raw(source, date, source), &fallback, &TierCatalog::default())
            })
            .collect();
        SearchBatch::assemble("q", documents, Duration::ZERO, vec![], vec![])
    }

    fn reference() -> TemporalReference {
        TemporalReference::parse("2026-01-04").unwrap()
    }

    #[tokio::test]
    async fn test_stale_batch_rejects_without_asking_analyst() {
        let reasoning = Arc::new(ScriptedReasoning::new());
        let verdict = gate(reasoning.clone())
            .verify(&batch(&[("Reuters", "2023-06-01")]), "t", reference())
            .await
            .unwrap();
        assert_eq!(verdict.violations, vec![RuleId::Temporal]);
        assert_eq!(reasoning.calls(AgentRole::Analyst), 0);
    }

    #[tokio::test]
    async fn test_analyst_sees_only_current_documents() {
        let reasoning = Arc::new(ScriptedReasoning::new());
        let verdict = gate(reasoning.clone())
            .verify(
                &batch(&[
                    ("FIFA", "2025-12-01"),
                    ("Reuters", "2025-12-01"),
                    ("El Comercio", "2025-12-01"),
                    ("Infobae", "2022-01-01"),
                ]),
                "t",
                reference(),
            )
            .await
            .unwrap();
        assert!(verdict.is_approved());
        let prompts = reasoning.prompts(AgentRole::Analyst);
        assert_eq!(prompts.len(), 1);
        assert!(!prompts[0].contains("Infobae"));
        assert!(prompts[0].contains("Reuters"));
    }

    #[tokio::test]
    async fn test_mechanical_rules_override_narrative_approval() {
        let reasoning = Arc::new(ScriptedReasoning::new());
        let verdict = gate(reasoning)
            .verify(&batch(&[("El Comercio", "2025-12-01")]), "t", reference())
            .await
            .unwrap();
        assert!(!verdict.is_approved());
        assert!(verdict.violates(RuleId::Triangulation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_analyst_failure_propagates_after_retries() {
        let reasoning = Arc::new(ScriptedReasoning::new().with_delay(Duration::from_secs(60)));
        let failure = gate(reasoning.clone())
            .verify(&batch(&[("FIFA", "2025-12-01")]), "t", reference())
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 2);
        assert_eq!(reasoning.calls(AgentRole::Analyst), 2);
    }
}
