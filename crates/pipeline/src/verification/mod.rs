//! Mechanical verification rules and the [`Verdict`] they produce.
//!
//! The reasoning service supplies a narrative judgment; everything else in
//! here is deterministic. [`evaluate`] combines four checks:
//!
//! | Rule | Input | Rejects when |
//! |------|-------|--------------|
//! | [`RuleId::Temporal`] | publish dates | nothing newer than the staleness threshold remains |
//! | [`RuleId::Triangulation`] | provenance labels | official, international agency or local coverage is missing |
//! | [`RuleId::NumericConsistency`] | narrative figures | staged-process arithmetic does not add up |
//! | [`RuleId::Neutrality`] | narrative verdict | the analyst rejected, or gave no clear verdict |
//!
//! Given the same batch, reference date and narrative, the verdict is always
//! the same.

pub mod narrative;
pub mod numeric;
pub mod provenance;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{excerpt, SearchBatch, SearchDocument, TemporalReference};

pub use narrative::NarrativeOutcome;
pub use numeric::{check_numeric_consistency, extract_figures, StagedProcessFigures};
pub use provenance::{ProvenanceCatalog, ProvenanceCategory};

/// Characters of analyst narrative quoted in neutrality feedback.
const NARRATIVE_QUOTE_CHARS: usize = 160;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Identifier of a verification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleId {
    Temporal,
    Triangulation,
    NumericConsistency,
    Neutrality,
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuleId::Temporal => "temporal",
            RuleId::Triangulation => "triangulation",
            RuleId::NumericConsistency => "numeric-consistency",
            RuleId::Neutrality => "neutrality",
        };
        f.write_str(s)
    }
}

/// One failed rule.
///
/// Used to build a [`Verdict`]; never surfaced as a session failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{rule}: {detail}")]
pub struct RuleViolation {
    pub rule: RuleId,
    /// What is missing or wrong, phrased as guidance for the next search.
    pub detail: String,
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Approve or reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictOutcome {
    Approved,
    Rejected,
}

/// The verification gate's decision for one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: VerdictOutcome,
    /// Violated rules, deduplicated and in [`RuleId`] order.
    pub violations: Vec<RuleId>,
    /// Guidance for the next research iteration; empty when approved.
    pub feedback: String,
    /// The parsed analyst narrative.
    pub narrative: NarrativeOutcome,
    /// The analyst's narrative text; empty when the analyst was not consulted.
    #[serde(default)]
    pub analysis: String,
    /// Documents that passed the temporal filter.
    pub retained_documents: usize,
    /// Documents dropped as stale.
    pub excluded_documents: usize,
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        self.outcome == VerdictOutcome::Approved
    }

    /// Returns `true` if `rule` is among the violations.
    pub fn violates(&self, rule: RuleId) -> bool {
        self.violations.contains(&rule)
    }

    fn from_findings(
        findings: Vec<RuleViolation>,
        narrative: NarrativeOutcome,
        analysis: String,
        retained_documents: usize,
        excluded_documents: usize,
    ) -> Self {
        let violations: Vec<RuleId> = findings
            .iter()
            .map(|v| v.rule)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let outcome = if violations.is_empty() {
            VerdictOutcome::Approved
        } else {
            VerdictOutcome::Rejected
        };
        let feedback = findings
            .iter()
            .map(|v| v.detail.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            outcome,
            violations,
            feedback,
            narrative,
            analysis,
            retained_documents,
            excluded_documents,
        }
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Documents not older than `reference − staleness_days`, in batch order.
///
/// Undated documents cannot be shown to be stale and are kept.
pub fn retain_current(
    documents: &[SearchDocument],
    reference: TemporalReference,
    staleness_days: u64,
) -> Vec<&SearchDocument> {
    documents
        .iter()
        .filter(|d| match d.published() {
            Some(published) => !reference.is_stale(published, staleness_days),
            None => true,
        })
        .collect()
}

/// Checks that every [`ProvenanceCategory`] is represented.
pub fn check_triangulation(
    documents: &[&SearchDocument],
    catalog: &ProvenanceCatalog,
) -> Result<(), RuleViolation> {
    let present: BTreeSet<ProvenanceCategory> = documents
        .iter()
        .filter_map(|d| catalog.classify(d.provenance()))
        .collect();
    let missing: Vec<&str> = ProvenanceCategory::ALL
        .iter()
        .filter(|c| !present.contains(c))
        .map(|c| c.missing_phrase())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(RuleViolation {
            rule: RuleId::Triangulation,
            detail: missing.join(", "),
        })
    }
}

/// Maps the analyst narrative to a neutrality finding.
pub fn check_neutrality(narrative: &str, outcome: NarrativeOutcome) -> Result<(), RuleViolation> {
    match outcome {
        NarrativeOutcome::Approved => Ok(()),
        NarrativeOutcome::Rejected => {
            let quoted = narrative
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or_default();
            Err(RuleViolation {
                rule: RuleId::Neutrality,
                detail: format!(
                    "analyst rejected the evidence: {}",
                    excerpt(quoted, NARRATIVE_QUOTE_CHARS)
                ),
            })
        }
        NarrativeOutcome::Ambiguous => Err(RuleViolation {
            rule: RuleId::Neutrality,
            detail: "no clear verdict in the analyst narrative".to_string(),
        }),
    }
}

/// Evaluates a batch and the analyst narrative written about it.
///
/// When the temporal filter leaves no documents the verdict is a `temporal`
/// rejection and the narrative is not consulted.
pub fn evaluate(
    batch: &SearchBatch,
    reference: TemporalReference,
    narrative: &str,
    catalog: &ProvenanceCatalog,
    staleness_days: u64,
) -> Verdict {
    let retained = retain_current(&batch.documents, reference, staleness_days);
    let excluded = batch.documents.len() - retained.len();

    if retained.is_empty() {
        let detail = format!(
            "no documents published on or after {}",
            reference.staleness_threshold(staleness_days)
        );
        return Verdict::from_findings(
            vec![RuleViolation {
                rule: RuleId::Temporal,
                detail,
            }],
            NarrativeOutcome::Ambiguous,
            String::new(),
            0,
            excluded,
        );
    }

    let outcome = NarrativeOutcome::parse(narrative);
    let findings: Vec<RuleViolation> = [
        check_triangulation(&retained, catalog),
        check_numeric_consistency(narrative),
        check_neutrality(narrative, outcome),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect();

    Verdict::from_findings(findings, outcome, narrative.trim().to_string(), retained.len(), excluded)
}
