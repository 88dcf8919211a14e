//! Parsing of the analyst's free-text verdict.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What the analyst narrative concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeOutcome {
    Approved,
    Rejected,
    /// Neither or both verdicts were found.
    Ambiguous,
}

static VERDICT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s*#>_-]*(?:final\s+)?(?:verdict|veredicto)(?:\s+final)?[\s*_]*:[\s*_]*(.+)$")
        .expect("verdict line regex")
});

static REJECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:rejected|rechazad[oa]|requires?\s+corrections|requiere\s+correcciones|(?:not|no)\s+approved|no\s+aprobad[oa]|disapproved|desaprobad[oa]|unapproved)\b",
    )
    .expect("rejection regex")
});

static APPROVAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:approved|aprobad[oa])\b").expect("approval regex"));

impl NarrativeOutcome {
    /// Parses a narrative.
    ///
    /// An explicit `VERDICT:` / `VEREDICTO:` line decides on its own. Without
    /// one, the whole text is approved only if it contains an approval keyword
    /// and no rejection keyword. Negated approvals ("NO APROBADO",
    /// "DISAPPROVED") count as rejections.
    pub fn parse(narrative: &str) -> Self {
        if let Some(caps) = VERDICT_LINE_RE.captures(narrative) {
            let line = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let outcome = Self::from_keywords(line);
            if outcome != NarrativeOutcome::Ambiguous {
                return outcome;
            }
        }
        Self::from_keywords(narrative)
    }

    fn from_keywords(text: &str) -> Self {
        if REJECTION_RE.is_match(text) {
            NarrativeOutcome::Rejected
        } else if APPROVAL_RE.is_match(text) {
            NarrativeOutcome::Approved
        } else {
            NarrativeOutcome::Ambiguous
        }
    }
}
