//! Best-effort arithmetic sanity check for staged-process statistics.
//!
//! Narratives about tournaments and similar staged processes tend to state
//! figures that must agree: "12 groups of 4 teams, 2 advance per group, 24 go
//! to the next round". The extraction here is pattern matching over English
//! and Spanish phrasing, not language understanding. A narrative without
//! extractable figures always passes.

use std::sync::LazyLock;

use regex::Regex;

use super::{RuleId, RuleViolation};

static GROUPS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+)\s+(?:groups?|grupos)\s+(?:of|de)\s+(\d+)\b").expect("groups regex")
});

static PER_GROUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d+)\s+(?:teams?\s+|equipos\s+)?(?:advance|advancing|qualify|qualifying|progress|go\s+through|clasifican|avanzan|pasan)\s+(?:per|from\s+each|from\s+every|in\s+each|por(?:\s+cada)?)\s+(?:group|grupo)\b",
    )
    .expect("per-group regex")
});

static TOP_PER_GROUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:top\s+(\d+)\s+(?:teams?\s+)?(?:of|from|in)\s+each\s+group|los\s+(\d+)\s+primeros\s+de\s+cada\s+grupo)\b")
        .expect("top-per-group regex")
});

static EXTRA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(\d+)\s+best\s+(?:third|second|fourth)[- ]placed|(\d+)\s+mejores\s+(?:terceros|segundos|cuartos))\b")
        .expect("best-placed regex")
});

static NEXT_ROUND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d+)\s+(?:teams?\s+|equipos\s+)?(?:will\s+)?(?:go|advance|move|progress|qualify|pass|pasan|avanzan|clasifican)\s+(?:on\s+)?(?:to|into|for|a)\s+(?:the\s+|la\s+)?(?:next|following|siguiente)\s+(?:round|stage|ronda|fase)\b",
    )
    .expect("next-round regex")
});

static ROUND_OF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:advance|go|move|progress|qualify)\s+(?:on\s+)?to\s+the\s+round\s+of\s+(\d+)\b")
        .expect("round-of regex")
});

static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(\d+)[- ]team\s+(?:tournament|competition|format|field|event)|(\d+)\s+teams\s+(?:will\s+)?(?:take\s+part|compete|participate)|(\d+)\s+(?:equipos|selecciones)\s+participantes)\b",
    )
    .expect("field regex")
});

/// Trailing words that scope a "teams compete" count to a single group.
static GROUP_SCOPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s+(?:(?:in|from|within)\s+(?:each|every)\s+group|per\s+group|(?:en|de)\s+cada\s+grupo|por\s+grupo)\b")
        .expect("group scope regex")
});

/// Figures extracted from one narrative. Only the first occurrence of each
/// figure is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagedProcessFigures {
    /// `(group count, group size)` from "N groups of K".
    pub groups: Option<(u64, u64)>,
    /// Entrants advancing from each group.
    pub per_group_advancing: Option<u64>,
    /// Extra entrants advancing as best-placed runners-up.
    pub extra_advancing: u64,
    /// Total entrants said to reach the next round.
    pub next_round_total: Option<u64>,
    /// Total entrants in the competition.
    pub field_size: Option<u64>,
}

fn captured_number(caps: &regex::Captures<'_>) -> Option<u64> {
    caps.iter()
        .skip(1)
        .flatten()
        .find_map(|m| m.as_str().parse().ok())
}

fn first_number(re: &Regex, text: &str) -> Option<u64> {
    re.captures(text).and_then(|caps| captured_number(&caps))
}

/// First field-size mention that is not about the teams inside one group.
fn field_size(text: &str) -> Option<u64> {
    FIELD_RE
        .captures_iter(text)
        .filter(|caps| {
            let end = caps.get(0).map_or(text.len(), |m| m.end());
            !GROUP_SCOPE_RE.is_match(&text[end..])
        })
        .find_map(|caps| captured_number(&caps))
}

/// Extracts staged-process figures from free text.
pub fn extract_figures(text: &str) -> StagedProcessFigures {
    let groups = GROUPS_RE.captures(text).and_then(|caps| {
        let count = caps.get(1)?.as_str().parse().ok()?;
        let size = caps.get(2)?.as_str().parse().ok()?;
        Some((count, size))
    });
    StagedProcessFigures {
        groups,
        per_group_advancing: first_number(&PER_GROUP_RE, text)
            .or_else(|| first_number(&TOP_PER_GROUP_RE, text)),
        extra_advancing: first_number(&EXTRA_RE, text).unwrap_or(0),
        next_round_total: first_number(&NEXT_ROUND_RE, text)
            .or_else(|| first_number(&ROUND_OF_RE, text)),
        field_size: field_size(text),
    }
}

/// Checks that the extracted figures agree with each other.
pub fn check_numeric_consistency(text: &str) -> Result<(), RuleViolation> {
    let figures = extract_figures(text);
    let violation = |detail: String| RuleViolation {
        rule: RuleId::NumericConsistency,
        detail,
    };

    if let (Some((count, size)), Some(field)) = (figures.groups, figures.field_size) {
        let expected = count.saturating_mul(size);
        if expected != field {
            return Err(violation(format!(
                "{count} groups of {size} make {expected} entrants, but the narrative says {field}"
            )));
        }
    }

    if let (Some((_, size)), Some(advancing)) = (figures.groups, figures.per_group_advancing) {
        if advancing > size {
            return Err(violation(format!(
                "{advancing} cannot advance from groups of {size}"
            )));
        }
    }

    if let (Some((count, _)), Some(advancing), Some(total)) = (
        figures.groups,
        figures.per_group_advancing,
        figures.next_round_total,
    ) {
        let expected = count
            .saturating_mul(advancing)
            .saturating_add(figures.extra_advancing);
        if expected != total {
            let extra = if figures.extra_advancing > 0 {
                format!(" + {} best-placed", figures.extra_advancing)
            } else {
                String::new()
            };
            return Err(violation(format!(
                "{count} groups × {advancing} advancing{extra} = {expected}, but the narrative says {total} go to the next round"
            )));
        }
    }

    Ok(())
}
