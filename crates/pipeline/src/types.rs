//! Shared value types for the newsroom pipeline domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants and participate in domain computations.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Creates a [`Timestamp`] at midnight UTC of the given calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.and_time(NaiveTime::MIN).and_utc())
    }

    /// Parses the date formats emitted by search sources.
    ///
    /// Accepts RFC 3339 timestamps (`2025-11-30T08:15:00Z`) and plain
    /// `YYYY-MM-DD` dates. Anything else yields `None`.
    pub fn parse_published(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self(dt.with_timezone(&Utc)));
        }
        // Sources sometimes append a time to a bare date; the date part is enough.
        let date_part = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .ok()
            .map(Self::from_date)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Returns the UTC calendar date of this timestamp.
    pub fn date(self) -> NaiveDate {
        self.0.date_naive()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------

/// Default staleness window for temporal grounding (24 months).
pub const DEFAULT_STALENESS_DAYS: u64 = 730;

/// The "today" a session reasons about.
///
/// Threaded explicitly through every call instead of reading the system clock,
/// so grounding checks are deterministic and testable. Sessions started by the
/// transport layer use their creation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemporalReference(NaiveDate);

impl TemporalReference {
    /// Creates a reference from a calendar date.
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parses a `YYYY-MM-DD` date.
    pub fn parse(raw: &str) -> Option<Self> {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .ok()
            .map(Self)
    }

    /// Uses the calendar date of a timestamp as the reference.
    pub fn from_timestamp(ts: Timestamp) -> Self {
        Self(ts.date())
    }

    /// Returns the reference date.
    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// Oldest publish date still considered current: `reference − staleness_days`.
    pub fn staleness_threshold(self, staleness_days: u64) -> NaiveDate {
        self.0
            .checked_sub_days(Days::new(staleness_days))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Returns `true` if `published` is strictly older than the staleness threshold.
    pub fn is_stale(self, published: Timestamp, staleness_days: u64) -> bool {
        published.date() < self.staleness_threshold(staleness_days)
    }
}

impl std::fmt::Display for TemporalReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Returns at most `max_chars` characters of `text`, cut on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
