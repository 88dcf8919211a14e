//! Pipeline tuning parameters.
//!
//! Loaded by the composition root (TOML file plus environment overrides) and
//! handed to the orchestrator by value. Every field has a default, so an empty
//! `[pipeline]` table is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::verification::ProvenanceCatalog;
use crate::{NewsroomError, TierCatalog, DEFAULT_STALENESS_DAYS};

/// Upper bound of `results_per_source` accepted by search collaborators.
pub const MAX_RESULTS_PER_SOURCE: usize = 20;

/// Tuning parameters for one executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Research/verify passes before the session fails.
    pub max_iterations: u32,
    /// Documents taken from each source per search (1..=20).
    pub results_per_source: usize,
    /// Single ceiling for one fan-out search.
    pub search_timeout_secs: u64,
    /// Ceiling for one reasoning attempt; also the per-iteration share of the
    /// session deadline.
    pub stage_timeout_secs: u64,
    /// Reasoning attempts per stage, including the first.
    pub reasoning_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Documents older than this many days before the reference date are stale.
    pub staleness_days: u64,
    pub provenance: ProvenanceCatalog,
    pub tiers: TierCatalog,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            results_per_source: 5,
            search_timeout_secs: 120,
            stage_timeout_secs: 180,
            reasoning_attempts: 3,
            retry_base_delay_ms: 2_000,
            retry_max_delay_ms: 60_000,
            staleness_days: DEFAULT_STALENESS_DAYS,
            provenance: ProvenanceCatalog::default(),
            tiers: TierCatalog::default(),
        }
    }
}

impl PipelineConfig {
    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), NewsroomError> {
        let fail = |message: String| Err(NewsroomError::ConfigurationError { message });
        if self.max_iterations == 0 {
            return fail("max_iterations must be at least 1".into());
        }
        if !(1..=MAX_RESULTS_PER_SOURCE).contains(&self.results_per_source) {
            return fail(format!(
                "results_per_source must be between 1 and {MAX_RESULTS_PER_SOURCE}, got {}",
                self.results_per_source
            ));
        }
        if self.search_timeout_secs == 0 {
            return fail("search_timeout_secs must be positive".into());
        }
        if self.stage_timeout_secs == 0 {
            return fail("stage_timeout_secs must be positive".into());
        }
        if self.reasoning_attempts == 0 {
            return fail("reasoning_attempts must be at least 1".into());
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return fail(format!(
                "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            ));
        }
        Ok(())
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    /// Global wall-clock ceiling for a session: `max_iterations × stage_timeout`.
    pub fn session_deadline(&self, max_iterations: u32) -> Duration {
        self.stage_timeout().saturating_mul(max_iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.staleness_days, 730);
        assert_eq!(config.session_deadline(3), Duration::from_secs(540));
    }

    #[test]
    fn test_results_per_source_bounds() {
        let mut config = PipelineConfig::default();
        config.results_per_source = 0;
        assert!(config.validate().is_err());
        config.results_per_source = 21;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("between 1 and 20"));
        config.results_per_source = 20;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_iterations_is_rejected() {
        let config = PipelineConfig {
            max_iterations: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(NewsroomError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"max_iterations": 5}"#).unwrap();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.results_per_source, 5);
        assert_eq!(config.tiers, TierCatalog::default());
    }
}
