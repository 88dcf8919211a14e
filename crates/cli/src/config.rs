//! `newsroom.toml` loading and environment overrides.
//!
//! ```toml
//! [pipeline]
//! max_iterations = 3
//!
//! [llm]
//! base_url = "http://127.0.0.1:11434/v1"
//! model = "ralf-mixed-model"
//!
//! [search]
//! base_url = "http://127.0.0.1:5000"
//!
//! [telemetry]
//! otlp_endpoint = "http://127.0.0.1:4317"
//! ```
//!
//! Environment variables win over the file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use llm::LlmSettings;
use pipeline::{NewsroomError, PipelineConfig};
use search::SearchSettings;
use serde::{Deserialize, Serialize};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "newsroom.toml";

/// Span export settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// OTLP/gRPC collector. Spans are only exported when this is set.
    pub otlp_endpoint: Option<String>,
}

/// Everything the binary reads from `newsroom.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub pipeline: PipelineConfig,
    pub llm: LlmSettings,
    pub search: SearchSettings,
    pub telemetry: TelemetrySettings,
}

impl CliConfig {
    /// Loads the file (if any), applies process environment overrides and validates.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match resolve_path(path) {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read configuration file {}", path.display()))?;
                Self::from_toml(&raw).with_context(|| format!("invalid configuration file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document; missing tables and keys take their defaults.
    pub fn from_toml(raw: &str) -> Result<Self, NewsroomError> {
        toml::from_str(raw).map_err(|e| NewsroomError::ConfigurationError { message: e.to_string() })
    }

    /// Applies overrides read through `lookup`. Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), NewsroomError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get("RALF_PROXY_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = get("RALF_MODEL_NAME") {
            self.llm.model = model;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get("SCRAPER_BASE_URL") {
            self.search.base_url = url;
        }
        if let Some(raw) = get("SCRAPER_MAX_RESULTS") {
            self.pipeline.results_per_source = parse_number("SCRAPER_MAX_RESULTS", &raw)?;
        }
        if let Some(raw) = get("NEWSROOM_MAX_ITERATIONS") {
            self.pipeline.max_iterations = parse_number("NEWSROOM_MAX_ITERATIONS", &raw)?;
        }
        if let Some(endpoint) = get("OTEL_EXPORTER_OTLP_ENDPOINT") {
            self.telemetry.otlp_endpoint = Some(endpoint);
        }
        Ok(())
    }

    /// Rejects settings the adapters or the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), NewsroomError> {
        self.pipeline.validate()?;
        if self.llm.base_url.trim().is_empty() {
            return Err(NewsroomError::ConfigurationError {
                message: "llm.base_url must not be empty".into(),
            });
        }
        if self.llm.model.trim().is_empty() {
            return Err(NewsroomError::ConfigurationError {
                message: "llm.model must not be empty".into(),
            });
        }
        if self.search.base_url.trim().is_empty() {
            return Err(NewsroomError::ConfigurationError {
                message: "search.base_url must not be empty".into(),
            });
        }
        Ok(())
    }
}

fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.is_file().then_some(default)
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, NewsroomError> {
    raw.parse().map_err(|_| NewsroomError::ConfigurationError {
        message: format!("{key} must be a non-negative integer, got '{raw}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = CliConfig::from_toml("").unwrap();
        assert_eq!(config, CliConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_tables_keep_other_defaults() {
        let config = CliConfig::from_toml(
            r#"
            [pipeline]
            max_iterations = 5
            staleness_days = 365

            [llm]
            model = "gpt-4o-mini"

            [search]
            sources = []
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.max_iterations, 5);
        assert_eq!(config.pipeline.staleness_days, 365);
        assert_eq!(config.pipeline.results_per_source, 5);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.base_url, LlmSettings::default().base_url);
        assert!(config.search.sources.is_empty());
        assert_eq!(config.telemetry.otlp_endpoint, None);
    }

    #[test]
    fn test_unreadable_toml_is_configuration_error() {
        let err = CliConfig::from_toml("[pipeline\nmax_iterations = 2").unwrap_err();
        assert!(matches!(err, NewsroomError::ConfigurationError { .. }));
    }

    #[test]
    fn test_environment_overrides_file_values() {
        let mut config = CliConfig::default();
        config
            .apply_overrides(env(&[
                ("RALF_PROXY_URL", "http://proxy:8080/v1"),
                ("RALF_MODEL_NAME", "mixtral"),
                ("OPENAI_API_KEY", "sk-test"),
                ("SCRAPER_BASE_URL", "http://scraper:5000"),
                ("SCRAPER_MAX_RESULTS", "8"),
                ("NEWSROOM_MAX_ITERATIONS", "2"),
                ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317"),
            ]))
            .unwrap();
        assert_eq!(config.llm.base_url, "http://proxy:8080/v1");
        assert_eq!(config.llm.model, "mixtral");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.search.base_url, "http://scraper:5000");
        assert_eq!(config.pipeline.results_per_source, 8);
        assert_eq!(config.pipeline.max_iterations, 2);
        assert_eq!(config.telemetry.otlp_endpoint.as_deref(), Some("http://collector:4317"));
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let mut config = CliConfig::default();
        config.apply_overrides(env(&[("RALF_MODEL_NAME", "  ")])).unwrap();
        assert_eq!(config.llm.model, LlmSettings::default().model);
    }

    #[test]
    fn test_non_numeric_override_is_rejected() {
        let mut config = CliConfig::default();
        let err = config
            .apply_overrides(env(&[("NEWSROOM_MAX_ITERATIONS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("NEWSROOM_MAX_ITERATIONS"));
    }

    #[test]
    fn test_validation_rejects_out_of_range_results() {
        let mut config = CliConfig::default();
        config.apply_overrides(env(&[("SCRAPER_MAX_RESULTS", "50")])).unwrap();
        assert!(matches!(
            config.validate(),
            Err(NewsroomError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_blank_endpoints() {
        let mut config = CliConfig::default();
        config.search.base_url = " ".into();
        assert!(config.validate().unwrap_err().to_string().contains("search.base_url"));
    }
}
