//! OpenAI-compatible chat-completions provider.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{AgentRole, ReasoningError, ReasoningService, RoleContext};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Sampling parameters for one agent role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoleSampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Connection and sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL up to and including the version segment, e.g. `http://127.0.0.1:11434/v1`.
    pub base_url: String,
    pub model: String,
    /// Sent as a bearer token when present.
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub researcher: RoleSampling,
    pub analyst: RoleSampling,
    pub writer: RoleSampling,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434/v1".to_string(),
            model: "ralf-mixed-model".to_string(),
            api_key: None,
            request_timeout_secs: 120,
            researcher: RoleSampling {
                temperature: 0.3,
                max_tokens: 2000,
            },
            analyst: RoleSampling {
                temperature: 0.5,
                max_tokens: 2000,
            },
            writer: RoleSampling {
                temperature: 0.8,
                max_tokens: 3000,
            },
        }
    }
}

impl LlmSettings {
    /// Sampling parameters used for `role`.
    pub fn sampling(&self, role: AgentRole) -> RoleSampling {
        match role {
            AgentRole::Researcher => self.researcher,
            AgentRole::Analyst => self.analyst,
            AgentRole::Writer => self.writer,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_request<'a>(settings: &'a LlmSettings, role: &'a RoleContext, prompt: &'a str) -> ChatRequest<'a> {
    let sampling = settings.sampling(role.role);
    ChatRequest {
        model: &settings.model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: &role.instructions,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ],
        temperature: sampling.temperature,
        max_tokens: sampling.max_tokens,
    }
}

fn parse_completion(body: &str) -> Result<String, ReasoningError> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|e| ReasoningError::ServiceError {
        message: format!("unreadable completion response: {e}"),
        status: Some(StatusCode::OK.as_u16()),
        retry_after: None,
    })?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| ReasoningError::ServiceError {
            message: "completion response has no content".to_string(),
            status: Some(StatusCode::OK.as_u16()),
            retry_after: None,
        })
}

/// Reads a `Retry-After` header given in seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// [`ReasoningService`] backed by a chat-completions endpoint.
pub struct OpenAiCompatibleProvider {
    client: Client,
    settings: LlmSettings,
}

impl OpenAiCompatibleProvider {
    /// Builds the HTTP client; no request is sent until the first completion.
    pub fn new(settings: LlmSettings) -> Result<Self, ReasoningError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| ReasoningError::ServiceError {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                retry_after: None,
            })?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }
}

#[async_trait]
impl ReasoningService for OpenAiCompatibleProvider {
    async fn complete(&self, role: &RoleContext, prompt: &str) -> Result<String, ReasoningError> {
        let request = build_request(&self.settings, role, prompt);
        let mut builder = self.client.post(self.settings.endpoint()).json(&request);
        if let Some(key) = self.settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }

        debug!(role = %role.role, model = %self.settings.model, "Sending completion request");
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ReasoningError::ServiceTimeout {
                    after: self.settings.request_timeout(),
                }
            } else {
                ReasoningError::service(format!("transport error: {e}"))
            }
        })?;

        let status = response.status();
        let hint = retry_after(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| ReasoningError::service(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            warn!(role = %role.role, status = status.as_u16(), "Completion request rejected");
            return Err(ReasoningError::ServiceError {
                message: format!("HTTP {}: {}", status.as_u16(), pipeline::excerpt(body.trim(), 200)),
                status: Some(status.as_u16()),
                retry_after: hint,
            });
        }

        parse_completion(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_request_uses_role_sampling() {
        let settings = LlmSettings::default();
        let role = RoleContext::new(AgentRole::Writer, "write news");
        let request = build_request(&settings, &role, "topic");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "ralf-mixed-model");
        assert_eq!(json["max_tokens"], 3000);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "write news");
        assert_eq!(json["messages"][1]["content"], "topic");
        assert!((json["temperature"].as_f64().unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let settings = LlmSettings {
            base_url: "http://proxy:11434/v1/".into(),
            ..LlmSettings::default()
        };
        assert_eq!(settings.endpoint(), "http://proxy:11434/v1/chat/completions");
    }

    #[test]
    fn test_parse_completion_takes_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  VERDICT: APPROVED \n"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "VERDICT: APPROVED");
    }

    #[test]
    fn test_parse_completion_errors_are_not_retryable() {
        let err = parse_completion(r#"{"choices":[]}"#).unwrap_err();
        assert!(!err.retry_policy().is_retryable());
        let err = parse_completion("not json").unwrap_err();
        assert!(!err.retry_policy().is_retryable());
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(12)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_settings_deserialise_with_defaults() {
        let settings: LlmSettings = serde_json::from_str(r#"{"model":"gpt-4o-mini"}"#).unwrap();
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.request_timeout(), Duration::from_secs(120));
        assert_eq!(settings.sampling(AgentRole::Researcher).temperature, 0.3);
    }
}
