//! Bounded retry around reasoning-service calls.
//!
//! Each attempt is capped by the stage timeout. Retryable failures back off
//! exponentially (`base × 2^(attempt−1)`, capped at the maximum delay) unless
//! the error carries its own hint. Non-retryable failures end the loop at once.

use std::time::Duration;

use pipeline::{NewsroomError, PipelineConfig, ReasoningError, ReasoningService, RetryPolicy, RoleContext, Stage};
use tracing::{debug, warn};

/// Retry schedule for one reasoning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Attempts including the first; at least 1.
    pub attempts: u32,
    pub attempt_timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Reads attempts, stage timeout and backoff bounds from `config`.
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            attempts: config.reasoning_attempts.max(1),
            attempt_timeout: config.stage_timeout(),
            base_delay: config.retry_base_delay(),
            max_delay: config.retry_max_delay(),
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// The last error of an exhausted or aborted retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningFailure {
    pub error: ReasoningError,
    /// Attempts made, including the first.
    pub attempts: u32,
}

impl ReasoningFailure {
    /// Converts into the session-level error for the stage that failed.
    pub fn into_newsroom_error(self, stage: Stage) -> NewsroomError {
        match self.error {
            ReasoningError::ServiceTimeout { .. } => NewsroomError::ServiceTimeout {
                stage,
                attempts: self.attempts,
            },
            ReasoningError::ServiceError { message, .. } => NewsroomError::ServiceError { stage, message },
        }
    }
}

/// Calls the reasoning service with the same inputs until it succeeds, the
/// error is not retryable, or the attempt budget is spent.
pub async fn complete_with_retry(
    service: &dyn ReasoningService,
    role: &RoleContext,
    prompt: &str,
    config: &RetryConfig,
) -> Result<String, ReasoningFailure> {
    let attempts = config.attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(config.attempt_timeout, service.complete(role, prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ReasoningError::ServiceTimeout {
                after: config.attempt_timeout,
            }),
        };

        let error = match result {
            Ok(text) => {
                debug!(role = %role.role, attempt, "Reasoning call succeeded");
                return Ok(text);
            }
            Err(error) => error,
        };

        let delay = match error.retry_policy() {
            RetryPolicy::Retryable { after } if attempt < attempts => {
                after.unwrap_or_else(|| config.backoff(attempt)).min(config.max_delay)
            }
            policy => {
                warn!(
                    role = %role.role,
                    attempt,
                    retryable = policy.is_retryable(),
                    error = %error,
                    "Reasoning call failed; giving up"
                );
                return Err(ReasoningFailure { error, attempts: attempt });
            }
        };

        warn!(
            role = %role.role,
            attempt,
            max_attempts = attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Reasoning call failed; retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedReasoning;
    use pipeline::AgentRole;

    fn config() -> RetryConfig {
        RetryConfig {
            attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }

    fn role() -> RoleContext {
        RoleContext::new(AgentRole::Writer, "write")
    }

    fn status(code: u16) -> ReasoningError {
        ReasoningError::ServiceError {
            message: format!("HTTP {code}"),
            status: Some(code),
            retry_after: None,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = config();
        assert_eq!(config.backoff(1), Duration::from_secs(2));
        assert_eq!(config.backoff(2), Duration::from_secs(4));
        assert_eq!(config.backoff(3), Duration::from_secs(8));
        assert_eq!(config.backoff(10), Duration::from_secs(60));
        assert_eq!(config.backoff(40), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let service = ScriptedReasoning::new()
            .push(AgentRole::Writer, Err(status(503)))
            .push(AgentRole::Writer, Err(status(429)))
            .push(AgentRole::Writer, Ok("draft".into()));
        let text = complete_with_retry(&service, &role(), "p", &config()).await.unwrap();
        assert_eq!(text, "draft");
        assert_eq!(service.calls(AgentRole::Writer), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let service = ScriptedReasoning::new().push(AgentRole::Writer, Err(status(400)));
        let failure = complete_with_retry(&service, &role(), "p", &config()).await.unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(service.calls(AgentRole::Writer), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_service_times_out_each_attempt() {
        let service = ScriptedReasoning::new().with_delay(Duration::from_secs(30));
        let failure = complete_with_retry(&service, &role(), "p", &config()).await.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(
            failure.clone().into_newsroom_error(Stage::Write),
            NewsroomError::ServiceTimeout {
                stage: Stage::Write,
                attempts: 3
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_is_honoured() {
        let service = ScriptedReasoning::new()
            .push(
                AgentRole::Writer,
                Err(ReasoningError::ServiceError {
                    message: "rate limited".into(),
                    status: Some(429),
                    retry_after: Some(Duration::from_secs(7)),
                }),
            )
            .push(AgentRole::Writer, Ok("ok".into()));
        let started = tokio::time::Instant::now();
        complete_with_retry(&service, &role(), "p", &config()).await.unwrap();
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(7) && waited < Duration::from_secs(8), "{waited:?}");
    }
}
