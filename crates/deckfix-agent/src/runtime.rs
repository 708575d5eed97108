// ABOUTME: Defines the AgentRuntime trait that all LLM provider adapters must implement.
// ABOUTME: Also defines AgentAction, AgentError, and the timeout/retry policy every model call goes through.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use deckfix_core::{ElementId, Proposal};

use crate::context::AgentContext;

/// What the model decided to do in a single reasoning step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentAction {
    /// Invoke a tool. `arguments` is the raw JSON text the model produced;
    /// it is validated by the tool registry, not by the provider.
    CallTool {
        call_id: String,
        name: String,
        arguments: String,
    },

    /// Plain text with no tool call.
    Narrate(String),
}

/// Errors that can occur while talking to a model.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Model call timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl AgentError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::ProviderError(_) | AgentError::RateLimited)
    }

    /// Failures the loop records and moves past instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AgentError::Timeout(_) | AgentError::InvalidResponse(_))
    }
}

/// Trait that all LLM provider adapters must implement. Each provider
/// translates AgentContext into API calls and parses responses into
/// AgentActions.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Execute one step of agent reasoning given the current context.
    async fn run_step(&self, context: &AgentContext) -> Result<AgentAction, AgentError>;

    /// Check `text` (the current value of `target`) for spelling and grammar
    /// errors. Returns spelling or grammar proposals only.
    async fn proofread(&self, target: &ElementId, text: &str) -> Result<Vec<Proposal>, AgentError>;

    /// Provider name for logging and display (e.g. "openai").
    fn provider_name(&self) -> &str;

    /// Model identifier being used (e.g. "gpt-4o").
    fn model_name(&self) -> &str;
}

/// Timeout and retry rules applied to every model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl ModelPolicy {
    /// Run `call` under the timeout, retrying retryable failures. A timeout
    /// is returned as `AgentError::Timeout` and is not retried.
    pub async fn call<T, F, Fut>(&self, what: &'static str, mut call: F) -> Result<T, AgentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(AgentError::Timeout(self.timeout)),
            };

            match result {
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(call = what, attempt, error = %err, "model call failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_retries: u32) -> ModelPolicy {
        ModelPolicy {
            timeout: Duration::from_millis(50),
            max_retries,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn agent_action_serde_round_trip() {
        let actions = vec![
            AgentAction::CallTool {
                call_id: "call_1".to_string(),
                name: "extract_slide_content".to_string(),
                arguments: "{\"slide_index\": 1}".to_string(),
            },
            AgentAction::Narrate("Looking at slide 2 next.".to_string()),
        ];

        for action in &actions {
            let json = serde_json::to_string(action).expect("serialize action");
            let back: AgentAction = serde_json::from_str(&json).expect("deserialize action");
            assert_eq!(&back, action);
        }
    }

    #[test]
    fn agent_error_classification() {
        assert!(AgentError::RateLimited.is_retryable());
        assert!(AgentError::ProviderError("502".to_string()).is_retryable());
        assert!(!AgentError::Unauthorized("bad key".to_string()).is_retryable());
        assert!(!AgentError::Timeout(Duration::from_secs(1)).is_retryable());

        assert!(AgentError::Timeout(Duration::from_secs(1)).is_recoverable());
        assert!(AgentError::InvalidResponse("no choices".to_string()).is_recoverable());
        assert!(!AgentError::RateLimited.is_recoverable());

        assert!(
            AgentError::Timeout(Duration::from_secs(60))
                .to_string()
                .contains("60s")
        );
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let calls = &AtomicU32::new(0);

        let result = policy(2)
            .call("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AgentError::RateLimited)
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), _> = policy(1)
            .call("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AgentError::ProviderError("503".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AgentError::ProviderError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), _> = policy(3)
            .call("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AgentError::Unauthorized("bad key".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AgentError::Unauthorized(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let result: Result<(), _> = policy(3)
            .call("test", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(AgentError::Timeout(_))));
    }
}
