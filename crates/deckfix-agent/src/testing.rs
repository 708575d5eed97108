// ABOUTME: Test utilities for deckfix-agent, including a scripted model runtime.
// ABOUTME: Used in tests to drive the review loop without real API calls.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use ulid::Ulid;

use deckfix_core::{CorrectionKind, ElementId, Proposal};

use crate::context::AgentContext;
use crate::runtime::{AgentAction, AgentError, AgentRuntime};

/// Build a tool call action with a fresh call id.
pub fn tool_call(name: &str, arguments: Value) -> AgentAction {
    AgentAction::CallTool {
        call_id: format!("call_{}", Ulid::new()),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

/// A runtime that replays a fixed script of step results.
///
/// Once the script runs out, the fallback action (if any) is returned on
/// every further step; without one the runtime narrates that it has nothing
/// left to do. Proofreading answers come from a text -> corrected map.
#[derive(Debug, Default)]
pub struct ScriptedRuntime {
    script: Mutex<VecDeque<Result<AgentAction, AgentError>>>,
    fallback: Option<AgentAction>,
    proofreads: HashMap<String, String>,
    delay: Option<Duration>,
    steps: AtomicUsize,
    contexts: Mutex<Vec<AgentContext>>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an action for the next unanswered step.
    pub fn then(self, action: AgentAction) -> Self {
        self.push(Ok(action))
    }

    /// Queue a failure for the next unanswered step.
    pub fn then_fail(self, error: AgentError) -> Self {
        self.push(Err(error))
    }

    /// Return `action` forever once the script is exhausted.
    pub fn repeating(mut self, action: AgentAction) -> Self {
        self.fallback = Some(action);
        self
    }

    /// Answer proofreading of exactly `text` with `corrected`.
    pub fn with_proofread(mut self, text: &str, corrected: &str) -> Self {
        self.proofreads.insert(text.to_string(), corrected.to_string());
        self
    }

    /// Sleep this long before answering any call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `run_step` calls made so far.
    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    /// Every context passed to `run_step`, in call order.
    pub fn contexts(&self) -> Vec<AgentContext> {
        self.contexts.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn push(self, step: Result<AgentAction, AgentError>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
        self
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn run_step(&self, context: &AgentContext) -> Result<AgentAction, AgentError> {
        self.steps.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut contexts) = self.contexts.lock() {
            contexts.push(context.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(step) => step,
            None => Ok(self
                .fallback
                .clone()
                .unwrap_or_else(|| AgentAction::Narrate("Nothing left to do.".to_string()))),
        }
    }

    async fn proofread(&self, target: &ElementId, text: &str) -> Result<Vec<Proposal>, AgentError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(self
            .proofreads
            .get(text)
            .map(|corrected| Proposal {
                target: *target,
                kind: CorrectionKind::Spelling,
                original: text.to_string(),
                replacement: corrected.clone(),
                rationale: Some("scripted".to_string()),
            })
            .into_iter()
            .collect())
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replays_script_then_fallback() {
        let runtime = ScriptedRuntime::new()
            .then(tool_call("extract_slide_content", json!({})))
            .then_fail(AgentError::RateLimited)
            .repeating(AgentAction::Narrate("still thinking".to_string()));
        let ctx = AgentContext::new("deck.pptx", "deck_corrected.pptx");

        assert!(matches!(
            runtime.run_step(&ctx).await,
            Ok(AgentAction::CallTool { ref name, .. }) if name == "extract_slide_content"
        ));
        assert!(matches!(runtime.run_step(&ctx).await, Err(AgentError::RateLimited)));
        for _ in 0..3 {
            assert_eq!(
                runtime.run_step(&ctx).await.unwrap(),
                AgentAction::Narrate("still thinking".to_string())
            );
        }
        assert_eq!(runtime.steps(), 5);
        assert_eq!(runtime.contexts().len(), 5);
    }

    #[tokio::test]
    async fn proofread_answers_only_known_text() {
        let runtime = ScriptedRuntime::new().with_proofread("Helo", "Hello");
        let target = ElementId::paragraph(1, 0, 0);

        let found = runtime.proofread(&target, "Helo").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].replacement, "Hello");
        assert_eq!(found[0].target, target);

        assert!(runtime.proofread(&target, "Fine").await.unwrap().is_empty());
    }

    #[test]
    fn tool_calls_get_unique_ids() {
        let a = tool_call("mark_complete", json!({}));
        let b = tool_call("mark_complete", json!({}));
        assert_ne!(a, b);
    }
}
