// ABOUTME: OpenAI API adapter implementing the AgentRuntime trait.
// ABOUTME: Translates AgentContext into Chat Completions calls with function tools, and proofreads via JSON mode.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use deckfix_core::{CorrectionKind, ElementId, Proposal};

use crate::context::{AgentContext, Exchange};
use crate::providers::{PROOFREAD_PROMPT, REVIEW_PROMPT, task_prompt};
use crate::runtime::{AgentAction, AgentError, AgentRuntime};
use crate::tools::all_tool_definitions;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o";
const MAX_TOKENS: u32 = 4096;
const PROOFREAD_TEMPERATURE: f64 = 0.1;

/// OpenAI runtime adapter. Calls the Chat Completions API with function
/// definitions and maps tool_calls responses back to AgentActions.
pub struct OpenAIRuntime {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIRuntime {
    /// Create a new OpenAIRuntime reading configuration from environment variables.
    /// Required: `OPENAI_API_KEY`
    /// Optional: `OPENAI_BASE_URL` (defaults to https://api.openai.com)
    /// Optional: `OPENAI_MODEL` (defaults to gpt-4o)
    pub fn from_env() -> Result<Self, AgentError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AgentError::Unauthorized("OPENAI_API_KEY not set".to_string()))?;

        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key, base_url, model))
    }

    /// Create a new OpenAIRuntime with explicit configuration.
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    /// Use a different model than the one configured.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Build the JSON request body for one step of the review loop.
    pub fn build_request_body(&self, context: &AgentContext) -> Value {
        let mut messages = vec![
            json!({
                "role": "system",
                "content": REVIEW_PROMPT
            }),
            json!({
                "role": "user",
                "content": task_prompt(&context.document, &context.output)
            }),
        ];

        for exchange in &context.exchanges {
            match exchange {
                Exchange::ToolResult {
                    call_id,
                    name,
                    arguments,
                    result,
                } => {
                    messages.push(assistant_tool_call(call_id, name, arguments));
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": call_id,
                        "content": result.to_string()
                    }));
                }
                Exchange::ToolError {
                    call_id,
                    name,
                    arguments,
                    error,
                } => {
                    messages.push(assistant_tool_call(call_id, name, arguments));
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": call_id,
                        "content": json!({ "error": error }).to_string()
                    }));
                }
                Exchange::Narration { text } => messages.push(json!({
                    "role": "assistant",
                    "content": text
                })),
                Exchange::Note { message } => messages.push(json!({
                    "role": "user",
                    "content": format!("[Error] {}", message)
                })),
            }
        }

        if !context.summary.is_empty() {
            messages.push(json!({
                "role": "user",
                "content": format!("[Current state]\n{}\n\nWhat is the next step?", context.summary)
            }));
        }

        json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": messages,
            "tools": build_openai_tools(),
            "tool_choice": "auto",
            "parallel_tool_calls": false
        })
    }

    /// Parse a Chat Completions response into an AgentAction. Only the first
    /// tool call is taken.
    pub fn parse_response(response_body: &Value) -> Result<AgentAction, AgentError> {
        let message = first_message(response_body)?;

        if let Some(tool_calls) = message.get("tool_calls").and_then(|t| t.as_array())
            && let Some(tool_call) = tool_calls.first()
        {
            return parse_openai_tool_call(tool_call);
        }

        if let Some(content) = message.get("content").and_then(|c| c.as_str())
            && !content.trim().is_empty()
        {
            return Ok(AgentAction::Narrate(content.to_string()));
        }

        Err(AgentError::InvalidResponse(
            "no tool call or content in response".to_string(),
        ))
    }

    /// Build the JSON-mode request that proofreads one paragraph.
    pub fn build_proofread_body(&self, text: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": PROOFREAD_PROMPT },
                { "role": "user", "content": format!("Analyze this text:\n\n\"{}\"", text) }
            ],
            "response_format": { "type": "json_object" },
            "temperature": PROOFREAD_TEMPERATURE
        })
    }

    /// Turn a proofreading response into at most one whole-paragraph proposal.
    pub fn parse_proofread(target: &ElementId, text: &str, response_body: &Value) -> Result<Vec<Proposal>, AgentError> {
        let content = first_message(response_body)?
            .get("content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| AgentError::InvalidResponse("proofread response has no content".to_string()))?;

        let result: ProofreadResult =
            extract_json(content).map_err(|e| AgentError::InvalidResponse(e.to_string()))?;

        let Some(corrected) = result.corrected_text.filter(|c| c != text && !c.trim().is_empty()) else {
            return Ok(Vec::new());
        };

        let kind = if result.errors_found.is_empty()
            || result
                .errors_found
                .iter()
                .any(|e| e.kind.parse::<CorrectionKind>() == Ok(CorrectionKind::Spelling))
        {
            CorrectionKind::Spelling
        } else {
            CorrectionKind::Grammar
        };
        let rationale = result
            .errors_found
            .iter()
            .map(|e| {
                if e.explanation.is_empty() {
                    format!("'{}' -> '{}'", e.original, e.correction)
                } else {
                    format!("'{}' -> '{}' ({})", e.original, e.correction, e.explanation)
                }
            })
            .collect::<Vec<_>>()
            .join("; ");

        Ok(vec![Proposal {
            target: *target,
            kind,
            original: text.to_string(),
            replacement: corrected,
            rationale: (!rationale.is_empty()).then_some(rationale),
        }])
    }

    async fn post(&self, body: &Value) -> Result<Value, AgentError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::ProviderError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &error_body));
        }

        response
            .json()
            .await
            .map_err(|e| AgentError::InvalidResponse(format!("failed to parse JSON: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct ProofreadResult {
    #[serde(default)]
    corrected_text: Option<String>,
    #[serde(default)]
    errors_found: Vec<FoundError>,
}

#[derive(Debug, Deserialize)]
struct FoundError {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    original: String,
    #[serde(default)]
    correction: String,
    #[serde(default)]
    explanation: String,
}

/// Map a non-success status to an error. Only 429 and 5xx are worth
/// retrying; other client errors are deterministic and go back to the loop
/// as invalid responses, except bad credentials which end the run.
fn status_error(status: reqwest::StatusCode, body: &str) -> AgentError {
    match status {
        reqwest::StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited,
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            AgentError::Unauthorized(format!("{}: check OPENAI_API_KEY", status))
        }
        s if s.is_server_error() => AgentError::ProviderError(format!("Server error: {}", s)),
        s => AgentError::InvalidResponse(format!("API error {}: {}", s, body)),
    }
}

fn first_message(response_body: &Value) -> Result<&Value, AgentError> {
    let choices = response_body
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| {
            AgentError::InvalidResponse("missing choices array in response".to_string())
        })?;

    let choice = choices
        .first()
        .ok_or_else(|| AgentError::InvalidResponse("empty choices array".to_string()))?;

    choice.get("message").ok_or_else(|| {
        AgentError::InvalidResponse("missing message in choice".to_string())
    })
}

fn assistant_tool_call(call_id: &str, name: &str, arguments: &str) -> Value {
    json!({
        "role": "assistant",
        "content": null,
        "tool_calls": [{
            "id": call_id,
            "type": "function",
            "function": { "name": name, "arguments": arguments }
        }]
    })
}

/// Convert tool definitions to OpenAI's function calling format.
fn build_openai_tools() -> Vec<Value> {
    all_tool_definitions()
        .into_iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.get("name").cloned().unwrap_or(Value::Null),
                    "description": tool.get("description").cloned().unwrap_or(Value::Null),
                    "parameters": tool.get("parameters").cloned().unwrap_or(json!({"type": "object"}))
                }
            })
        })
        .collect()
}

/// Parse a single tool_call. Argument validation is left to the tool registry.
fn parse_openai_tool_call(tool_call: &Value) -> Result<AgentAction, AgentError> {
    let function = tool_call.get("function").ok_or_else(|| {
        AgentError::InvalidResponse("tool_call missing function".to_string())
    })?;

    let name = function
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| AgentError::InvalidResponse("function missing name".to_string()))?;

    let arguments = function
        .get("arguments")
        .and_then(|a| a.as_str())
        .unwrap_or("{}");

    let call_id = tool_call
        .get("id")
        .and_then(|i| i.as_str())
        .unwrap_or_default();

    Ok(AgentAction::CallTool {
        call_id: call_id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    })
}

/// Parse JSON from model output: raw, inside code fences, or the outermost
/// brace-delimited span.
fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T, anyhow::Error> {
    if let Ok(result) = serde_json::from_str::<T>(text) {
        return Ok(result);
    }

    let stripped = strip_code_fences(text);
    if let Ok(result) = serde_json::from_str::<T>(&stripped) {
        return Ok(result);
    }

    let first_brace = text.find('{');
    let last_brace = text.rfind('}');
    if let (Some(start), Some(end)) = (first_brace, last_brace)
        && start < end
        && let Ok(result) = serde_json::from_str::<T>(&text[start..=end])
    {
        return Ok(result);
    }

    Err(anyhow::anyhow!("failed to parse model output as JSON"))
}

fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl AgentRuntime for OpenAIRuntime {
    async fn run_step(&self, context: &AgentContext) -> Result<AgentAction, AgentError> {
        let body = self.build_request_body(context);
        let response_body = self.post(&body).await?;
        Self::parse_response(&response_body)
    }

    async fn proofread(&self, target: &ElementId, text: &str) -> Result<Vec<Proposal>, AgentError> {
        let body = self.build_proofread_body(text);
        let response_body = self.post(&body).await?;
        Self::parse_proofread(target, text, &response_body)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
