// ABOUTME: Agent library for deckfix: a bounded tool-calling loop that reviews and corrects slide decks.
// ABOUTME: Provides the runtime trait, LLM providers, the tool registry and handlers, and configuration.

pub mod agent;
pub mod config;
pub mod context;
pub mod handlers;
pub mod providers;
pub mod runtime;
pub mod testing;
pub mod tools;

pub use agent::{Agent, RunOutcome};
pub use config::{AgentConfig, ConfigError};
pub use runtime::{AgentAction, AgentError, AgentRuntime, ModelPolicy};
pub use tools::{ToolCall, ToolError, ToolName};
