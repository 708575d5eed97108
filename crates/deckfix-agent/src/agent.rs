// ABOUTME: The bounded review loop: ask the model for one action, validate and dispatch it, repeat.
// ABOUTME: Ends on mark_complete, on the iteration cap or on a fatal error, and always flushes pending corrections.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use deckfix_core::{AgentState, Conflict, DocumentAdapter, corrected_path};

use crate::config::AgentConfig;
use crate::context::{AgentContext, Exchange};
use crate::handlers::{self, ToolEnv};
use crate::runtime::{AgentAction, AgentRuntime};
use crate::tools::{ToolCall, ToolError};

/// How a review run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The model called `mark_complete` and the deck was saved.
    Success {
        output_path: PathBuf,
        corrections_applied: usize,
        conflicts: Vec<Conflict>,
        iterations: u32,
    },

    /// The iteration cap was reached first. Pending corrections were still saved.
    Capped {
        output_path: PathBuf,
        corrections_applied: usize,
        conflicts: Vec<Conflict>,
        iterations: u32,
    },

    /// A fatal error ended the run. `state` is the run state at that point.
    Failure {
        reason: String,
        iteration: u32,
        state: Box<AgentState>,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }

    pub fn output_path(&self) -> Option<&Path> {
        match self {
            RunOutcome::Success { output_path, .. } | RunOutcome::Capped { output_path, .. } => Some(output_path),
            RunOutcome::Failure { .. } => None,
        }
    }
}

/// Why the loop stopped, before the final flush.
#[derive(Debug, PartialEq, Eq)]
enum LoopExit {
    Completed,
    Capped,
    Aborted(String),
}

/// Drives one model through the review loop over one document.
pub struct Agent {
    runtime: Arc<dyn AgentRuntime>,
    document: Arc<dyn DocumentAdapter>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(runtime: Arc<dyn AgentRuntime>, document: Arc<dyn DocumentAdapter>, config: AgentConfig) -> Self {
        Self {
            runtime,
            document,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Review the deck at `input`, making at most `max_iterations` model
    /// calls. Corrections are saved next to the input with a `_corrected`
    /// suffix.
    pub async fn run(&self, input: &Path, max_iterations: u32) -> RunOutcome {
        let output = corrected_path(input);
        let env = ToolEnv {
            document: self.document.as_ref(),
            runtime: self.runtime.as_ref(),
            input,
            output: &output,
            policy: self.config.policy(),
        };
        let mut state = AgentState::new();
        let mut context = AgentContext::new(input.display().to_string(), output.display().to_string());

        tracing::info!(
            input = %input.display(),
            provider = self.runtime.provider_name(),
            model = self.runtime.model_name(),
            max_iterations,
            "starting review"
        );

        let exit = run_loop(&mut state, &mut context, &env, max_iterations).await;

        if let LoopExit::Aborted(reason) = exit {
            tracing::error!(iteration = state.iteration, error = %reason, "review aborted");
            return RunOutcome::Failure {
                reason,
                iteration: state.iteration,
                state: Box::new(state),
            };
        }

        if let Err(err) = handlers::apply_all(&mut state, &env) {
            tracing::error!(iteration = state.iteration, error = %err, "final save failed");
            return RunOutcome::Failure {
                reason: err.to_string(),
                iteration: state.iteration,
                state: Box::new(state),
            };
        }

        let corrections_applied = state.corrections.applied_count();
        let conflicts = std::mem::take(&mut state.conflicts);
        let iterations = state.iteration;
        tracing::info!(
            iterations,
            corrections_applied,
            conflicts = conflicts.len(),
            output = %output.display(),
            complete = exit == LoopExit::Completed,
            "review finished"
        );

        match exit {
            LoopExit::Completed => RunOutcome::Success {
                output_path: output,
                corrections_applied,
                conflicts,
                iterations,
            },
            _ => RunOutcome::Capped {
                output_path: output,
                corrections_applied,
                conflicts,
                iterations,
            },
        }
    }
}

async fn run_loop(
    state: &mut AgentState,
    context: &mut AgentContext,
    env: &ToolEnv<'_>,
    max_iterations: u32,
) -> LoopExit {
    while !state.is_complete() && state.iteration < max_iterations {
        context.refresh_summary(state);
        tracing::info!(iteration = state.iteration + 1, "requesting next action");

        let runtime = env.runtime;
        let ctx: &AgentContext = context;
        let action = env.policy.call("run_step", move || runtime.run_step(ctx)).await;

        match action {
            Ok(AgentAction::CallTool {
                call_id,
                name,
                arguments,
            }) => {
                if let Err(reason) = dispatch(state, context, env, call_id, name, arguments).await {
                    return LoopExit::Aborted(reason);
                }
            }
            Ok(AgentAction::Narrate(text)) => {
                tracing::warn!(iteration = state.iteration + 1, "model answered without a tool call");
                context.record(Exchange::Narration { text });
            }
            Err(err) if err.is_recoverable() => {
                tracing::warn!(iteration = state.iteration + 1, error = %err, "model call failed");
                context.record(Exchange::Note {
                    message: err.to_string(),
                });
            }
            Err(err) => return LoopExit::Aborted(err.to_string()),
        }

        state.iteration += 1;
    }

    if state.is_complete() {
        LoopExit::Completed
    } else {
        tracing::warn!(max_iterations, "iteration cap reached before the review was marked complete");
        LoopExit::Capped
    }
}

/// Validate and run one tool call, recording the outcome. Returns the
/// failure reason when the error is fatal.
async fn dispatch(
    state: &mut AgentState,
    context: &mut AgentContext,
    env: &ToolEnv<'_>,
    call_id: String,
    name: String,
    arguments: String,
) -> Result<(), String> {
    let outcome: Result<Value, ToolError> = match ToolCall::parse(&name, &arguments) {
        Ok(call) => {
            tracing::info!(iteration = state.iteration + 1, tool = %call.name(), "calling tool");
            handlers::execute(call, state, env).await
        }
        Err(err) => Err(err),
    };

    match outcome {
        Ok(result) => {
            tracing::debug!(tool = %name, result = %result, "tool succeeded");
            context.record(Exchange::ToolResult {
                call_id,
                name,
                arguments,
                result,
            });
            Ok(())
        }
        Err(err) if err.is_fatal() => Err(err.to_string()),
        Err(err) => {
            tracing::warn!(tool = %name, error = %err, "tool call rejected");
            context.record(Exchange::ToolError {
                call_id,
                name,
                arguments,
                error: err.to_string(),
            });
            Ok(())
        }
    }
}
