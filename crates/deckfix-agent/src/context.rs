// ABOUTME: Provides AgentContext, the view of a run that is handed to the model on every step.
// ABOUTME: Holds the document under review, a state summary and the transcript of prior exchanges.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use deckfix_core::AgentState;

use crate::tools::ToolName;

/// One entry of the run transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Exchange {
    /// A tool call that ran and produced a result.
    ToolResult {
        call_id: String,
        name: String,
        arguments: String,
        result: Value,
    },

    /// A tool call that was rejected or failed recoverably.
    ToolError {
        call_id: String,
        name: String,
        arguments: String,
        error: String,
    },

    /// Text the model produced instead of a tool call.
    Narration { text: String },

    /// A problem with the model call itself, such as a timeout.
    Note { message: String },
}

/// Contextual information provided to the model for each reasoning step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentContext {
    /// Path of the presentation being reviewed, for display.
    pub document: String,
    /// Where corrections will be saved, for display.
    pub output: String,
    pub summary: String,
    pub exchanges: Vec<Exchange>,
}

impl AgentContext {
    pub fn new(document: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    /// Rebuild the summary from the current state of the run.
    pub fn refresh_summary(&mut self, state: &AgentState) {
        let analyzed = if state.analyzed.is_empty() {
            "none".to_string()
        } else {
            state
                .analyzed
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let slides = match &state.deck {
            Some(deck) => deck.slide_count().to_string(),
            None => "not loaded yet".to_string(),
        };

        self.summary = format!(
            "Iteration: {}\nSlides in deck: {}\nSlides analyzed: {}\nPending corrections: {}\nApplied corrections: {}\nAvailable tools: {}",
            state.iteration + 1,
            slides,
            analyzed,
            state.corrections.pending_count(),
            state.corrections.applied_count(),
            ToolName::ALL.map(|t| t.as_str()).join(", "),
        );
    }

    pub fn record(&mut self, exchange: Exchange) {
        self.exchanges.push(exchange);
    }

    pub fn last_exchange(&self) -> Option<&Exchange> {
        self.exchanges.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckfix_core::{CorrectionKind, ElementId, Proposal};

    #[test]
    fn summary_reflects_state() {
        let mut state = AgentState::new();
        state.iteration = 2;
        state.mark_analyzed([2, 1]);
        state
            .corrections
            .add(Proposal {
                target: ElementId::paragraph(1, 0, 0),
                kind: CorrectionKind::Spelling,
                original: "Helo".to_string(),
                replacement: "Hello".to_string(),
                rationale: None,
            })
            .unwrap();

        let mut ctx = AgentContext::new("deck.pptx", "deck_corrected.pptx");
        ctx.refresh_summary(&state);

        assert!(ctx.summary.contains("Iteration: 3"), "{}", ctx.summary);
        assert!(ctx.summary.contains("Slides analyzed: 1, 2"));
        assert!(ctx.summary.contains("Slides in deck: not loaded yet"));
        assert!(ctx.summary.contains("Pending corrections: 1"));
        assert!(ctx.summary.contains("Applied corrections: 0"));
        for tool in ToolName::ALL {
            assert!(ctx.summary.contains(tool.as_str()));
        }
    }

    #[test]
    fn exchanges_serialize_with_kind_tag() {
        let exchange = Exchange::Note {
            message: "model call timed out".to_string(),
        };
        let json = serde_json::to_value(&exchange).unwrap();
        assert_eq!(json["kind"], "note");

        let mut ctx = AgentContext::new("deck.pptx", "out.pptx");
        ctx.record(exchange.clone());
        assert_eq!(ctx.last_exchange(), Some(&exchange));
    }
}
