// ABOUTME: Executes validated tool calls against the run state, the document adapter and the model.
// ABOUTME: Each handler returns a JSON result for the model; only document I/O and hard model failures are fatal.

use std::path::Path;

use serde_json::{Value, json};
use tracing::{debug, info};

use deckfix_core::{AgentState, ApplyReport, CorrectionKind, Deck, DocumentAdapter, ElementId, Proposal, alignment};

use crate::runtime::{AgentRuntime, ModelPolicy};
use crate::tools::{ToolCall, ToolError};

/// Everything a handler may touch besides the run state.
#[derive(Clone, Copy)]
pub struct ToolEnv<'a> {
    pub document: &'a dyn DocumentAdapter,
    pub runtime: &'a dyn AgentRuntime,
    pub input: &'a Path,
    pub output: &'a Path,
    pub policy: ModelPolicy,
}

/// Run one tool call. Calls after the review is marked complete are refused.
pub async fn execute(call: ToolCall, state: &mut AgentState, env: &ToolEnv<'_>) -> Result<Value, ToolError> {
    if state.is_complete() {
        return Err(ToolError::AlreadyComplete);
    }

    match call {
        ToolCall::ExtractSlideContent { slide_index } => extract_slide_content(state, env, slide_index),
        ToolCall::AnalyzeTextForErrors { element_id, text } => analyze_text_for_errors(env, element_id, &text).await,
        ToolCall::AnalyzeAlignment { slide_index } => analyze_alignment(state, env, slide_index),
        ToolCall::AddCorrection(proposal) => add_correction(state, proposal),
        ToolCall::ApplyAllCorrections => {
            let report = apply_all(state, env)?;
            Ok(json!({
                "processed": report.processed,
                "writes": report.writes,
                "conflicts": report.conflicts,
                "applied_total": state.corrections.applied_count(),
                "output_path": env.output.display().to_string(),
            }))
        }
        ToolCall::MarkComplete => {
            state.mark_complete();
            info!(pending = state.corrections.pending_count(), "review marked complete");
            Ok(json!({
                "complete": true,
                "pending_corrections": state.corrections.pending_count(),
            }))
        }
    }
}

/// Apply every pending correction and persist the deck to the output path.
/// Used both by the tool and by the loop's final flush.
pub fn apply_all(state: &mut AgentState, env: &ToolEnv<'_>) -> Result<ApplyReport, ToolError> {
    let mut deck = take_deck(state, env)?;
    let report = state.corrections.apply(&mut deck);
    let written = env.document.write(&deck, env.output);
    state.deck = Some(deck);
    written?;

    state.conflicts.extend(report.conflicts.iter().cloned());
    info!(
        processed = report.processed,
        writes = report.writes,
        conflicts = report.conflicts.len(),
        output = %env.output.display(),
        "applied corrections"
    );
    Ok(report)
}

fn take_deck(state: &mut AgentState, env: &ToolEnv<'_>) -> Result<Deck, ToolError> {
    match state.deck.take() {
        Some(deck) => Ok(deck),
        None => {
            let deck = env.document.read(env.input)?;
            info!(path = %env.input.display(), slides = deck.slide_count(), "loaded deck");
            Ok(deck)
        }
    }
}

fn loaded_deck<'s>(state: &'s mut AgentState, env: &ToolEnv<'_>) -> Result<&'s Deck, ToolError> {
    let deck = take_deck(state, env)?;
    Ok(state.deck.insert(deck))
}

fn check_slide(deck: &Deck, slide_index: Option<usize>) -> Result<(), ToolError> {
    match slide_index {
        Some(index) if index == 0 || index > deck.slide_count() => Err(ToolError::OutOfRange {
            index,
            count: deck.slide_count(),
        }),
        _ => Ok(()),
    }
}

fn extract_slide_content(
    state: &mut AgentState,
    env: &ToolEnv<'_>,
    slide_index: Option<usize>,
) -> Result<Value, ToolError> {
    let deck = loaded_deck(state, env)?;
    check_slide(deck, slide_index)?;

    let slides: Vec<_> = deck
        .slides
        .iter()
        .filter(|s| slide_index.is_none_or(|i| s.index == i))
        .collect();
    let indices: Vec<usize> = slides.iter().map(|s| s.index).collect();
    let result = json!({
        "slide_count": deck.slide_count(),
        "slides": slides
            .iter()
            .map(|s| json!({
                "slide_index": s.index,
                "elements": s.elements.iter().map(|e| json!({
                    "element_id": e.id,
                    "shape": e.shape_name,
                    "text": e.text,
                })).collect::<Vec<_>>(),
            }))
            .collect::<Vec<_>>(),
    });

    debug!(slides = ?indices, "extracted slide content");
    state.mark_analyzed(indices);
    Ok(result)
}

async fn analyze_text_for_errors(env: &ToolEnv<'_>, element_id: ElementId, text: &str) -> Result<Value, ToolError> {
    let runtime = env.runtime;
    let target = &element_id;
    let proposals: Vec<Proposal> = env
        .policy
        .call("proofread", move || runtime.proofread(target, text))
        .await?
        .into_iter()
        .filter(|p| p.kind != CorrectionKind::Alignment)
        .collect();

    debug!(target = %element_id, proposals = proposals.len(), "proofread text");
    Ok(json!({
        "element_id": element_id,
        "has_errors": !proposals.is_empty(),
        "proposals": proposals,
    }))
}

fn analyze_alignment(state: &mut AgentState, env: &ToolEnv<'_>, slide_index: Option<usize>) -> Result<Value, ToolError> {
    let deck = loaded_deck(state, env)?;
    check_slide(deck, slide_index)?;

    let standard = alignment::standard(deck);
    let proposals = alignment::propose(deck, slide_index);
    debug!(slide = ?slide_index, proposals = proposals.len(), "analyzed alignment");

    Ok(json!({
        "standard": standard,
        "proposals": proposals,
    }))
}

fn add_correction(state: &mut AgentState, proposal: Proposal) -> Result<Value, ToolError> {
    let correction = state.corrections.add(proposal)?;
    debug!(correction = %correction, "recorded correction");
    let id = correction.id.to_string();

    Ok(json!({
        "correction_id": id,
        "pending_corrections": state.corrections.pending_count(),
    }))
}
