// ABOUTME: The closed set of review tools: names, typed calls parsed from model JSON, and their JSON schemas.
// ABOUTME: Unknown names and malformed arguments are rejected here, before any handler runs.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Value, json};

use deckfix_core::{CorrectionKind, DocumentError, ElementId, Proposal, StoreError};

use crate::runtime::AgentError;

/// Every tool the model may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ExtractSlideContent,
    AnalyzeTextForErrors,
    AnalyzeAlignment,
    AddCorrection,
    ApplyAllCorrections,
    MarkComplete,
}

impl ToolName {
    pub const ALL: [ToolName; 6] = [
        ToolName::ExtractSlideContent,
        ToolName::AnalyzeTextForErrors,
        ToolName::AnalyzeAlignment,
        ToolName::AddCorrection,
        ToolName::ApplyAllCorrections,
        ToolName::MarkComplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ExtractSlideContent => "extract_slide_content",
            ToolName::AnalyzeTextForErrors => "analyze_text_for_errors",
            ToolName::AnalyzeAlignment => "analyze_alignment",
            ToolName::AddCorrection => "add_correction",
            ToolName::ApplyAllCorrections => "apply_all_corrections",
            ToolName::MarkComplete => "mark_complete",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

/// Errors from validating or executing a tool call.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: ToolName, message: String },

    #[error("slide {index} is out of range; the deck has {count} slides")]
    OutOfRange { index: usize, count: usize },

    #[error("correction rejected: {0}")]
    Rejected(#[from] StoreError),

    #[error("model call failed: {0}")]
    Model(#[from] AgentError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("the review is already marked complete")]
    AlreadyComplete,
}

impl ToolError {
    /// Fatal errors end the run; everything else is reported back to the model.
    pub fn is_fatal(&self) -> bool {
        match self {
            ToolError::Document(_) => true,
            ToolError::Model(err) => !err.is_recoverable(),
            _ => false,
        }
    }
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    ExtractSlideContent { slide_index: Option<usize> },
    AnalyzeTextForErrors { element_id: ElementId, text: String },
    AnalyzeAlignment { slide_index: Option<usize> },
    AddCorrection(Proposal),
    ApplyAllCorrections,
    MarkComplete,
}

#[derive(Debug, Default, Deserialize)]
struct SlideArgs {
    #[serde(default)]
    slide_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeTextArgs {
    element_id: ElementId,
    text: String,
}

#[derive(Debug, Deserialize)]
struct AddCorrectionArgs {
    target_id: ElementId,
    kind: String,
    original: String,
    replacement: String,
    #[serde(default)]
    rationale: Option<String>,
}

impl ToolCall {
    /// Validate a call by name and raw JSON arguments. Empty arguments are
    /// treated as `{}`.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolError> {
        let tool: ToolName = name.parse()?;
        let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
        let invalid = |message: String| ToolError::InvalidArguments { tool, message };

        let call = match tool {
            ToolName::ExtractSlideContent => {
                let args: SlideArgs = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
                ToolCall::ExtractSlideContent {
                    slide_index: args.slide_index,
                }
            }
            ToolName::AnalyzeTextForErrors => {
                let args: AnalyzeTextArgs = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
                ToolCall::AnalyzeTextForErrors {
                    element_id: args.element_id,
                    text: args.text,
                }
            }
            ToolName::AnalyzeAlignment => {
                let args: SlideArgs = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
                ToolCall::AnalyzeAlignment {
                    slide_index: args.slide_index,
                }
            }
            ToolName::AddCorrection => {
                let args: AddCorrectionArgs = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
                let kind = listed_kind(&args.kind).ok_or_else(|| {
                    invalid(format!(
                        "kind must be one of {}, got '{}'",
                        CorrectionKind::ALL.map(|k| k.label()).join(", "),
                        args.kind
                    ))
                })?;
                ToolCall::AddCorrection(Proposal {
                    target: args.target_id,
                    kind,
                    original: args.original,
                    replacement: args.replacement,
                    rationale: args.rationale,
                })
            }
            ToolName::ApplyAllCorrections => ToolCall::ApplyAllCorrections,
            ToolName::MarkComplete => ToolCall::MarkComplete,
        };

        Ok(call)
    }

    pub fn name(&self) -> ToolName {
        match self {
            ToolCall::ExtractSlideContent { .. } => ToolName::ExtractSlideContent,
            ToolCall::AnalyzeTextForErrors { .. } => ToolName::AnalyzeTextForErrors,
            ToolCall::AnalyzeAlignment { .. } => ToolName::AnalyzeAlignment,
            ToolCall::AddCorrection(_) => ToolName::AddCorrection,
            ToolCall::ApplyAllCorrections => ToolName::ApplyAllCorrections,
            ToolCall::MarkComplete => ToolName::MarkComplete,
        }
    }
}

/// Only the kinds named in the add_correction schema. Aliases accepted
/// elsewhere (such as "punctuation" from proofreading) are refused here.
fn listed_kind(value: &str) -> Option<CorrectionKind> {
    CorrectionKind::ALL
        .into_iter()
        .find(|k| k.label().eq_ignore_ascii_case(value.trim()))
}

/// Return the complete set of tool definitions the model can use.
/// These are provider-agnostic JSON schemas; each provider adapter
/// reformats them to match its API's tool format.
pub fn all_tool_definitions() -> Vec<Value> {
    ToolName::ALL.into_iter().map(tool_definition).collect()
}

fn tool_definition(tool: ToolName) -> Value {
    let (description, parameters) = match tool {
        ToolName::ExtractSlideContent => (
            "Extract the text paragraphs of one slide, or of every slide when slide_index is omitted. Each paragraph comes with its element_id.",
            slide_index_parameters("1-based slide number. Omit to extract every slide."),
        ),
        ToolName::AnalyzeTextForErrors => (
            "Use the proofreader to check one paragraph for spelling and grammar errors. Returns proposed corrections; nothing is recorded until add_correction is called.",
            json!({
                "type": "object",
                "properties": {
                    "element_id": {
                        "type": "string",
                        "description": "Paragraph id as returned by extract_slide_content, e.g. s1/sh0/p0."
                    },
                    "text": {
                        "type": "string",
                        "description": "The paragraph's current text."
                    }
                },
                "required": ["element_id", "text"]
            }),
        ),
        ToolName::AnalyzeAlignment => (
            "Compare title and body positions against the deck's most common positions. Returns alignment proposals for one slide, or for all slides when slide_index is omitted.",
            slide_index_parameters("1-based slide number. Omit to check every slide."),
        ),
        ToolName::AddCorrection => (
            "Record a correction to apply later. Spelling and grammar corrections target a paragraph id (s1/sh0/p0) and replace its text; alignment corrections target a shape id (s1/sh0) and use an 'x,y' or 'x' position in EMU.",
            json!({
                "type": "object",
                "properties": {
                    "target_id": {
                        "type": "string",
                        "description": "Element id of the paragraph or shape to correct."
                    },
                    "kind": {
                        "type": "string",
                        "enum": CorrectionKind::ALL.map(|k| k.label()),
                        "description": "What the correction fixes."
                    },
                    "original": {
                        "type": "string",
                        "description": "The current text or position."
                    },
                    "replacement": {
                        "type": "string",
                        "description": "The corrected text or position."
                    },
                    "rationale": {
                        "type": "string",
                        "description": "Why this correction is needed."
                    }
                },
                "required": ["target_id", "kind", "original", "replacement"]
            }),
        ),
        ToolName::ApplyAllCorrections => (
            "Apply every pending correction and save the corrected presentation. Safe to call more than once.",
            no_parameters(),
        ),
        ToolName::MarkComplete => (
            "Mark the review as finished. Call this once all slides are checked and corrections are applied.",
            no_parameters(),
        ),
    };

    json!({
        "name": tool.as_str(),
        "description": description,
        "parameters": parameters
    })
}

fn slide_index_parameters(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "slide_index": {
                "type": "integer",
                "minimum": 1,
                "description": description
            }
        },
        "required": []
    })
}

fn no_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_tools_are_defined_once() {
        let tools = all_tool_definitions();
        assert_eq!(tools.len(), 6);

        let names: Vec<&str> = tools
            .iter()
            .map(|t| t.get("name").and_then(|n| n.as_str()).unwrap())
            .collect();
        for tool in ToolName::ALL {
            assert_eq!(names.iter().filter(|n| **n == tool.as_str()).count(), 1);
        }
        for tool in &tools {
            assert!(tool.get("description").and_then(|d| d.as_str()).is_some());
            assert_eq!(tool["parameters"]["type"], "object");
        }
    }

    #[test]
    fn tool_names_round_trip_through_strings() {
        for tool in ToolName::ALL {
            assert_eq!(tool.as_str().parse::<ToolName>().unwrap(), tool);
        }
        assert!(matches!(
            "delete_slide".parse::<ToolName>(),
            Err(ToolError::UnknownTool(name)) if name == "delete_slide"
        ));
    }

    #[test]
    fn parses_calls_with_and_without_arguments() {
        assert_eq!(
            ToolCall::parse("extract_slide_content", "").unwrap(),
            ToolCall::ExtractSlideContent { slide_index: None }
        );
        assert_eq!(
            ToolCall::parse("analyze_alignment", r#"{"slide_index": 3}"#).unwrap(),
            ToolCall::AnalyzeAlignment { slide_index: Some(3) }
        );
        assert_eq!(
            ToolCall::parse("mark_complete", "{}").unwrap(),
            ToolCall::MarkComplete
        );
        assert_eq!(
            ToolCall::parse("analyze_text_for_errors", r#"{"element_id": "s2/sh1/p0", "text": "Helo"}"#).unwrap(),
            ToolCall::AnalyzeTextForErrors {
                element_id: ElementId::paragraph(2, 1, 0),
                text: "Helo".to_string()
            }
        );
    }

    #[test]
    fn parses_add_correction_into_a_proposal() {
        let call = ToolCall::parse(
            "add_correction",
            r#"{"target_id": "s1/sh0/p0", "kind": "Grammar", "original": "Hi,", "replacement": "Hi."}"#,
        )
        .unwrap();

        assert_eq!(call.name(), ToolName::AddCorrection);
        match call {
            ToolCall::AddCorrection(p) => {
                assert_eq!(p.target, ElementId::paragraph(1, 0, 0));
                assert_eq!(p.kind, CorrectionKind::Grammar);
                assert_eq!(p.rationale, None);
            }
            other => panic!("expected AddCorrection, got {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_arguments() {
        let cases = [
            ("add_correction", r#"{"target_id": "s1/sh0/p0"}"#),
            ("add_correction", r#"{"target_id": "slide one", "kind": "spelling", "original": "a", "replacement": "b"}"#),
            ("add_correction", r#"{"target_id": "s1/sh0/p0", "kind": "tone", "original": "a", "replacement": "b"}"#),
            ("add_correction", r#"{"target_id": "s1/sh0/p0", "kind": "punctuation", "original": "a", "replacement": "b"}"#),
            ("extract_slide_content", r#"{"slide_index": -1}"#),
            ("analyze_text_for_errors", "not json"),
        ];

        for (name, args) in cases {
            let err = ToolCall::parse(name, args).unwrap_err();
            assert!(
                matches!(err, ToolError::InvalidArguments { .. }),
                "{} {} gave {:?}",
                name,
                args,
                err
            );
            assert!(!err.is_fatal());
        }
    }

    #[test]
    fn only_io_and_hard_model_failures_are_fatal() {
        assert!(!ToolError::UnknownTool("x".to_string()).is_fatal());
        assert!(!ToolError::OutOfRange { index: 9, count: 2 }.is_fatal());
        assert!(!ToolError::Model(AgentError::Timeout(std::time::Duration::from_secs(1))).is_fatal());
        assert!(ToolError::Model(AgentError::Unauthorized("key".to_string())).is_fatal());
        assert!(
            ToolError::Document(DocumentError::Xml {
                part: "ppt/slides/slide1.xml".to_string(),
                message: "bad".to_string()
            })
            .is_fatal()
        );
    }
}
