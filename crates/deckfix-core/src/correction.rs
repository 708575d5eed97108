// ABOUTME: Defines Correction (a recorded intent to replace one value on one element) and Proposal.
// ABOUTME: Proposals come out of analysis; they become Corrections only when added to the store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::element::ElementId;

/// What a correction fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionKind {
    Spelling,
    Grammar,
    Alignment,
}

impl CorrectionKind {
    pub const ALL: [CorrectionKind; 3] = [
        CorrectionKind::Spelling,
        CorrectionKind::Grammar,
        CorrectionKind::Alignment,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CorrectionKind::Spelling => "spelling",
            CorrectionKind::Grammar => "grammar",
            CorrectionKind::Alignment => "alignment",
        }
    }

    /// Spelling and grammar corrections rewrite paragraph text.
    pub fn is_text(&self) -> bool {
        !matches!(self, CorrectionKind::Alignment)
    }
}

impl fmt::Display for CorrectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CorrectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spelling" => Ok(CorrectionKind::Spelling),
            // proofreaders often report punctuation separately
            "grammar" | "punctuation" => Ok(CorrectionKind::Grammar),
            "alignment" => Ok(CorrectionKind::Alignment),
            other => Err(format!("unknown correction kind: {}", other)),
        }
    }
}

/// A suggested correction that has not been recorded yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub target: ElementId,
    pub kind: CorrectionKind,
    pub original: String,
    pub replacement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// A recorded correction. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub id: Ulid,
    pub target: ElementId,
    pub kind: CorrectionKind,
    pub original: String,
    pub replacement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Correction {
    pub fn new(proposal: Proposal) -> Self {
        Self {
            id: Ulid::new(),
            target: proposal.target,
            kind: proposal.kind,
            original: proposal.original,
            replacement: proposal.replacement,
            rationale: proposal.rationale,
        }
    }
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: '{}' -> '{}'",
            self.kind, self.target, self.original, self.replacement
        )
    }
}
