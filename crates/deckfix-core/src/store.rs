// ABOUTME: CorrectionStore holds pending and applied corrections in discovery order.
// ABOUTME: apply() writes pending corrections into a Deck, grouped by target, reporting conflicts instead of failing.

use std::fmt;

use serde::Serialize;
use ulid::Ulid;

use crate::correction::{Correction, CorrectionKind, Proposal};
use crate::deck::Deck;
use crate::element::{ElementId, PositionValue};

/// Errors raised when a proposal cannot be recorded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} corrections must target a paragraph (s<slide>/sh<shape>/p<paragraph>), got {target}")]
    ParagraphRequired {
        kind: CorrectionKind,
        target: ElementId,
    },

    #[error("alignment value '{value}' is not '<x>,<y>' or '<x>'")]
    InvalidPosition { value: String },
}

/// Why a correction did not apply cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ConflictReason {
    /// The current value differed from the recorded original. The replacement
    /// was still written; `found` is the value it replaced.
    ValueMismatch { expected: String, found: String },
    /// No element with the target id exists in the deck.
    MissingTarget,
    /// The replacement could not be interpreted for this kind of correction.
    InvalidValue { value: String },
    /// The shape has no explicit position to move.
    MissingGeometry,
}

/// A non-fatal problem found while applying one correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub correction: Ulid,
    pub target: ElementId,
    #[serde(flatten)]
    pub reason: ConflictReason,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ConflictReason::ValueMismatch { expected, found } => write!(
                f,
                "{}: expected '{}' but found '{}'; applied against the current value",
                self.target, expected, found
            ),
            ConflictReason::MissingTarget => write!(f, "{}: no such element", self.target),
            ConflictReason::InvalidValue { value } => {
                write!(f, "{}: invalid replacement value '{}'", self.target, value)
            }
            ConflictReason::MissingGeometry => {
                write!(f, "{}: shape has no explicit position", self.target)
            }
        }
    }
}

/// Result of one apply pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Corrections taken from the pending list in this pass.
    pub processed: usize,
    /// Element values actually changed.
    pub writes: usize,
    pub conflicts: Vec<Conflict>,
}

enum Outcome {
    Written,
    Unchanged,
    Conflict { reason: ConflictReason, written: bool },
}

/// Ordered list of corrections: pending until applied, then moved to applied.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrectionStore {
    pending: Vec<Correction>,
    applied: Vec<Correction>,
}

impl CorrectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a proposal as a pending correction. Several corrections may
    /// target the same element; they are resolved in order at apply time.
    pub fn add(&mut self, proposal: Proposal) -> Result<&Correction, StoreError> {
        if proposal.kind.is_text() && !proposal.target.is_paragraph() {
            return Err(StoreError::ParagraphRequired {
                kind: proposal.kind,
                target: proposal.target,
            });
        }
        if proposal.kind == CorrectionKind::Alignment
            && proposal.replacement.parse::<PositionValue>().is_err()
        {
            return Err(StoreError::InvalidPosition {
                value: proposal.replacement,
            });
        }

        let correction = Correction::new(proposal);
        tracing::debug!(id = %correction.id, target = %correction.target, kind = %correction.kind, "correction recorded");
        self.pending.push(correction);
        Ok(&self.pending[self.pending.len() - 1])
    }

    pub fn pending(&self) -> &[Correction] {
        &self.pending
    }

    pub fn applied(&self) -> &[Correction] {
        &self.applied
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// Apply every pending correction to `deck` and mark it applied.
    ///
    /// Corrections are grouped by target (groups ordered by first appearance)
    /// and applied in insertion order within a group, so a later correction
    /// sees the value written by an earlier one. Mismatches never fail the
    /// pass; they are returned as conflicts. Calling this again with nothing
    /// pending is a no-op.
    pub fn apply(&mut self, deck: &mut Deck) -> ApplyReport {
        let pending = std::mem::take(&mut self.pending);
        let mut report = ApplyReport::default();

        let mut targets: Vec<ElementId> = Vec::new();
        for correction in &pending {
            if !targets.contains(&correction.target) {
                targets.push(correction.target);
            }
        }

        for target in &targets {
            for correction in pending.iter().filter(|c| &c.target == target) {
                report.processed += 1;
                let outcome = if correction.kind.is_text() {
                    apply_text(correction, deck)
                } else {
                    apply_alignment(correction, deck)
                };

                match outcome {
                    Outcome::Written => report.writes += 1,
                    Outcome::Unchanged => {}
                    Outcome::Conflict { reason, written } => {
                        if written {
                            report.writes += 1;
                        }
                        let conflict = Conflict {
                            correction: correction.id,
                            target: correction.target,
                            reason,
                        };
                        tracing::warn!(%conflict, "correction conflict");
                        report.conflicts.push(conflict);
                    }
                }
            }
        }

        self.applied.extend(pending);
        report
    }
}

fn apply_text(correction: &Correction, deck: &mut Deck) -> Outcome {
    let Some(element) = deck.element_mut(&correction.target) else {
        return Outcome::Conflict {
            reason: ConflictReason::MissingTarget,
            written: false,
        };
    };

    if element.text == correction.original {
        element.text = correction.replacement.clone();
        return Outcome::Written;
    }
    if element.text == correction.replacement {
        return Outcome::Unchanged;
    }
    if !correction.original.is_empty() && element.text.contains(&correction.original) {
        element.text = element
            .text
            .replace(&correction.original, &correction.replacement);
        return Outcome::Written;
    }

    let found = std::mem::replace(&mut element.text, correction.replacement.clone());
    Outcome::Conflict {
        reason: ConflictReason::ValueMismatch {
            expected: correction.original.clone(),
            found,
        },
        written: true,
    }
}

fn apply_alignment(correction: &Correction, deck: &mut Deck) -> Outcome {
    let Some(shape) = deck.shape_mut(&correction.target) else {
        return Outcome::Conflict {
            reason: ConflictReason::MissingTarget,
            written: false,
        };
    };
    let Ok(replacement) = correction.replacement.parse::<PositionValue>() else {
        return Outcome::Conflict {
            reason: ConflictReason::InvalidValue {
                value: correction.replacement.clone(),
            },
            written: false,
        };
    };
    let Some(bounds) = shape.bounds.as_mut() else {
        return Outcome::Conflict {
            reason: ConflictReason::MissingGeometry,
            written: false,
        };
    };

    let current = bounds.position();
    let target = replacement.resolve(current);
    if target == current {
        return Outcome::Unchanged;
    }
    bounds.move_to(target);

    match correction.original.parse::<PositionValue>() {
        Ok(original) if original.matches(current) => Outcome::Written,
        _ => Outcome::Conflict {
            reason: ConflictReason::ValueMismatch {
                expected: correction.original.clone(),
                found: current.to_string(),
            },
            written: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::{ShapeElement, Slide, TextElement};
    use crate::element::{Bounds, Position};

    fn deck_with_text(text: &str) -> Deck {
        let mut deck = Deck::new("deck.pptx");
        let mut slide = Slide::new(1, "ppt/slides/slide1.xml");
        slide.shapes.push(ShapeElement {
            id: ElementId::shape(1, 0),
            name: "Title 1".to_string(),
            placeholder: Some("title".to_string()),
            bounds: Some(Bounds {
                x: 100,
                y: 200,
                width: 5000,
                height: 800,
            }),
        });
        slide.elements.push(TextElement {
            id: ElementId::paragraph(1, 0, 0),
            shape_name: "Title 1".to_string(),
            text: text.to_string(),
        });
        deck.slides.push(slide);
        deck
    }

    fn text_proposal(original: &str, replacement: &str) -> Proposal {
        Proposal {
            target: ElementId::paragraph(1, 0, 0),
            kind: CorrectionKind::Spelling,
            original: original.to_string(),
            replacement: replacement.to_string(),
            rationale: None,
        }
    }

    fn text_of(deck: &Deck) -> &str {
        &deck.element(&ElementId::paragraph(1, 0, 0)).unwrap().text
    }

    #[test]
    fn add_then_apply_writes_replacement() {
        let mut deck = deck_with_text("Helo wrold");
        let mut store = CorrectionStore::new();
        store.add(text_proposal("Helo wrold", "Hello world")).unwrap();
        assert_eq!(store.pending_count(), 1);

        let report = store.apply(&mut deck);

        assert_eq!(text_of(&deck), "Hello world");
        assert_eq!(report.processed, 1);
        assert_eq!(report.writes, 1);
        assert!(report.conflicts.is_empty());
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.applied_count(), 1);
    }

    #[test]
    fn second_apply_is_a_no_op() {
        let mut deck = deck_with_text("Helo wrold");
        let mut store = CorrectionStore::new();
        store.add(text_proposal("Helo wrold", "Hello world")).unwrap();
        store.apply(&mut deck);
        let before = deck.clone();

        let report = store.apply(&mut deck);

        assert_eq!(report, ApplyReport::default());
        assert_eq!(deck, before);
        assert_eq!(store.applied_count(), 1, "applied at most once");
    }

    #[test]
    fn mismatch_applies_against_current_value_and_records_conflict() {
        let mut deck = deck_with_text("Helo");
        let mut store = CorrectionStore::new();
        store.add(text_proposal("Helo", "Hello")).unwrap();
        // external edit after the correction was recorded
        deck.element_mut(&ElementId::paragraph(1, 0, 0)).unwrap().text = "Hxllo".to_string();

        let report = store.apply(&mut deck);

        assert_eq!(text_of(&deck), "Hello");
        assert_eq!(report.writes, 1);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(
            report.conflicts[0].reason,
            ConflictReason::ValueMismatch {
                expected: "Helo".to_string(),
                found: "Hxllo".to_string(),
            }
        );
    }

    #[test]
    fn fragment_original_is_replaced_in_place() {
        let mut deck = deck_with_text("Teh quick fox and teh dog");
        let mut store = CorrectionStore::new();
        store.add(text_proposal("teh", "the")).unwrap();

        let report = store.apply(&mut deck);

        assert_eq!(text_of(&deck), "Teh quick fox and the dog");
        assert!(report.conflicts.is_empty());
    }

    #[test]
    fn later_correction_on_same_target_sees_earlier_write() {
        let mut deck = deck_with_text("Helo wrold");
        let mut store = CorrectionStore::new();
        store.add(text_proposal("Helo wrold", "Hello wrold")).unwrap();
        store.add(text_proposal("Hello wrold", "Hello world")).unwrap();

        let report = store.apply(&mut deck);

        assert_eq!(text_of(&deck), "Hello world");
        assert_eq!(report.writes, 2);
        assert!(report.conflicts.is_empty());
    }

    #[test]
    fn duplicate_correction_is_unchanged_not_conflict() {
        let mut deck = deck_with_text("Helo");
        let mut store = CorrectionStore::new();
        store.add(text_proposal("Helo", "Hello")).unwrap();
        store.add(text_proposal("Helo", "Hello")).unwrap();

        let report = store.apply(&mut deck);

        assert_eq!(report.processed, 2);
        assert_eq!(report.writes, 1);
        assert!(report.conflicts.is_empty());
    }

    #[test]
    fn missing_target_is_reported_without_write() {
        let mut deck = deck_with_text("Helo");
        let mut store = CorrectionStore::new();
        let mut proposal = text_proposal("x", "y");
        proposal.target = ElementId::paragraph(9, 0, 0);
        store.add(proposal).unwrap();

        let report = store.apply(&mut deck);

        assert_eq!(report.writes, 0);
        assert_eq!(report.conflicts[0].reason, ConflictReason::MissingTarget);
        assert_eq!(store.applied_count(), 1);
    }

    #[test]
    fn text_kinds_require_paragraph_targets() {
        let mut store = CorrectionStore::new();
        let mut proposal = text_proposal("a", "b");
        proposal.target = ElementId::shape(1, 0);
        let err = store.add(proposal).unwrap_err();
        assert!(matches!(err, StoreError::ParagraphRequired { .. }));
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn alignment_moves_shape_and_checks_original() {
        let mut deck = deck_with_text("Title");
        let mut store = CorrectionStore::new();
        store
            .add(Proposal {
                target: ElementId::shape(1, 0),
                kind: CorrectionKind::Alignment,
                original: "100,200".to_string(),
                replacement: "300".to_string(),
                rationale: None,
            })
            .unwrap();
        store
            .add(Proposal {
                target: ElementId::shape(1, 0),
                kind: CorrectionKind::Alignment,
                original: "100,200".to_string(),
                replacement: "300,50".to_string(),
                rationale: None,
            })
            .unwrap();

        let report = store.apply(&mut deck);

        let bounds = deck.shape(&ElementId::shape(1, 0)).unwrap().bounds.unwrap();
        assert_eq!(bounds.position(), Position { x: 300, y: 50 });
        assert_eq!(report.writes, 2);
        assert_eq!(report.conflicts.len(), 1, "second correction saw 300,200");
    }

    #[test]
    fn alignment_rejects_unparseable_replacement() {
        let mut store = CorrectionStore::new();
        let err = store
            .add(Proposal {
                target: ElementId::shape(1, 0),
                kind: CorrectionKind::Alignment,
                original: "1,2".to_string(),
                replacement: "left".to_string(),
                rationale: None,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPosition { .. }));
    }

    #[test]
    fn alignment_without_geometry_is_a_conflict() {
        let mut deck = deck_with_text("Title");
        deck.shape_mut(&ElementId::shape(1, 0)).unwrap().bounds = None;
        let mut store = CorrectionStore::new();
        store
            .add(Proposal {
                target: ElementId::shape(1, 0),
                kind: CorrectionKind::Alignment,
                original: "1,2".to_string(),
                replacement: "3,4".to_string(),
                rationale: None,
            })
            .unwrap();

        let report = store.apply(&mut deck);

        assert_eq!(report.writes, 0);
        assert_eq!(report.conflicts[0].reason, ConflictReason::MissingGeometry);
    }
}
