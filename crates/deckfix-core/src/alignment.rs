// ABOUTME: Derives the deck's standard title and body positions and proposes moves for outliers.
// ABOUTME: The standard is the most common value across slides; ties go to the value seen first.

use serde::Serialize;

use crate::correction::{CorrectionKind, Proposal};
use crate::deck::{Deck, ShapeElement, ShapeRole, Slide};
use crate::element::{Position, PositionValue};

/// Positions most titles and single bodies in the deck agree on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlignmentStandard {
    pub title: Option<Position>,
    pub body_left: Option<i64>,
}

/// Compute the standard positions from every slide in the deck.
pub fn standard(deck: &Deck) -> AlignmentStandard {
    let title_positions: Vec<Position> = deck
        .slides
        .iter()
        .flat_map(|s| s.shapes_with_role(ShapeRole::Title))
        .filter_map(|s| s.bounds.map(|b| b.position()))
        .collect();

    let body_lefts: Vec<i64> = deck
        .slides
        .iter()
        .filter_map(sole_body)
        .filter_map(|s| s.bounds.map(|b| b.x))
        .collect();

    let title = match (
        most_common(title_positions.iter().map(|p| p.x)),
        most_common(title_positions.iter().map(|p| p.y)),
    ) {
        (Some(x), Some(y)) => Some(Position { x, y }),
        _ => None,
    };

    AlignmentStandard {
        title,
        body_left: most_common(body_lefts.into_iter()),
    }
}

/// Propose alignment corrections for one slide, or for every slide when
/// `slide` is `None`. Indices that do not exist yield nothing.
pub fn propose(deck: &Deck, slide: Option<usize>) -> Vec<Proposal> {
    let standard = standard(deck);
    let mut proposals = Vec::new();

    for s in deck.slides.iter().filter(|s| slide.is_none_or(|i| s.index == i)) {
        if let Some(target) = standard.title {
            for shape in s.shapes_with_role(ShapeRole::Title) {
                if let Some(p) = propose_move(shape, PositionValue::from(target), "title") {
                    proposals.push(p);
                }
            }
        }
        if let Some(x) = standard.body_left
            && let Some(shape) = sole_body(s)
        {
            if let Some(p) = propose_move(shape, PositionValue { x, y: None }, "body") {
                proposals.push(p);
            }
        }
    }

    proposals
}

fn propose_move(shape: &ShapeElement, target: PositionValue, role: &str) -> Option<Proposal> {
    let current = shape.bounds?.position();
    if target.matches(current) {
        return None;
    }
    Some(Proposal {
        target: shape.id,
        kind: CorrectionKind::Alignment,
        original: current.to_string(),
        replacement: target.to_string(),
        rationale: Some(format!(
            "{} '{}' is at {}; most slides place the {} at {}",
            role, shape.name, current, role, target
        )),
    })
}

/// The slide's body shape, when it has exactly one. Multi-column layouts are
/// left alone since their bodies legitimately differ.
fn sole_body(slide: &Slide) -> Option<&ShapeElement> {
    let mut bodies = slide.shapes_with_role(ShapeRole::Body);
    let first = bodies.next()?;
    if bodies.next().is_some() {
        return None;
    }
    Some(first)
}

fn most_common<T: PartialEq + Copy>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for v in values {
        match counts.iter_mut().find(|(seen, _)| *seen == v) {
            Some((_, n)) => *n += 1,
            None => counts.push((v, 1)),
        }
    }
    let best = counts.iter().map(|(_, n)| *n).max()?;
    counts.into_iter().find(|(_, n)| *n == best).map(|(v, _)| v)
}
