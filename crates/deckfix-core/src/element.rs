// ABOUTME: Element identifiers and geometry primitives shared by the deck model and corrections.
// ABOUTME: ElementId has a stable string form (s1/sh2/p0) used on the wire and in tool arguments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors produced when parsing an element id or a position value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElementIdError {
    #[error("invalid element id '{0}': expected s<slide>/sh<shape> or s<slide>/sh<shape>/p<paragraph>")]
    Malformed(String),

    #[error("invalid element id '{0}': slide numbers start at 1")]
    ZeroSlide(String),

    #[error("invalid position '{0}': expected '<x>,<y>' or '<x>' in EMU")]
    Position(String),
}

/// Identifies a shape (`s1/sh2`) or one paragraph of a shape's text (`s1/sh2/p0`).
///
/// Slides are numbered from 1. Shape and paragraph ordinals count from 0 in
/// document order within their slide and shape respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ElementId {
    pub slide: usize,
    pub shape: usize,
    pub paragraph: Option<usize>,
}

impl ElementId {
    /// Id of a whole shape.
    pub fn shape(slide: usize, shape: usize) -> Self {
        Self {
            slide,
            shape,
            paragraph: None,
        }
    }

    /// Id of a single paragraph within a shape.
    pub fn paragraph(slide: usize, shape: usize, paragraph: usize) -> Self {
        Self {
            slide,
            shape,
            paragraph: Some(paragraph),
        }
    }

    /// The id of the shape that owns this element.
    pub fn shape_id(&self) -> Self {
        Self::shape(self.slide, self.shape)
    }

    pub fn is_paragraph(&self) -> bool {
        self.paragraph.is_some()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}/sh{}", self.slide, self.shape)?;
        if let Some(p) = self.paragraph {
            write!(f, "/p{}", p)?;
        }
        Ok(())
    }
}

impl FromStr for ElementId {
    type Err = ElementIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ElementIdError::Malformed(s.to_string());
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(malformed());
        }

        let number = |part: &str, prefix: &str| -> Result<usize, ElementIdError> {
            part.strip_prefix(prefix)
                .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|digits| digits.parse().ok())
                .ok_or_else(malformed)
        };

        let slide = number(parts[0], "s")?;
        if slide == 0 {
            return Err(ElementIdError::ZeroSlide(s.to_string()));
        }
        let shape = number(parts[1], "sh")?;
        let paragraph = match parts.get(2) {
            Some(part) => Some(number(part, "p")?),
            None => None,
        };

        Ok(Self {
            slide,
            shape,
            paragraph,
        })
    }
}

impl TryFrom<String> for ElementId {
    type Error = ElementIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ElementId> for String {
    fn from(id: ElementId) -> Self {
        id.to_string()
    }
}

/// A shape's offset on the slide, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// A shape's bounding box, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Bounds {
    pub fn position(&self) -> Position {
        Position {
            x: self.x,
            y: self.y,
        }
    }

    pub fn move_to(&mut self, position: Position) {
        self.x = position.x;
        self.y = position.y;
    }
}

/// The value carried by an alignment correction: `x,y` or just `x`.
///
/// A missing `y` matches any current top and leaves it unchanged when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionValue {
    pub x: i64,
    pub y: Option<i64>,
}

impl PositionValue {
    pub fn matches(&self, current: Position) -> bool {
        self.x == current.x && self.y.is_none_or(|y| y == current.y)
    }

    /// The position that results from applying this value to `current`.
    pub fn resolve(&self, current: Position) -> Position {
        Position {
            x: self.x,
            y: self.y.unwrap_or(current.y),
        }
    }
}

impl From<Position> for PositionValue {
    fn from(p: Position) -> Self {
        Self { x: p.x, y: Some(p.y) }
    }
}

impl fmt::Display for PositionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.y {
            Some(y) => write!(f, "{},{}", self.x, y),
            None => write!(f, "{}", self.x),
        }
    }
}

impl FromStr for PositionValue {
    type Err = ElementIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ElementIdError::Position(s.to_string());
        let mut parts = s.split(',').map(str::trim);
        let x = parts
            .next()
            .and_then(|x| x.parse::<i64>().ok())
            .ok_or_else(invalid)?;
        let y = match parts.next() {
            Some(y) => Some(y.parse::<i64>().map_err(|_| invalid())?),
            None => None,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self { x, y })
    }
}
