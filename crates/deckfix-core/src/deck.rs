// ABOUTME: In-memory snapshot of a presentation: slides, their shapes and their text paragraphs.
// ABOUTME: The correction store reads and writes current values through the lookup methods here.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::element::{Bounds, ElementId};

/// A presentation as extracted by a document adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    /// File the deck was read from. Adapters use it as the template on write.
    pub source: PathBuf,
    pub slide_width: Option<i64>,
    pub slide_height: Option<i64>,
    pub slides: Vec<Slide>,
}

impl Deck {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            slide_width: None,
            slide_height: None,
            slides: Vec::new(),
        }
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Look up a slide by its 1-based number.
    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.slides.iter().find(|s| s.index == index)
    }

    pub fn element(&self, id: &ElementId) -> Option<&TextElement> {
        self.slide(id.slide)?.elements.iter().find(|e| &e.id == id)
    }

    pub fn element_mut(&mut self, id: &ElementId) -> Option<&mut TextElement> {
        self.slides
            .iter_mut()
            .find(|s| s.index == id.slide)?
            .elements
            .iter_mut()
            .find(|e| &e.id == id)
    }

    /// Look up the shape that owns `id` (a shape id or a paragraph id).
    pub fn shape(&self, id: &ElementId) -> Option<&ShapeElement> {
        let shape_id = id.shape_id();
        self.slide(id.slide)?.shapes.iter().find(|s| s.id == shape_id)
    }

    pub fn shape_mut(&mut self, id: &ElementId) -> Option<&mut ShapeElement> {
        let shape_id = id.shape_id();
        self.slides
            .iter_mut()
            .find(|s| s.index == id.slide)?
            .shapes
            .iter_mut()
            .find(|s| s.id == shape_id)
    }

    /// All text elements across the deck, in slide then element order.
    pub fn elements(&self) -> impl Iterator<Item = &TextElement> {
        self.slides.iter().flat_map(|s| s.elements.iter())
    }
}

/// One slide of the deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    /// 1-based position in presentation order.
    pub index: usize,
    /// Package part the slide was read from (e.g. `ppt/slides/slide1.xml`).
    pub part: String,
    pub elements: Vec<TextElement>,
    pub shapes: Vec<ShapeElement>,
}

impl Slide {
    pub fn new(index: usize, part: impl Into<String>) -> Self {
        Self {
            index,
            part: part.into(),
            elements: Vec::new(),
            shapes: Vec::new(),
        }
    }

    /// Shapes with the given role, in document order.
    pub fn shapes_with_role(&self, role: ShapeRole) -> impl Iterator<Item = &ShapeElement> {
        self.shapes.iter().filter(move |s| s.role() == role)
    }
}

/// One paragraph of text within a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    pub id: ElementId,
    pub shape_name: String,
    /// Runs concatenated in order; line breaks inside the paragraph are `\n`.
    pub text: String,
}

/// The structural role a shape plays on its slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeRole {
    Title,
    Body,
    Other,
}

/// A shape with optional explicit geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeElement {
    pub id: ElementId,
    pub name: String,
    /// Placeholder type from `<p:ph type="..."/>`; `Some("")` for an untyped placeholder.
    pub placeholder: Option<String>,
    /// `None` when the geometry is inherited from the slide layout.
    pub bounds: Option<Bounds>,
}

impl ShapeElement {
    pub fn role(&self) -> ShapeRole {
        match self.placeholder.as_deref() {
            Some("title") | Some("ctrTitle") => return ShapeRole::Title,
            Some("body") | Some("") | Some("obj") => return ShapeRole::Body,
            Some(_) => return ShapeRole::Other,
            None => {}
        }
        if self.name.contains("Title") {
            ShapeRole::Title
        } else if self.name.contains("Content") || self.name.contains("Text Placeholder") {
            ShapeRole::Body
        } else {
            ShapeRole::Other
        }
    }
}
