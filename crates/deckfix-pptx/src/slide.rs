// ABOUTME: Parses one slide part into shapes with names, placeholders, geometry and paragraph segments.
// ABOUTME: Converts the parsed form into the core Slide model, keeping segment detail for the rewriter.

use deckfix_core::{Bounds, DocumentError, ElementId, ShapeElement, Slide, TextElement};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::scan::{Mark, Scanner};

/// A piece of paragraph content: the text of one `a:t`, or a line break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Run(String),
    Break,
}

/// The text a sequence of segments renders as. Breaks become newlines.
pub(crate) fn segments_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| match s {
            Segment::Run(text) => text.as_str(),
            Segment::Break => "\n",
        })
        .collect()
}

#[derive(Debug, Default)]
pub(crate) struct ParsedShape {
    pub shape: usize,
    pub name: String,
    pub placeholder: Option<String>,
    pub offset: Option<(i64, i64)>,
    pub extent: Option<(i64, i64)>,
    pub paragraphs: Vec<Vec<Segment>>,
}

impl ParsedShape {
    pub(crate) fn bounds(&self) -> Option<Bounds> {
        let (x, y) = self.offset?;
        let (width, height) = self.extent.unwrap_or((0, 0));
        Some(Bounds { x, y, width, height })
    }
}

#[derive(Debug, Default)]
pub(crate) struct ParsedSlide {
    pub shapes: Vec<ParsedShape>,
}

impl ParsedSlide {
    pub(crate) fn shape(&self, shape: usize) -> Option<&ParsedShape> {
        self.shapes.iter().find(|s| s.shape == shape)
    }

    pub(crate) fn paragraph(&self, shape: usize, paragraph: usize) -> Option<&[Segment]> {
        self.shape(shape)?.paragraphs.get(paragraph).map(Vec::as_slice)
    }

    /// Convert into the core model for slide `index`. Paragraphs with only
    /// whitespace are not surfaced as text elements.
    pub(crate) fn into_slide(self, index: usize, part: &str) -> Slide {
        let mut slide = Slide::new(index, part);
        for parsed in self.shapes {
            let bounds = parsed.bounds();
            for (p, segments) in parsed.paragraphs.iter().enumerate() {
                let text = segments_text(segments);
                if text.trim().is_empty() {
                    continue;
                }
                slide.elements.push(TextElement {
                    id: ElementId::paragraph(index, parsed.shape, p),
                    shape_name: parsed.name.clone(),
                    text,
                });
            }
            slide.shapes.push(ShapeElement {
                id: ElementId::shape(index, parsed.shape),
                name: parsed.name,
                placeholder: parsed.placeholder,
                bounds,
            });
        }
        slide
    }
}

pub(crate) fn xml_error(part: &str, err: impl std::fmt::Display) -> DocumentError {
    DocumentError::Xml {
        part: part.to_string(),
        message: err.to_string(),
    }
}

/// Parse the XML of slide part `part`.
pub(crate) fn parse_slide(xml: &str, part: &str) -> Result<ParsedSlide, DocumentError> {
    let mut reader = Reader::from_str(xml);
    let mut scanner = Scanner::default();
    let mut slide = ParsedSlide::default();

    loop {
        let event = reader.read_event().map_err(|e| xml_error(part, e))?;
        match &event {
            Event::Eof => break,
            Event::Text(t) if scanner.in_text() => {
                let text = t.unescape().map_err(|e| xml_error(part, e))?;
                push_text(&mut slide, &text);
                continue;
            }
            Event::CData(t) if scanner.in_text() => {
                let raw: &[u8] = t;
                push_text(&mut slide, &String::from_utf8_lossy(raw));
                continue;
            }
            _ => {}
        }

        let mark = scanner.observe(&event);
        if let Mark::ShapeStart { shape } = mark {
            slide.shapes.push(ParsedShape {
                shape,
                ..Default::default()
            });
            continue;
        }
        let Some(shape) = slide.shapes.last_mut() else {
            continue;
        };
        match mark {
            Mark::Name(name) if shape.name.is_empty() => shape.name = name,
            Mark::Placeholder(kind) => shape.placeholder = Some(kind),
            Mark::Offset { x, y } => shape.offset = Some((x.unwrap_or(0), y.unwrap_or(0))),
            Mark::Extent { cx, cy } => shape.extent = Some((cx.unwrap_or(0), cy.unwrap_or(0))),
            Mark::ParagraphStart { .. } => shape.paragraphs.push(Vec::new()),
            Mark::TextStart { .. } => {
                if let Some(paragraph) = shape.paragraphs.last_mut() {
                    paragraph.push(Segment::Run(String::new()));
                }
            }
            Mark::Break => {
                if let Some(paragraph) = shape.paragraphs.last_mut() {
                    paragraph.push(Segment::Break);
                }
            }
            _ => {}
        }
    }

    Ok(slide)
}

fn push_text(slide: &mut ParsedSlide, text: &str) {
    if let Some(Segment::Run(run)) = slide
        .shapes
        .last_mut()
        .and_then(|s| s.paragraphs.last_mut())
        .and_then(|p| p.last_mut())
    {
        run.push_str(text);
    }
}
