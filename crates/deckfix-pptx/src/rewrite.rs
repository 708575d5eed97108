// ABOUTME: Writes edited paragraph text and shape positions back into slide XML, preserving run formatting.
// ABOUTME: Every event not touched by an edit is copied through unchanged.

use std::collections::HashMap;

use deckfix_core::{DocumentError, Position, Slide};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::scan::{Mark, Scanner, local_name, prefix};
use crate::slide::{ParsedSlide, Segment, parse_slide, segments_text, xml_error};

/// New content for one paragraph's runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParagraphPlan {
    /// Replacement text for each `a:t` of the paragraph, in order.
    pub runs: Vec<String>,
    /// Text for a run to create when the paragraph has none.
    pub inject: Option<String>,
}

/// Spread `new_text` over the runs of a paragraph so formatting survives.
///
/// When the change falls inside a single run only that run is edited.
/// Otherwise, if the line count is unchanged, each line's text goes into the
/// first run of that line and its other runs are emptied. As a last resort
/// the whole text goes into the paragraph's first run.
pub(crate) fn distribute(segments: &[Segment], new_text: &str) -> ParagraphPlan {
    let runs: Vec<&str> = segments
        .iter()
        .filter_map(|s| match s {
            Segment::Run(text) => Some(text.as_str()),
            Segment::Break => None,
        })
        .collect();

    if runs.is_empty() {
        return ParagraphPlan {
            runs: Vec::new(),
            inject: Some(new_text.replace('\n', " ")),
        };
    }

    let plan = |runs: Vec<String>| ParagraphPlan { runs, inject: None };

    if let Some(edited) = edit_single_run(segments, new_text) {
        return plan(edited);
    }
    if let Some(edited) = fill_lines(segments, new_text) {
        return plan(edited);
    }

    let mut edited = vec![String::new(); runs.len()];
    edited[0] = new_text.replace('\n', " ");
    plan(edited)
}

fn edit_single_run(segments: &[Segment], new_text: &str) -> Option<Vec<String>> {
    let old: Vec<char> = segments_text(segments).chars().collect();
    let new: Vec<char> = new_text.chars().collect();

    let max_common = old.len().min(new.len());
    let head = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let tail = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_common - head)
        .take_while(|(a, b)| a == b)
        .count();

    let (start, end) = (head, old.len() - tail);
    let inserted: String = new[head..new.len() - tail].iter().collect();

    let mut out = Vec::new();
    let mut offset = 0;
    let mut hit = false;
    for segment in segments {
        match segment {
            Segment::Break => offset += 1,
            Segment::Run(text) => {
                let chars: Vec<char> = text.chars().collect();
                let run_end = offset + chars.len();
                if !hit && offset <= start && end <= run_end {
                    let mut edited: String = chars[..start - offset].iter().collect();
                    edited.push_str(&inserted);
                    edited.extend(&chars[end - offset..]);
                    out.push(edited);
                    hit = true;
                } else {
                    out.push(text.clone());
                }
                offset = run_end;
            }
        }
    }
    hit.then_some(out)
}

fn fill_lines(segments: &[Segment], new_text: &str) -> Option<Vec<String>> {
    let lines: Vec<&str> = new_text.split('\n').collect();
    let old_lines = 1 + segments.iter().filter(|s| **s == Segment::Break).count();
    if lines.len() != old_lines {
        return None;
    }

    let mut out = Vec::new();
    let mut line = 0;
    let mut filled = false;
    for segment in segments {
        match segment {
            Segment::Break => {
                if !filled && !lines[line].is_empty() {
                    return None;
                }
                line += 1;
                filled = false;
            }
            Segment::Run(_) if filled => out.push(String::new()),
            Segment::Run(_) => {
                out.push(lines[line].to_string());
                filled = true;
            }
        }
    }
    if !filled && !lines[line].is_empty() {
        return None;
    }
    Some(out)
}

/// Edits to apply to one slide part.
#[derive(Debug, Default)]
pub(crate) struct SlideEdits {
    paragraphs: HashMap<(usize, usize), ParagraphPlan>,
    positions: HashMap<usize, Position>,
}

impl SlideEdits {
    /// Compare `slide` against what is stored in the part and plan the
    /// writes needed to make the part match.
    pub(crate) fn diff(parsed: &ParsedSlide, slide: &Slide) -> Self {
        let mut edits = Self::default();

        for element in &slide.elements {
            let Some(paragraph) = element.id.paragraph else {
                continue;
            };
            let Some(segments) = parsed.paragraph(element.id.shape, paragraph) else {
                continue;
            };
            if segments_text(segments) != element.text {
                edits.paragraphs.insert(
                    (element.id.shape, paragraph),
                    distribute(segments, &element.text),
                );
            }
        }

        for shape in &slide.shapes {
            let (Some(bounds), Some(stored)) = (shape.bounds, parsed.shape(shape.id.shape)) else {
                continue;
            };
            if stored.offset != Some((bounds.x, bounds.y)) {
                edits.positions.insert(shape.id.shape, bounds.position());
            }
        }

        edits
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.paragraphs.is_empty() && self.positions.is_empty()
    }
}

/// Rewrite slide `part` so it holds the text and positions of `slide`.
/// Returns `None` when the part already matches.
pub(crate) fn rewrite_slide(xml: &str, slide: &Slide) -> Result<Option<String>, DocumentError> {
    let part = slide.part.as_str();
    let parsed = parse_slide(xml, part)?;
    let edits = SlideEdits::diff(&parsed, slide);
    if edits.is_empty() {
        return Ok(None);
    }

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut scanner = Scanner::default();
    // Replacement text for the `a:t` being copied, and whether it was written.
    let mut replacing: Option<(String, bool)> = None;
    // Run to create in the current paragraph, with the paragraph's prefix.
    let mut injecting: Option<(String, String)> = None;

    loop {
        let event = reader.read_event().map_err(|e| xml_error(part, e))?;
        if matches!(event, Event::Eof) {
            break;
        }
        if scanner.in_text() && matches!(event, Event::Text(_) | Event::CData(_)) {
            if let Some((text, written)) = replacing.as_mut() {
                if !*written {
                    write(&mut writer, part, Event::Text(BytesText::new(text)))?;
                    *written = true;
                }
                continue;
            }
        }

        let mark = scanner.observe(&event);
        let plan = match (scanner.shape(), &mark) {
            (Some(shape), Mark::ParagraphStart { paragraph, .. }) => edits.paragraphs.get(&(shape, *paragraph)),
            (Some(shape), _) => scanner.paragraph().and_then(|p| edits.paragraphs.get(&(shape, p))),
            _ => None,
        };

        match (&mark, &event) {
            (Mark::Offset { .. }, Event::Start(e) | Event::Empty(e)) => {
                if let Some(position) = scanner.shape().and_then(|s| edits.positions.get(&s)) {
                    let moved = with_position(e, *position);
                    let moved = if matches!(event, Event::Empty(_)) {
                        Event::Empty(moved)
                    } else {
                        Event::Start(moved)
                    };
                    write(&mut writer, part, moved)?;
                    continue;
                }
            }
            (Mark::ParagraphStart { empty, .. }, Event::Start(e) | Event::Empty(e)) => {
                if let Some(text) = plan.and_then(|p| p.inject.clone()) {
                    let ns = qualified_prefix(e);
                    if *empty {
                        write(&mut writer, part, Event::Start(e.clone()))?;
                        write_run(&mut writer, part, &ns, &text)?;
                        write(&mut writer, part, Event::End(e.to_end()))?;
                        continue;
                    }
                    injecting = Some((text, ns));
                }
            }
            (Mark::EndParagraphProperties | Mark::ParagraphEnd { .. }, _) => {
                if let Some((text, ns)) = injecting.take() {
                    write_run(&mut writer, part, &ns, &text)?;
                }
            }
            (Mark::TextStart { run, empty }, Event::Start(e) | Event::Empty(e)) => {
                if let Some(text) = plan.and_then(|p| p.runs.get(*run)) {
                    if *empty {
                        write(&mut writer, part, Event::Start(e.clone()))?;
                        write(&mut writer, part, Event::Text(BytesText::new(text)))?;
                        write(&mut writer, part, Event::End(e.to_end()))?;
                        continue;
                    }
                    replacing = Some((text.clone(), false));
                }
            }
            (Mark::TextEnd { .. }, _) => {
                if let Some((text, written)) = replacing.take()
                    && !written
                {
                    write(&mut writer, part, Event::Text(BytesText::new(&text)))?;
                }
            }
            _ => {}
        }

        write(&mut writer, part, event)?;
    }

    String::from_utf8(writer.into_inner())
        .map(Some)
        .map_err(|e| xml_error(part, e))
}

fn write(writer: &mut Writer<Vec<u8>>, part: &str, event: Event<'_>) -> Result<(), DocumentError> {
    writer.write_event(event).map_err(|e| xml_error(part, e))
}

fn write_run(writer: &mut Writer<Vec<u8>>, part: &str, ns: &str, text: &str) -> Result<(), DocumentError> {
    let run = format!("{}r", ns);
    let t = format!("{}t", ns);
    write(writer, part, Event::Start(BytesStart::new(run.as_str())))?;
    write(writer, part, Event::Start(BytesStart::new(t.as_str())))?;
    write(writer, part, Event::Text(BytesText::new(text)))?;
    write(writer, part, Event::End(BytesEnd::new(t.as_str())))?;
    write(writer, part, Event::End(BytesEnd::new(run.as_str())))
}

/// `a:` for `a:p`, empty for an unprefixed element.
fn qualified_prefix(e: &BytesStart<'_>) -> String {
    let name = e.name();
    prefix(name.as_ref())
        .map(|p| format!("{}:", String::from_utf8_lossy(p)))
        .unwrap_or_default()
}

fn with_position(e: &BytesStart<'_>, position: Position) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut moved = BytesStart::new(name);
    let (x, y) = (position.x.to_string(), position.y.to_string());
    for attr in e.attributes().flatten() {
        match local_name(attr.key.as_ref()) {
            b"x" => moved.push_attribute(("x", x.as_str())),
            b"y" => moved.push_attribute(("y", y.as_str())),
            _ => moved.push_attribute(attr),
        }
    }
    moved
}
