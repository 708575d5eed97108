// ABOUTME: Positional scanner over slide XML events: which shape, paragraph and text run an event belongs to.
// ABOUTME: Shared by the reader and the rewriter so both number shapes, paragraphs and runs identically.

use quick_xml::events::{BytesStart, Event};

/// Something the scanner recognised in the event it was just fed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mark {
    Other,
    ShapeStart { shape: usize },
    ShapeEnd,
    Name(String),
    Placeholder(String),
    Offset { x: Option<i64>, y: Option<i64> },
    Extent { cx: Option<i64>, cy: Option<i64> },
    /// `empty` is set for a self-closing `<a:p/>`, which never gets an end mark.
    ParagraphStart { paragraph: usize, empty: bool },
    ParagraphEnd { paragraph: usize },
    /// `empty` is set for a self-closing `<a:t/>`.
    TextStart { run: usize, empty: bool },
    TextEnd { run: usize },
    Break,
    EndParagraphProperties,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Xfrm {
    #[default]
    NotSeen,
    Inside,
    Done,
}

/// Tracks where in the shape tree the current event sits.
///
/// Shapes are `p:sp` and `p:graphicFrame` elements, numbered from 0 in
/// document order. Paragraphs are the `a:p` elements of a shape's text
/// bodies (table cells included), numbered from 0 per shape. Runs are the
/// `a:t` elements of a paragraph, numbered from 0 per paragraph.
#[derive(Debug, Default)]
pub(crate) struct Scanner {
    shapes_seen: usize,
    shape: Option<usize>,
    text_bodies: usize,
    paragraphs_seen: usize,
    paragraph: Option<usize>,
    runs_seen: usize,
    run: Option<usize>,
    xfrm: Xfrm,
}

impl Scanner {
    pub(crate) fn shape(&self) -> Option<usize> {
        self.shape
    }

    pub(crate) fn paragraph(&self) -> Option<usize> {
        self.paragraph
    }

    /// True while between the start and end of an `a:t` element.
    pub(crate) fn in_text(&self) -> bool {
        self.run.is_some()
    }

    pub(crate) fn observe(&mut self, event: &Event<'_>) -> Mark {
        match event {
            Event::Start(e) => self.open(e, false),
            Event::Empty(e) => self.open(e, true),
            Event::End(e) => self.close(local_name(e.name().as_ref())),
            _ => Mark::Other,
        }
    }

    fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> Mark {
        let name = e.name();
        let local = local_name(name.as_ref());

        if self.shape.is_none() {
            if !empty && matches!(local, b"sp" | b"graphicFrame") {
                let shape = self.shapes_seen;
                self.shapes_seen += 1;
                self.shape = Some(shape);
                self.paragraphs_seen = 0;
                self.xfrm = Xfrm::NotSeen;
                return Mark::ShapeStart { shape };
            }
            return Mark::Other;
        }

        match local {
            b"cNvPr" => Mark::Name(attribute(e, b"name").unwrap_or_default()),
            b"ph" => Mark::Placeholder(attribute(e, b"type").unwrap_or_default()),
            b"xfrm" if !empty && self.xfrm == Xfrm::NotSeen => {
                self.xfrm = Xfrm::Inside;
                Mark::Other
            }
            b"off" if self.xfrm == Xfrm::Inside => Mark::Offset {
                x: number(e, b"x"),
                y: number(e, b"y"),
            },
            b"ext" if self.xfrm == Xfrm::Inside => Mark::Extent {
                cx: number(e, b"cx"),
                cy: number(e, b"cy"),
            },
            b"txBody" if !empty => {
                self.text_bodies += 1;
                Mark::Other
            }
            b"p" if self.text_bodies > 0 => {
                let paragraph = self.paragraphs_seen;
                self.paragraphs_seen += 1;
                self.runs_seen = 0;
                if !empty {
                    self.paragraph = Some(paragraph);
                }
                Mark::ParagraphStart { paragraph, empty }
            }
            b"t" if self.paragraph.is_some() => {
                let run = self.runs_seen;
                self.runs_seen += 1;
                if !empty {
                    self.run = Some(run);
                }
                Mark::TextStart { run, empty }
            }
            b"br" if self.paragraph.is_some() => Mark::Break,
            b"endParaRPr" if self.paragraph.is_some() => Mark::EndParagraphProperties,
            _ => Mark::Other,
        }
    }

    fn close(&mut self, local: &[u8]) -> Mark {
        if self.shape.is_none() {
            return Mark::Other;
        }
        match local {
            b"sp" | b"graphicFrame" => {
                self.shape = None;
                self.text_bodies = 0;
                self.paragraph = None;
                self.run = None;
                Mark::ShapeEnd
            }
            b"xfrm" if self.xfrm == Xfrm::Inside => {
                self.xfrm = Xfrm::Done;
                Mark::Other
            }
            b"txBody" if self.text_bodies > 0 => {
                self.text_bodies -= 1;
                Mark::Other
            }
            b"p" => match self.paragraph.take() {
                Some(paragraph) => Mark::ParagraphEnd { paragraph },
                None => Mark::Other,
            },
            b"t" => match self.run.take() {
                Some(run) => Mark::TextEnd { run },
                None => Mark::Other,
            },
            _ => Mark::Other,
        }
    }
}

/// Extract the local name from a potentially namespaced XML element name.
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().position(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// The namespace prefix of a qualified name, if any (`a` for `a:p`).
pub(crate) fn prefix(name: &[u8]) -> Option<&[u8]> {
    name.iter().position(|&b| b == b':').map(|pos| &name[..pos])
}

/// Value of the attribute whose qualified name is exactly `key`.
pub(crate) fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

fn number(e: &BytesStart<'_>, key: &[u8]) -> Option<i64> {
    attribute(e, key)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::Reader;

    fn marks(xml: &str) -> Vec<Mark> {
        let mut reader = Reader::from_str(xml);
        let mut scanner = Scanner::default();
        let mut out = Vec::new();
        loop {
            let event = reader.read_event().unwrap();
            if matches!(event, Event::Eof) {
                break;
            }
            let mark = scanner.observe(&event);
            if mark != Mark::Other {
                out.push(mark);
            }
        }
        out
    }

    #[test]
    fn local_name_and_prefix_split_qualified_names() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
        assert_eq!(prefix(b"a:p"), Some(&b"a"[..]));
        assert_eq!(prefix(b"p"), None);
    }

    #[test]
    fn numbers_shapes_paragraphs_and_runs() {
        let xml = r#"<p:spTree>
            <p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>
              <p:spPr><a:xfrm><a:off x="10" y="20"/><a:ext cx="30" cy="40"/></a:xfrm></p:spPr>
              <p:txBody><a:bodyPr/><a:p><a:r><a:t>Hi</a:t></a:r><a:br/><a:r><a:t/></a:r></a:p><a:p/></p:txBody>
            </p:sp>
            <p:sp><p:txBody><a:p><a:r><a:t>x</a:t></a:r><a:endParaRPr/></a:p></p:txBody></p:sp>
        </p:spTree>"#;

        assert_eq!(
            marks(xml),
            vec![
                Mark::ShapeStart { shape: 0 },
                Mark::Name("Title 1".to_string()),
                Mark::Placeholder("title".to_string()),
                Mark::Offset { x: Some(10), y: Some(20) },
                Mark::Extent { cx: Some(30), cy: Some(40) },
                Mark::ParagraphStart { paragraph: 0, empty: false },
                Mark::TextStart { run: 0, empty: false },
                Mark::TextEnd { run: 0 },
                Mark::Break,
                Mark::TextStart { run: 1, empty: true },
                Mark::ParagraphEnd { paragraph: 0 },
                Mark::ParagraphStart { paragraph: 1, empty: true },
                Mark::ShapeEnd,
                Mark::ShapeStart { shape: 1 },
                Mark::ParagraphStart { paragraph: 0, empty: false },
                Mark::TextStart { run: 0, empty: false },
                Mark::TextEnd { run: 0 },
                Mark::EndParagraphProperties,
                Mark::ParagraphEnd { paragraph: 0 },
                Mark::ShapeEnd,
            ]
        );
    }

    #[test]
    fn only_the_first_transform_is_geometry() {
        let xml = r#"<p:sp><p:spPr><a:xfrm><a:off x="1" y="2"/></a:xfrm></p:spPr>
            <p:txBody><a:bodyPr><a:xfrm><a:off x="9" y="9"/></a:xfrm></a:bodyPr></p:txBody></p:sp>"#;

        let offsets: Vec<_> = marks(xml)
            .into_iter()
            .filter(|m| matches!(m, Mark::Offset { .. }))
            .collect();

        assert_eq!(offsets, vec![Mark::Offset { x: Some(1), y: Some(2) }]);
    }
}
