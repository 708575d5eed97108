// ABOUTME: Builds small but genuine .pptx packages for tests, without needing PowerPoint fixtures on disk.
// ABOUTME: FixtureDeck writes the content types, relationships, presentation and slide parts the reader needs.

use std::io::{Cursor, Write};
use std::path::Path;

use quick_xml::escape::escape;
use zip::ZipWriter;
use zip::write::FileOptions;

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

/// One shape on a fixture slide. Each paragraph is a list of runs.
#[derive(Debug, Clone)]
pub struct FixtureShape {
    name: Option<String>,
    placeholder: Option<String>,
    offset: Option<(i64, i64)>,
    paragraphs: Vec<Vec<String>>,
}

impl FixtureShape {
    /// A title placeholder with a single one-run paragraph.
    pub fn title(text: &str) -> Self {
        Self {
            name: None,
            placeholder: Some(r#"type="title""#.to_string()),
            offset: None,
            paragraphs: vec![vec![text.to_string()]],
        }
    }

    /// A body placeholder with one single-run paragraph per entry.
    pub fn body(paragraphs: &[&str]) -> Self {
        Self {
            name: None,
            placeholder: Some(r#"idx="1""#.to_string()),
            offset: None,
            paragraphs: paragraphs.iter().map(|p| vec![p.to_string()]).collect(),
        }
    }

    /// A free text box (no placeholder) whose paragraphs may hold several runs.
    pub fn text_box(name: &str, paragraphs: &[&[&str]]) -> Self {
        Self {
            name: Some(name.to_string()),
            placeholder: None,
            offset: None,
            paragraphs: paragraphs
                .iter()
                .map(|runs| runs.iter().map(|r| r.to_string()).collect())
                .collect(),
        }
    }

    /// Give the shape explicit geometry at (x, y) EMU.
    pub fn at(mut self, x: i64, y: i64) -> Self {
        self.offset = Some((x, y));
        self
    }

    fn xml(&self, index: usize) -> String {
        let id = index + 2;
        let name = self.name.clone().unwrap_or_else(|| match &self.placeholder {
            Some(ph) if ph.contains("title") => format!("Title {}", id - 1),
            Some(_) => format!("Content Placeholder {}", id - 1),
            None => format!("TextBox {}", id - 1),
        });
        let ph = self
            .placeholder
            .as_ref()
            .map(|attrs| format!("<p:ph {}/>", attrs))
            .unwrap_or_default();
        let geometry = self
            .offset
            .map(|(x, y)| {
                format!(
                    r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="8229600" cy="1143000"/></a:xfrm>"#,
                    x, y
                )
            })
            .unwrap_or_default();

        let mut body = String::new();
        for runs in &self.paragraphs {
            body.push_str("<a:p>");
            for run in runs {
                body.push_str(&format!(r#"<a:r><a:rPr lang="en-US"/><a:t>{}</a:t></a:r>"#, escape(run.as_str())));
            }
            body.push_str(r#"<a:endParaRPr lang="en-US"/></a:p>"#);
        }

        format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr/><p:nvPr>{ph}</p:nvPr></p:nvSpPr><p:spPr>{geometry}</p:spPr><p:txBody><a:bodyPr/><a:lstStyle/>{body}</p:txBody></p:sp>"#,
            id = id,
            name = escape(name.as_str()),
            ph = ph,
            geometry = geometry,
            body = body,
        )
    }
}

/// A presentation assembled slide by slide.
#[derive(Debug, Clone, Default)]
pub struct FixtureDeck {
    slides: Vec<Vec<FixtureShape>>,
}

impl FixtureDeck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slide(mut self, shapes: Vec<FixtureShape>) -> Self {
        self.slides.push(shapes);
        self
    }

    /// The package as bytes.
    pub fn to_bytes(&self) -> zip::result::ZipResult<Vec<u8>> {
        let options = FileOptions::default();
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for (name, content) in self.parts() {
            zip.start_file(name, options)?;
            zip.write_all(content.as_bytes())?;
        }

        Ok(zip.finish()?.into_inner())
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let bytes = self.to_bytes().map_err(std::io::Error::other)?;
        std::fs::write(path, bytes)
    }

    fn parts(&self) -> Vec<(String, String)> {
        let count = self.slides.len();
        let mut parts = Vec::new();

        let overrides: String = (1..=count)
            .map(|n| {
                format!(
                    r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#,
                    n
                )
            })
            .collect();
        parts.push((
            "[Content_Types].xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>{}</Types>"#,
                overrides
            ),
        ));

        parts.push((
            "_rels/.rels".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{}" Target="ppt/presentation.xml"/></Relationships>"#,
                REL_OFFICE_DOCUMENT
            ),
        ));

        let slide_ids: String = (1..=count)
            .map(|n| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n + 1))
            .collect();
        parts.push((
            "ppt/presentation.xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"><p:sldIdLst>{}</p:sldIdLst><p:sldSz cx="9144000" cy="6858000" type="screen4x3"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
                NS_A, NS_R, NS_P, slide_ids
            ),
        ));

        let rels: String = (1..=count)
            .map(|n| {
                format!(
                    r#"<Relationship Id="rId{}" Type="{}" Target="slides/slide{}.xml"/>"#,
                    n + 1,
                    REL_SLIDE,
                    n
                )
            })
            .collect();
        parts.push((
            "ppt/_rels/presentation.xml.rels".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
                rels
            ),
        ));

        for (i, shapes) in self.slides.iter().enumerate() {
            let tree: String = shapes.iter().enumerate().map(|(s, shape)| shape.xml(s)).collect();
            parts.push((
                format!("ppt/slides/slide{}.xml", i + 1),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld></p:sld>"#,
                    NS_A, NS_R, NS_P, tree
                ),
            ));
        }

        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PptxDocument;
    use deckfix_core::{DocumentAdapter, ShapeRole};

    #[test]
    fn fixture_names_shapes_like_powerpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.pptx");
        FixtureDeck::new()
            .slide(vec![
                FixtureShape::title("Q&A <live>"),
                FixtureShape::body(&["One"]),
                FixtureShape::text_box("Callout", &[&["Bold", " plain"]]),
            ])
            .write_to(&path)
            .unwrap();

        let deck = PptxDocument::new().read(&path).unwrap();
        let slide = deck.slide(1).unwrap();

        let names: Vec<&str> = slide.shapes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Title 1", "Content Placeholder 2", "Callout"]);
        let roles: Vec<ShapeRole> = slide.shapes.iter().map(|s| s.role()).collect();
        assert_eq!(roles, vec![ShapeRole::Title, ShapeRole::Body, ShapeRole::Other]);
        assert_eq!(slide.elements[0].text, "Q&A <live>");
        assert_eq!(slide.elements[2].text, "Bold plain");
    }
}
