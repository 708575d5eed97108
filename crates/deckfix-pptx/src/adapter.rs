// ABOUTME: PptxDocument implements DocumentAdapter over .pptx packages.
// ABOUTME: Writes copy the source package entry by entry, rewriting only the slide parts that changed.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use deckfix_core::{Deck, DocumentAdapter, DocumentError, Slide};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::package::{read_part, slide_parts};
use crate::rewrite::rewrite_slide;
use crate::slide::parse_slide;

/// Reads and writes PowerPoint 2007+ (.pptx) files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PptxDocument;

impl PptxDocument {
    pub fn new() -> Self {
        Self
    }
}

fn open(path: &Path) -> Result<ZipArchive<Cursor<Vec<u8>>>, DocumentError> {
    let bytes = std::fs::read(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| package_error(path, e))
}

fn package_error(path: &Path, err: impl std::fmt::Display) -> DocumentError {
    DocumentError::Package {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

impl DocumentAdapter for PptxDocument {
    fn read(&self, path: &Path) -> Result<Deck, DocumentError> {
        let mut archive = open(path)?;
        let (parts, size) = slide_parts(&mut archive, path)?;

        let mut deck = Deck::new(path);
        if let Some((width, height)) = size {
            deck.slide_width = Some(width);
            deck.slide_height = Some(height);
        }

        for (i, part) in parts.iter().enumerate() {
            let xml = read_part(&mut archive, path, part)?;
            let slide = parse_slide(&xml, part)?.into_slide(i + 1, part);
            tracing::debug!(slide = i + 1, part = %part, elements = slide.elements.len(), "read slide");
            deck.slides.push(slide);
        }

        tracing::info!(path = %path.display(), slides = deck.slide_count(), "read presentation");
        Ok(deck)
    }

    fn write(&self, deck: &Deck, path: &Path) -> Result<(), DocumentError> {
        let mut archive = open(&deck.source)?;
        let slides: HashMap<&str, &Slide> = deck.slides.iter().map(|s| (s.part.as_str(), s)).collect();
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut rewritten = 0;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| package_error(&deck.source, e))?;
            let name = entry.name().to_string();
            if entry.is_dir() {
                writer
                    .add_directory(name, options)
                    .map_err(|e| package_error(path, e))?;
                continue;
            }

            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).map_err(|e| {
                package_error(&deck.source, format!("failed to read '{}': {}", name, e))
            })?;
            drop(entry);

            if let Some(slide) = slides.get(name.as_str()) {
                let xml = String::from_utf8(contents).map_err(|e| crate::slide::xml_error(&name, e))?;
                contents = match rewrite_slide(&xml, slide)? {
                    Some(updated) => {
                        rewritten += 1;
                        updated.into_bytes()
                    }
                    None => xml.into_bytes(),
                };
            }

            writer
                .start_file(name, options)
                .map_err(|e| package_error(path, e))?;
            writer.write_all(&contents).map_err(|source| DocumentError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let bytes = writer.finish().map_err(|e| package_error(path, e))?.into_inner();
        std::fs::write(path, bytes).map_err(|source| DocumentError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(path = %path.display(), rewritten, "wrote presentation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixtureDeck, FixtureShape};
    use deckfix_core::{Bounds, ElementId, Position};

    fn fixture(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("deck.pptx");
        FixtureDeck::new()
            .slide(vec![
                FixtureShape::title("Helo wrold").at(457200, 274638),
                FixtureShape::body(&["First point", "Secnd point"]),
            ])
            .slide(vec![FixtureShape::title("Agenda").at(500000, 274638)])
            .write_to(&path)
            .unwrap();
        path
    }

    #[test]
    fn reads_slides_in_order_with_text_and_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());

        let deck = PptxDocument::new().read(&path).unwrap();

        assert_eq!(deck.source, path);
        assert_eq!(deck.slide_count(), 2);
        assert_eq!(deck.slide_width, Some(9144000));
        let texts: Vec<(String, &str)> = deck
            .elements()
            .map(|e| (e.id.to_string(), e.text.as_str()))
            .collect();
        assert_eq!(
            texts,
            vec![
                ("s1/sh0/p0".to_string(), "Helo wrold"),
                ("s1/sh1/p0".to_string(), "First point"),
                ("s1/sh1/p1".to_string(), "Secnd point"),
                ("s2/sh0/p0".to_string(), "Agenda"),
            ]
        );
        assert_eq!(
            deck.shape(&ElementId::shape(2, 0)).unwrap().bounds.map(|b| b.position()),
            Some(Position { x: 500000, y: 274638 })
        );
    }

    #[test]
    fn write_then_read_reflects_edits_and_leaves_source_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let out = dir.path().join("deck_corrected.pptx");
        let adapter = PptxDocument::new();
        let mut deck = adapter.read(&path).unwrap();

        deck.element_mut(&ElementId::paragraph(1, 0, 0)).unwrap().text = "Hello world".to_string();
        deck.shape_mut(&ElementId::shape(2, 0)).unwrap().bounds = Some(Bounds {
            x: 457200,
            y: 274638,
            width: 8229600,
            height: 1143000,
        });
        adapter.write(&deck, &out).unwrap();

        let written = adapter.read(&out).unwrap();
        assert_eq!(written.element(&ElementId::paragraph(1, 0, 0)).unwrap().text, "Hello world");
        assert_eq!(written.element(&ElementId::paragraph(1, 1, 1)).unwrap().text, "Secnd point");
        assert_eq!(
            written.shape(&ElementId::shape(2, 0)).unwrap().bounds.map(|b| b.x),
            Some(457200)
        );

        let original = adapter.read(&path).unwrap();
        assert_eq!(original.element(&ElementId::paragraph(1, 0, 0)).unwrap().text, "Helo wrold");
    }

    #[test]
    fn unchanged_deck_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let out = dir.path().join("copy.pptx");
        let adapter = PptxDocument::new();

        let deck = adapter.read(&path).unwrap();
        adapter.write(&deck, &out).unwrap();

        let mut copy = adapter.read(&out).unwrap();
        copy.source = path.clone();
        assert_eq!(copy, deck);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = PptxDocument::new()
            .read(Path::new("/definitely/not/here.pptx"))
            .unwrap_err();
        assert!(matches!(err, DocumentError::Read { .. }));
    }

    #[test]
    fn non_zip_input_is_a_package_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pptx");
        std::fs::write(&path, b"plain text, not a zip").unwrap();

        let err = PptxDocument::new().read(&path).unwrap_err();
        assert!(matches!(err, DocumentError::Package { .. }), "got {:?}", err);
    }

    #[test]
    fn write_to_missing_directory_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let adapter = PptxDocument::new();
        let deck = adapter.read(&path).unwrap();

        let err = adapter
            .write(&deck, &dir.path().join("no-such-dir").join("out.pptx"))
            .unwrap_err();
        assert!(matches!(err, DocumentError::Write { .. }), "got {:?}", err);
    }
}
