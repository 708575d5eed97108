// ABOUTME: Test utilities for deckfix-core, including an in-memory DocumentAdapter.
// ABOUTME: Lets agent and store tests run without touching the filesystem or the pptx crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::deck::{Deck, ShapeElement, Slide, TextElement};
use crate::document::{DocumentAdapter, DocumentError};
use crate::element::{Bounds, ElementId};

/// A document adapter backed by a map of path -> Deck.
///
/// Writes can be made to fail to exercise the fatal I/O path.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    decks: Mutex<HashMap<PathBuf, Deck>>,
    fail_writes: AtomicBool,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `deck` under its own source path.
    pub fn with_deck(self, deck: Deck) -> Self {
        self.insert(deck.source.clone(), deck);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, deck: Deck) {
        if let Ok(mut decks) = self.decks.lock() {
            decks.insert(path.into(), deck);
        }
    }

    /// The deck last written to (or inserted at) `path`.
    pub fn get(&self, path: &Path) -> Option<Deck> {
        self.decks.lock().ok()?.get(path).cloned()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl DocumentAdapter for MemoryDocument {
    fn read(&self, path: &Path) -> Result<Deck, DocumentError> {
        self.get(path).ok_or_else(|| DocumentError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such deck"),
        })
    }

    fn write(&self, deck: &Deck, path: &Path) -> Result<(), DocumentError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DocumentError::Write {
                path: path.to_path_buf(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.insert(path, deck.clone());
        Ok(())
    }
}

/// Build a deck where each slide has a titled shape holding the given
/// paragraphs. Slide `n` gets title shape `s{n}/sh0` positioned at x=457200.
pub fn deck_with_titles(source: impl Into<PathBuf>, slides: &[&[&str]]) -> Deck {
    let mut deck = Deck::new(source);
    for (i, paragraphs) in slides.iter().enumerate() {
        let index = i + 1;
        let mut slide = Slide::new(index, format!("ppt/slides/slide{}.xml", index));
        let name = format!("Title {}", index);
        slide.shapes.push(ShapeElement {
            id: ElementId::shape(index, 0),
            name: name.clone(),
            placeholder: Some("title".to_string()),
            bounds: Some(Bounds {
                x: 457200,
                y: 274638,
                width: 8229600,
                height: 1143000,
            }),
        });
        for (p, text) in paragraphs.iter().enumerate() {
            slide.elements.push(TextElement {
                id: ElementId::paragraph(index, 0, p),
                shape_name: name.clone(),
                text: text.to_string(),
            });
        }
        deck.slides.push(slide);
    }
    deck
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_document_round_trips_and_fails_on_demand() {
        let deck = deck_with_titles("in.pptx", &[&["Helo wrold"], &[]]);
        let docs = MemoryDocument::new().with_deck(deck.clone());

        assert_eq!(docs.read(Path::new("in.pptx")).unwrap(), deck);
        assert!(docs.read(Path::new("missing.pptx")).is_err());

        docs.write(&deck, Path::new("out.pptx")).unwrap();
        assert_eq!(docs.get(Path::new("out.pptx")), Some(deck.clone()));

        docs.fail_writes(true);
        assert!(matches!(
            docs.write(&deck, Path::new("out.pptx")),
            Err(DocumentError::Write { .. })
        ));
    }
}
