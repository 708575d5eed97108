// ABOUTME: The DocumentAdapter boundary: read a presentation into a Deck, write a Deck back to disk.
// ABOUTME: DocumentError covers every I/O-category failure; callers treat all of them as fatal.

use std::path::{Path, PathBuf};

use crate::deck::Deck;

/// Suffix inserted before the extension of the input path to name the output.
pub const CORRECTED_SUFFIX: &str = "_corrected";

/// Errors raised by a document adapter.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid package {}: {message}", .path.display())]
    Package { path: PathBuf, message: String },

    #[error("part '{part}' missing from {}", .path.display())]
    MissingPart { path: PathBuf, part: String },

    #[error("malformed XML in '{part}': {message}")]
    Xml { part: String, message: String },
}

/// Reads and writes presentations. Implementations are synchronous.
pub trait DocumentAdapter: Send + Sync {
    /// Read the whole presentation at `path` into a snapshot.
    fn read(&self, path: &Path) -> Result<Deck, DocumentError>;

    /// Persist `deck` to `path`, overwriting any existing file.
    fn write(&self, deck: &Deck, path: &Path) -> Result<(), DocumentError>;
}

/// The output path for a corrected copy of `input`: `deck.pptx` becomes
/// `deck_corrected.pptx` in the same directory.
pub fn corrected_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, CORRECTED_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, CORRECTED_SUFFIX),
    };
    input.with_file_name(name)
}
