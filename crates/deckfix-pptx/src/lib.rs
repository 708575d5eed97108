// ABOUTME: PowerPoint (Office Open XML) document adapter for deckfix.
// ABOUTME: Reads .pptx packages into Decks and writes corrected text and geometry back into a copy.

mod adapter;
mod package;
mod rewrite;
mod scan;
mod slide;
pub mod testing;

pub use adapter::PptxDocument;
