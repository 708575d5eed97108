// ABOUTME: Core library for deckfix, containing the deck model, corrections and agent state.
// ABOUTME: This crate defines the shared data model used by the document adapter and the agent loop.

pub mod alignment;
pub mod correction;
pub mod deck;
pub mod document;
pub mod element;
pub mod rules;
pub mod state;
pub mod store;
pub mod testing;

pub use correction::{Correction, CorrectionKind, Proposal};
pub use deck::{Deck, ShapeElement, ShapeRole, Slide, TextElement};
pub use document::{DocumentAdapter, DocumentError, corrected_path};
pub use element::{Bounds, ElementId, ElementIdError, Position, PositionValue};
pub use state::AgentState;
pub use store::{ApplyReport, Conflict, ConflictReason, CorrectionStore, StoreError};
