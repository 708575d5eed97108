// ABOUTME: AgentState is the single mutable record of one review run, threaded through every tool handler.
// ABOUTME: Tracks iteration, the correction store, analyzed slides, the loaded deck, conflicts and completion.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::deck::Deck;
use crate::store::{Conflict, CorrectionStore};

/// Progress of a single run. Created empty, mutated only by tool handlers
/// and the loop's iteration counter, dropped when the run ends.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentState {
    pub iteration: u32,
    pub corrections: CorrectionStore,
    /// 1-based numbers of slides whose content has been extracted.
    pub analyzed: BTreeSet<usize>,
    /// Snapshot loaded on first use by a tool.
    #[serde(skip)]
    pub deck: Option<Deck>,
    /// Conflicts reported by every apply pass so far.
    pub conflicts: Vec<Conflict>,
    complete: bool,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Set the completion flag. There is no way to clear it.
    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    pub fn mark_analyzed(&mut self, slides: impl IntoIterator<Item = usize>) {
        self.analyzed.extend(slides);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_empty() {
        let state = AgentState::new();
        assert_eq!(state.iteration, 0);
        assert_eq!(state.corrections.pending_count(), 0);
        assert!(state.analyzed.is_empty());
        assert!(state.deck.is_none());
        assert!(!state.is_complete());
    }

    #[test]
    fn completion_is_monotonic() {
        let mut state = AgentState::new();
        state.mark_complete();
        state.mark_complete();
        assert!(state.is_complete());
    }

    #[test]
    fn analyzed_slides_are_deduplicated_and_ordered() {
        let mut state = AgentState::new();
        state.mark_analyzed([3, 1]);
        state.mark_analyzed([1, 2]);
        assert_eq!(state.analyzed.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
