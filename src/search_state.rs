//! Search bookkeeping embedded in the selection models.
//!
//! Search is active exactly while results are installed. The selection that
//! was current when the search opened is saved as an anchor and handed back
//! when the search is cleared.

use crate::store::SearchResult;

/// Selection to restore when a search is cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreSearchAnchor {
    /// Grid index, for models that select by index.
    pub index: usize,
    /// Pane ID, for models that select by pane and row.
    pub pane: String,
    pub row: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    results: Option<Vec<SearchResult>>,
    query: String,
    anchor: PreSearchAnchor,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_search_results(&mut self, results: Vec<SearchResult>, query: impl Into<String>) {
        self.results = Some(results);
        self.query = query.into();
    }

    pub fn is_active(&self) -> bool {
        self.results.is_some()
    }

    pub fn results(&self) -> Option<&[SearchResult]> {
        self.results.as_deref()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn save_pre_search_state(&mut self, index: usize) {
        self.anchor.index = index;
    }

    pub fn save_pre_search_pane_state(&mut self, pane: impl Into<String>, row: usize) {
        self.anchor.pane = pane.into();
        self.anchor.row = row;
    }

    /// Drop results and query, returning the saved anchor.
    pub fn clear_search_results(&mut self) -> PreSearchAnchor {
        self.results = None;
        self.query.clear();
        std::mem::take(&mut self.anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    #[test]
    fn active_iff_results_installed() {
        let mut state = SearchState::new();
        assert!(!state.is_active());

        state.set_search_results(Vec::new(), "nothing");
        assert!(state.is_active());
        assert_eq!(state.results().unwrap().len(), 0);
        assert_eq!(state.query(), "nothing");

        state.clear_search_results();
        assert!(!state.is_active());
        assert_eq!(state.query(), "");
    }

    #[test]
    fn clear_returns_saved_anchor() {
        let mut state = SearchState::new();
        state.save_pre_search_state(4);
        state.save_pre_search_pane_state("in_progress", 2);
        state.set_search_results(
            vec![SearchResult {
                task: Task::new("T1", "First"),
                score: 2.0,
            }],
            "first",
        );

        let anchor = state.clear_search_results();
        assert_eq!(
            anchor,
            PreSearchAnchor {
                index: 4,
                pane: "in_progress".to_string(),
                row: 2,
            }
        );
        assert_eq!(state.clear_search_results(), PreSearchAnchor::default());
    }
}
