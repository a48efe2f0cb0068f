//! Selection models observed by the views.
//!
//! Each model keeps its state behind a read/write lock and notifies its
//! listeners after the lock is released. Setters named `*_silent` clamp
//! state during a redraw and never notify.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::listeners::{ListenerId, ListenerRegistry};
use crate::plugin::ViewMode;
use crate::search_state::SearchState;
use crate::store::SearchResult;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

// =============================================================================
// Board
// =============================================================================

#[derive(Debug, Default)]
struct BoardState {
    panes: Vec<String>,
    selected_pane: String,
    selected_row: usize,
    view_mode: ViewMode,
    search: SearchState,
}

/// Pane-and-row selection on the kanban board.
#[derive(Debug, Default)]
pub struct BoardSelection {
    state: RwLock<BoardState>,
    listeners: ListenerRegistry,
}

impl BoardSelection {
    /// Select the first pane of `panes`, row 0.
    pub fn new<I, S>(panes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let panes: Vec<String> = panes.into_iter().map(Into::into).collect();
        let selected_pane = panes.first().cloned().unwrap_or_default();
        Self {
            state: RwLock::new(BoardState {
                panes,
                selected_pane,
                ..BoardState::default()
            }),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    pub fn panes(&self) -> Vec<String> {
        read(&self.state).panes.clone()
    }

    pub fn selected_pane(&self) -> String {
        read(&self.state).selected_pane.clone()
    }

    pub fn selected_row(&self) -> usize {
        read(&self.state).selected_row
    }

    pub fn view_mode(&self) -> ViewMode {
        read(&self.state).view_mode
    }

    /// Replace the pane list, keeping the selection when its pane survives.
    pub fn set_panes<I, S>(&self, panes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut state = write(&self.state);
            state.panes = panes.into_iter().map(Into::into).collect();
            if !state.panes.contains(&state.selected_pane) {
                state.selected_pane = state.panes.first().cloned().unwrap_or_default();
                state.selected_row = 0;
            }
        }
        self.listeners.notify();
    }

    /// Move to `pane` and `row` with a single notification.
    pub fn set_selection(&self, pane: impl Into<String>, row: usize) {
        {
            let mut state = write(&self.state);
            state.selected_pane = pane.into();
            state.selected_row = row;
        }
        self.listeners.notify();
    }

    pub fn set_selected_row(&self, row: usize) {
        write(&self.state).selected_row = row;
        self.listeners.notify();
    }

    /// Clamp the row during a refresh without notifying.
    pub fn set_selected_row_silent(&self, row: usize) {
        write(&self.state).selected_row = row;
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        write(&self.state).view_mode = mode;
        self.listeners.notify();
    }

    pub fn toggle_view_mode(&self) -> ViewMode {
        let mode = {
            let mut state = write(&self.state);
            state.view_mode = state.view_mode.toggled();
            state.view_mode
        };
        self.listeners.notify();
        mode
    }

    pub fn move_selection_left(&self) -> bool {
        self.move_pane(-1)
    }

    pub fn move_selection_right(&self) -> bool {
        self.move_pane(1)
    }

    /// Step to the neighbouring pane and reset the row to 0.
    fn move_pane(&self, step: isize) -> bool {
        let moved = {
            let mut state = write(&self.state);
            let current = state
                .panes
                .iter()
                .position(|pane| *pane == state.selected_pane);
            let target = current
                .and_then(|index| index.checked_add_signed(step))
                .and_then(|index| state.panes.get(index).cloned());
            match target {
                Some(pane) => {
                    state.selected_pane = pane;
                    state.selected_row = 0;
                    true
                }
                None => false,
            }
        };
        if moved {
            self.listeners.notify();
        }
        moved
    }

    // Search ------------------------------------------------------------------

    /// Install search results, remembering the selection the first time.
    pub fn set_search_results(&self, results: Vec<SearchResult>, query: impl Into<String>) {
        {
            let mut state = write(&self.state);
            if !state.search.is_active() {
                let (pane, row) = (state.selected_pane.clone(), state.selected_row);
                state.search.save_pre_search_pane_state(pane, row);
            }
            state.search.set_search_results(results, query);
            state.selected_row = 0;
        }
        self.listeners.notify();
    }

    /// Leave search and restore the pane and row it started from.
    pub fn clear_search(&self) {
        {
            let mut state = write(&self.state);
            if !state.search.is_active() {
                return;
            }
            let anchor = state.search.clear_search_results();
            if state.panes.contains(&anchor.pane) {
                state.selected_pane = anchor.pane;
            }
            state.selected_row = anchor.row;
        }
        self.listeners.notify();
    }

    pub fn is_search_active(&self) -> bool {
        read(&self.state).search.is_active()
    }

    pub fn search_query(&self) -> String {
        read(&self.state).search.query().to_string()
    }

    pub fn search_results(&self) -> Option<Vec<SearchResult>> {
        read(&self.state).search.results().map(<[SearchResult]>::to_vec)
    }
}

// =============================================================================
// Plugin grid
// =============================================================================

#[derive(Debug)]
struct GridState {
    selected_index: usize,
    columns: usize,
    view_mode: ViewMode,
    config_index: usize,
    search: SearchState,
}

/// Index selection over tasks laid out `columns` wide.
#[derive(Debug)]
pub struct PluginGridSelection {
    state: RwLock<GridState>,
    listeners: ListenerRegistry,
}

impl PluginGridSelection {
    pub fn new(columns: usize, config_index: usize) -> Self {
        Self {
            state: RwLock::new(GridState {
                selected_index: 0,
                columns: columns.max(1),
                view_mode: ViewMode::default(),
                config_index,
                search: SearchState::new(),
            }),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    pub fn selected_index(&self) -> usize {
        read(&self.state).selected_index
    }

    pub fn columns(&self) -> usize {
        read(&self.state).columns
    }

    pub fn config_index(&self) -> usize {
        read(&self.state).config_index
    }

    pub fn view_mode(&self) -> ViewMode {
        read(&self.state).view_mode
    }

    pub fn set_selected_index(&self, index: usize) {
        write(&self.state).selected_index = index;
        self.listeners.notify();
    }

    /// Clamp the index during a refresh without notifying.
    pub fn set_selected_index_silent(&self, index: usize) {
        write(&self.state).selected_index = index;
    }

    pub fn set_columns(&self, columns: usize) {
        write(&self.state).columns = columns.max(1);
        self.listeners.notify();
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        write(&self.state).view_mode = mode;
        self.listeners.notify();
    }

    /// Move within a grid of `count` items; `false` when blocked by an edge.
    ///
    /// The last row may be partial: moving right past its end or down onto
    /// a missing cell does not move.
    pub fn move_selection(&self, direction: Direction, count: usize) -> bool {
        let moved = {
            let mut state = write(&self.state);
            let next = grid_step(state.selected_index, state.columns, count, direction);
            match next {
                Some(index) => {
                    state.selected_index = index;
                    true
                }
                None => false,
            }
        };
        if moved {
            self.listeners.notify();
        }
        moved
    }

    pub fn set_search_results(&self, results: Vec<SearchResult>, query: impl Into<String>) {
        {
            let mut state = write(&self.state);
            if !state.search.is_active() {
                let index = state.selected_index;
                state.search.save_pre_search_state(index);
            }
            state.search.set_search_results(results, query);
            state.selected_index = 0;
        }
        self.listeners.notify();
    }

    pub fn clear_search(&self) {
        {
            let mut state = write(&self.state);
            if !state.search.is_active() {
                return;
            }
            state.selected_index = state.search.clear_search_results().index;
        }
        self.listeners.notify();
    }

    pub fn is_search_active(&self) -> bool {
        read(&self.state).search.is_active()
    }

    pub fn search_query(&self) -> String {
        read(&self.state).search.query().to_string()
    }

    pub fn search_results(&self) -> Option<Vec<SearchResult>> {
        read(&self.state).search.results().map(<[SearchResult]>::to_vec)
    }
}

fn grid_step(index: usize, columns: usize, count: usize, direction: Direction) -> Option<usize> {
    if count == 0 || index >= count {
        return None;
    }
    let columns = columns.max(1);
    match direction {
        Direction::Left => (index % columns != 0).then(|| index - 1),
        Direction::Right => {
            let next = index + 1;
            (index % columns != columns - 1 && next < count).then_some(next)
        }
        Direction::Up => index.checked_sub(columns),
        Direction::Down => {
            let next = index + columns;
            (next < count).then_some(next)
        }
    }
}
