use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::cli::Project;
use crate::codec::{decode_task, encode_task, DecodeOptions};
use crate::error::{Error, Result};
use crate::filter::EvalContext;
use crate::nav::{
    views, PluginViewParams, TaskDetailParams, TaskEditParams, ViewParams, ViewStack,
};
use crate::plugin::loader::load_default_scopes;
use crate::plugin::{registry, DokiSource, Plugin, TikiPlugin, ViewMode};
use crate::selection::{BoardSelection, Direction, PluginGridSelection};
use crate::store::{SearchResult, TaskStore};
use crate::task::Task;

use super::board::{self, Layout};
use super::editor::{self, Term};
use super::view;
use super::watch;

const EVENT_POLL_MS: u64 = 120;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StatusKind {
    Error,
    Info,
}

pub(crate) struct App {
    pub(crate) store: Arc<TaskStore>,
    pub(crate) plugins: Vec<Plugin>,
    /// Tiki plugin shown on the board.
    pub(crate) board_plugin: usize,
    /// Doki plugin shown in the document view.
    pub(crate) document_plugin: usize,
    pub(crate) document: String,
    pub(crate) board: Arc<BoardSelection>,
    pub(crate) grid: Arc<PluginGridSelection>,
    pub(crate) nav: ViewStack,
    pub(crate) columns: Vec<Vec<Task>>,
    pub(crate) search_input: Option<String>,
    pub(crate) status: Option<(StatusKind, String)>,
    root: PathBuf,
    user: Option<String>,
    max_points: i32,
    default_mode: ViewMode,
    dirty: Arc<AtomicBool>,
}

pub(crate) fn run(project: Project) -> Result<()> {
    let load = load_default_scopes(&project.task_dir(), project.max_points())?;
    registry::init_plugin_actions(&load.plugins)?;

    let first_error = load.errors.first().map(ToString::to_string);
    let mut app = App::new(project, load.plugins);
    if let Some(err) = first_error {
        app.set_error(format!("workflow: {err}"));
    }

    let dirty = Arc::clone(&app.dirty);
    let listener = app.store.add_listener(move || dirty.store(true, Ordering::SeqCst));
    let (err_tx, err_rx) = mpsc::channel();
    watch::spawn_watch(Arc::clone(&app.store), err_tx);

    let result = run_terminal(&mut app, err_rx);

    app.store.remove_listener(listener);
    registry::teardown_plugin_actions();
    result
}

fn run_terminal(app: &mut App, errors: Receiver<String>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app, errors);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop(terminal: &mut Term, app: &mut App, errors: Receiver<String>) -> Result<()> {
    let mut redraw = true;
    loop {
        while let Ok(err) = errors.try_recv() {
            app.set_error(format!("watch error: {err}"));
            redraw = true;
        }

        if app.dirty.swap(false, Ordering::SeqCst) {
            app.refresh();
            redraw = true;
        }

        if redraw {
            terminal.draw(|frame| view::render(frame, app))?;
            redraw = false;
        }

        if event::poll(Duration::from_millis(EVENT_POLL_MS))? {
            match event::read()? {
                Event::Key(key) => {
                    if handle_key(terminal, app, key) {
                        break;
                    }
                    app.refresh();
                    redraw = true;
                }
                Event::Resize(_, _) => redraw = true,
                _ => {}
            }
        }
    }
    Ok(())
}

impl App {
    pub(crate) fn new(project: Project, plugins: Vec<Plugin>) -> Self {
        let user = project.current_user_name();
        let max_points = project.max_points();
        let default_mode = ViewMode::parse(&project.config.ui.view_mode).unwrap_or_default();
        let dirty = Arc::new(AtomicBool::new(true));

        let board = Arc::new(BoardSelection::new(Vec::<String>::new()));
        {
            let dirty = Arc::clone(&dirty);
            board.add_listener(move || dirty.store(true, Ordering::SeqCst));
        }
        let grid = Arc::new(PluginGridSelection::new(1, 0));

        let mut app = Self {
            store: project.store,
            plugins,
            board_plugin: 0,
            document_plugin: 0,
            document: String::new(),
            board,
            grid,
            nav: ViewStack::new(),
            columns: Vec::new(),
            search_input: None,
            status: None,
            root: project.root,
            user,
            max_points,
            default_mode,
            dirty,
        };
        if let Some(first) = app.plugins.iter().position(|plugin| plugin.as_tiki().is_some()) {
            app.activate(first);
        }
        app
    }

    pub(crate) fn board_tiki(&self) -> Option<&TikiPlugin> {
        self.plugins.get(self.board_plugin).and_then(Plugin::as_tiki)
    }

    pub(crate) fn layout(&self) -> Layout {
        self.board_tiki().map_or(Layout::Lanes, board::layout_of)
    }

    pub(crate) fn view_mode(&self) -> ViewMode {
        match self.layout() {
            Layout::Lanes => self.board.view_mode(),
            Layout::Grid { .. } => self.grid.view_mode(),
        }
    }

    pub(crate) fn is_search_active(&self) -> bool {
        match self.layout() {
            Layout::Lanes => self.board.is_search_active(),
            Layout::Grid { .. } => self.grid.is_search_active(),
        }
    }

    pub(crate) fn search_query(&self) -> String {
        match self.layout() {
            Layout::Lanes => self.board.search_query(),
            Layout::Grid { .. } => self.grid.search_query(),
        }
    }

    fn search_results(&self) -> Option<Vec<SearchResult>> {
        match self.layout() {
            Layout::Lanes => self.board.search_results(),
            Layout::Grid { .. } => self.grid.search_results(),
        }
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "board error");
        self.status = Some((StatusKind::Error, message));
    }

    pub(crate) fn set_info(&mut self, message: impl Into<String>) {
        self.status = Some((StatusKind::Info, message.into()));
    }

    fn report(&mut self, err: Error) {
        if let Error::Conflict(id) = &err {
            let id = id.clone();
            if let Err(reload) = self.store.reload() {
                tracing::warn!(error = %reload, "reload after conflict failed");
            }
            self.set_error(format!("{id} changed on disk; reloaded, try again"));
            return;
        }
        self.set_error(err.to_string());
    }

    fn new_grid(&self, columns: usize, config_index: usize) -> Arc<PluginGridSelection> {
        let grid = Arc::new(PluginGridSelection::new(columns, config_index));
        let dirty = Arc::clone(&self.dirty);
        grid.add_listener(move || dirty.store(true, Ordering::SeqCst));
        grid
    }

    /// Show the plugin at `index`: tiki plugins replace the board, doki
    /// plugins open the document view on top of it.
    pub(crate) fn activate(&mut self, index: usize) {
        let Some(plugin) = self.plugins.get(index) else {
            return;
        };
        match plugin {
            Plugin::Tiki(tiki) => {
                let params = PluginViewParams {
                    plugin: tiki.base.name.clone(),
                    lane: 0,
                };
                let layout = board::layout_of(tiki);
                let panes = board::pane_names(tiki);
                let config_index = tiki.base.config_index;
                let mode = match tiki.view_mode {
                    ViewMode::Expanded => ViewMode::Expanded,
                    ViewMode::Compact => self.default_mode,
                };

                self.board_plugin = index;
                match layout {
                    Layout::Lanes => {
                        self.board.clear_search();
                        let first = panes.first().cloned().unwrap_or_default();
                        self.board.set_panes(panes);
                        self.board.set_selection(first, 0);
                        self.board.set_view_mode(mode);
                    }
                    Layout::Grid { columns } => {
                        self.grid = self.new_grid(columns, config_index);
                        self.grid.set_view_mode(mode);
                    }
                }
                self.nav.clear();
                if let Err(err) = self.nav.push_typed(views::BOARD, &params) {
                    self.report(err);
                }
            }
            Plugin::Doki(doki) => {
                let params = PluginViewParams {
                    plugin: doki.base.name.clone(),
                    lane: 0,
                };
                let document = self.load_document(&doki.source);
                self.document_plugin = index;
                self.document = document;
                let pushed = if self.nav.current_view_id() == views::PLUGIN {
                    params
                        .encode()
                        .map(|params| self.nav.replace_top(views::PLUGIN, params))
                        .map(|_| ())
                } else {
                    self.nav.push_typed(views::PLUGIN, &params)
                };
                if let Err(err) = pushed {
                    self.report(err);
                }
            }
        }
        self.refresh();
    }

    fn load_document(&self, source: &DokiSource) -> String {
        match source {
            DokiSource::Internal(text) => text.clone(),
            DokiSource::File(location) if location.contains("://") => {
                format!("Remote documents are not fetched: {location}")
            }
            DokiSource::File(location) => {
                let path = self.root.join(location);
                std::fs::read_to_string(&path)
                    .unwrap_or_else(|err| format!("Could not read {}: {err}", path.display()))
            }
        }
    }

    /// Rebuild the board columns and clamp the selection without notifying.
    pub(crate) fn refresh(&mut self) {
        let search = self.search_results();
        let columns = match self.board_tiki() {
            Some(plugin) => {
                let tasks = self.store.get_all_tasks();
                let ctx = EvalContext::new(Utc::now(), self.user.as_deref());
                board::build_columns(plugin, &tasks, &ctx, search.as_deref())
            }
            None => Vec::new(),
        };
        self.columns = columns;

        let (pane, row) = self.selected_position();
        let len = self.columns.get(pane).map_or(0, Vec::len);
        let clamped = board::clamp_row(row, len);
        if clamped != row {
            match self.layout() {
                Layout::Lanes => self.board.set_selected_row_silent(clamped),
                Layout::Grid { .. } => self.grid.set_selected_index_silent(clamped),
            }
        }
    }

    /// Selected column and row within it.
    pub(crate) fn selected_position(&self) -> (usize, usize) {
        match self.layout() {
            Layout::Lanes => {
                let pane = self.board.selected_pane();
                let index = self
                    .board
                    .panes()
                    .iter()
                    .position(|name| *name == pane)
                    .unwrap_or(0);
                (index, self.board.selected_row())
            }
            Layout::Grid { .. } => (0, self.grid.selected_index()),
        }
    }

    pub(crate) fn selected_task(&self) -> Option<&Task> {
        let (pane, row) = self.selected_position();
        self.columns.get(pane).and_then(|column| column.get(row))
    }

    fn move_selection(&mut self, direction: Direction) {
        let (pane, row) = self.selected_position();
        let len = self.columns.get(pane).map_or(0, Vec::len);
        match self.layout() {
            Layout::Lanes => match direction {
                Direction::Left => {
                    self.board.move_selection_left();
                }
                Direction::Right => {
                    self.board.move_selection_right();
                }
                Direction::Up => {
                    if let Some(prev) = row.checked_sub(1) {
                        self.board.set_selected_row(prev);
                    }
                }
                Direction::Down => {
                    if row + 1 < len {
                        self.board.set_selected_row(row + 1);
                    }
                }
            },
            Layout::Grid { .. } => {
                self.grid.move_selection(direction, len);
            }
        }
    }

    /// Move the selected task one lane over through the target lane's action.
    fn move_task(&mut self, direction: Direction) {
        if self.layout() != Layout::Lanes {
            return;
        }
        let (pane, _) = self.selected_position();
        let target = match direction {
            Direction::Left => pane.checked_sub(1),
            Direction::Right => Some(pane + 1).filter(|next| *next < self.columns.len()),
            _ => None,
        };
        let (Some(target), Some(task), Some(plugin)) =
            (target, self.selected_task(), self.board_tiki())
        else {
            return;
        };

        let id = task.id.clone();
        let lane_name = plugin.lanes.get(target).map(|lane| lane.name.clone());
        let moved = plugin
            .move_to_lane(task, target, self.user.as_deref(), self.max_points)
            .and_then(|updated| self.store.try_update_task(updated));
        match moved {
            Ok(_) => {
                tracing::debug!(%id, lane = target, "task moved");
                self.refresh();
                let row = self
                    .columns
                    .get(target)
                    .and_then(|column| column.iter().position(|task| task.id == id));
                if let (Some(lane), Some(row)) = (lane_name, row) {
                    self.board.set_selection(lane, row);
                }
            }
            Err(err) => self.report(err),
        }
    }

    fn start_search(&mut self) {
        self.search_input = Some(self.search_query());
    }

    fn run_search(&mut self, query: String) {
        if query.trim().is_empty() {
            self.clear_search();
            return;
        }
        let filter = self.board_tiki().and_then(|plugin| plugin.filter.clone());
        let results = self.store.search(&query, filter.as_ref());
        let hits = results.len();
        match self.layout() {
            Layout::Lanes => self.board.set_search_results(results, query),
            Layout::Grid { .. } => self.grid.set_search_results(results, query),
        }
        self.set_info(format!("{hits} match(es)"));
    }

    fn clear_search(&mut self) {
        match self.layout() {
            Layout::Lanes => self.board.clear_search(),
            Layout::Grid { .. } => self.grid.clear_search(),
        }
    }

    fn toggle_view_mode(&mut self) {
        match self.layout() {
            Layout::Lanes => {
                self.board.toggle_view_mode();
            }
            Layout::Grid { .. } => self.grid.set_view_mode(self.grid.view_mode().toggled()),
        }
    }

    /// Run the active plugin's action bound to `key`; `false` when unbound.
    fn apply_plugin_action(&mut self, key: char) -> bool {
        let Some(action) = self
            .board_tiki()
            .and_then(|plugin| plugin.action_for_key(key))
            .cloned()
        else {
            return false;
        };
        let Some(task) = self.selected_task().cloned() else {
            self.set_info("no task selected");
            return true;
        };
        let applied = action
            .action
            .apply(&task, self.user.as_deref(), self.max_points)
            .and_then(|updated| self.store.try_update_task(updated));
        match applied {
            Ok(task) => self.set_info(format!("{}: {}", action.label, task.id)),
            Err(err) => self.report(err),
        }
        true
    }

    fn open_detail(&mut self) {
        let Some(task_id) = self.selected_task().map(|task| task.id.clone()) else {
            return;
        };
        if let Err(err) = self.nav.push_typed(views::TASK_DETAIL, &TaskDetailParams { task_id }) {
            self.report(err);
        }
    }

    /// Task shown by the detail view on top of the stack.
    pub(crate) fn detail_task(&self) -> Option<Task> {
        let params: TaskDetailParams = self.nav.current_view()?.params_as().ok()?;
        self.store.get_task(&params.task_id)
    }

    fn edit_task(&mut self, terminal: &mut Term, task: Task) {
        let params = TaskEditParams {
            task_id: task.id.clone(),
            is_new: false,
            focus: None,
            description_only: false,
        };
        if let Err(err) = self.nav.push_typed(views::TASK_EDIT, &params) {
            return self.report(err);
        }
        let result = self.edit_in_editor(terminal, &task, false);
        self.nav.pop();
        match result {
            Ok(Some(task)) => self.set_info(format!("saved {}", task.id)),
            Ok(None) => self.set_info("no changes"),
            Err(err) => self.report(err),
        }
    }

    fn new_task(&mut self, terminal: &mut Term) {
        let mut draft = match self.store.new_task_template() {
            Ok(task) => task,
            Err(err) => return self.report(err),
        };
        if self.layout() == Layout::Lanes {
            let (pane, _) = self.selected_position();
            if let Some(plugin) = self.board_tiki() {
                match plugin.move_to_lane(&draft, pane, self.user.as_deref(), self.max_points) {
                    Ok(task) => draft = task,
                    Err(err) => tracing::debug!(error = %err, "lane defaults not applied"),
                }
            }
        }

        let params = TaskEditParams {
            task_id: draft.id.clone(),
            is_new: true,
            focus: Some("title".to_string()),
            description_only: false,
        };
        if let Err(err) = self.nav.push_typed(views::TASK_EDIT, &params) {
            return self.report(err);
        }
        let result = self.edit_in_editor(terminal, &draft, true);
        self.nav.pop();
        match result {
            Ok(Some(task)) => self.set_info(format!("created {}", task.id)),
            Ok(None) => self.set_info("cancelled: a new task needs a title"),
            Err(err) => self.report(err),
        }
    }

    /// Round-trip `task` through the external editor and save the result.
    ///
    /// `Ok(None)` when nothing was saved: an unchanged buffer, or a new
    /// task left without a title.
    fn edit_in_editor(&mut self, terminal: &mut Term, task: &Task, is_new: bool) -> Result<Option<Task>> {
        let content = encode_task(task)?;
        let edited = editor::edit_external(terminal, &content).map_err(Error::OperationFailed)?;
        if edited == content && !is_new {
            return Ok(None);
        }

        let options = DecodeOptions {
            max_points: self.max_points,
            fallback_id: task.id.clone(),
            fallback_time: task.created_at,
        };
        let decoded = decode_task(&edited, &options);
        for warning in &decoded.warnings {
            tracing::debug!(id = %task.id, %warning, "edited task normalized");
        }
        let mut updated = decoded.task;
        updated.id = task.id.clone();
        updated.created_at = task.created_at;
        updated.loaded_mtime = task.loaded_mtime;
        if decoded.missing_created_by {
            updated.created_by = task.created_by.clone();
        }

        if is_new {
            if updated.title.trim().is_empty() {
                return Ok(None);
            }
            self.store.create_task(updated).map(Some)
        } else {
            self.store.try_update_task(updated).map(Some)
        }
    }
}

fn is_shift_arrow(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::SHIFT)
        && matches!(key.code, KeyCode::Left | KeyCode::Right)
}

/// Handle one key press; `true` quits.
fn handle_key(terminal: &mut Term, app: &mut App, key: KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    if app.search_input.is_some() {
        handle_search_key(app, key);
        return false;
    }

    if let Some(activation) = registry::plugin_for_key(&key) {
        app.activate(activation.index);
        return false;
    }

    let view_id = app.nav.current_view_id().to_string();
    match view_id.as_str() {
        views::TASK_DETAIL => handle_detail_key(terminal, app, key),
        views::PLUGIN => handle_document_key(app, key),
        _ => handle_board_key(terminal, app, key),
    }
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
    let Some(input) = app.search_input.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Esc => app.search_input = None,
        KeyCode::Enter => {
            let query = std::mem::take(input);
            app.search_input = None;
            app.run_search(query);
        }
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Char(ch) => input.push(ch),
        _ => {}
    }
}

fn handle_board_key(terminal: &mut Term, app: &mut App, key: KeyEvent) -> bool {
    if is_shift_arrow(&key) {
        let direction = if key.code == KeyCode::Left {
            Direction::Left
        } else {
            Direction::Right
        };
        app.move_task(direction);
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Esc => {
            if app.is_search_active() {
                app.clear_search();
            } else {
                app.status = None;
            }
        }
        KeyCode::Left | KeyCode::Char('h') => app.move_selection(Direction::Left),
        KeyCode::Right | KeyCode::Char('l') => app.move_selection(Direction::Right),
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(Direction::Up),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(Direction::Down),
        KeyCode::Enter => app.open_detail(),
        KeyCode::Char('/') => app.start_search(),
        KeyCode::Char('v') => app.toggle_view_mode(),
        KeyCode::Char('n') => app.new_task(terminal),
        KeyCode::Char('e') => {
            if let Some(task) = app.selected_task().cloned() {
                app.edit_task(terminal, task);
            }
        }
        KeyCode::Char('r') => match app.store.reload() {
            Ok(()) => app.set_info("reloaded"),
            Err(err) => app.report(err),
        },
        KeyCode::Char(ch) => {
            app.apply_plugin_action(ch);
        }
        _ => {}
    }
    false
}

fn handle_detail_key(terminal: &mut Term, app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => {
            app.nav.pop();
        }
        KeyCode::Char('e') => {
            if let Some(task) = app.detail_task() {
                app.edit_task(terminal, task);
            }
        }
        _ => {}
    }
    false
}

fn handle_document_key(app: &mut App, key: KeyEvent) -> bool {
    if matches!(key.code, KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q')) {
        app.nav.pop();
    }
    false
}
