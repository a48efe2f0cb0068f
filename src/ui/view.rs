use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use crate::nav::views;
use crate::plugin::{Plugin, ViewMode};
use crate::task::Task;

use super::app::{App, StatusKind};
use super::board::Layout as BoardLayout;

const COLOR_TEXT: Color = Color::Rgb(234, 236, 239);
const COLOR_MUTED: Color = Color::Rgb(160, 165, 172);
const COLOR_BG_MUTED: Color = Color::Rgb(52, 56, 60);
const COLOR_INFO: Color = Color::Rgb(116, 198, 219);
const COLOR_ERROR: Color = Color::Rgb(255, 107, 107);
const COLOR_ACCENT: Color = Color::Rgb(122, 170, 255);
const COLOR_BORDER_LIST: Color = Color::Rgb(92, 126, 166);
const COLOR_BORDER_DETAIL: Color = Color::Rgb(180, 156, 92);
const UNASSIGNED: &str = "Unassigned";

pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(frame, app, chunks[0]);
    match app.nav.current_view_id() {
        views::TASK_DETAIL => render_detail(frame, app, chunks[1]),
        views::PLUGIN => render_document(frame, app, chunks[1]),
        _ => render_board(frame, app, chunks[1]),
    }
    render_footer(frame, app, chunks[2]);
}

/// Parse `#rrggbb` or a basic color name.
fn parse_color(value: Option<&str>) -> Option<Color> {
    let value = value?.trim();
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() == 6 {
            let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
            return Some(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?));
        }
        return None;
    }
    value.parse::<Color>().ok()
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let showing_document = app.nav.current_view_id() == views::PLUGIN;
    let mut spans = Vec::new();
    for (index, plugin) in app.plugins.iter().enumerate() {
        let active = match plugin {
            Plugin::Tiki(_) => !showing_document && index == app.board_plugin,
            Plugin::Doki(_) => showing_document && index == app.document_plugin,
        };
        let base = plugin.base();
        let mut style = Style::default().fg(parse_color(base.foreground.as_deref()).unwrap_or(COLOR_TEXT));
        if let Some(bg) = parse_color(base.background.as_deref()) {
            style = style.bg(bg);
        }
        if active {
            style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
        }
        spans.push(Span::styled(format!(" {} {} ", base.key, base.name), style));
        spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let line = if let Some(input) = &app.search_input {
        Line::from(vec![
            Span::styled("/", Style::default().fg(COLOR_ACCENT)),
            Span::raw(input.clone()),
            Span::styled("_", Style::default().fg(COLOR_MUTED)),
        ])
    } else if let Some((kind, message)) = &app.status {
        let color = match kind {
            StatusKind::Error => COLOR_ERROR,
            StatusKind::Info => COLOR_INFO,
        };
        Line::from(Span::styled(message.clone(), Style::default().fg(color)))
    } else {
        let hint = match app.nav.current_view_id() {
            views::TASK_DETAIL => "e edit  Esc back",
            views::PLUGIN => "Esc back",
            _ => "←→↑↓ move  S-←→ move task  Enter open  e edit  n new  / search  v view  q quit",
        };
        Line::from(Span::styled(hint, Style::default().fg(COLOR_MUTED)))
    };
    frame.render_widget(Paragraph::new(line).style(Style::default().bg(COLOR_BG_MUTED)), area);
}

fn task_item(task: &Task, mode: ViewMode) -> ListItem<'static> {
    let title = Line::from(vec![
        Span::styled(format!("{} ", task.id), Style::default().fg(COLOR_MUTED)),
        Span::styled(task.title.clone(), Style::default().fg(COLOR_TEXT)),
    ]);
    match mode {
        ViewMode::Compact => ListItem::new(title),
        ViewMode::Expanded => {
            let assignee = if task.assignee.is_empty() {
                UNASSIGNED
            } else {
                task.assignee.as_str()
            };
            let meta = Line::from(Span::styled(
                format!(
                    "  {} · p{} · {}pt · {}",
                    task.kind, task.priority, task.points, assignee
                ),
                Style::default().fg(COLOR_MUTED),
            ));
            let mut lines = vec![title, meta];
            if !task.tags.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("  #{}", task.tags.join(" #")),
                    Style::default().fg(COLOR_ACCENT),
                )));
            }
            ListItem::new(lines)
        }
    }
}

fn render_board(frame: &mut Frame, app: &App, area: Rect) {
    let Some(plugin) = app.board_tiki() else {
        let empty = Paragraph::new("No task plugins are configured.")
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    };
    let mode = app.view_mode();
    let (selected_pane, selected_row) = app.selected_position();
    let search = app.is_search_active().then(|| app.search_query());

    match app.layout() {
        BoardLayout::Lanes => {
            let count = app.columns.len().max(1) as u32;
            let constraints: Vec<Constraint> =
                (0..count).map(|_| Constraint::Ratio(1, count)).collect();
            let lanes = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(constraints)
                .split(area);
            for (index, column) in app.columns.iter().enumerate() {
                let name = plugin
                    .lanes
                    .get(index)
                    .map_or(plugin.base.name.as_str(), |lane| lane.name.as_str());
                let title = format!(" {} ({}) ", name, column.len());
                render_column(
                    frame,
                    lanes[index],
                    &title,
                    column,
                    mode,
                    (index == selected_pane).then_some(selected_row),
                );
            }
        }
        BoardLayout::Grid { columns } => {
            let mut title = format!(" {} ", plugin.base.name);
            if let Some(query) = &search {
                title.push_str(&format!("/{query} "));
            }
            let tasks = app.columns.first().map(Vec::as_slice).unwrap_or_default();
            render_grid(frame, area, &title, tasks, columns, mode, selected_row);
        }
    }
}

fn render_column(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    tasks: &[Task],
    mode: ViewMode,
    selected: Option<usize>,
) {
    let border = if selected.is_some() {
        COLOR_ACCENT
    } else {
        COLOR_BORDER_LIST
    };
    let items: Vec<ListItem> = tasks.iter().map(|task| task_item(task, mode)).collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(title.to_string()),
        )
        .highlight_style(Style::default().bg(COLOR_BG_MUTED).add_modifier(Modifier::BOLD));
    let mut state = ListState::default();
    state.select(selected.filter(|_| !tasks.is_empty()));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_grid(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    tasks: &[Task],
    columns: usize,
    mode: ViewMode,
    selected: usize,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(COLOR_BORDER_LIST))
        .title(title.to_string());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let columns = columns.max(1);
    let width = columns as u32;
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints((0..columns).map(|_| Constraint::Ratio(1, width)).collect::<Vec<_>>())
        .split(inner);
    for (column, cell) in cells.iter().enumerate() {
        let slice: Vec<Task> = tasks
            .iter()
            .skip(column)
            .step_by(columns)
            .cloned()
            .collect();
        let items: Vec<ListItem> = slice.iter().map(|task| task_item(task, mode)).collect();
        let list = List::new(items)
            .highlight_style(Style::default().bg(COLOR_BG_MUTED).add_modifier(Modifier::BOLD));
        let mut state = ListState::default();
        if !tasks.is_empty() && selected % columns == column {
            state.select(Some(selected / columns));
        }
        frame.render_stateful_widget(list, *cell, &mut state);
    }
}

fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
    let Some(task) = app.detail_task() else {
        let gone = Paragraph::new("This task no longer exists.")
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(gone, area);
        return;
    };

    let label = |name: &str| Span::styled(format!("{name:<10}"), Style::default().fg(COLOR_MUTED));
    let assignee = if task.assignee.is_empty() {
        Span::styled(UNASSIGNED, Style::default().fg(COLOR_MUTED))
    } else {
        Span::raw(task.assignee.clone())
    };
    let mut lines = vec![
        Line::from(vec![label("Status"), Span::raw(task.status.label())]),
        Line::from(vec![label("Type"), Span::raw(task.kind.to_string())]),
        Line::from(vec![label("Priority"), Span::raw(task.priority.to_string())]),
        Line::from(vec![label("Points"), Span::raw(task.points.to_string())]),
        Line::from(vec![label("Assignee"), assignee]),
        Line::from(vec![label("Tags"), Span::raw(task.tags.join(", "))]),
        Line::from(vec![
            label("Created"),
            Span::raw(format!(
                "{} by {}",
                task.created_at.format("%Y-%m-%d %H:%M"),
                task.created_by
            )),
        ]),
        Line::from(vec![
            label("Updated"),
            Span::raw(task.updated_at.format("%Y-%m-%d %H:%M").to_string()),
        ]),
        Line::default(),
    ];
    lines.extend(task.description.lines().map(|line| Line::from(line.to_string())));
    if !task.comments.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("Comments ({})", task.comments.len()),
            Style::default().fg(COLOR_ACCENT),
        )));
        for comment in &task.comments {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{} {}: ", comment.created_at.format("%Y-%m-%d"), comment.author),
                    Style::default().fg(COLOR_MUTED),
                ),
                Span::raw(comment.text.clone()),
            ]));
        }
    }

    let widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(COLOR_BORDER_DETAIL))
                .title(format!(" {}: {} ", task.id, task.title)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn render_document(frame: &mut Frame, app: &App, area: Rect) {
    let title = app
        .plugins
        .get(app.document_plugin)
        .map(|plugin| format!(" {} ", plugin.name()))
        .unwrap_or_default();
    let lines: Vec<Line> = app
        .document
        .lines()
        .map(|line| {
            if line.starts_with('#') {
                Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(line.to_string())
            }
        })
        .collect();
    let widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(COLOR_BORDER_DETAIL))
                .title(title),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}
