use std::time::Instant;

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::block::Title;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::storage::KeyValueStore;
use crate::task::{format_created, Filter, Priority, Task};

use super::app::{AppState, Focus, StatusKind};
use super::dialog::ConfirmDialog;

const CHECKBOX_WIDTH: usize = 4;
const MARKER_WIDTH: usize = 2;
const TAG_TEXT: &str = "important";
const TIME_WIDTH: usize = 18;
const HELP_KEY_WIDTH: usize = 12;
const INPUT_PLACEHOLDER: &str = "What needs to be done?";
const COLOR_TEXT: Color = Color::Rgb(234, 236, 239);
const COLOR_MUTED: Color = Color::Rgb(160, 165, 172);
const COLOR_MUTED_DARK: Color = Color::Rgb(118, 124, 130);
const COLOR_BG_MUTED: Color = Color::Rgb(52, 56, 60);
const COLOR_INFO: Color = Color::Rgb(116, 198, 219);
const COLOR_WARNING: Color = Color::Rgb(244, 200, 98);
const COLOR_ERROR: Color = Color::Rgb(255, 107, 107);
const COLOR_SUCCESS: Color = Color::Rgb(126, 210, 146);
const COLOR_ACCENT: Color = Color::Rgb(122, 170, 255);
const COLOR_BORDER_LIST: Color = Color::Rgb(92, 126, 166);

pub fn render<S: KeyValueStore>(frame: &mut Frame, app: &mut AppState<S>, now: Instant) {
    app.rebind_rows();

    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(2),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);

    render_tabs(frame, app, chunks[0]);
    render_input(frame, app, chunks[1], now);
    render_list(frame, app, chunks[2]);
    render_footer(frame, app, chunks[3]);

    if app.show_help {
        render_help_modal(frame, area);
    }
    app.dialog_area = app
        .dialog
        .as_ref()
        .map(|dialog| render_confirm_modal(frame, area, dialog));
}

fn render_tabs<S: KeyValueStore>(frame: &mut Frame, app: &AppState<S>, area: Rect) {
    let counts = app.controller.counts();
    let current = app.controller.filter();

    let mut spans = Vec::new();
    for (idx, filter) in Filter::ALL.into_iter().enumerate() {
        if idx > 0 {
            spans.push(Span::styled("  ", Style::default().fg(COLOR_MUTED_DARK)));
        }
        let (count, color) = match filter {
            Filter::All => (counts.total, COLOR_INFO),
            Filter::Active => (counts.active, COLOR_ACCENT),
            Filter::Completed => (counts.completed, COLOR_SUCCESS),
        };
        let text = format!("{} {} ({count})", idx + 1, filter.label());
        let style = if filter == current {
            Style::default()
                .fg(color)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(COLOR_MUTED)
        };
        spans.push(Span::styled(text, style));
    }

    let widget = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(COLOR_BG_MUTED)),
    );
    frame.render_widget(widget, area);
}

fn render_input<S: KeyValueStore>(frame: &mut Frame, app: &AppState<S>, area: Rect, now: Instant) {
    let shaking = app.is_shaking(now);
    let area = match app.shake_phase(now) {
        Some(phase) if area.width > 4 => {
            let offset = [1u16, 0, 2, 1][phase % 4];
            Rect::new(area.x + offset, area.y, area.width - 2, area.height)
        }
        _ => area,
    };

    let focused = app.focus == Focus::Input && app.editing.is_none() && app.dialog.is_none();
    let border_color = if shaking {
        COLOR_ERROR
    } else if focused {
        COLOR_ACCENT
    } else {
        COLOR_BG_MUTED
    };
    let title = if shaking {
        Span::styled(
            " type something first ",
            Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(" New task ", Style::default().fg(COLOR_TEXT))
    };
    let priority_title = Title::from(Line::from(vec![
        Span::styled(" priority: ", Style::default().fg(COLOR_MUTED_DARK)),
        Span::styled(app.priority.as_str(), priority_style(app.priority)),
        Span::raw(" "),
    ]))
    .alignment(Alignment::Right);

    let width = area.width.saturating_sub(2) as usize;
    let line = if focused {
        Line::from(value_with_caret_spans(
            &app.input.value(),
            app.input.cursor(),
            width,
            Style::default().fg(COLOR_TEXT),
        ))
    } else if app.input.is_empty() {
        Line::from(Span::styled(
            INPUT_PLACEHOLDER,
            Style::default().fg(COLOR_MUTED_DARK),
        ))
    } else {
        Line::from(Span::styled(
            truncate_text(&app.input.value(), width),
            Style::default().fg(COLOR_TEXT),
        ))
    };

    let widget = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title(title)
            .title(priority_title),
    );
    frame.render_widget(widget, area);
}

fn render_list<S: KeyValueStore>(frame: &mut Frame, app: &AppState<S>, area: Rect) {
    let focused = app.focus == Focus::List;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused {
            COLOR_BORDER_LIST
        } else {
            COLOR_BG_MUTED
        }))
        .title(Span::styled(
            format!(" Tasks: {} ", app.controller.filter().label()),
            Style::default().fg(COLOR_TEXT),
        ));

    if let Some(message) = app.controller.empty_state_message() {
        let height = area.height.saturating_sub(2) as usize;
        let mut lines: Vec<Line<'static>> = vec![Line::from(""); height.saturating_sub(1) / 2];
        lines.push(Line::from(Span::styled(
            message,
            Style::default().fg(COLOR_MUTED),
        )));
        let widget = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(widget, area);
        return;
    }

    let width = area.width.saturating_sub(2) as usize;
    let height = area.height.saturating_sub(2) as usize;
    let selected = focused.then_some(app.selected);
    let (start, end) = list_window(app.rows.len(), selected, height);

    let mut lines = Vec::new();
    for (idx, id) in app.rows[start..end].iter().enumerate() {
        let Some(task) = app.controller.task(*id) else {
            continue;
        };
        let is_selected = selected == Some(start + idx);
        let editing = app
            .editing
            .as_ref()
            .filter(|edit| edit.task_id == task.id);
        let line = match editing {
            Some(edit) => render_edit_row(task, &edit.input, width),
            None => render_list_row(task, is_selected, app.is_removing(task.id), width),
        };
        lines.push(line);
    }

    let widget = Paragraph::new(lines).block(block);
    frame.render_widget(widget, area);
}

fn render_list_row(task: &Task, selected: bool, removing: bool, width: usize) -> Line<'static> {
    let marker = if selected { "› " } else { "  " };
    let checkbox = if task.completed { "[x] " } else { "[ ] " };
    let tag_width = if task.priority.is_important() {
        TAG_TEXT.len() + 1
    } else {
        0
    };
    let text_width = width.saturating_sub(MARKER_WIDTH + CHECKBOX_WIDTH + tag_width + TIME_WIDTH);

    let mut text_style = Style::default().fg(COLOR_TEXT);
    if task.completed {
        text_style = text_style.fg(COLOR_MUTED).add_modifier(Modifier::CROSSED_OUT);
    }
    if removing {
        text_style = Style::default()
            .fg(COLOR_MUTED_DARK)
            .add_modifier(Modifier::DIM | Modifier::CROSSED_OUT);
    }
    let checkbox_style = if task.completed {
        Style::default().fg(COLOR_SUCCESS)
    } else {
        Style::default().fg(COLOR_MUTED)
    };

    let mut spans = vec![
        Span::styled(marker, Style::default().fg(COLOR_ACCENT)),
        Span::styled(checkbox, checkbox_style),
        Span::styled(pad_text(&task.text, text_width), text_style),
    ];
    if task.priority.is_important() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(TAG_TEXT, priority_style(task.priority)));
    }
    spans.push(Span::styled(
        format!("  {}", format_created(task.created_at)),
        Style::default().fg(COLOR_MUTED_DARK),
    ));

    let line = Line::from(spans);
    if selected {
        line.style(Style::default().bg(COLOR_BG_MUTED))
    } else {
        line
    }
}

fn render_edit_row(task: &Task, input: &super::input::LineInput, width: usize) -> Line<'static> {
    let checkbox = if task.completed { "[x] " } else { "[ ] " };
    let mut spans = vec![
        Span::styled("✎ ", Style::default().fg(COLOR_WARNING)),
        Span::styled(checkbox, Style::default().fg(COLOR_MUTED)),
    ];
    spans.extend(value_with_caret_spans(
        &input.value(),
        input.cursor(),
        width.saturating_sub(MARKER_WIDTH + CHECKBOX_WIDTH),
        Style::default().fg(COLOR_TEXT).add_modifier(Modifier::UNDERLINED),
    ));
    Line::from(spans)
}

fn render_footer<S: KeyValueStore>(frame: &mut Frame, app: &AppState<S>, area: Rect) {
    let hint_span = Span::styled(app.footer_hint(), Style::default().fg(COLOR_INFO));
    let line = if let Some((status, kind)) = app.status_line() {
        let status_style = match kind {
            StatusKind::Error => Style::default()
                .fg(COLOR_ERROR)
                .add_modifier(Modifier::BOLD),
            StatusKind::Info => Style::default().fg(COLOR_WARNING),
        };
        Line::from(vec![
            hint_span,
            Span::raw("  |  "),
            Span::styled(status, status_style),
        ])
    } else {
        Line::from(hint_span)
    };

    let counts = app.controller.counts();
    let clear_style = |available: bool| {
        if available {
            Style::default().fg(COLOR_MUTED)
        } else {
            Style::default()
                .fg(COLOR_MUTED_DARK)
                .add_modifier(Modifier::DIM)
        }
    };
    let counts_line = Line::from(vec![
        Span::styled(
            app.controller.footer_summary(),
            Style::default().fg(COLOR_ACCENT),
        ),
        Span::raw("    "),
        Span::styled("c clear completed", clear_style(counts.completed > 0)),
        Span::raw("  "),
        Span::styled("C clear all", clear_style(counts.total > 0)),
    ]);
    let widget = Paragraph::new(vec![line, counts_line])
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(COLOR_BORDER_LIST)),
        );
    frame.render_widget(widget, area);
}

/// Draw the dialog and return the rectangle it occupies.
fn render_confirm_modal(frame: &mut Frame, area: Rect, dialog: &ConfirmDialog) -> Rect {
    let content_width = area.width.saturating_sub(8).min(52);
    let height = 7u16.min(area.height.saturating_sub(2));
    let modal = centered_rect(content_width, height, area);
    frame.render_widget(Clear, modal);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            dialog.message().to_string(),
            Style::default().fg(COLOR_TEXT).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("y/enter", Style::default().fg(COLOR_ERROR)),
            Span::styled(" confirm   ", Style::default().fg(COLOR_MUTED_DARK)),
            Span::styled("n/esc", Style::default().fg(COLOR_ACCENT)),
            Span::styled(" cancel", Style::default().fg(COLOR_MUTED_DARK)),
        ]),
    ];

    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(COLOR_WARNING))
                .title("Confirm"),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(widget, modal);
    modal
}

fn render_help_modal(frame: &mut Frame, area: Rect) {
    let lines = build_help_lines(40);
    let height = (lines.len() as u16 + 2).min(area.height.saturating_sub(2));
    let modal = centered_rect(44, height, area);
    frame.render_widget(Clear, modal);
    let widget = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(widget, modal);
}

fn build_help_lines(width: usize) -> Vec<Line<'static>> {
    vec![
        help_header("Input"),
        help_line("enter", "add task", width),
        help_line("ctrl+p", "cycle priority", width),
        help_line("ctrl+f", "cycle filter", width),
        help_line("tab/down", "go to list", width),
        help_header("List"),
        help_line("j/k", "move selection", width),
        help_line("space/x", "toggle done", width),
        help_line("e", "edit text", width),
        help_line("d/del", "delete task", width),
        help_line("1/2/3 f", "all/active/completed", width),
        help_line("c", "clear completed", width),
        help_line("C", "clear all", width),
        help_line("i/tab", "back to input", width),
        help_line("q/esc", "quit", width),
    ]
}

fn help_header(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default().fg(COLOR_INFO).add_modifier(Modifier::BOLD),
    ))
}

fn help_line(keys: &str, desc: &str, width: usize) -> Line<'static> {
    let key_text = pad_text(keys, HELP_KEY_WIDTH.min(width));
    let desc_width = width.saturating_sub(HELP_KEY_WIDTH + 1);
    let desc_text = truncate_text(desc, desc_width);
    Line::from(vec![
        Span::styled(
            key_text,
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(desc_text, Style::default().fg(COLOR_MUTED)),
    ])
}

fn value_with_caret_spans(
    value: &str,
    cursor: usize,
    width: usize,
    style: Style,
) -> Vec<Span<'static>> {
    if width == 0 {
        return vec![Span::raw("")];
    }
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();
    let cursor = cursor.min(len);
    if len == 0 {
        return vec![Span::styled(
            " ".to_string(),
            style.add_modifier(Modifier::REVERSED),
        )];
    }

    let caret_at_end = cursor == len;
    let available = if caret_at_end {
        width.saturating_sub(1)
    } else {
        width
    };
    let mut start = 0usize;
    if len > available {
        if cursor > available {
            start = cursor.saturating_sub(available);
        }
        if start + available > len {
            start = len.saturating_sub(available);
        }
    }
    let end = (start + available).min(len);
    let window = &chars[start..end];

    if caret_at_end {
        let text: String = window.iter().collect();
        let mut spans = Vec::new();
        if !text.is_empty() {
            spans.push(Span::styled(text, style));
        }
        spans.push(Span::styled(
            " ".to_string(),
            style.add_modifier(Modifier::REVERSED),
        ));
        return spans;
    }

    let caret_index = cursor.saturating_sub(start);
    let before: String = window[..caret_index].iter().collect();
    let caret_char = window.get(caret_index).copied().unwrap_or(' ');
    let after: String = window[caret_index.saturating_add(1).min(window.len())..]
        .iter()
        .collect();

    let mut spans = Vec::new();
    if !before.is_empty() {
        spans.push(Span::styled(before, style));
    }
    spans.push(Span::styled(
        caret_char.to_string(),
        style.add_modifier(Modifier::REVERSED),
    ));
    if !after.is_empty() {
        spans.push(Span::styled(after, style));
    }
    spans
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(2));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn list_window(total: usize, selected: Option<usize>, height: usize) -> (usize, usize) {
    if height == 0 || total == 0 {
        return (0, 0);
    }
    if total <= height {
        return (0, total);
    }
    let selected = selected.unwrap_or(0).min(total - 1);
    let start = if selected >= height {
        selected + 1 - height
    } else {
        0
    };
    (start, (start + height).min(total))
}

fn priority_style(priority: Priority) -> Style {
    match priority {
        Priority::Important => Style::default()
            .fg(COLOR_ERROR)
            .add_modifier(Modifier::BOLD),
        Priority::Normal => Style::default().fg(COLOR_MUTED),
    }
}

fn pad_text(value: &str, width: usize) -> String {
    let truncated = truncate_text(value, width);
    let len = truncated.chars().count();
    if len >= width {
        return truncated;
    }
    format!("{truncated}{}", " ".repeat(width - len))
}

fn truncate_text(value: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let count = value.chars().count();
    if count <= max {
        return value.to_string();
    }
    if max <= 3 {
        return value.chars().take(max).collect();
    }
    let mut out: String = value.chars().take(max - 3).collect();
    out.push_str("...");
    out
}
