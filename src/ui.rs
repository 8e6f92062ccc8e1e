use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Widget, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, AppState};
use crate::keyset::ALPHABET;
use crate::report::ReportSink;
use crate::session::{SessionState, Slot};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;
const SEPARATOR_GLYPH: &str = "·";

pub fn draw<R: ReportSink>(app: &App<R>, f: &mut Frame) {
    let area = f.area();
    f.render_widget(app, area);
}

impl<R: ReportSink> Widget for &App<R> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Typing => render_typing(self, area, buf),
            AppState::KeyPicker => render_key_picker(self, area, buf),
            AppState::KeyStats => render_key_stats(self, area, buf),
        }
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

fn render_typing<R: ReportSink>(app: &App<R>, area: Rect, buf: &mut Buffer) {
    let session = app.engine.session();
    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let prompt_width = session.words().collect::<Vec<_>>().join(" ").width() as u16;
    let prompt_lines = if prompt_width <= max_chars_per_line {
        1
    } else {
        prompt_width.div_ceil(max_chars_per_line) + 1
    };
    let padding = area.height.saturating_sub(prompt_lines + 6) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(1), // metrics
            Constraint::Length(1), // keys
            Constraint::Length(padding),
            Constraint::Length(prompt_lines),
            Constraint::Min(0),
            Constraint::Length(1), // goal
            Constraint::Length(1), // help
        ])
        .split(area);

    Paragraph::new(metrics_line(app))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    Paragraph::new(Line::from(vec![
        Span::styled("keys: ", dim_bold()),
        Span::styled(app.active_keys(), bold().fg(Color::Cyan)),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    if session.is_loaded() {
        Paragraph::new(Line::from(prompt_spans(session)))
            .alignment(if prompt_lines == 1 {
                Alignment::Center
            } else {
                Alignment::Left
            })
            .wrap(Wrap { trim: true })
            .render(chunks[3], buf);
    } else {
        Paragraph::new(Span::styled(
            "no words match the selected keys, press ctrl+k to pick more",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);
    }

    if let Some(goal) = app.goal {
        let xp = app.experience.map(|xp| xp.daily).unwrap_or_default();
        Gauge::default()
            .gauge_style(Style::default().fg(Color::Magenta))
            .ratio(goal.ratio())
            .label(format!(
                "{}/{} min today, {} xp",
                goal.completed_minutes(),
                goal.target_minutes,
                xp
            ))
            .render(chunks[5], buf);
    }

    Paragraph::new(Span::styled(
        "(esc) quit  (ctrl+r) restart  (ctrl+k) keys  (ctrl+s) key stats",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[6], buf);
}

fn metrics_line<R: ReportSink>(app: &App<R>) -> Line<'static> {
    let current = app.engine.metrics();
    let accuracy = current
        .map(|m| format!("{}%", m.accuracy))
        .unwrap_or_else(|| "-".to_string());
    Line::from(vec![
        Span::styled("wpm ", dim_bold()),
        Span::styled(
            current.map(|m| m.speed).unwrap_or_default().to_string(),
            bold().fg(Color::Green),
        ),
        Span::styled("  last ", dim_bold()),
        Span::styled(app.engine.last_speed().to_string(), bold()),
        Span::styled("  top ", dim_bold()),
        Span::styled(app.engine.top_speed().to_string(), bold()),
        Span::styled("  acc ", dim_bold()),
        Span::styled(accuracy, bold()),
    ])
}

/// One span per slot, separators included.
pub fn prompt_spans(session: &SessionState) -> Vec<Span<'static>> {
    let cursor = session.cursor();
    let green = bold().fg(Color::Green);
    let red = bold().fg(Color::Red);
    let orange = bold().fg(Color::Rgb(255, 165, 0));
    let at_cursor = dim_bold().add_modifier(Modifier::UNDERLINED);

    let mut spans = Vec::new();
    for (w, word) in session.words().enumerate() {
        let chars: Vec<char> = word.chars().collect();
        for position in 0..=chars.len() {
            let is_separator = position == chars.len();
            let slot = Slot { word: w, position };
            // past the last word there is only something to draw after a miss
            if is_separator
                && w + 1 == session.word_count()
                && session.attempt(slot).is_none()
            {
                break;
            }
            let expected = if is_separator {
                SEPARATOR_GLYPH.to_string()
            } else {
                chars[position].to_string()
            };
            let mut span = match session.attempt(slot) {
                Some(r) if !r.correct => Span::styled(
                    if r.char == ' ' {
                        SEPARATOR_GLYPH.to_string()
                    } else {
                        r.char.to_string()
                    },
                    red,
                ),
                Some(r) if r.was_corrected() => Span::styled(expected, orange),
                Some(_) => Span::styled(expected, green),
                None => Span::styled(expected, dim_bold()),
            };
            // a standing miss stays red under the cursor
            if (w, position) == (cursor.word, cursor.letter) {
                span.style = span.style.add_modifier(Modifier::UNDERLINED);
                if session.attempt(slot).is_none() {
                    span.style = at_cursor;
                }
            }
            spans.push(span);
        }
    }
    spans
}

fn render_key_picker<R: ReportSink>(app: &App<R>, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new("Select keys")
        .block(Block::default().borders(Borders::ALL).title("Keys"))
        .style(bold().fg(Color::Cyan))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let Some(keys) = app.engine.source().key_set() else {
        return;
    };
    let spans: Vec<Span> = ALPHABET
        .iter()
        .map(|&c| {
            let style = if c == app.config.current_key {
                bold().fg(Color::Black).bg(Color::Yellow)
            } else if keys.contains(c) {
                bold().fg(Color::Green)
            } else {
                dim_bold()
            };
            Span::styled(format!(" {c} "), style)
        })
        .collect();
    Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        "(a-z) toggle key  (*) all keys  (enter) done",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);
}

fn render_key_stats<R: ReportSink>(app: &App<R>, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new("Key Performance")
        .block(Block::default().borders(Borders::ALL).title("Stats"))
        .style(bold().fg(Color::Cyan))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let weakest = app
        .problem_keys
        .iter()
        .map(|k| format!("{} {}%", key_label(k.key), k.accuracy))
        .collect::<Vec<_>>()
        .join(", ");
    Paragraph::new(Line::from(vec![
        Span::styled("goal streak ", dim_bold()),
        Span::styled(format!("{} days", app.goal_streak), bold().fg(Color::Magenta)),
        Span::styled("  weakest ", dim_bold()),
        Span::styled(
            if weakest.is_empty() { "-".to_string() } else { weakest },
            bold().fg(Color::Red),
        ),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    if app.key_stats.is_empty() {
        Paragraph::new("No key data yet. Finish a session first.")
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
    } else {
        let header = Row::new(vec!["Key", "Accuracy", "Speed", "Errors", "Last practiced"])
            .style(bold().fg(Color::Yellow));
        let rows: Vec<Row> = app
            .key_stats
            .iter()
            .map(|k| {
                let color = if k.accuracy >= 95 {
                    Color::Green
                } else if k.accuracy >= 85 {
                    Color::Yellow
                } else {
                    Color::Red
                };
                Row::new(vec![
                    Cell::from(key_label(k.key)),
                    Cell::from(format!("{}%", k.accuracy)).style(Style::default().fg(color)),
                    Cell::from(format!("{} wpm", k.speed)),
                    Cell::from(k.error_count.to_string()),
                    Cell::from(k.last_practiced.format("%Y-%m-%d").to_string()),
                ])
            })
            .collect();
        Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Length(10),
                Constraint::Length(10),
                Constraint::Length(8),
                Constraint::Min(14),
            ],
        )
        .header(header)
        .render(chunks[2], buf);
    }

    Paragraph::new(Span::styled(
        "(any key) back",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);
}

fn key_label(key: char) -> String {
    if key == ' ' {
        "space".to_string()
    } else {
        key.to_string()
    }
}
