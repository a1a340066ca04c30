use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::browser::{BrowserState, Mode};
use crate::library::basename;

const CURSOR: &str = "→ ";
const NO_MATCHES: &str = "no matches; please clear input";

pub fn render_browser(f: &mut Frame, state: &BrowserState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Input line
            Constraint::Length(1), // Spacer
            Constraint::Min(0),    // List + preview
            Constraint::Length(1), // Status
        ])
        .split(f.area());

    render_input(f, chunks[0], state);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[2]);

    render_list(f, panes[0], state);
    render_preview(f, panes[1], state);
    render_status(f, chunks[3], state);
}

fn render_input(f: &mut Frame, area: Rect, state: &BrowserState) {
    let line = Line::from(vec![
        Span::styled("> ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(state.filter().to_string()),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn render_list(f: &mut Frame, area: Rect, state: &BrowserState) {
    if state.matches().is_empty() {
        let empty = Paragraph::new(NO_MATCHES).style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, area);
        return;
    }

    let lines: Vec<Line> = state
        .visible()
        .map(|pos| {
            let item = &state.items()[state.matches()[pos]];
            let selected = pos == state.cursor();
            let text = row_label(state, item, selected);

            let style = if selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::styled(text, style)
        })
        .collect();

    f.render_widget(Paragraph::new(lines), area);
}

fn render_preview(f: &mut Frame, area: Rect, state: &BrowserState) {
    let lines: Vec<Line> = state
        .selected()
        .and_then(|item| state.preview(item))
        .unwrap_or_default()
        .iter()
        .map(|child| Line::raw(child.as_str()))
        .collect();

    let preview = Paragraph::new(lines)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::LEFT));
    f.render_widget(preview, area);
}

fn render_status(f: &mut Frame, area: Rect, state: &BrowserState) {
    let mut text = format!("{} {}/{}", state.mode(), state.matches().len(), state.items().len());
    if let Some(artist) = state.artist() {
        text.push_str(" · ");
        text.push_str(artist);
    }
    f.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

/// One list row: cursor marker, queued marker, then the item. The queued
/// column only appears once some album of the artist is queued. Albums
/// show their basename; the artist is already on screen.
fn row_label(state: &BrowserState, item: &str, selected: bool) -> String {
    let cursor = if selected { CURSOR } else { "  " };
    match state.mode() {
        Mode::Albums if state.any_queued() => {
            let queued = if state.is_queued(item) { "Q " } else { "  " };
            format!("{}{}{}", cursor, queued, basename(item))
        }
        Mode::Albums => format!("{}{}", cursor, basename(item)),
        Mode::Queue | Mode::Artists => format!("{}{}", cursor, item),
    }
}
