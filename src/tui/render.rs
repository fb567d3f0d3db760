/// Ratatui draw entry-point for banter.
/// Thin dispatcher — most rendering lives in chat.rs.
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

use super::AppState;
use super::chat::{short_id, spinner_glyph};

// ── Main draw entry point ─────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // history
            Constraint::Length(1), // status bar
            Constraint::Length(3), // input box
        ])
        .split(area);

    super::chat::draw_history(f, state, chunks[0]);
    draw_status_bar(f, state, chunks[1]);
    draw_input(f, state, chunks[2]);
}

// ── Status bar ────────────────────────────────────────────────────────────────

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let (status_glyph, status_color) = if state.busy() {
        (spinner_glyph(state.spinner_tick), Color::Cyan)
    } else {
        ("▲", Color::White)
    };

    let turn_count = state.chat.transcript.len();

    let line = Line::from(vec![
        Span::raw(" "),
        Span::styled(
            status_glyph,
            Style::default().fg(status_color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            " banter",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            state.profile.clone(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled("  ·  ", Style::default().fg(Color::DarkGray)),
        Span::styled(state.server.clone(), Style::default().fg(Color::Rgb(100, 180, 220))),
        Span::styled("  ", Style::default()),
        Span::styled("◈ ", Style::default().fg(Color::Rgb(80, 70, 140))),
        Span::styled(
            short_id(&state.conversation_id),
            Style::default().fg(Color::Rgb(140, 120, 220)),
        ),
        Span::styled(
            format!("  {turn_count} msg{}", if turn_count == 1 { "" } else { "s" }),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            "  Ctrl+R reload  Ctrl+N new  Ctrl+C quit",
            Style::default().fg(Color::Rgb(55, 50, 90)),
        ),
    ]);

    let bar_style = if state.chat.is_streaming() {
        Style::default().bg(Color::Rgb(15, 15, 25))
    } else {
        Style::default().bg(Color::Rgb(10, 10, 18))
    };

    f.render_widget(Paragraph::new(line).style(bar_style), area);
}

// ── Input box ─────────────────────────────────────────────────────────────────

fn draw_input(f: &mut Frame, state: &AppState, area: Rect) {
    let streaming = state.chat.is_streaming();
    let (border_color, prompt_color, prompt_char) = if streaming {
        (Color::Rgb(40, 40, 60), Color::DarkGray, "·")
    } else {
        (Color::Rgb(60, 60, 80), Color::Cyan, "❯")
    };

    let prompt_span = Span::styled(
        format!("  {prompt_char} "),
        Style::default().fg(prompt_color).add_modifier(Modifier::BOLD),
    );

    let content_span = if streaming {
        Span::styled(
            "streaming · Esc to cancel",
            Style::default().fg(Color::Rgb(60, 60, 80)),
        )
    } else if state.input.is_empty() {
        Span::styled(
            "message · Enter to send · ↑↓ scroll",
            Style::default().fg(Color::Rgb(70, 70, 90)),
        )
    } else {
        Span::styled(state.input.clone(), Style::default().fg(Color::White))
    };

    let input_line = Line::from(vec![prompt_span, content_span]);

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(border_color))
        .style(Style::default().bg(Color::Rgb(8, 8, 14)));

    let paragraph = Paragraph::new(input_line)
        .block(block)
        .wrap(Wrap { trim: false });

    f.render_widget(paragraph, area);

    // Position cursor at the actual edit cursor, not end of string
    if !streaming {
        // prompt is "  ❯ " — ❯ is 1 wide, total visible width is 4 cols
        let prompt_width: u16 = 4;
        let text_before_cursor = &state.input[..state.cursor.min(state.input.len())];
        let cursor_x = area.x + prompt_width + text_before_cursor.width() as u16;
        let cursor_y = area.y + 1; // +1 for top border
        if cursor_x < area.x + area.width {
            f.set_cursor_position((cursor_x, cursor_y));
        }
    }
}
