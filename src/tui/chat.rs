/// Chat history pane rendering — build_items, draw_history, spinner, utilities.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, List, ListItem},
};
use unicode_width::UnicodeWidthStr;

use super::AppState;
use crate::markdown;
use crate::transcript::Role;

// ── Spinner ────────────────────────────────────────────────────────────────────

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn spinner_glyph(tick: u32) -> &'static str {
    SPINNER_GLYPHS[(tick as usize) % SPINNER_GLYPHS.len()]
}

// ── History items builder ──────────────────────────────────────────────────────

pub fn build_items(state: &AppState, term_width: u16) -> Vec<ListItem<'static>> {
    let mut items: Vec<ListItem<'static>> = Vec::new();

    for msg in state.chat.transcript.messages() {
        match msg.role {
            Role::User => push_user_bubble(&mut items, &msg.content, term_width),
            Role::Model => push_model_message(&mut items, &msg.content, term_width),
        }
    }

    // The reply currently streaming in, below the completed messages.
    if !state.chat.buffer.is_empty() {
        push_stream_tail(&mut items, state.chat.buffer.text(), term_width);
    }

    if state.chat.is_loading() || state.history_loading {
        let glyph = spinner_glyph(state.spinner_tick);
        let msg = if state.history_loading { "loading history…" } else { "waiting for reply…" };
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled(
                format!("{glyph} "),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(msg.to_string(), Style::default().fg(Color::Cyan)),
        ])));
    }

    if let Some(banner) = &state.banner {
        items.push(ListItem::new(Line::raw("")));
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled(
                format!("✗ {banner}"),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
        ])));
    }

    items
}

fn push_user_bubble(items: &mut Vec<ListItem<'static>>, msg: &str, term_width: u16) {
    let bg = Color::Rgb(28, 26, 52);
    let border = Color::Rgb(110, 90, 200);
    let label_fg = Color::Rgb(160, 140, 255);
    let text_fg = Color::Rgb(235, 232, 255);
    let body_style = Style::default().fg(text_fg).bg(bg);
    let edge_style = Style::default().fg(border).bg(bg);

    // Dynamic widths — 2 chars left margin, 1 right margin
    let inner_w = (term_width as usize).saturating_sub(3).max(10);
    // Top: "╭─ you ──...──╮" — label is " you " (5 chars), corners+space = 4
    let dash_total = inner_w.saturating_sub(4 + 5);
    let top_dashes = "─".repeat(dash_total);
    items.push(ListItem::new(Line::from(vec![
        Span::raw("  "),
        Span::styled("╭─ ".to_string(), edge_style),
        Span::styled(
            "you",
            Style::default().fg(label_fg).bg(bg).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {top_dashes}╮"), edge_style),
    ])));

    // Body — word-wrap inside the box (inner_w minus "│ " = 2)
    let wrap_width = inner_w.saturating_sub(2).max(10);
    let raw_lines: Vec<&str> = if msg.is_empty() { vec![""] } else { msg.lines().collect() };
    let wrapped: Vec<String> = raw_lines
        .iter()
        .flat_map(|line| wrap_text(line, wrap_width))
        .collect();
    for line in &wrapped {
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled("│ ", edge_style),
            Span::styled(line.clone(), body_style),
        ])));
    }

    let bot_dashes = "─".repeat(inner_w.saturating_sub(2));
    items.push(ListItem::new(Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("╰{bot_dashes}╯"), edge_style),
    ])));
    items.push(ListItem::new(Line::raw("")));
}

/// Completed model messages render through the Markdown pipeline.
fn push_model_message(items: &mut Vec<ListItem<'static>>, content: &str, term_width: u16) {
    let label_fg = Color::Rgb(0, 210, 210);
    let wrap_width = (term_width as usize).saturating_sub(9).max(20);

    let lines = markdown::render_lines(content, wrap_width as u16);
    let mut first = true;
    for line in lines {
        let mut spans: Vec<Span<'static>> = Vec::with_capacity(line.spans.len() + 3);
        if first {
            first = false;
            spans.push(Span::raw("  "));
            spans.push(Span::styled(
                "model",
                Style::default().fg(label_fg).add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw("  "));
        } else {
            spans.push(Span::raw("         "));
        }
        spans.extend(line.spans);
        items.push(ListItem::new(Line::from(spans)));
    }
    if first {
        // Empty reply — still show the label so the turn is visible.
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled(
                "model",
                Style::default().fg(label_fg).add_modifier(Modifier::BOLD),
            ),
        ])));
    }
    items.push(ListItem::new(Line::raw("")));
}

/// The in-flight buffer renders as plain wrapped text; Markdown styling waits
/// for the finalized message.
fn push_stream_tail(items: &mut Vec<ListItem<'static>>, text: &str, term_width: u16) {
    let label_fg = Color::Rgb(0, 210, 210);
    let text_fg = Color::Rgb(210, 230, 255);
    let wrap_width = (term_width as usize).saturating_sub(9).max(20);

    let mut first = true;
    for src_line in text.lines() {
        for w in wrap_text(src_line, wrap_width) {
            if first {
                first = false;
                items.push(ListItem::new(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(
                        "model",
                        Style::default().fg(label_fg).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw("  "),
                    Span::styled(w, Style::default().fg(text_fg)),
                ])));
            } else {
                items.push(ListItem::new(Line::from(vec![
                    Span::raw("         "),
                    Span::styled(w, Style::default().fg(text_fg)),
                ])));
            }
        }
    }
}

// ── Draw functions ─────────────────────────────────────────────────────────────

pub fn draw_history(f: &mut Frame, state: &AppState, area: Rect) {
    let all_items = build_items(state, area.width);
    let total = all_items.len();
    let visible = area.height as usize;

    let skip = if total > visible {
        (total - visible).saturating_sub(state.scroll)
    } else {
        0
    };

    let sliced: Vec<ListItem<'static>> = all_items.into_iter().skip(skip).collect();
    let list = List::new(sliced)
        .block(Block::default().style(Style::default().bg(Color::Rgb(8, 8, 14))));
    f.render_widget(list, area);
}

// ── Utilities ──────────────────────────────────────────────────────────────────

/// Word-wrap a single line of text to `max_width` columns.
/// Splits on whitespace; never truncates mid-word unless the word alone exceeds max_width.
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;

    for word in text.split_whitespace() {
        let word_width = word.width();
        if current_width == 0 {
            current.push_str(word);
            current_width = word_width;
        } else if current_width + 1 + word_width <= max_width {
            current.push(' ');
            current.push_str(word);
            current_width += 1 + word_width;
        } else {
            lines.push(current.clone());
            current = word.to_string();
            current_width = word_width;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Shorten an id for the status bar — first 8 chars is plenty to recognise.
pub fn short_id(id: &str) -> String {
    if id.chars().count() <= 8 {
        id.to_string()
    } else {
        let cut = id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(id.len());
        format!("{}…", &id[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text_basic() {
        let wrapped = wrap_text("one two three four", 9);
        assert_eq!(wrapped, vec!["one two", "three", "four"]);
    }

    #[test]
    fn test_wrap_text_empty_line_preserved() {
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }

    #[test]
    fn test_wrap_text_long_word_kept_whole() {
        let wrapped = wrap_text("supercalifragilistic", 5);
        assert_eq!(wrapped, vec!["supercalifragilistic"]);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("0123456789abcdef"), "01234567…");
    }
}
