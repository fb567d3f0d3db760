/// Markdown → styled terminal lines for model messages.
///
/// Walks pulldown-cmark events once, accumulating inline tokens per block and
/// word-wrapping each block to the pane width. Code blocks are buffered whole
/// and emitted verbatim (indented, unwrapped); everything else wraps.
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const MIN_WIDTH: usize = 8;

pub fn render_lines(markdown: &str, width: u16) -> Vec<Line<'static>> {
    let width = (width as usize).max(MIN_WIDTH);
    let mut r = Renderer::new(width);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);

    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(Tag::Paragraph) => {}
            Event::End(TagEnd::Paragraph) => r.end_block(),

            Event::Start(Tag::Heading { .. }) => r.heading = true,
            Event::End(TagEnd::Heading(_)) => {
                r.end_block();
                r.heading = false;
            }

            Event::Start(Tag::Strong) => r.bold += 1,
            Event::End(TagEnd::Strong) => r.bold = r.bold.saturating_sub(1),
            Event::Start(Tag::Emphasis) => r.italic += 1,
            Event::End(TagEnd::Emphasis) => r.italic = r.italic.saturating_sub(1),
            Event::Start(Tag::Strikethrough) => r.strike += 1,
            Event::End(TagEnd::Strikethrough) => r.strike = r.strike.saturating_sub(1),

            Event::Code(code) => {
                let style = Style::default().fg(Color::Yellow);
                r.push_text(&code, Some(style));
            }

            Event::Start(Tag::CodeBlock(_)) => {
                r.flush_inline();
                r.in_code = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                r.emit_code_block();
                r.in_code = false;
            }

            Event::Start(Tag::List(start)) => r.lists.push(start),
            Event::End(TagEnd::List(_)) => {
                r.lists.pop();
                if r.lists.is_empty() {
                    r.blank();
                }
            }
            Event::Start(Tag::Item) => r.begin_item(),
            Event::End(TagEnd::Item) => r.flush_inline(),

            Event::Text(text) => {
                if r.in_code {
                    r.code.push_str(&text);
                } else {
                    r.push_text(&text, None);
                }
            }
            Event::SoftBreak => r.push_space(),
            Event::HardBreak => r.flush_inline(),

            Event::Rule => {
                r.end_block();
                r.out.push(Line::from(Span::styled(
                    "─".repeat(width.min(40)),
                    Style::default().fg(Color::DarkGray),
                )));
                r.blank();
            }

            // Links render as their text; raw HTML and the rest pass through
            // as nothing.
            _ => {}
        }
    }

    r.end_block();
    while r.out.last().is_some_and(|l| l.spans.is_empty()) {
        r.out.pop();
    }
    r.out
}

// ── Renderer ──────────────────────────────────────────────────────────────────

struct Renderer {
    width: usize,
    out: Vec<Line<'static>>,
    /// Inline tokens of the current block: words and single collapsed spaces.
    inline: Vec<(String, Style)>,
    /// Hanging-indent prefix for the current list item, consumed by the
    /// first wrapped line.
    prefix: Option<String>,
    bold: usize,
    italic: usize,
    strike: usize,
    heading: bool,
    in_code: bool,
    code: String,
    /// Ordered-list counters per nesting level (None = bulleted).
    lists: Vec<Option<u64>>,
}

impl Renderer {
    fn new(width: usize) -> Self {
        Self {
            width,
            out: Vec::new(),
            inline: Vec::new(),
            prefix: None,
            bold: 0,
            italic: 0,
            strike: 0,
            heading: false,
            in_code: false,
            code: String::new(),
            lists: Vec::new(),
        }
    }

    fn style(&self, over: Option<Style>) -> Style {
        let mut style = over.unwrap_or_default();
        if self.heading {
            style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
        }
        if self.bold > 0 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.strike > 0 {
            style = style.add_modifier(Modifier::CROSSED_OUT);
        }
        style
    }

    fn push_text(&mut self, text: &str, over: Option<Style>) {
        let style = self.style(over);
        let mut word = String::new();
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !word.is_empty() {
                    self.inline.push((std::mem::take(&mut word), style));
                }
                // collapse runs into one space token
                if !matches!(self.inline.last(), Some((t, _)) if t == " ") {
                    self.inline.push((" ".to_string(), style));
                }
            } else {
                word.push(ch);
            }
        }
        if !word.is_empty() {
            self.inline.push((word, style));
        }
    }

    fn push_space(&mut self) {
        let style = self.style(None);
        if !matches!(self.inline.last(), Some((t, _)) if t == " ") {
            self.inline.push((" ".to_string(), style));
        }
    }

    fn begin_item(&mut self) {
        self.flush_inline();
        let depth = self.lists.len().saturating_sub(1);
        let marker = match self.lists.last_mut() {
            Some(Some(n)) => {
                let m = format!("{n}. ");
                *n += 1;
                m
            }
            _ => "• ".to_string(),
        };
        self.prefix = Some(format!("{}{}", "  ".repeat(depth), marker));
    }

    /// Wrap the current block's tokens into output lines. No trailing blank.
    fn flush_inline(&mut self) {
        let tokens = std::mem::take(&mut self.inline);
        let prefix = self.prefix.take().unwrap_or_default();
        let indent = prefix.width();

        let mut first = true;
        let mut current: Vec<Span<'static>> = Vec::new();
        let mut used = 0usize;

        let begin = |current: &mut Vec<Span<'static>>, used: &mut usize, first: &mut bool| {
            let lead = if *first {
                prefix.clone()
            } else {
                " ".repeat(indent)
            };
            *first = false;
            *used = lead.width();
            if !lead.is_empty() {
                current.push(Span::raw(lead));
            }
        };

        let mut any = false;
        for (token, style) in tokens {
            if token == " " {
                if used > 0 && used < self.width && !current.is_empty() {
                    current.push(Span::styled(" ".to_string(), style));
                    used += 1;
                }
                continue;
            }
            any = true;
            let w = token.width();
            if current.is_empty() {
                begin(&mut current, &mut used, &mut first);
            }
            if used + w > self.width && used > indent {
                // drop a trailing space before breaking
                if current.last().is_some_and(|s| s.content == " ") {
                    current.pop();
                }
                self.out.push(Line::from(std::mem::take(&mut current)));
                begin(&mut current, &mut used, &mut first);
            }
            if w > self.width {
                // oversized word: hard-split by display columns
                let mut piece = String::new();
                let mut pw = 0usize;
                for ch in token.chars() {
                    let cw = ch.width().unwrap_or(0);
                    if used + pw + cw > self.width && pw > 0 {
                        current.push(Span::styled(std::mem::take(&mut piece), style));
                        self.out.push(Line::from(std::mem::take(&mut current)));
                        begin(&mut current, &mut used, &mut first);
                        pw = 0;
                    }
                    piece.push(ch);
                    pw += cw;
                }
                if !piece.is_empty() {
                    current.push(Span::styled(piece, style));
                    used += pw;
                }
            } else {
                current.push(Span::styled(token, style));
                used += w;
            }
        }
        if any && !current.is_empty() {
            if current.last().is_some_and(|s| s.content == " ") {
                current.pop();
            }
            self.out.push(Line::from(current));
        }
    }

    fn end_block(&mut self) {
        self.flush_inline();
        self.blank();
    }

    fn blank(&mut self) {
        if !self.out.is_empty() && !self.out.last().is_some_and(|l| l.spans.is_empty()) {
            self.out.push(Line::default());
        }
    }

    fn emit_code_block(&mut self) {
        let style = Style::default().fg(Color::Green);
        for line in self.code.lines() {
            self.out
                .push(Line::from(Span::styled(format!("  {line}"), style)));
        }
        self.code.clear();
        self.blank();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_plain_paragraph_single_line() {
        let lines = render_lines("hello there", 80);
        assert_eq!(text_of(&lines), vec!["hello there"]);
    }

    #[test]
    fn test_empty_input_renders_nothing() {
        assert!(render_lines("", 80).is_empty());
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = render_lines("one two three four five six seven", 12);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.width() <= 12, "line too wide: {:?}", text_of(&lines));
        }
    }

    #[test]
    fn test_bold_span_carries_modifier() {
        let lines = render_lines("a **bold** word", 80);
        let bold = lines[0]
            .spans
            .iter()
            .find(|s| s.content == "bold")
            .expect("bold span");
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_code_block_verbatim_lines() {
        let lines = render_lines("```\nlet x = 1;\nlet y = 2;\n```", 80);
        let texts = text_of(&lines);
        assert!(texts.contains(&"  let x = 1;".to_string()));
        assert!(texts.contains(&"  let y = 2;".to_string()));
    }

    #[test]
    fn test_bullet_list_markers() {
        let lines = render_lines("- first\n- second", 80);
        let texts = text_of(&lines);
        assert!(texts.iter().any(|t| t.starts_with("• first")));
        assert!(texts.iter().any(|t| t.starts_with("• second")));
    }

    #[test]
    fn test_ordered_list_counts() {
        let lines = render_lines("1. a\n2. b", 80);
        let texts = text_of(&lines);
        assert!(texts.iter().any(|t| t.starts_with("1. a")));
        assert!(texts.iter().any(|t| t.starts_with("2. b")));
    }

    #[test]
    fn test_paragraphs_separated_by_blank_line() {
        let lines = render_lines("one\n\ntwo", 80);
        let texts = text_of(&lines);
        assert_eq!(texts, vec!["one", "", "two"]);
    }

    #[test]
    fn test_oversized_word_is_hard_split() {
        let lines = render_lines(&"x".repeat(30), 10);
        assert!(lines.len() >= 3);
        for line in &lines {
            assert!(line.width() <= 10);
        }
    }
}
