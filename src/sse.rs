/// Incremental server-sent-events decoder.
///
/// The HTTP body arrives as arbitrary byte chunks; an event frame
/// (`event:`/`data:` lines terminated by a blank line) may be split across
/// chunks, so the decoder carries a leftover buffer between `feed` calls and
/// only dispatches complete frames.

// ── Event ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name from the `event:` field; "message" when absent, per the
    /// SSE default.
    pub name: String,
    /// Concatenation of the frame's `data:` lines, newline-joined.
    pub data: String,
}

// ── Decoder ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk; returns every event whose frame completed.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.pending.push_str(chunk);

        let mut events = Vec::new();
        // A frame ends at a blank line. Only consume through the last
        // complete frame; the tail stays pending for the next chunk.
        while let Some(end) = find_frame_end(&self.pending) {
            let frame: String = self.pending.drain(..end.consumed).collect();
            if let Some(ev) = parse_frame(&frame) {
                events.push(ev);
            }
        }
        events
    }
}

struct FrameEnd {
    consumed: usize,
}

/// Locate the first blank-line frame terminator ("\n\n" or "\r\n\r\n").
fn find_frame_end(buf: &str) -> Option<FrameEnd> {
    let lf = buf.find("\n\n").map(|i| (i, i + 2));
    let crlf = buf.find("\r\n\r\n").map(|i| (i, i + 4));
    match (lf, crlf) {
        (Some((a, ac)), Some((b, _))) if a < b => Some(FrameEnd { consumed: ac }),
        (Some(_), Some((_, bc))) => Some(FrameEnd { consumed: bc }),
        (Some((_, ac)), None) => Some(FrameEnd { consumed: ac }),
        (None, Some((_, bc))) => Some(FrameEnd { consumed: bc }),
        (None, None) => None,
    }
}

/// Parse one complete frame into an event. Frames carrying no `data:` and no
/// `event:` field (comments, retry hints) yield nothing.
fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut name: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in frame.lines() {
        if line.starts_with(':') {
            continue; // comment
        }
        if let Some(rest) = field(line, "event") {
            name = Some(rest.to_string());
        } else if let Some(rest) = field(line, "data") {
            data_lines.push(rest);
        }
        // id:/retry: are irrelevant to this client
    }

    if name.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        name: name.unwrap_or_else(|| "message".to_string()),
        data: data_lines.join("\n"),
    })
}

/// `"data: x"` / `"data:x"` → `Some("x")`, per the SSE field grammar (one
/// leading space after the colon is stripped).
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?;
    let rest = rest.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

// ── Fragment unquoting ────────────────────────────────────────────────────────

/// The server wraps every `message` payload in one leading and one trailing
/// delimiter character (`"<text>"`). Stripping exactly those two characters
/// is part of the wire contract — the inner text is not escaped and must not
/// be run through a JSON parser.
pub fn unquote_fragment(raw: &str) -> &str {
    let mut chars = raw.char_indices();
    let Some((_, first)) = chars.next() else {
        return "";
    };
    let start = first.len_utf8();
    match raw.char_indices().next_back() {
        Some((last, _)) if last >= start => &raw[start..last],
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut dec = SseDecoder::new();
        let events = dec.feed("event: message\ndata: \"Hi\"\n\n");
        assert_eq!(
            events,
            vec![SseEvent { name: "message".to_string(), data: "\"Hi\"".to_string() }]
        );
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed("event: mess").is_empty());
        assert!(dec.feed("age\ndata: \"Hi\"").is_empty());
        let events = dec.feed("\n\nevent: end\ndata: close connection\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "message");
        assert_eq!(events[0].data, "\"Hi\"");
        assert_eq!(events[1].name, "end");
    }

    #[test]
    fn test_default_event_name_is_message() {
        let mut dec = SseDecoder::new();
        let events = dec.feed("data: \"x\"\n\n");
        assert_eq!(events[0].name, "message");
    }

    #[test]
    fn test_crlf_frames() {
        let mut dec = SseDecoder::new();
        let events = dec.feed("event: end\r\ndata: bye\r\n\r\n");
        assert_eq!(events[0].name, "end");
        assert_eq!(events[0].data, "bye");
    }

    #[test]
    fn test_multiple_data_lines_join_with_newline() {
        let mut dec = SseDecoder::new();
        let events = dec.feed("data: a\ndata: b\n\n");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn test_comments_ignored() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(": keepalive\n\n").is_empty());
    }

    #[test]
    fn test_event_without_data() {
        let mut dec = SseDecoder::new();
        let events = dec.feed("event: end\n\n");
        assert_eq!(events[0].name, "end");
        assert_eq!(events[0].data, "");
    }

    #[test]
    fn test_unquote_strips_exactly_one_char_each_side() {
        assert_eq!(unquote_fragment("\"Hi\""), "Hi");
        assert_eq!(unquote_fragment("\" there\""), " there");
        // Inner quotes survive — only the outermost pair is framing.
        assert_eq!(unquote_fragment("\"a\"b\""), "a\"b");
    }

    #[test]
    fn test_unquote_degenerate_payloads() {
        assert_eq!(unquote_fragment(""), "");
        assert_eq!(unquote_fragment("\""), "");
        assert_eq!(unquote_fragment("\"\""), "");
    }

    #[test]
    fn test_unquote_multibyte_boundaries() {
        assert_eq!(unquote_fragment("\"héllo\""), "héllo");
        assert_eq!(unquote_fragment("«x»"), "x");
    }
}
