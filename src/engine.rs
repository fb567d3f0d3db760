/// The streaming turn engine.
///
/// Exactly one send/receive cycle per submission. The engine splits into a
/// pure reducer (`ChatState`) and an async driver (`run_turn`):
///
///   ui task:      begin_turn() guard + optimistic user append, then folds
///                 TurnEvents via ChatState::apply
///   driver task:  tokio::spawn — opens the SSE channel, decodes events,
///                 enforces the idle timeout, honors the cancel handle,
///                 reports TurnEvents over an UnboundedSender
///
/// The user message is appended strictly before the channel opens, so the
/// view never shows a model fragment without its preceding user turn.
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::sse::{unquote_fragment, SseDecoder};
use crate::transcript::{Message, StreamBuffer, Transcript};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    /// The channel signalled `error`, or closed without an `end` event.
    #[error("the model failed to respond")]
    Transport,
    #[error("server returned HTTP {0}")]
    Http(u16),
    #[error("event channel read failed: {0}")]
    Stream(String),
    #[error("no reply data for {0}s")]
    IdleTimeout(u64),
    #[error("reply cancelled")]
    Cancelled,
}

/// Rejections raised by `begin_turn` before any state mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Whitespace-only text — rejected with no side effects.
    Empty,
    /// A turn is already streaming; one channel per view at a time.
    Busy,
}

// ── Events ────────────────────────────────────────────────────────────────────

/// What the driver reports back to the reducer. Fragments arrive already
/// unquoted (the one-leading-one-trailing delimiter pair stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    Fragment(String),
    End,
    Failed(TurnError),
}

/// Result of folding one event, for the caller to act on (render, banner).
#[derive(Debug, PartialEq)]
pub enum Applied {
    Fragment,
    Completed(Message),
    Failed(TurnError),
}

// ── Reducer ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Streaming,
}

/// Transcript + stream buffer + the single-in-flight guard, folded over
/// TurnEvents. All transcript mutation goes through here.
#[derive(Debug, Default)]
pub struct ChatState {
    pub transcript: Transcript,
    pub buffer: StreamBuffer,
    phase: Phase,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_streaming(&self) -> bool {
        self.phase == Phase::Streaming
    }

    /// True from submit until the first fragment arrives.
    pub fn is_loading(&self) -> bool {
        self.buffer.is_loading()
    }

    /// Start a turn: validate, append the user message optimistically, arm
    /// the stream buffer. Returns the appended message so the caller can
    /// hand its text to the driver.
    ///
    /// Rejections happen before any mutation: whitespace-only input is a
    /// strict no-op, and a second submission while one is streaming is
    /// refused rather than queued or superseded.
    pub fn begin_turn(&mut self, text: &str) -> Result<Message, SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::Empty);
        }
        if self.phase == Phase::Streaming {
            return Err(SubmitError::Busy);
        }
        let msg = Message::user(text.to_string());
        self.transcript.push(msg.clone());
        self.buffer.start();
        self.phase = Phase::Streaming;
        Ok(msg)
    }

    /// Replace the transcript wholesale with loaded history. Any in-flight
    /// buffer is discarded; callers guard against reloading mid-stream.
    pub fn load_history(&mut self, messages: Vec<Message>) {
        self.transcript.replace_all(messages);
        self.buffer.clear();
        self.phase = Phase::Idle;
    }

    /// Fold one event from the driver.
    pub fn apply(&mut self, event: TurnEvent) -> Applied {
        match event {
            TurnEvent::Fragment(fragment) => {
                self.buffer.append(&fragment);
                Applied::Fragment
            }
            TurnEvent::End => {
                // The only normal terminal transition. Zero fragments still
                // finalize into an (empty) model message.
                let msg = Message::model(self.buffer.take());
                self.transcript.push(msg.clone());
                self.phase = Phase::Idle;
                Applied::Completed(msg)
            }
            TurnEvent::Failed(err) => {
                // No message is appended and the buffer is dropped; the
                // caller surfaces the error instead of leaving the view in
                // an ambiguous loading state.
                self.buffer.clear();
                self.phase = Phase::Idle;
                Applied::Failed(err)
            }
        }
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

/// Drive one turn's event channel to a terminal event.
///
/// Always sends exactly one terminal event (`End` or `Failed`) before
/// returning, and returning drops the response — the connection is closed on
/// every exit path, including cancel and timeout.
pub async fn run_turn(
    api: ApiClient,
    conversation_id: String,
    text: String,
    idle_timeout: Duration,
    tx: mpsc::UnboundedSender<TurnEvent>,
    mut cancel: oneshot::Receiver<()>,
) {
    debug!(conversation = %conversation_id, "opening turn stream");

    let resp = tokio::select! {
        res = api.open_turn_stream(&conversation_id, &text) => match res {
            Ok(resp) => resp,
            Err(err) => {
                warn!(error = %err, "failed to open turn stream");
                let _ = tx.send(TurnEvent::Failed(err));
                return;
            }
        },
        _ = &mut cancel => {
            let _ = tx.send(TurnEvent::Failed(TurnError::Cancelled));
            return;
        }
    };

    let mut stream = resp.bytes_stream();
    let mut decoder = SseDecoder::new();

    loop {
        let chunk = tokio::select! {
            _ = &mut cancel => {
                debug!("turn cancelled — dropping stream");
                let _ = tx.send(TurnEvent::Failed(TurnError::Cancelled));
                return;
            }
            next = tokio::time::timeout(idle_timeout, stream.next()) => match next {
                Err(_) => {
                    warn!(secs = idle_timeout.as_secs(), "idle timeout on event channel");
                    let _ = tx.send(TurnEvent::Failed(TurnError::IdleTimeout(idle_timeout.as_secs())));
                    return;
                }
                Ok(None) => {
                    // EOF without an `end` event: the reply never finalized.
                    warn!("event channel closed before end");
                    let _ = tx.send(TurnEvent::Failed(TurnError::Transport));
                    return;
                }
                Ok(Some(Err(err))) => {
                    warn!(error = %err, "event channel read failed");
                    let _ = tx.send(TurnEvent::Failed(TurnError::Stream(err.to_string())));
                    return;
                }
                Ok(Some(Ok(bytes))) => bytes,
            }
        };

        for event in decoder.feed(&String::from_utf8_lossy(&chunk)) {
            match event.name.as_str() {
                "message" => {
                    let fragment = unquote_fragment(&event.data).to_string();
                    if tx.send(TurnEvent::Fragment(fragment)).is_err() {
                        // Receiver gone — view tore down; stop reading.
                        return;
                    }
                }
                "end" => {
                    debug!("end event — closing channel");
                    let _ = tx.send(TurnEvent::End);
                    return;
                }
                "error" => {
                    warn!("error event on channel");
                    let _ = tx.send(TurnEvent::Failed(TurnError::Transport));
                    return;
                }
                other => {
                    debug!(event = other, "ignoring unknown channel event");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Role;

    fn streamed(state: &mut ChatState, raw_payloads: &[&str]) {
        // Mirror the driver: decode wire frames, unquote, apply.
        let mut decoder = SseDecoder::new();
        for raw in raw_payloads {
            for ev in decoder.feed(&format!("event: message\ndata: {raw}\n\n")) {
                state.apply(TurnEvent::Fragment(unquote_fragment(&ev.data).to_string()));
            }
        }
    }

    #[test]
    fn test_submit_appends_one_user_message_before_any_network() {
        let mut state = ChatState::new();
        let msg = state.begin_turn("hello").unwrap();
        assert_eq!(state.transcript.len(), 1);
        assert_eq!(msg.role, Role::User);
        assert_eq!(state.transcript.last().unwrap().content, "hello");
        assert!(state.is_streaming());
        assert!(state.is_loading());
    }

    #[test]
    fn test_whitespace_only_is_rejected_without_side_effects() {
        let mut state = ChatState::new();
        assert_eq!(state.begin_turn("  "), Err(SubmitError::Empty));
        assert!(state.transcript.is_empty());
        assert!(!state.is_streaming());
        assert!(!state.is_loading());
    }

    #[test]
    fn test_second_submit_while_streaming_is_rejected() {
        let mut state = ChatState::new();
        state.begin_turn("first").unwrap();
        assert_eq!(state.begin_turn("second"), Err(SubmitError::Busy));
        assert_eq!(state.transcript.len(), 1);
    }

    #[test]
    fn test_hello_scenario_end_to_end() {
        let mut state = ChatState::new();
        state.begin_turn("hello").unwrap();
        streamed(&mut state, &["\"Hi\"", "\" there\""]);
        assert!(!state.is_loading());

        let applied = state.apply(TurnEvent::End);
        let Applied::Completed(reply) = applied else {
            panic!("expected completion, got {applied:?}");
        };
        assert_eq!(reply.role, Role::Model);
        assert_eq!(reply.content, "Hi there");

        let contents: Vec<_> = state
            .transcript
            .messages()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(contents, vec![(Role::User, "hello"), (Role::Model, "Hi there")]);
        assert!(state.buffer.is_empty());
        assert!(!state.is_loading());
        assert!(!state.is_streaming());
    }

    #[test]
    fn test_fragments_accumulate_in_arrival_order() {
        let mut state = ChatState::new();
        state.begin_turn("q").unwrap();
        streamed(&mut state, &["\"c\"", "\"a\"", "\"b\""]);
        assert_eq!(state.buffer.text(), "cab");
    }

    #[test]
    fn test_end_with_zero_fragments_yields_empty_model_message() {
        let mut state = ChatState::new();
        state.begin_turn("q").unwrap();
        let Applied::Completed(reply) = state.apply(TurnEvent::End) else {
            panic!("expected completion");
        };
        assert_eq!(reply.content, "");
        assert_eq!(state.transcript.len(), 2);
    }

    #[test]
    fn test_first_fragment_clears_loading() {
        let mut state = ChatState::new();
        state.begin_turn("q").unwrap();
        assert!(state.is_loading());
        state.apply(TurnEvent::Fragment("x".to_string()));
        assert!(!state.is_loading());
        assert!(state.is_streaming());
    }

    #[test]
    fn test_error_adds_no_message_and_clears_loading() {
        let mut state = ChatState::new();
        state.begin_turn("q").unwrap();
        state.apply(TurnEvent::Fragment("partial".to_string()));
        let applied = state.apply(TurnEvent::Failed(TurnError::Transport));
        assert_eq!(applied, Applied::Failed(TurnError::Transport));
        assert_eq!(state.transcript.len(), 1); // only the user turn
        assert!(state.buffer.is_empty());
        assert!(!state.is_loading());
        assert!(!state.is_streaming());
    }

    #[test]
    fn test_submit_works_again_after_failure() {
        let mut state = ChatState::new();
        state.begin_turn("q").unwrap();
        state.apply(TurnEvent::Failed(TurnError::IdleTimeout(90)));
        assert!(state.begin_turn("retry").is_ok());
        assert_eq!(state.transcript.len(), 2);
    }

    #[test]
    fn test_load_history_replaces_wholesale_and_is_idempotent() {
        let mut state = ChatState::new();
        state.transcript.push(Message::user("stale".to_string()));

        let loaded = vec![Message {
            id: "1".to_string(),
            role: Role::User,
            content: "hi".to_string(),
        }];
        state.load_history(loaded.clone());
        let first: Vec<_> = state.transcript.messages().to_vec();
        state.load_history(loaded);
        assert_eq!(state.transcript.messages(), first.as_slice());
        assert_eq!(state.transcript.len(), 1);
        assert!(state.buffer.is_empty());
    }
}
