/// Ratatui-based TUI for banter.
///
/// Architecture:
///   main thread:  event loop — crossterm keyboard events + mpsc UiEvent drain
///   turn task:    tokio::spawn — drives one SSE turn, sends UiEvents back
///
/// Layout:
///   ┌────────────────────────────────────────────────┐
///   │  conversation history (scrollable, Min(0))     │
///   ├────────────────────────────────────────────────┤
///   │  status bar (1 line)                           │
///   ├────────────────────────────────────────────────┤
///   │  input box (3 lines, fixed)                    │
///   └────────────────────────────────────────────────┘
pub mod chat;
pub mod render;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::api::ApiClient;
use crate::config::ResolvedConfig;
use crate::engine::{self, Applied, ChatState, SubmitError, TurnEvent};
use crate::session;
use crate::transcript::Message;

// ── UiEvent — typed events from background tasks → TUI ───────────────────────

#[derive(Debug)]
pub enum UiEvent {
    /// The turn driver produced an event (fragment, end, failure).
    Turn(TurnEvent),
    /// History fetch finished for a conversation.
    HistoryLoaded {
        conversation_id: String,
        messages: Vec<Message>,
    },
    HistoryFailed { error: String },
    /// A fresh conversation was created (Ctrl+N).
    ConversationCreated { id: String },
    ConversationCreateFailed { error: String },
}

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    pub chat: ChatState,
    pub input: String,
    pub cursor: usize, // byte offset in input
    pub scroll: usize, // lines scrolled up in history
    /// Incremented every 120ms while anything is in flight, for the spinner.
    pub spinner_tick: u32,
    pub profile: String,
    pub server: String,
    pub conversation_id: String,
    /// Non-fatal error shown under the history; cleared on the next submit.
    pub banner: Option<String>,
    pub history_loading: bool,
    pub cancel_tx: Option<oneshot::Sender<()>>,
}

impl AppState {
    pub fn new(resolved: &ResolvedConfig, conversation_id: String) -> Self {
        Self {
            chat: ChatState::new(),
            input: String::new(),
            cursor: 0,
            scroll: 0,
            spinner_tick: 0,
            profile: resolved.profile_name.clone(),
            server: resolved.server.clone(),
            conversation_id,
            banner: None,
            history_loading: false,
            cancel_tx: None,
        }
    }

    pub fn busy(&self) -> bool {
        self.chat.is_streaming() || self.chat.is_loading() || self.history_loading
    }

    fn apply_event(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::Turn(turn_ev) => match self.chat.apply(turn_ev) {
                Applied::Fragment => {
                    self.scroll = 0; // auto-scroll to bottom on new content
                }
                Applied::Completed(_) => {
                    self.cancel_tx = None;
                    self.scroll = 0;
                }
                Applied::Failed(err) => {
                    self.cancel_tx = None;
                    self.banner = Some(err.to_string());
                }
            },
            UiEvent::HistoryLoaded { conversation_id, messages } => {
                // A load that raced a conversation switch is stale; a load
                // never overwrites a stream in progress.
                if conversation_id == self.conversation_id && !self.chat.is_streaming() {
                    self.chat.load_history(messages);
                    self.scroll = 0;
                }
                self.history_loading = false;
            }
            UiEvent::HistoryFailed { error } => {
                self.history_loading = false;
                self.banner = Some(format!("history load failed: {error} — Ctrl+R to retry"));
            }
            UiEvent::ConversationCreated { id } => {
                self.conversation_id = id;
                self.chat.load_history(Vec::new());
                self.banner = None;
                self.scroll = 0;
            }
            UiEvent::ConversationCreateFailed { error } => {
                self.banner = Some(format!("new conversation failed: {error}"));
            }
        }
    }

    // ── Input editing ─────────────────────────────────────────────────────────

    fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    fn backspace(&mut self) {
        if let Some(prev) = self.input[..self.cursor].chars().next_back() {
            self.cursor -= prev.len_utf8();
            self.input.remove(self.cursor);
        }
    }

    fn delete_forward(&mut self) {
        if self.cursor < self.input.len() {
            self.input.remove(self.cursor);
        }
    }

    fn move_left(&mut self) {
        if let Some(prev) = self.input[..self.cursor].chars().next_back() {
            self.cursor -= prev.len_utf8();
        }
    }

    fn move_right(&mut self) {
        if let Some(next) = self.input[self.cursor..].chars().next() {
            self.cursor += next.len_utf8();
        }
    }
}

// ── Background task launchers ─────────────────────────────────────────────────

fn spawn_history_load(api: &ApiClient, id: &str, ui_tx: &mpsc::UnboundedSender<UiEvent>) {
    let api = api.clone();
    let id = id.to_string();
    let ui = ui_tx.clone();
    tokio::spawn(async move {
        match api.history(&id).await {
            Ok(messages) => {
                let _ = ui.send(UiEvent::HistoryLoaded { conversation_id: id, messages });
            }
            Err(e) => {
                let _ = ui.send(UiEvent::HistoryFailed { error: e.to_string() });
            }
        }
    });
}

fn launch_turn(
    state: &mut AppState,
    api: &ApiClient,
    idle_timeout: Duration,
    ui_tx: &mpsc::UnboundedSender<UiEvent>,
    text: String,
) {
    state.banner = None;
    state.scroll = 0;

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    state.cancel_tx = Some(cancel_tx);

    let (turn_tx, mut turn_rx) = mpsc::unbounded_channel::<TurnEvent>();
    tokio::spawn(engine::run_turn(
        api.clone(),
        state.conversation_id.clone(),
        text,
        idle_timeout,
        turn_tx,
        cancel_rx,
    ));

    let ui = ui_tx.clone();
    tokio::spawn(async move {
        while let Some(ev) = turn_rx.recv().await {
            if ui.send(UiEvent::Turn(ev)).is_err() {
                break;
            }
        }
    });
}

fn spawn_new_conversation(
    api: &ApiClient,
    data_dir: &Path,
    ui_tx: &mpsc::UnboundedSender<UiEvent>,
) {
    let api = api.clone();
    let dir = data_dir.to_path_buf();
    let ui = ui_tx.clone();
    tokio::spawn(async move {
        match api.new_conversation().await {
            Ok(id) => {
                if let Err(e) = session::write_last_conversation(&dir, &id) {
                    warn!(error = %e, "could not persist conversation pointer");
                }
                let _ = ui.send(UiEvent::ConversationCreated { id });
            }
            Err(e) => {
                let _ = ui.send(UiEvent::ConversationCreateFailed { error: e.to_string() });
            }
        }
    });
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(
    api: ApiClient,
    resolved: ResolvedConfig,
    conversation_id: String,
    data_dir: PathBuf,
) -> Result<()> {
    let mut terminal = setup_terminal()?;

    // Panic hook — restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    let result = event_loop(&mut terminal, api, resolved, conversation_id, data_dir).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    api: ApiClient,
    resolved: ResolvedConfig,
    conversation_id: String,
    data_dir: PathBuf,
) -> Result<()> {
    let idle_timeout = Duration::from_secs(resolved.idle_timeout_secs);
    let mut state = AppState::new(&resolved, conversation_id);

    // Channel: background tasks → TUI
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    // Load the active conversation's history straight away.
    state.history_loading = true;
    spawn_history_load(&api, &state.conversation_id, &ui_tx);

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(120));

    terminal.draw(|f| render::draw(f, &state))?;

    loop {
        tokio::select! {
            // ── Animation tick ────────────────────────────────────────────────
            _ = ticker.tick() => {
                if state.busy() {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    terminal.draw(|f| render::draw(f, &state))?;
                }
            }

            // ── Drain events from background tasks ────────────────────────────
            Some(ev) = ui_rx.recv() => {
                state.apply_event(ev);
                terminal.draw(|f| render::draw(f, &state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                if let Event::Key(key) = ev {
                    let keep = handle_key(key, &mut state, &api, &data_dir, idle_timeout, &ui_tx);
                    if !keep {
                        break;
                    }
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }
        }
    }

    // Teardown: a turn still in flight gets cancelled, which drops the
    // connection on the driver side.
    if let Some(cancel) = state.cancel_tx.take() {
        let _ = cancel.send(());
    }

    Ok(())
}

// ── Key handler ───────────────────────────────────────────────────────────────

fn handle_key(
    key: KeyEvent,
    state: &mut AppState,
    api: &ApiClient,
    data_dir: &Path,
    idle_timeout: Duration,
    ui_tx: &mpsc::UnboundedSender<UiEvent>,
) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('c') if ctrl => return false,

        KeyCode::Char('r') if ctrl => {
            if state.chat.is_streaming() {
                state.banner = Some("cannot reload while a reply is streaming".to_string());
            } else {
                state.banner = None;
                state.history_loading = true;
                spawn_history_load(api, &state.conversation_id, ui_tx);
            }
        }

        KeyCode::Char('n') if ctrl => {
            if state.chat.is_streaming() {
                state.banner = Some("cannot switch conversation while a reply is streaming".to_string());
            } else {
                spawn_new_conversation(api, data_dir, ui_tx);
            }
        }

        KeyCode::Esc => {
            if let Some(cancel) = state.cancel_tx.take() {
                // Driver answers with Failed(Cancelled); the reducer cleans up.
                let _ = cancel.send(());
            } else {
                state.banner = None;
            }
        }

        KeyCode::Enter => {
            let text = state.input.clone();
            match state.chat.begin_turn(&text) {
                Ok(msg) => {
                    state.input.clear();
                    state.cursor = 0;
                    launch_turn(state, api, idle_timeout, ui_tx, msg.content);
                }
                Err(SubmitError::Empty) => {
                    // Strict no-op — input stays as typed.
                }
                Err(SubmitError::Busy) => {
                    state.banner = Some("reply in progress — Esc to cancel it first".to_string());
                }
            }
        }

        KeyCode::Up => state.scroll = state.scroll.saturating_add(1),
        KeyCode::Down => state.scroll = state.scroll.saturating_sub(1),
        KeyCode::PageUp => state.scroll = state.scroll.saturating_add(10),
        KeyCode::PageDown => state.scroll = state.scroll.saturating_sub(10),

        KeyCode::Left => state.move_left(),
        KeyCode::Right => state.move_right(),
        KeyCode::Home => state.cursor = 0,
        KeyCode::End => state.cursor = state.input.len(),
        KeyCode::Backspace => state.backspace(),
        KeyCode::Delete => state.delete_forward(),
        KeyCode::Char(c) => state.insert_char(c),

        _ => {}
    }

    true
}
