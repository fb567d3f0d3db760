/// Conversation data model.
///
/// A `Transcript` is the ordered list of completed messages for one
/// conversation. Messages are immutable once appended; the reply still being
/// streamed lives in a separate `StreamBuffer` and only becomes a `Message`
/// when the channel signals completion.
use serde::{Deserialize, Serialize};

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One transcript entry. The server sends extra fields (timestamps,
/// conversation id) which serde ignores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: String) -> Self {
        Self { id: fresh_id(), role: Role::User, content }
    }

    pub fn model(content: String) -> Self {
        Self { id: fresh_id(), role: Role::Model, content }
    }
}

/// Client-generated message id. History messages keep their server ids.
pub fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ── Transcript ────────────────────────────────────────────────────────────────

/// Insertion order = conversation order. Rebuilt wholesale when a
/// conversation's history loads, appended to by the turn engine afterwards.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    /// Replace all contents with a freshly loaded history.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

// ── StreamBuffer ──────────────────────────────────────────────────────────────

/// Accumulator for the model reply currently in flight. At most one exists
/// per conversation view; it is cleared when the turn finalizes or fails.
#[derive(Debug, Clone, Default)]
pub struct StreamBuffer {
    text: String,
    /// True from submit until the first fragment arrives — drives the
    /// loading indicator.
    awaiting_first: bool,
}

impl StreamBuffer {
    pub fn start(&mut self) {
        self.text.clear();
        self.awaiting_first = true;
    }

    /// Append a fragment in arrival order. No reordering, no deduplication:
    /// ordering is the transport's responsibility.
    pub fn append(&mut self, fragment: &str) {
        self.awaiting_first = false;
        self.text.push_str(fragment);
    }

    /// Take the accumulated text, leaving the buffer empty and not loading.
    pub fn take(&mut self) -> String {
        self.awaiting_first = false;
        std::mem::take(&mut self.text)
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.awaiting_first = false;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.awaiting_first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_deserialize_ignores_extra_fields() {
        let raw = r#"{"id":"1","role":"user","content":"hi","createdAt":"2025-01-01","conversationId":"abc"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.id, "1");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "hi");
    }

    #[test]
    fn test_role_round_trips_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), r#""model""#);
        let role: Role = serde_json::from_str(r#""user""#).unwrap();
        assert_eq!(role, Role::User);
    }

    #[test]
    fn test_replace_all_discards_previous() {
        let mut t = Transcript::default();
        t.push(Message::user("old".to_string()));
        t.replace_all(vec![Message::model("new".to_string())]);
        assert_eq!(t.len(), 1);
        assert_eq!(t.messages()[0].content, "new");
    }

    #[test]
    fn test_buffer_loading_until_first_fragment() {
        let mut buf = StreamBuffer::default();
        buf.start();
        assert!(buf.is_loading());
        buf.append("Hi");
        assert!(!buf.is_loading());
        buf.append(" there");
        assert_eq!(buf.text(), "Hi there");
        assert_eq!(buf.take(), "Hi there");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_fresh_ids_are_unique() {
        assert_ne!(fresh_id(), fresh_id());
    }
}
