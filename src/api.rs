/// Typed client for the chat backend.
///
/// One `reqwest::Client` shared by every call (it is internally pooled and
/// cheap to clone). The turn stream is the only streaming endpoint; the rest
/// are plain JSON envelopes.
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::engine::TurnError;
use crate::transcript::Message;

// ── Envelopes ─────────────────────────────────────────────────────────────────

/// `GET /api/chat/{id}` — only `data` matters; the `count` and `error`
/// fields are advisory and ignored.
#[derive(Debug, Deserialize)]
struct HistoryEnvelope {
    #[serde(default)]
    data: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct NewConversationEnvelope {
    conversation: ConversationRef,
}

#[derive(Debug, Deserialize)]
struct ConversationRef {
    id: String,
}

// ── Client ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(server: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: server.trim_end_matches('/').to_string(),
        }
    }

    pub fn server(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// `GET /api/health` — used at bootstrap to fail fast with a readable
    /// message instead of a mid-session surprise.
    pub async fn health(&self) -> Result<()> {
        let resp = self
            .http
            .get(self.url("/api/health"))
            .send()
            .await
            .with_context(|| format!("cannot reach server at {}", self.base))?;
        if !resp.status().is_success() {
            bail!("server at {} is unhealthy: HTTP {}", self.base, resp.status());
        }
        Ok(())
    }

    /// Fetch a conversation's full message history, oldest first.
    pub async fn history(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let url = self.url(&format!("/api/chat/{conversation_id}"));
        debug!(%url, "fetching history");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("history request failed")?;
        if !resp.status().is_success() {
            bail!("history request failed: HTTP {}", resp.status());
        }
        let envelope: HistoryEnvelope =
            resp.json().await.context("malformed history response")?;
        Ok(envelope.data)
    }

    /// Create a fresh conversation; returns its server-assigned id.
    pub async fn new_conversation(&self) -> Result<String> {
        let resp = self
            .http
            .post(self.url("/api/chat/new"))
            .send()
            .await
            .context("new-conversation request failed")?;
        if !resp.status().is_success() {
            bail!("new-conversation request failed: HTTP {}", resp.status());
        }
        let envelope: NewConversationEnvelope = resp
            .json()
            .await
            .context("malformed new-conversation response")?;
        debug!(id = %envelope.conversation.id, "created conversation");
        Ok(envelope.conversation.id)
    }

    /// Open the SSE channel for one turn. Errors use the engine's taxonomy so
    /// the driver can forward them as terminal events unchanged.
    pub async fn open_turn_stream(
        &self,
        conversation_id: &str,
        query: &str,
    ) -> Result<reqwest::Response, TurnError> {
        let resp = self
            .http
            .get(self.url("/api/chat"))
            .query(&[("query", query), ("conversationId", conversation_id)])
            .send()
            .await
            .map_err(|e| TurnError::Stream(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TurnError::Http(status.as_u16()));
        }
        Ok(resp)
    }

    /// `POST /api/upload` — single multipart file under the field the server
    /// expects (`statementDoc`). Boundary call only; nothing here feeds the
    /// turn engine.
    pub async fn upload(&self, file: &Path) -> Result<()> {
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("cannot read {}", file.display()))?;
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let part = reqwest::multipart::Part::bytes(bytes).file_name(name);
        let form = reqwest::multipart::Form::new().part("statementDoc", part);

        let resp = self
            .http
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await
            .context("upload request failed")?;
        if !resp.status().is_success() {
            bail!("upload failed: HTTP {}", resp.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let api = ApiClient::new("http://localhost:8080/");
        assert_eq!(api.server(), "http://localhost:8080");
        assert_eq!(api.url("/api/health"), "http://localhost:8080/api/health");
    }

    #[test]
    fn test_history_envelope_reads_only_data() {
        let raw = r#"{"error":false,"count":1,"data":[{"id":"1","role":"model","content":"hi"}]}"#;
        let env: HistoryEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.data.len(), 1);
        assert_eq!(env.data[0].content, "hi");
    }

    #[test]
    fn test_history_envelope_missing_data_is_empty() {
        let env: HistoryEnvelope = serde_json::from_str(r#"{"error":true}"#).unwrap();
        assert!(env.data.is_empty());
    }

    #[test]
    fn test_new_conversation_envelope() {
        let raw = r#"{"conversation":{"id":"abc-123","createdAt":"2025-01-01"}}"#;
        let env: NewConversationEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.conversation.id, "abc-123");
    }
}
