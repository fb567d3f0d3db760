/// Session bootstrap: which conversation is active.
///
/// Resolution order is CLI argument, then the persisted last-conversation
/// pointer, then a freshly created conversation. The pointer is a single
/// file under the data dir, read once at startup and rewritten whenever the
/// active conversation changes.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::routes::conversation_from_path;

const POINTER_FILE: &str = "last_conversation";

/// `$XDG_DATA_HOME/banter`, falling back to `~/.local/share/banter`.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("XDG_DATA_HOME") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir).join("banter"));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".local").join("share").join("banter"))
}

pub fn read_last_conversation(dir: &Path) -> Option<String> {
    let raw = fs::read_to_string(dir.join(POINTER_FILE)).ok()?;
    let id = raw.trim();
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

pub fn write_last_conversation(dir: &Path, id: &str) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("cannot create {}", dir.display()))?;
    fs::write(dir.join(POINTER_FILE), id)
        .with_context(|| format!("cannot write {}", dir.join(POINTER_FILE).display()))
}

/// Resolve the conversation to enter and persist the choice.
///
/// `requested` may be a bare id or a `/conversation/{id}` path. `force_new`
/// skips both the argument and the pointer.
pub async fn resolve_conversation(
    api: &ApiClient,
    dir: &Path,
    requested: Option<&str>,
    force_new: bool,
) -> Result<String> {
    if !force_new {
        if let Some(raw) = requested {
            let id = conversation_from_path(raw)
                .with_context(|| format!("no conversation id in {raw:?}"))?;
            debug!(%id, "conversation from argument");
            write_last_conversation(dir, &id)?;
            return Ok(id);
        }
        if let Some(id) = read_last_conversation(dir) {
            debug!(%id, "conversation from pointer file");
            return Ok(id);
        }
    }

    let id = api.new_conversation().await?;
    info!(%id, "starting new conversation");
    write_last_conversation(dir, &id)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pointer_round_trip() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("banter");
        assert_eq!(read_last_conversation(&dir), None);
        write_last_conversation(&dir, "abc-123").unwrap();
        assert_eq!(read_last_conversation(&dir), Some("abc-123".to_string()));
    }

    #[test]
    fn test_blank_pointer_reads_as_none() {
        let tmp = TempDir::new().unwrap();
        write_last_conversation(tmp.path(), "  \n").unwrap();
        assert_eq!(read_last_conversation(tmp.path()), None);
    }

    #[test]
    fn test_pointer_overwrite() {
        let tmp = TempDir::new().unwrap();
        write_last_conversation(tmp.path(), "first").unwrap();
        write_last_conversation(tmp.path(), "second").unwrap();
        assert_eq!(read_last_conversation(tmp.path()), Some("second".to_string()));
    }
}
