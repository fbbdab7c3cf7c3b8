// src/session/store.rs
// Per-file JSON Session Store. Grounded verbatim on
// original_source/Orchestrator/src/orchestrator/session_store.py, with the
// REDESIGN FLAG from spec.md applied: writes are atomic (temp file +
// rename) instead of session_store.py's plain json.dump, and a corrupt
// file is distinguished from a missing one rather than both collapsing to
// `None`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::OrchestratorError;

const TITLE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

impl ConversationMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub session_id: String,
    pub user_id: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn default_app_name() -> String {
    "orchestrator".to_string()
}

impl SessionData {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            app_name: default_app_name(),
            title: String::new(),
            created_at: now.clone(),
            updated_at: now,
            messages: Vec::new(),
            metadata: serde_json::json!({}),
        }
    }

    pub fn add_message(&mut self, role: impl Into<String>, content: impl Into<String>) {
        let role = role.into();
        let content = content.into();

        if self.title.is_empty() && role == "user" {
            self.title = truncate_title(&content);
        }

        self.messages.push(ConversationMessage::new(role, content));
        self.updated_at = Utc::now().to_rfc3339();
    }
}

fn truncate_title(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() > TITLE_MAX_CHARS {
        let head: String = chars[..TITLE_MAX_CHARS].iter().collect();
        format!("{head}…")
    } else {
        content.to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: usize,
}

impl From<&SessionData> for SessionSummary {
    fn from(data: &SessionData) -> Self {
        Self {
            session_id: data.session_id.clone(),
            user_id: data.user_id.clone(),
            title: data.title.clone(),
            created_at: data.created_at.clone(),
            updated_at: data.updated_at.clone(),
            message_count: data.messages.len(),
        }
    }
}

/// File-backed session storage, one JSON document per session, with an
/// in-memory cache consulted before touching disk.
pub struct SessionStore {
    sessions_dir: PathBuf,
    cache: Arc<Mutex<HashMap<String, SessionData>>>,
}

impl SessionStore {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Result<Self, OrchestratorError> {
        let sessions_dir = sessions_dir.into();
        std::fs::create_dir_all(&sessions_dir)
            .map_err(|e| OrchestratorError::Config(format!("cannot create sessions dir: {e}")))?;
        Ok(Self {
            sessions_dir,
            cache: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn file_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.json"))
    }

    /// Returns `Ok(None)` if no file exists for this session, `Ok(Some(_))`
    /// if found (cache or disk), and `Err` only if the file exists but is
    /// not parseable JSON.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionData>, OrchestratorError> {
        validate_session_id(session_id)?;

        if let Some(cached) = self.cache.lock().await.get(session_id) {
            return Ok(Some(cached.clone()));
        }

        let path = self.file_path(session_id);
        if !path.exists() {
            return Ok(None);
        }

        let data = load_session_file(&path)
            .map_err(|e| OrchestratorError::Agent(format!("corrupt session file {session_id}: {e}")))?;

        self.cache.lock().await.insert(session_id.to_string(), data.clone());
        Ok(Some(data))
    }

    pub async fn save_session(&self, session: &SessionData) -> Result<(), OrchestratorError> {
        validate_session_id(&session.session_id)?;
        let path = self.file_path(&session.session_id);
        write_atomic(&path, session)
            .map_err(|e| OrchestratorError::Agent(format!("failed to save session: {e}")))?;
        self.cache
            .lock()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    /// Gets the session if it exists, otherwise creates it, appends the
    /// message, and persists the result.
    pub async fn add_message(
        &self,
        session_id: &str,
        user_id: &str,
        role: &str,
        content: &str,
    ) -> Result<SessionData, OrchestratorError> {
        let mut session = match self.get_session(session_id).await? {
            Some(existing) => existing,
            None => SessionData::new(session_id.to_string(), user_id.to_string()),
        };
        session.add_message(role, content);
        self.save_session(&session).await?;
        Ok(session)
    }

    /// Lists sessions, newest-updated first. When `user_id` is `Some`,
    /// only that user's sessions are returned; `None` lists every session
    /// on disk, matching `session_store.py`'s `list_sessions(user_id=None)`.
    /// A session file that fails to parse is logged and skipped, never
    /// deleted.
    pub async fn list_sessions(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<SessionSummary>, OrchestratorError> {
        let mut entries = Vec::new();

        let read_dir = std::fs::read_dir(&self.sessions_dir)
            .map_err(|e| OrchestratorError::Agent(format!("cannot read sessions dir: {e}")))?;

        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = match load_session_file(&path) {
                Ok(data) => data,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping corrupt session file");
                    continue;
                }
            };
            if user_id.map_or(true, |id| data.user_id == id) {
                entries.push(SessionSummary::from(&data));
            }
        }

        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(entries)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool, OrchestratorError> {
        validate_session_id(session_id)?;
        self.cache.lock().await.remove(session_id);
        let path = self.file_path(session_id);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .map_err(|e| OrchestratorError::Agent(format!("failed to delete session: {e}")))?;
        Ok(true)
    }
}

/// A session id containing a path separator or `..` is rejected rather
/// than risking escape from `sessions_dir` — spec.md §8 classes this as
/// `SessionNotFound`, not a distinct path-traversal error.
fn validate_session_id(session_id: &str) -> Result<(), OrchestratorError> {
    if session_id.is_empty()
        || session_id.contains('/')
        || session_id.contains('\\')
        || session_id.contains("..")
    {
        return Err(OrchestratorError::SessionNotFound(session_id.to_string()));
    }
    Ok(())
}

fn load_session_file(path: &Path) -> anyhow::Result<SessionData> {
    let contents = std::fs::read_to_string(path)?;
    let data = serde_json::from_str(&contents)?;
    Ok(data)
}

/// Writes to `<path>.tmp` then renames over `path`, so a crash mid-write
/// never leaves a half-written session file in place.
fn write_atomic(path: &Path, session: &SessionData) -> anyhow::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    let contents = serde_json::to_string_pretty(session)?;
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_message_creates_and_persists_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        store
            .add_message("sess1", "user_abc", "user", "hello there, this is my first message")
            .await
            .unwrap();

        let loaded = store.get_session("sess1").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.title, "hello there, this is my first message");
    }

    #[tokio::test]
    async fn title_truncates_over_fifty_chars() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let long = "x".repeat(80);
        store.add_message("sess1", "user_abc", "user", &long).await.unwrap();

        let loaded = store.get_session("sess1").await.unwrap().unwrap();
        assert_eq!(loaded.title.chars().count(), TITLE_MAX_CHARS + 1);
        assert!(loaded.title.ends_with('…'));
    }

    #[tokio::test]
    async fn missing_session_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        assert!(store.get_session("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_skipped_by_list_not_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        store.add_message("good", "user_abc", "user", "hi").await.unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();

        let listed = store.list_sessions(Some("user_abc")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id, "good");
        // The corrupt file must still be on disk.
        assert!(dir.path().join("bad.json").exists());
    }

    #[tokio::test]
    async fn delete_session_removes_file_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        store.add_message("sess1", "user_abc", "user", "hi").await.unwrap();

        assert!(store.delete_session("sess1").await.unwrap());
        assert!(!store.delete_session("sess1").await.unwrap());
        assert!(store.get_session("sess1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_id_with_path_separator_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let result = store.get_session("../escape").await;
        assert!(matches!(result, Err(OrchestratorError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn list_sessions_sorts_by_updated_at_descending() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let mut older = SessionData::new("a", "user_abc");
        older.updated_at = "2020-01-01T00:00:00+00:00".to_string();
        store.save_session(&older).await.unwrap();

        let mut newer = SessionData::new("b", "user_abc");
        newer.updated_at = "2024-01-01T00:00:00+00:00".to_string();
        store.save_session(&newer).await.unwrap();

        let listed = store.list_sessions(Some("user_abc")).await.unwrap();
        assert_eq!(listed[0].session_id, "b");
        assert_eq!(listed[1].session_id, "a");
    }

    #[tokio::test]
    async fn list_sessions_without_user_id_lists_everyone() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        store.add_message("s1", "alice", "user", "hi").await.unwrap();
        store.add_message("s2", "bob", "user", "hi").await.unwrap();

        let listed = store.list_sessions(None).await.unwrap();
        assert_eq!(listed.len(), 2);
    }
}
