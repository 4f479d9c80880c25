use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

/// One recorded entry of the session transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A persisted conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub model: String,
    pub working_directory: String,
    pub entries: Vec<TranscriptEntry>,
}

impl Session {
    pub fn new(model: &str, working_directory: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            model: model.to_string(),
            working_directory: working_directory.to_string(),
            entries: Vec::new(),
        }
    }

    /// Record one transcript entry
    pub fn record(&mut self, role: &str, content: &str) {
        self.entries.push(TranscriptEntry {
            role: role.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn short_id(&self) -> &str {
        if self.id.len() > 8 { &self.id[..8] } else { &self.id }
    }
}

/// Loads, saves, and lists sessions under the user data directory
pub struct SessionManager {
    sessions_dir: PathBuf,
    current: Option<Session>,
}

impl SessionManager {
    pub fn new() -> Result<Self> {
        let sessions_dir = Self::sessions_dir()?;
        fs::create_dir_all(&sessions_dir)?;
        Ok(Self {
            sessions_dir,
            current: None,
        })
    }

    #[cfg(test)]
    fn with_dir(sessions_dir: PathBuf) -> Self {
        Self {
            sessions_dir,
            current: None,
        }
    }

    fn sessions_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("coda").join("sessions"))
    }

    pub fn start_new_session(&mut self, model: &str, working_directory: &str) -> &Session {
        self.current = Some(Session::new(model, working_directory));
        self.current.as_ref().unwrap()
    }

    pub fn load_session(&mut self, session_id: &str) -> Result<&Session> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Err(anyhow!("Session not found: {}", session_id));
        }

        let content = fs::read_to_string(&path)?;
        self.current = Some(serde_json::from_str(&content)?);
        Ok(self.current.as_ref().unwrap())
    }

    /// Load the session whose id starts with the given prefix.
    pub fn load_by_prefix(&mut self, prefix: &str) -> Result<&Session> {
        let id = self
            .list_sessions()?
            .into_iter()
            .map(|s| s.id)
            .find(|id| id.starts_with(prefix))
            .ok_or_else(|| anyhow!("Session not found: {}", prefix))?;
        self.load_session(&id)
    }

    pub fn save_current_session(&self) -> Result<()> {
        let session = self
            .current
            .as_ref()
            .ok_or_else(|| anyhow!("No active session"))?;

        let path = self.session_path(&session.id);
        fs::write(&path, serde_json::to_string_pretty(session)?)?;
        Ok(())
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn current_session_mut(&mut self) -> Option<&mut Session> {
        self.current.as_mut()
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut sessions = Vec::new();

        for entry in fs::read_dir(&self.sessions_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Ok(content) = fs::read_to_string(&path)
                && let Ok(session) = serde_json::from_str::<Session>(&content)
            {
                sessions.push(SessionSummary {
                    id: session.id,
                    updated_at: session.updated_at,
                    entry_count: session.entries.len(),
                    model: session.model,
                });
            }
        }

        // Most recent first
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    /// Resume the most recently updated session, if any.
    pub fn resume_most_recent(&mut self) -> Result<Option<&Session>> {
        let Some(summary) = self.list_sessions()?.into_iter().next() else {
            return Ok(None);
        };
        self.load_session(&summary.id).map(Some)
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{}.json", session_id))
    }
}

/// Summary of a saved session for listing
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub updated_at: DateTime<Utc>,
    pub entry_count: usize,
    pub model: String,
}

impl std::fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short_id = if self.id.len() > 8 {
            &self.id[..8]
        } else {
            &self.id
        };
        write!(
            f,
            "{} | {} | {} entries | {}",
            short_id,
            self.updated_at.format("%Y-%m-%d %H:%M"),
            self.entry_count,
            self.model
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, SessionManager) {
        let dir = tempfile::tempdir().unwrap();
        let manager = SessionManager::with_dir(dir.path().to_path_buf());
        (dir, manager)
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let (_dir, mut manager) = manager();
        manager.start_new_session("test-model", "/work");
        manager
            .current_session_mut()
            .unwrap()
            .record("user", "hello");
        manager.save_current_session().unwrap();

        let id = manager.current_session().unwrap().id.clone();
        let mut fresh = SessionManager::with_dir(manager.sessions_dir.clone());
        let loaded = fresh.load_session(&id).unwrap();

        assert_eq!(loaded.entry_count(), 1);
        assert_eq!(loaded.entries[0].content, "hello");
        assert_eq!(loaded.model, "test-model");
    }

    #[test]
    fn list_orders_most_recent_first() {
        let (_dir, mut manager) = manager();
        manager.start_new_session("m", "/a");
        manager.save_current_session().unwrap();
        let first_id = manager.current_session().unwrap().id.clone();

        manager.start_new_session("m", "/b");
        manager
            .current_session_mut()
            .unwrap()
            .record("user", "newer");
        manager.save_current_session().unwrap();
        let second_id = manager.current_session().unwrap().id.clone();

        let sessions = manager.list_sessions().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, second_id);
        assert_eq!(sessions[1].id, first_id);
    }

    #[test]
    fn load_by_prefix_matches_short_ids() {
        let (_dir, mut manager) = manager();
        manager.start_new_session("m", "/a");
        manager.save_current_session().unwrap();
        let id = manager.current_session().unwrap().id.clone();

        let mut fresh = SessionManager::with_dir(manager.sessions_dir.clone());
        let loaded = fresh.load_by_prefix(&id[..8]).unwrap();
        assert_eq!(loaded.id, id);
    }

    #[test]
    fn missing_session_is_an_error() {
        let (_dir, mut manager) = manager();
        assert!(manager.load_session("nope").is_err());
    }
}
