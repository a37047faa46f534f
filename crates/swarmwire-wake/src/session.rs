//! Process-wide session continuity tracked in an on-disk JSON file,
//! written atomically (temp file + rename) so a crash mid-write never
//! leaves a half-written file behind.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WakeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Active,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub session_id: String,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub messages_processed: u64,
    #[serde(default)]
    pub current_swarm: Option<String>,
    #[serde(default)]
    pub context_summary: Option<String>,
}

pub struct SessionManager {
    session_file: PathBuf,
    session_timeout_minutes: i64,
    current: Option<SessionData>,
}

impl SessionManager {
    pub fn new(session_file: impl Into<PathBuf>, session_timeout_minutes: i64) -> Self {
        Self { session_file: session_file.into(), session_timeout_minutes, current: None }
    }

    /// Load (if not already cached) and return the current session, if any.
    /// A corrupted file is deleted and reported as a `Session` error.
    pub fn current_session(&mut self) -> Result<Option<&SessionData>, WakeError> {
        if self.current.is_none() {
            self.load()?;
        }
        Ok(self.current.as_ref())
    }

    /// True iff a session file exists, is not `idle`, and its idle time
    /// is within `session_timeout_minutes`.
    pub fn should_resume(&mut self) -> Result<bool, WakeError> {
        let Some(session) = self.current_session()? else {
            return Ok(false);
        };
        if session.state == SessionState::Idle {
            return Ok(false);
        }
        let elapsed = Utc::now() - session.last_active;
        Ok(elapsed.num_seconds() <= self.session_timeout_minutes * 60)
    }

    pub fn start_session(&mut self, session_id: impl Into<String>, swarm_id: Option<String>) -> Result<(), WakeError> {
        let now = Utc::now();
        self.current = Some(SessionData {
            session_id: session_id.into(),
            state: SessionState::Active,
            started_at: now,
            last_active: now,
            messages_processed: 0,
            current_swarm: swarm_id,
            context_summary: None,
        });
        self.save()
    }

    pub fn update_activity(&mut self, messages_processed: u64, context_summary: Option<String>) -> Result<(), WakeError> {
        let Some(session) = self.current.as_mut() else {
            return Err(WakeError::Session("no active session to update".to_string()));
        };
        session.state = SessionState::Active;
        session.last_active = Utc::now();
        session.messages_processed += messages_processed;
        if context_summary.is_some() {
            session.context_summary = context_summary;
        }
        self.save()
    }

    pub fn suspend_session(&mut self, context_summary: impl Into<String>) -> Result<(), WakeError> {
        let Some(session) = self.current.as_mut() else {
            return Err(WakeError::Session("no active session to suspend".to_string()));
        };
        session.state = SessionState::Suspended;
        session.last_active = Utc::now();
        session.context_summary = Some(context_summary.into());
        self.save()
    }

    pub fn end_session(&mut self) -> Result<(), WakeError> {
        self.current = None;
        if self.session_file.exists() {
            std::fs::remove_file(&self.session_file)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), WakeError> {
        if !self.session_file.exists() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(&self.session_file)?;
        match serde_json::from_str::<SessionData>(&raw) {
            Ok(data) => {
                self.current = Some(data);
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&self.session_file);
                Err(WakeError::Session(format!("corrupted session file: {e}")))
            }
        }
    }

    fn save(&self) -> Result<(), WakeError> {
        let Some(session) = &self.current else {
            return Ok(());
        };
        write_atomic(&self.session_file, &serde_json::to_vec_pretty(session).map_err(|e| {
            WakeError::Session(format!("serialize session: {e}"))
        })?)?;
        Ok(())
    }
}

/// Write `contents` to a sibling temp file in `path`'s directory, then
/// rename it over `path`, so readers never observe a partial write.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), WakeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_should_resume_within_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut mgr = SessionManager::new(&path, 30);
        mgr.start_session("sess-1", Some("s1".to_string())).unwrap();
        assert!(path.exists());

        let mut reloaded = SessionManager::new(&path, 30);
        assert!(reloaded.should_resume().unwrap());
    }

    #[test]
    fn corrupted_file_is_deleted_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"not json").unwrap();
        let mut mgr = SessionManager::new(&path, 30);
        let err = mgr.current_session().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Session);
        assert!(!path.exists());
    }

    #[test]
    fn end_session_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut mgr = SessionManager::new(&path, 30);
        mgr.start_session("sess-1", None).unwrap();
        mgr.end_session().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn idle_session_does_not_resume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let now = Utc::now();
        let data = SessionData {
            session_id: "s".to_string(),
            state: SessionState::Idle,
            started_at: now,
            last_active: now,
            messages_processed: 0,
            current_swarm: None,
            context_summary: None,
        };
        std::fs::write(&path, serde_json::to_vec(&data).unwrap()).unwrap();
        let mut mgr = SessionManager::new(&path, 30);
        assert!(!mgr.should_resume().unwrap());
    }
}
