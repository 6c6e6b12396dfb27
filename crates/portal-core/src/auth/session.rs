use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Persisted session cookie, so separate CLI runs share one login.
/// The cookie value is opaque; validity is only known after hydration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// `name=value` pair as the server set it
    pub cookie: String,
    pub correo: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(cookie: String, correo: Option<String>) -> Self {
        Self {
            cookie,
            correo,
            saved_at: Utc::now(),
        }
    }
}

pub struct Session {
    cache_dir: PathBuf,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: None,
        }
    }

    /// Load session from disk. Returns whether a cookie was found.
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(false);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let data: SessionData =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        debug!(saved_at = %data.saved_at, "Session file loaded");
        self.data = Some(data);
        Ok(true)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.session_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(&path, contents).context("Failed to write session file")?;
        }
        Ok(())
    }

    /// Clear session data
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }

    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    pub fn cookie(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.cookie.as_str())
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_without_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = Session::new(dir.path().to_path_buf());
        assert!(!session.load().expect("load"));
        assert!(session.cookie().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("portal");

        let mut session = Session::new(nested.clone());
        session.update(SessionData::new(
            "token=abc".to_string(),
            Some("ana@example.com".to_string()),
        ));
        session.save().expect("save");

        let mut reloaded = Session::new(nested);
        assert!(reloaded.load().expect("load"));
        assert_eq!(reloaded.data, session.data);
        assert_eq!(reloaded.cookie(), Some("token=abc"));
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = Session::new(dir.path().to_path_buf());
        session.update(SessionData::new("token=abc".to_string(), None));
        session.save().expect("save");

        session.clear().expect("clear");
        assert!(session.data.is_none());
        assert!(!dir.path().join(SESSION_FILE).exists());

        // Clearing twice is fine
        session.clear().expect("clear again");
    }

    #[test]
    fn test_save_without_data_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = Session::new(dir.path().to_path_buf());
        session.save().expect("save");
        assert!(!dir.path().join(SESSION_FILE).exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(SESSION_FILE), "not json").expect("write");
        let mut session = Session::new(dir.path().to_path_buf());
        assert!(session.load().is_err());
    }
}
