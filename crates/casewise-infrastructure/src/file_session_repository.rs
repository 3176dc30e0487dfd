//! File-backed `SessionRepository`.
//!
//! Directory structure:
//! ```text
//! sessions_dir/
//! ├── <session_id>.json
//! └── .<session_id>.json.lock
//! ```
//!
//! Blocking file I/O runs on the blocking pool.

use crate::paths::CasewisePaths;
use crate::storage::AtomicJsonFile;
use async_trait::async_trait;
use casewise_core::session::{Session, SessionRepository};
use casewise_core::{CasewiseError, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct FileSessionRepository {
    sessions_dir: PathBuf,
}

impl FileSessionRepository {
    /// Creates a repository at the default location (`<data dir>/casewise/sessions`).
    pub async fn default_location() -> Result<Self> {
        Self::new(CasewisePaths::sessions_dir()?).await
    }

    pub async fn new(sessions_dir: impl AsRef<Path>) -> Result<Self> {
        let sessions_dir = sessions_dir.as_ref().to_path_buf();
        fs::create_dir_all(&sessions_dir).await?;
        Ok(Self { sessions_dir })
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Session ids become file names, so only a conservative alphabet is
    /// accepted.
    fn file_for(&self, session_id: &str) -> Option<AtomicJsonFile<Session>> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| AtomicJsonFile::new(self.sessions_dir.join(format!("{session_id}.json"))))
    }

    async fn blocking<T, F>(f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| CasewiseError::internal(format!("storage task failed: {e}")))?
    }
}

#[async_trait]
impl SessionRepository for FileSessionRepository {
    async fn insert(&self, session: &Session) -> Result<()> {
        let file = self.file_for(&session.session_id).ok_or_else(|| {
            CasewiseError::internal(format!("invalid session id '{}'", session.session_id))
        })?;
        let session = session.clone();

        Self::blocking(move || {
            if file.create_new(&session)? {
                Ok(())
            } else {
                Err(CasewiseError::SessionExists {
                    session_id: session.session_id,
                })
            }
        })
        .await
    }

    async fn get(&self, session_id: &str) -> Result<Session> {
        let Some(file) = self.file_for(session_id) else {
            return Err(CasewiseError::session_not_found(session_id));
        };
        let id = session_id.to_string();

        Self::blocking(move || {
            file.load()?
                .ok_or_else(|| CasewiseError::session_not_found(id))
        })
        .await
    }

    async fn update(&self, session: &mut Session) -> Result<bool> {
        let Some(file) = self.file_for(&session.session_id) else {
            return Ok(false);
        };

        let mut next = session.clone();
        next.version += 1;
        next.updated_at = Utc::now();
        let expected = session.version;
        let candidate = next.clone();

        let updated = Self::blocking(move || {
            file.update(|stored: &mut Session| {
                if stored.version != expected {
                    return Err(CasewiseError::version_conflict(
                        &stored.session_id,
                        expected,
                        stored.version,
                    ));
                }
                *stored = candidate;
                Ok(())
            })
        })
        .await?;

        if updated {
            *session = next;
        }
        Ok(updated)
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let Some(file) = self.file_for(session_id) else {
            return Ok(false);
        };
        Self::blocking(move || Ok(file.remove()?)).await
    }

    async fn list_all(&self) -> Result<Vec<Session>> {
        let mut entries = fs::read_dir(&self.sessions_dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_session_file = path.extension().is_some_and(|ext| ext == "json")
                && !path
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with('.'));
            if is_session_file {
                paths.push(path);
            }
        }

        let mut sessions = Self::blocking(move || {
            let mut sessions = Vec::with_capacity(paths.len());
            for path in paths {
                let file = AtomicJsonFile::<Session>::new(path);
                match file.load() {
                    Ok(Some(session)) => sessions.push(session),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            target: "session_store",
                            path = %file.path().display(),
                            error = %e,
                            "skipping unreadable session file"
                        );
                    }
                }
            }
            Ok(sessions)
        })
        .await?;

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}
