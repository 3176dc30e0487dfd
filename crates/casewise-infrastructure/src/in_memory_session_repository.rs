//! Process-local `SessionRepository`.

use async_trait::async_trait;
use casewise_core::session::{Session, SessionRepository};
use casewise_core::{CasewiseError, Result};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Sessions kept in a map for the lifetime of the process.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn insert(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.session_id) {
            return Err(CasewiseError::SessionExists {
                session_id: session.session_id.clone(),
            });
        }
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| CasewiseError::session_not_found(session_id))
    }

    async fn update(&self, session: &mut Session) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        let Some(stored) = sessions.get_mut(&session.session_id) else {
            return Ok(false);
        };
        if stored.version != session.version {
            return Err(CasewiseError::version_conflict(
                &session.session_id,
                session.version,
                stored.version,
            ));
        }

        session.version += 1;
        session.updated_at = Utc::now();
        *stored = session.clone();
        Ok(true)
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(session_id).is_some())
    }

    async fn list_all(&self) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        let mut all: Vec<Session> = sessions.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }
}
