//! Session repository trait.
//!
//! Defines the contract every session store backend honours.

use super::model::Session;
use super::stats::SessionStats;
use crate::error::{CasewiseError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Keyed storage of [`Session`] aggregates.
///
/// # Implementation Notes
///
/// - `update` is compare-and-swap on `Session::version`. On success the store
///   increments the version and refreshes `updated_at` on both the stored copy
///   and the caller's value.
/// - A backend must round-trip a session without loss.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Stores a fully built session. Fails with `SessionExists` on a
    /// duplicate id.
    async fn insert(&self, session: &Session) -> Result<()>;

    /// Finds a session by its ID, failing with `SessionNotFound`.
    async fn get(&self, session_id: &str) -> Result<Session>;

    /// Writes `session` back if its version matches the stored one.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: stored; `session.version` now holds the new version
    /// - `Ok(false)`: no session with this id exists
    /// - `Err(VersionConflict)`: the stored session moved on since it was read
    async fn update(&self, session: &mut Session) -> Result<bool>;

    /// Removes a session. Returns whether it existed.
    async fn delete(&self, session_id: &str) -> Result<bool>;

    /// Lists every stored session, most recently updated first.
    async fn list_all(&self) -> Result<Vec<Session>>;

    /// Creates and stores an empty session.
    async fn create(
        &self,
        session_id: &str,
        case_id: &str,
        user_id: Option<&str>,
    ) -> Result<Session> {
        let session = Session::new(session_id, case_id, user_id.map(str::to_string));
        self.insert(&session).await?;
        Ok(session)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|s| s.user_id.as_deref() == Some(user_id))
            .collect())
    }

    async fn list_by_case(&self, case_id: &str) -> Result<Vec<Session>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|s| s.case_id == case_id)
            .collect())
    }

    /// Sessions that have not reached `completed`.
    async fn list_active(&self) -> Result<Vec<Session>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(Session::is_active)
            .collect())
    }

    /// Deletes sessions whose last update is older than `age`. Returns the
    /// number removed.
    async fn purge_older_than(&self, age: Duration) -> Result<usize> {
        let cutoff = purge_cutoff(age)?;
        let mut removed = 0;
        for session in self.list_all().await? {
            if session.updated_at < cutoff && self.delete(&session.session_id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn stats(&self) -> Result<SessionStats> {
        let sessions = self.list_all().await?;
        Ok(SessionStats::from_sessions(&sessions))
    }
}

/// The instant before which a session counts as expired.
pub fn purge_cutoff(age: Duration) -> Result<DateTime<Utc>> {
    let age = chrono::Duration::from_std(age)
        .map_err(|e| CasewiseError::config(format!("retention period out of range: {e}")))?;
    Ok(Utc::now() - age)
}
