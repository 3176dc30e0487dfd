//! Aggregate statistics over stored sessions.

use super::model::{Session, SessionStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub completed_sessions: usize,
    /// Mean of per-session average scores over sessions with at least one grade.
    pub average_score: f64,
    pub sessions_by_case: BTreeMap<String, usize>,
    pub sessions_by_state: BTreeMap<String, usize>,
}

impl SessionStats {
    pub fn from_sessions<'a, I>(sessions: I) -> Self
    where
        I: IntoIterator<Item = &'a Session>,
    {
        let mut stats = SessionStats::default();
        let mut scored = 0usize;
        let mut score_sum = 0.0;

        for session in sessions {
            stats.total_sessions += 1;
            if session.status == SessionStatus::Completed {
                stats.completed_sessions += 1;
            } else {
                stats.active_sessions += 1;
            }
            if !session.grades.is_empty() {
                scored += 1;
                score_sum += session.average_score();
            }
            *stats
                .sessions_by_case
                .entry(session.case_id.clone())
                .or_default() += 1;
            *stats
                .sessions_by_state
                .entry(session.status.to_string())
                .or_default() += 1;
        }

        if scored > 0 {
            stats.average_score = score_sum / scored as f64;
        }
        stats
    }
}
