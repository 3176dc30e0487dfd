//! The `Session` aggregate root.

use crate::case::{CaseInfo, Rubric};
use crate::flow::FlowState;
use crate::grading::{Answer, GradingResult};
use crate::question::Question;
use crate::teaching::TeachingPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use strum::{AsRefStr, Display};

/// Coarse lifecycle status of a session, derived from its flow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    Initialized,
    CaseLoaded,
    Questioning,
    Grading,
    FollowUp,
    Teaching,
    Completed,
    Error,
}

impl From<FlowState> for SessionStatus {
    fn from(state: FlowState) -> Self {
        match state {
            FlowState::Initialized => SessionStatus::Initialized,
            FlowState::CaseLoaded => SessionStatus::CaseLoaded,
            FlowState::AskingDiagnostic | FlowState::AwaitingAnswer => SessionStatus::Questioning,
            FlowState::GradingAnswer | FlowState::DecidingFollowUp => SessionStatus::Grading,
            FlowState::AskingFollowUp => SessionStatus::FollowUp,
            FlowState::ProvidingTeaching => SessionStatus::Teaching,
            FlowState::SessionComplete => SessionStatus::Completed,
            FlowState::Error => SessionStatus::Error,
        }
    }
}

/// Persisted state of one diagnostic session.
///
/// Mutated only by the orchestrator's handlers. `version` is owned by the
/// session store, which bumps it on every successful update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub case_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub status: SessionStatus,
    /// State of the bound flow machine, kept for rehydration.
    pub flow_state: FlowState,
    #[serde(default)]
    pub case_info: Option<CaseInfo>,
    /// Rubric loaded with the case; grading criteria and weighted scoring use it.
    #[serde(default)]
    pub rubric: Option<Rubric>,
    /// Ordered diagnostic questions loaded at start.
    #[serde(default)]
    pub available_questions: Vec<Question>,
    pub current_question_index: usize,
    pub total_questions: usize,
    #[serde(default)]
    pub questions_asked: Vec<Question>,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub grades: Vec<GradingResult>,
    #[serde(default)]
    pub follow_up_questions: Vec<Question>,
    #[serde(default)]
    pub teaching_points: Vec<TeachingPoint>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl Session {
    pub fn new(
        session_id: impl Into<String>,
        case_id: impl Into<String>,
        user_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            case_id: case_id.into(),
            user_id,
            status: SessionStatus::Initialized,
            flow_state: FlowState::Initialized,
            case_info: None,
            rubric: None,
            available_questions: Vec::new(),
            current_question_index: 0,
            total_questions: 0,
            questions_asked: Vec::new(),
            answers: Vec::new(),
            grades: Vec::new(),
            follow_up_questions: Vec::new(),
            teaching_points: Vec::new(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            ended_at: None,
            version: 0,
        }
    }

    /// Records the bound machine's state and the derived status.
    pub fn set_flow_state(&mut self, state: FlowState) {
        self.flow_state = state;
        self.status = state.into();
    }

    pub fn is_active(&self) -> bool {
        self.status != SessionStatus::Completed
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn has_more_questions(&self) -> bool {
        self.current_question_index < self.total_questions
    }

    /// The diagnostic question at the current index, if any.
    pub fn current_question(&self) -> Option<&Question> {
        self.available_questions.get(self.current_question_index)
    }

    pub fn last_question(&self) -> Option<&Question> {
        self.questions_asked.last()
    }

    pub fn last_answer(&self) -> Option<&Answer> {
        self.answers.last()
    }

    pub fn last_grade(&self) -> Option<&GradingResult> {
        self.grades.last()
    }

    /// Whether the most recently asked question still lacks an answer.
    pub fn awaiting_answer_for(&self) -> Option<&Question> {
        if self.answers.len() < self.questions_asked.len() {
            self.questions_asked.last()
        } else {
            None
        }
    }

    /// Unweighted mean of all grade scores; 0.0 before any grade.
    pub fn average_score(&self) -> f64 {
        if self.grades.is_empty() {
            return 0.0;
        }
        self.grades.iter().map(|g| g.score).sum::<f64>() / self.grades.len() as f64
    }

    /// Mean score per category, in order of first appearance.
    ///
    /// Each grade is paired with the question asked at the same position.
    pub fn category_scores(&self) -> Vec<(String, f64)> {
        let mut totals: Vec<(String, f64, usize)> = Vec::new();
        for (grade, question) in self.grades.iter().zip(self.questions_asked.iter()) {
            let category = question.scoring_category();
            match totals.iter_mut().find(|(name, _, _)| name == category) {
                Some(entry) => {
                    entry.1 += grade.score;
                    entry.2 += 1;
                }
                None => totals.push((category.to_string(), grade.score, 1)),
            }
        }
        totals
            .into_iter()
            .map(|(name, sum, count)| (name, sum / count as f64))
            .collect()
    }

    /// Minutes between creation and end (or now, for a running session).
    pub fn duration_minutes(&self) -> f64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.created_at).num_seconds().max(0) as f64 / 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::QuestionKind;

    fn graded_session(entries: &[(&str, f64)]) -> Session {
        let mut session = Session::new("s-1", "case-1", None);
        for (i, (category, score)) in entries.iter().enumerate() {
            let question = Question::new(
                format!("q_{i}"),
                QuestionKind::Diagnostic,
                *category,
                "text",
            );
            let answer = Answer::new(&question.id, "s-1", "answer");
            session
                .grades
                .push(GradingResult::new(&question.id, &answer.id, *score, ""));
            session.answers.push(answer);
            session.questions_asked.push(question);
        }
        session
    }

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new("s-1", "case-1", Some("u-1".to_string()));
        assert_eq!(session.status, SessionStatus::Initialized);
        assert_eq!(session.flow_state, FlowState::Initialized);
        assert_eq!(session.version, 0);
        assert!(session.is_active());
        assert!(!session.is_ended());
        assert_eq!(session.average_score(), 0.0);
    }

    #[test]
    fn test_category_scores_average_per_category_in_order() {
        let session = graded_session(&[("B", 0.4), ("A", 1.0), ("B", 0.8)]);
        let scores = session.category_scores();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].0, "B");
        assert!((scores[0].1 - 0.6).abs() < 1e-9);
        assert_eq!(scores[1], ("A".to_string(), 1.0));
        assert!((session.average_score() - 2.2 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_status_follows_flow_state() {
        let mut session = Session::new("s-1", "case-1", None);
        session.set_flow_state(FlowState::AwaitingAnswer);
        assert_eq!(session.status, SessionStatus::Questioning);
        session.set_flow_state(FlowState::SessionComplete);
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(!session.is_active());
    }

    #[test]
    fn test_awaiting_answer_for_tracks_unanswered_question() {
        let mut session = Session::new("s-1", "case-1", None);
        assert!(session.awaiting_answer_for().is_none());
        session.questions_asked.push(Question::new(
            "q_1",
            QuestionKind::Diagnostic,
            "A",
            "text",
        ));
        assert_eq!(session.awaiting_answer_for().map(|q| q.id.as_str()), Some("q_1"));
    }
}
