//! Typed inputs and results of the orchestrator surface.

use casewise_core::flow::{FlowAction, FlowState, StateChange};
use casewise_core::question::Question;
use casewise_core::session::SessionStatus;
use casewise_core::teaching::TeachingPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A client request against a running session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SessionAction {
    StartQuestions,
    GetQuestion,
    SubmitAnswer {
        /// When present, must name the question awaiting an answer.
        #[serde(default)]
        question_id: Option<String>,
        answer: String,
    },
    GetFeedback,
    Reset,
}

impl SessionAction {
    pub fn submit(question_id: impl Into<String>, answer: impl Into<String>) -> Self {
        SessionAction::SubmitAnswer {
            question_id: Some(question_id.into()),
            answer: answer.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionAction::StartQuestions => "start_questions",
            SessionAction::GetQuestion => "get_question",
            SessionAction::SubmitAnswer { .. } => "submit_answer",
            SessionAction::GetFeedback => "get_feedback",
            SessionAction::Reset => "reset",
        }
    }
}

/// Result of a handled action, discriminated by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Ready {
        total_questions: usize,
    },
    Question {
        question: Question,
        /// 1-based position of the diagnostic question being worked on.
        question_number: usize,
        total_questions: usize,
        progress: f64,
    },
    FollowUpNeeded {
        score: f64,
        feedback: String,
    },
    NextQuestion {
        score: f64,
        feedback: String,
    },
    Complete {
        #[serde(default)]
        score: Option<f64>,
        #[serde(default)]
        feedback: Option<String>,
    },
    TeachingRecommended {
        score: f64,
        feedback: String,
    },
    TeachingDelivered {
        teaching: TeachingPoint,
    },
    Error {
        message: String,
    },
}

impl ActionOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            ActionOutcome::Ready { .. } => "ready",
            ActionOutcome::Question { .. } => "question",
            ActionOutcome::FollowUpNeeded { .. } => "follow_up_needed",
            ActionOutcome::NextQuestion { .. } => "next_question",
            ActionOutcome::Complete { .. } => "complete",
            ActionOutcome::TeachingRecommended { .. } => "teaching_recommended",
            ActionOutcome::TeachingDelivered { .. } => "teaching_delivered",
            ActionOutcome::Error { .. } => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ActionOutcome::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub current_question_index: usize,
    pub total_questions: usize,
    pub questions_answered: usize,
    pub grades_received: usize,
    pub follow_ups_asked: usize,
    pub teaching_points: usize,
    /// Fraction of diagnostic questions resolved, in `[0, 1]`.
    pub completion: f64,
}

/// Read-only snapshot returned by `get_session_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStateView {
    pub session_id: String,
    pub case_id: String,
    pub user_id: Option<String>,
    pub state: FlowState,
    pub status: SessionStatus,
    pub valid_actions: Vec<FlowAction>,
    pub history: Vec<StateChange>,
    pub progress: SessionProgress,
    pub awaiting_answer_for: Option<Question>,
    pub ended: bool,
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub score: f64,
}

/// Final results produced by `end_session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub case_id: String,
    pub user_id: Option<String>,
    pub overall_score: f64,
    pub weighted_score: f64,
    pub category_scores: Vec<CategoryScore>,
    pub recommended_follow_ups: Vec<Question>,
    pub questions_answered: usize,
    pub follow_ups_completed: usize,
    pub teaching_points_viewed: usize,
    pub duration_minutes: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn category_score(&self, category: &str) -> Option<f64> {
        self.category_scores
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.score)
    }
}
