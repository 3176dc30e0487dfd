//! Answers, grading results, and the grading provider interface.

use crate::case::RubricCategory;
use crate::error::Result;
use crate::question::Question;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Answer text denoting an intentionally skipped question.
pub const SKIP_SENTINEL: &str = "[skipped]";

/// Whether `text` is the skip sentinel, ignoring case and surrounding space.
pub fn is_skip_sentinel(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(SKIP_SENTINEL)
}

/// A student's answer to one question. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    pub question_id: String,
    pub session_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Answer {
    pub fn new(
        question_id: impl Into<String>,
        session_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            question_id: question_id.into(),
            session_id: session_id.into(),
            text: text.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        is_skip_sentinel(&self.text)
    }
}

/// How a grade was produced. Stored under `grading_method` in the result's
/// metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingMethod {
    Ai,
    FallbackContentAnalysis,
    Skipped,
}

impl GradingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            GradingMethod::Ai => "ai",
            GradingMethod::FallbackContentAnalysis => "fallback_content_analysis",
            GradingMethod::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub question_id: String,
    pub answer_id: String,
    /// Normalised to `[0, max_score]`.
    pub score: f64,
    pub max_score: f64,
    pub feedback: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub rubric_scores: HashMap<String, f64>,
    /// `None` lets the coordinator apply the session threshold.
    #[serde(default)]
    pub needs_follow_up: Option<bool>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl GradingResult {
    pub fn new(
        question_id: impl Into<String>,
        answer_id: impl Into<String>,
        score: f64,
        feedback: impl Into<String>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            answer_id: answer_id.into(),
            score: score.clamp(0.0, 1.0),
            max_score: 1.0,
            feedback: feedback.into(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            suggestions: Vec::new(),
            rubric_scores: HashMap::new(),
            needs_follow_up: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_method(mut self, method: GradingMethod) -> Self {
        self.metadata
            .insert("grading_method".to_string(), json!(method.as_str()));
        self
    }

    pub fn grading_method(&self) -> Option<&str> {
        self.metadata.get("grading_method").and_then(Value::as_str)
    }

    /// Whether the grade triggers a follow-up at `threshold`.
    pub fn requires_follow_up(&self, threshold: f64) -> bool {
        self.needs_follow_up.unwrap_or(self.score < threshold)
    }
}

/// Everything a grader needs to score one answer.
#[derive(Debug, Clone, Copy)]
pub struct GradingRequest<'a> {
    pub question: &'a Question,
    pub answer: &'a Answer,
    pub case_id: &'a str,
    pub criteria: Option<&'a RubricCategory>,
}

impl GradingRequest<'_> {
    pub fn category(&self) -> &str {
        self.question.scoring_category()
    }
}

/// Scores a single free-text answer.
///
/// A returned error, a malformed result or a timeout all count as failure of
/// this provider; the coordinator then uses the deterministic scorer.
#[async_trait]
pub trait GradingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn grade(&self, request: &GradingRequest<'_>) -> Result<GradingResult>;
}
