//! Deterministic content-analysis scorer.
//!
//! Used whenever the AI grading path is unavailable. Scores depend only on
//! word count and domain-vocabulary hits, so the same answer always gets the
//! same grade.

use super::model::{GradingMethod, GradingProvider, GradingRequest, GradingResult};
use crate::error::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

/// Upper bound of any fallback score.
pub const FALLBACK_SCORE_CAP: f64 = 0.85;

/// Markers of filler or keyboard-mash text, matched as whole words.
static GIBBERISH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(lorem|ipsum|dolor|sit|amet|test|testing|xyz|asdf|qwerty|hello|world|yo|sup|what|huh|umm|asd|zxc|qwe|rty|fgh|dfg|cvb|bnm)\b",
    )
    .expect("Valid regex pattern")
});

/// Domain vocabulary, matched as substrings of the lowercased answer.
const MEDICAL_TERMS: &[&str] = &[
    "imaging",
    "findings",
    "diagnosis",
    "differential",
    "clinical",
    "patient",
    "medical",
    "treatment",
    "management",
    "follow",
    "workup",
    "test",
    "scan",
    "ct",
    "mri",
    "ultrasound",
    "radiologist",
    "physician",
    "doctor",
    "hospital",
    "disease",
    "condition",
    "symptoms",
    "signs",
    "abnormal",
    "normal",
    "study",
    "examination",
    "evaluation",
    "assessment",
    "recommendation",
    "consultation",
    "ovarian",
    "cancer",
    "malignancy",
    "tumor",
    "mass",
    "peritoneal",
    "ascites",
    "metastasis",
    "staging",
    "oncology",
    "gynecology",
    "radiology",
    "abdominal",
    "pelvic",
    "contrast",
    "enhancement",
    "biopsy",
    "surgery",
    "chemotherapy",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentScorer;

impl ContentScorer {
    pub fn new() -> Self {
        Self
    }

    /// Scores an answer on the 0-100 scale.
    fn raw_score(answer: &str) -> u32 {
        let lower = answer.trim().to_lowercase();
        if lower.is_empty() {
            return 0;
        }

        let mut markers: Vec<&str> = GIBBERISH_PATTERN
            .find_iter(&lower)
            .map(|m| m.as_str())
            .collect();
        markers.sort_unstable();
        markers.dedup();
        if markers.len() > 2 {
            return 0;
        }

        let words = lower.split_whitespace().count();
        if words < 10 {
            return 25;
        }

        let hits = MEDICAL_TERMS
            .iter()
            .filter(|term| lower.contains(*term))
            .count() as u32;

        if words < 50 && hits < 10 {
            return (20 + hits * 2).min(40);
        }
        if words >= 100 && hits >= 15 {
            (60 + hits).min(85)
        } else if words >= 50 && hits >= 10 {
            (45 + hits * 2).min(75)
        } else if words >= 25 && hits >= 5 {
            (35 + hits * 3).min(65)
        } else {
            (25 + hits * 4).min(45)
        }
    }

    /// Scores an answer in `[0, FALLBACK_SCORE_CAP]`.
    pub fn score(&self, answer: &str) -> f64 {
        f64::from(Self::raw_score(answer)) / 100.0
    }

    pub fn feedback(&self, category: &str, score: f64) -> String {
        if score < 0.3 {
            format!(
                "Insufficient response for {category}. Please provide more detailed medical analysis."
            )
        } else if score < 0.5 {
            format!(
                "Basic response for {category}. Consider including more specific medical terminology and detailed analysis."
            )
        } else if score < 0.7 {
            format!(
                "Good effort on {category}. Work on providing more comprehensive and systematic evaluation."
            )
        } else {
            format!(
                "Strong response for {category}. Good use of medical terminology and systematic approach."
            )
        }
    }

    pub fn grade_request(&self, request: &GradingRequest<'_>) -> GradingResult {
        let category = request.category();
        let text = &request.answer.text;
        let score = self.score(text);

        let mut result = GradingResult::new(
            &request.question.id,
            &request.answer.id,
            score,
            self.feedback(category, score),
        )
        .with_method(GradingMethod::FallbackContentAnalysis);
        result.rubric_scores.insert(category.to_string(), score);
        result.metadata.insert(
            "word_count".to_string(),
            json!(text.split_whitespace().count()),
        );
        if score < 0.5 {
            result
                .suggestions
                .push("Consider more specific medical terminology".to_string());
            result
                .suggestions
                .push("Focus on key diagnostic findings".to_string());
        }
        result
    }
}

#[async_trait]
impl GradingProvider for ContentScorer {
    fn name(&self) -> &str {
        "content_scorer"
    }

    async fn grade(&self, request: &GradingRequest<'_>) -> Result<GradingResult> {
        Ok(self.grade_request(request))
    }
}
