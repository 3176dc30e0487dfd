//! Questions and the question provider interface.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Diagnostic,
    FollowUp,
    Clarification,
}

/// A question posed to the student. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub category: String,
    pub text: String,
    #[serde(default)]
    pub rubric_category: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn new(
        id: impl Into<String>,
        kind: QuestionKind,
        category: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            category: category.into(),
            text: text.into(),
            rubric_category: None,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_rubric_category(mut self, category: impl Into<String>) -> Self {
        self.rubric_category = Some(category.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The rubric category this question is scored under.
    pub fn scoring_category(&self) -> &str {
        self.rubric_category.as_deref().unwrap_or(&self.category)
    }

    pub fn is_follow_up(&self) -> bool {
        self.kind == QuestionKind::FollowUp
    }
}

/// What a follow-up generator knows about the weak answer it targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeakAnswerContext {
    pub case_id: String,
    pub question_text: String,
    pub answer_text: String,
    pub feedback: String,
    pub score: f64,
    #[serde(default)]
    pub weak_areas: Vec<String>,
}

/// Supplies the ordered diagnostic questions of a case and generates
/// follow-ups for weak categories.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    /// Loads the ordered question set for a case.
    ///
    /// Implementations fall back to [`generic_questions`] when the case has no
    /// questions of its own.
    async fn load_questions(&self, case_id: &str) -> Result<Vec<Question>>;

    /// Produces one follow-up question for a weak category.
    async fn generate_follow_up(
        &self,
        category: &str,
        context: &WeakAnswerContext,
    ) -> Result<Question>;
}

const GENERIC_QUESTIONS: &[(&str, &str, &str, &str)] = &[
    (
        "Image Interpretation",
        "Describe the key imaging findings in this case. What anatomical structures are involved?",
        "Focus on systematic image interpretation",
        "Consider location, size, signal characteristics, and enhancement patterns",
    ),
    (
        "Differential Diagnosis",
        "Based on the imaging findings, what is your differential diagnosis? List the most likely diagnoses in order of probability.",
        "Provide a focused differential diagnosis",
        "Consider patient demographics, clinical presentation, and imaging patterns",
    ),
    (
        "Clinical Correlation",
        "How do the imaging findings correlate with the patient's clinical presentation and history?",
        "Integrate imaging with clinical information",
        "Consider symptoms, physical exam findings, and laboratory results",
    ),
    (
        "Management Recommendations",
        "What are your recommendations for further imaging or clinical management?",
        "Provide actionable next steps",
        "Consider need for additional imaging, biopsy, or follow-up",
    ),
    (
        "Communication & Organization",
        "How would you communicate these findings to the referring physician? What is the most critical information to convey?",
        "Focus on clear, concise communication",
        "Prioritize urgent findings and actionable recommendations",
    ),
    (
        "Professional Judgment",
        "What is your level of confidence in the diagnosis? What factors contribute to diagnostic uncertainty?",
        "Demonstrate clinical reasoning",
        "Consider alternative diagnoses and limiting factors",
    ),
    (
        "Safety Considerations",
        "Are there any safety considerations or urgent findings that require immediate attention?",
        "Identify time-sensitive findings",
        "Consider life-threatening conditions or complications",
    ),
];

/// The seven-question set used when a case ships no questions.
pub fn generic_questions() -> Vec<Question> {
    GENERIC_QUESTIONS
        .iter()
        .enumerate()
        .map(|(i, (category, text, context, hint))| {
            Question::new(
                format!("fallback_q_{}", i + 1),
                QuestionKind::Diagnostic,
                *category,
                *text,
            )
            .with_rubric_category(*category)
            .with_metadata("step", json!(i + 1))
            .with_metadata("context", json!(context))
            .with_metadata("hint", json!(hint))
            .with_metadata("difficulty", json!("intermediate"))
            .with_metadata("is_fallback", json!(true))
        })
        .collect()
}

/// Per-category follow-up templates: one that names the weak areas, and a
/// neutral one for when none were recorded.
fn follow_up_template(category: &str) -> Option<(&'static str, &'static str)> {
    let templates = match category {
        "Image Interpretation" => (
            "You mentioned {weak_areas}. Can you elaborate on the specific imaging characteristics that led to this assessment?",
            "Looking at the images again, which specific imaging characteristics support your assessment?",
        ),
        "Differential Diagnosis" => (
            "Regarding {weak_areas}, what additional findings would help differentiate between the diagnoses you mentioned?",
            "What additional findings would help differentiate between the diagnoses you are considering?",
        ),
        "Clinical Correlation" => (
            "You noted {weak_areas}. How would you explain the relationship between these findings and the patient's symptoms?",
            "How would you explain the relationship between the imaging findings and the patient's symptoms?",
        ),
        "Management Recommendations" => (
            "Considering {weak_areas}, what specific follow-up timeline would you recommend and why?",
            "What specific follow-up timeline would you recommend for this patient, and why?",
        ),
        "Communication & Organization" => (
            "In discussing {weak_areas}, how would you prioritize this information when speaking with the referring physician?",
            "How would you prioritize these findings when speaking with the referring physician?",
        ),
        "Professional Judgment" => (
            "Given your concerns about {weak_areas}, what additional information would increase your diagnostic confidence?",
            "What additional information would increase your diagnostic confidence?",
        ),
        "Safety Considerations" => (
            "Regarding {weak_areas}, what immediate steps would you take to ensure patient safety?",
            "What immediate steps would you take to ensure patient safety?",
        ),
        _ => return None,
    };
    Some(templates)
}

/// Builds the static follow-up for `category`.
///
/// Used directly by template-based providers and as the fallback when a
/// generative provider fails.
pub fn template_follow_up(category: &str, weak_areas: &[String]) -> Question {
    let text = match (follow_up_template(category), weak_areas.is_empty()) {
        (Some((_, neutral)), true) => neutral.to_string(),
        (Some((specific, _)), false) => specific.replace("{weak_areas}", &weak_areas.join(", ")),
        (None, true) => "Can you walk through your reasoning in more detail?".to_string(),
        (None, false) => format!("Can you provide more detail about {}?", weak_areas.join(", ")),
    };

    Question::new(
        follow_up_id(category),
        QuestionKind::FollowUp,
        category,
        text,
    )
    .with_rubric_category(category)
    .with_metadata("original_category", json!(category))
    .with_metadata("weak_areas", json!(weak_areas))
    .with_metadata("difficulty", json!("advanced"))
    .with_metadata("generated_by", json!("template"))
}

/// Follow-up ids carry a random suffix so repeated follow-ups in one
/// category stay distinguishable.
pub fn follow_up_id(category: &str) -> String {
    let slug: String = category
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("followup_{}_{}", slug, &suffix[..8])
}
