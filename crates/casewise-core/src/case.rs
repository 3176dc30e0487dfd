//! Case metadata, grading rubrics, and the case provider interface.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Weight applied to a category the rubric does not list.
pub const UNLISTED_CATEGORY_WEIGHT: f64 = 0.1;

/// Metadata describing a diagnostic case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseInfo {
    pub case_id: String,
    pub title: String,
    pub specialty: String,
    pub difficulty: String,
    pub description: String,
    #[serde(default)]
    pub imaging_study_uid: Option<String>,
    /// Clinical history, demographics, modality, learning objectives and
    /// anything else the case author supplied.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl CaseInfo {
    /// Case info for a case directory without a metadata file.
    pub fn placeholder(case_id: impl Into<String>) -> Self {
        let case_id = case_id.into();
        Self {
            title: format!("Case {case_id}"),
            case_id,
            specialty: "Radiology".to_string(),
            difficulty: "Intermediate".to_string(),
            description: "Diagnostic radiology case".to_string(),
            imaging_study_uid: None,
            metadata: HashMap::new(),
        }
    }

    pub fn clinical_history(&self) -> Option<&str> {
        self.metadata.get("clinical_history").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCategory {
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub criteria: Vec<String>,
}

/// Ordered scoring categories for a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub categories: Vec<RubricCategory>,
}

impl Rubric {
    pub fn category(&self, name: &str) -> Option<&RubricCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn weight_of(&self, name: &str) -> f64 {
        self.category(name)
            .map(|c| c.weight)
            .unwrap_or(UNLISTED_CATEGORY_WEIGHT)
    }

    /// Rubric-weighted mean of per-category scores; 0.0 for no categories.
    pub fn weighted_score<'a, I>(&self, category_scores: I) -> f64
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let (sum, total_weight) = category_scores
            .into_iter()
            .fold((0.0, 0.0), |(sum, weight_sum), (name, score)| {
                let weight = self.weight_of(name);
                (sum + score * weight, weight_sum + weight)
            });
        if total_weight > 0.0 {
            sum / total_weight
        } else {
            0.0
        }
    }
}

impl Default for Rubric {
    fn default() -> Self {
        let entries = [
            (
                "Image Interpretation",
                0.20,
                "Systematic image interpretation and technical quality assessment",
            ),
            (
                "Differential Diagnosis",
                0.20,
                "Comprehensive differential diagnosis with appropriate prioritization",
            ),
            (
                "Clinical Correlation",
                0.15,
                "Integration of imaging findings with clinical presentation",
            ),
            (
                "Management Recommendations",
                0.15,
                "Appropriate next steps and management recommendations",
            ),
            (
                "Communication & Organization",
                0.15,
                "Clear, organized communication of findings",
            ),
            (
                "Professional Judgment",
                0.10,
                "Appropriate confidence level and clinical reasoning",
            ),
            (
                "Safety Considerations",
                0.05,
                "Recognition of urgent findings and safety considerations",
            ),
        ];

        Self {
            categories: entries
                .into_iter()
                .map(|(name, weight, description)| RubricCategory {
                    name: name.to_string(),
                    weight,
                    description: description.to_string(),
                    criteria: Vec::new(),
                })
                .collect(),
        }
    }
}

/// Loads case metadata and rubrics.
#[async_trait]
pub trait CaseProvider: Send + Sync {
    /// Returns `CaseNotFound` for an unknown case id.
    async fn load_case(&self, case_id: &str) -> Result<CaseInfo>;

    /// Returns the case's rubric, or the default rubric when it has none.
    async fn load_rubric(&self, _case_id: &str) -> Result<Rubric> {
        Ok(Rubric::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rubric_weights_sum_to_one() {
        let rubric = Rubric::default();
        let total: f64 = rubric.categories.iter().map(|c| c.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(rubric.categories.len(), 7);
    }

    #[test]
    fn test_weighted_score_uses_rubric_weights() {
        let rubric = Rubric::default();
        let score = rubric.weighted_score([
            ("Image Interpretation", 1.0),
            ("Safety Considerations", 0.0),
        ]);
        // 0.20 / (0.20 + 0.05)
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_unlisted_category_gets_default_weight() {
        let rubric = Rubric::default();
        assert_eq!(rubric.weight_of("Nuclear Medicine"), UNLISTED_CATEGORY_WEIGHT);
        assert_eq!(rubric.weighted_score(std::iter::empty()), 0.0);
    }
}
