//! Static teaching content keyed by rubric category.

use async_trait::async_trait;
use casewise_core::Result;
use casewise_core::teaching::{TeachingContext, TeachingPoint, TeachingProvider};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

struct Lesson {
    topic: &'static str,
    content: &'static str,
    references: &'static [&'static str],
}

fn lesson_for(category: &str) -> Lesson {
    match category {
        "Image Interpretation" => Lesson {
            topic: "Systematic Image Review",
            content: "Work through every image with a fixed search pattern. Describe location, \
size, margins, density or signal, and enhancement before naming a diagnosis.",
            references: &["Brant & Helms, Fundamentals of Diagnostic Radiology, ch. 1"],
        },
        "Differential Diagnosis" => Lesson {
            topic: "Building a Prioritised Differential",
            content: "Anchor the differential on the dominant finding, then rank by prevalence \
in this demographic and by how well each entity explains all findings.",
            references: &["Dahnert, Radiology Review Manual"],
        },
        "Clinical Correlation" => Lesson {
            topic: "Integrating the Clinical Picture",
            content: "Map each imaging finding to the presenting symptoms and labs. Findings \
that do not fit the history deserve explicit mention.",
            references: &["ACR Appropriateness Criteria"],
        },
        "Management Recommendations" => Lesson {
            topic: "Actionable Next Steps",
            content: "Recommend the single most useful next test or intervention, with a \
timeframe, and say how its result would change management.",
            references: &["ACR Appropriateness Criteria", "Fleischner Society guidelines"],
        },
        "Communication & Organization" => Lesson {
            topic: "Structured Reporting",
            content: "Lead with the answer to the clinical question, then critical findings, \
then incidental findings. Close the loop on urgent results directly.",
            references: &["ACR Practice Parameter for Communication of Diagnostic Imaging Findings"],
        },
        "Professional Judgment" => Lesson {
            topic: "Calibrating Diagnostic Confidence",
            content: "State your confidence and the specific features that limit it. Name the \
finding that would change your mind.",
            references: &["Bruno et al., Understanding and Confronting Our Mistakes, RadioGraphics 2015"],
        },
        "Safety Considerations" => Lesson {
            topic: "Recognising Critical Findings",
            content: "Screen every study for time-sensitive findings before detailed review and \
escalate them by direct communication.",
            references: &["ACR Critical Results Communication guidance"],
        },
        _ => Lesson {
            topic: "Diagnostic Reasoning",
            content: "Revisit the key findings, the differential they support, and the clinical \
question being asked.",
            references: &["Reference 1", "Reference 2"],
        },
    }
}

/// Serves a fixed lesson per category, prefixed with the grader's feedback.
#[derive(Default)]
pub struct StubTeachingProvider {
    issued: AtomicU64,
}

impl StubTeachingProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TeachingProvider for StubTeachingProvider {
    async fn get_teaching_point(
        &self,
        question_id: &str,
        context: &TeachingContext,
    ) -> Result<TeachingPoint> {
        let lesson = lesson_for(&context.category);
        let n = self.issued.fetch_add(1, Ordering::Relaxed);

        let content = if context.feedback.trim().is_empty() {
            lesson.content.to_string()
        } else {
            format!("{}\n\n{}", context.feedback.trim(), lesson.content)
        };

        let mut metadata = HashMap::new();
        metadata.insert("category".to_string(), json!(context.category));
        metadata.insert("score".to_string(), json!(context.score));

        Ok(TeachingPoint {
            id: format!("teaching_{question_id}_{n}"),
            related_question_id: Some(question_id.to_string()),
            topic: lesson.topic.to_string(),
            content,
            references: lesson.references.iter().map(|r| r.to_string()).collect(),
            difficulty_level: "intermediate".to_string(),
            metadata,
        })
    }
}
