//! Directory-backed case and question provider.
//!
//! Directory structure:
//! ```text
//! cases_root/
//! └── <case_id>/
//!     ├── metadata.json    # title, specialty, clinical history, ...
//!     ├── questions.json   # {"questions": [{"question": ..., "rubric_category": ...}]}
//!     └── rubric.json      # optional grading rubric
//! ```

use async_trait::async_trait;
use casewise_core::case::{CaseInfo, CaseProvider, Rubric, RubricCategory};
use casewise_core::question::{
    Question, QuestionKind, QuestionProvider, WeakAnswerContext, generic_questions,
    template_follow_up,
};
use casewise_core::{CasewiseError, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const AGENT_NAME: &str = "case_directory";

pub struct CaseDirectory {
    root: PathBuf,
}

impl CaseDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the ids of every case directory under the root.
    pub async fn list_case_ids(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Resolves a case directory, refusing ids that would escape the root.
    async fn case_dir(&self, case_id: &str) -> Result<PathBuf> {
        let safe = !case_id.is_empty()
            && !case_id.contains(['/', '\\'])
            && case_id != "."
            && case_id != "..";
        let dir = self.root.join(case_id);
        if safe && fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
            Ok(dir)
        } else {
            Err(CasewiseError::case_not_found(case_id))
        }
    }

    /// Reads an optional JSON file. `Ok(None)` when absent.
    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CasewiseError::agent(AGENT_NAME, e.to_string())),
        };
        serde_json::from_str(&content).map(Some).map_err(|e| {
            CasewiseError::agent(AGENT_NAME, format!("{}: {}", path.display(), e))
        })
    }
}

#[derive(Deserialize)]
struct MetadataFile {
    title: Option<String>,
    specialty: Option<String>,
    difficulty: Option<String>,
    description: Option<String>,
    #[serde(alias = "dicom_study_uid")]
    imaging_study_uid: Option<String>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

impl MetadataFile {
    fn into_case_info(self, case_id: &str) -> CaseInfo {
        let fallback = CaseInfo::placeholder(case_id);
        CaseInfo {
            case_id: case_id.to_string(),
            title: self.title.unwrap_or(fallback.title),
            specialty: self.specialty.unwrap_or(fallback.specialty),
            difficulty: self.difficulty.unwrap_or(fallback.difficulty),
            description: self.description.unwrap_or(fallback.description),
            imaging_study_uid: self.imaging_study_uid,
            metadata: self.extra,
        }
    }
}

#[derive(Deserialize)]
struct QuestionsFile {
    #[serde(default)]
    questions: Vec<QuestionEntry>,
}

#[derive(Deserialize)]
struct QuestionEntry {
    question: String,
    rubric_category: Option<String>,
    step: Option<u32>,
    #[serde(default)]
    context: String,
    #[serde(default)]
    hint: String,
    #[serde(default)]
    focus_areas: Vec<String>,
    difficulty: Option<String>,
    #[serde(default)]
    expected_elements: Vec<String>,
    #[serde(rename = "type")]
    answer_type: Option<String>,
}

impl QuestionEntry {
    fn into_question(self, index: usize) -> Question {
        let category = self
            .rubric_category
            .clone()
            .unwrap_or_else(|| "General".to_string());
        let mut question = Question::new(
            format!("q_{}", index + 1),
            QuestionKind::Diagnostic,
            category,
            self.question,
        )
        .with_metadata("step", json!(self.step.unwrap_or(index as u32 + 1)))
        .with_metadata("context", json!(self.context))
        .with_metadata("hint", json!(self.hint))
        .with_metadata("focus_areas", json!(self.focus_areas))
        .with_metadata(
            "difficulty",
            json!(self.difficulty.unwrap_or_else(|| "intermediate".to_string())),
        )
        .with_metadata("expected_elements", json!(self.expected_elements))
        .with_metadata(
            "answer_type",
            json!(self.answer_type.unwrap_or_else(|| "free_text".to_string())),
        );
        question.rubric_category = self.rubric_category;
        question
    }
}

/// `rubric.json` either lists categories or maps names to their settings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RubricFile {
    Listed {
        categories: Vec<RubricCategory>,
    },
    Keyed {
        categories: HashMap<String, KeyedCategory>,
    },
}

#[derive(Deserialize)]
struct KeyedCategory {
    weight: f64,
    #[serde(default)]
    criteria: Value,
}

impl RubricFile {
    fn into_rubric(self) -> Rubric {
        match self {
            RubricFile::Listed { categories } => Rubric { categories },
            RubricFile::Keyed { categories } => {
                let mut categories: Vec<RubricCategory> = categories
                    .into_iter()
                    .map(|(name, entry)| {
                        let (description, criteria) = match entry.criteria {
                            Value::String(text) => (text, Vec::new()),
                            Value::Array(items) => (
                                String::new(),
                                items
                                    .into_iter()
                                    .filter_map(|v| v.as_str().map(str::to_string))
                                    .collect(),
                            ),
                            _ => (String::new(), Vec::new()),
                        };
                        RubricCategory {
                            name,
                            weight: entry.weight,
                            description,
                            criteria,
                        }
                    })
                    .collect();
                // Map order is not meaningful; heaviest first reads naturally.
                categories.sort_by(|a, b| {
                    b.weight.total_cmp(&a.weight).then_with(|| a.name.cmp(&b.name))
                });
                Rubric { categories }
            }
        }
    }
}

#[async_trait]
impl CaseProvider for CaseDirectory {
    async fn load_case(&self, case_id: &str) -> Result<CaseInfo> {
        let dir = self.case_dir(case_id).await?;
        let case = match Self::read_json::<MetadataFile>(&dir.join("metadata.json")).await? {
            Some(metadata) => metadata.into_case_info(case_id),
            None => CaseInfo::placeholder(case_id),
        };
        tracing::debug!(target: "cases", case_id, title = %case.title, "loaded case");
        Ok(case)
    }

    async fn load_rubric(&self, case_id: &str) -> Result<Rubric> {
        let dir = self.case_dir(case_id).await?;
        match Self::read_json::<RubricFile>(&dir.join("rubric.json")).await {
            Ok(Some(file)) => Ok(file.into_rubric()),
            Ok(None) => Ok(Rubric::default()),
            Err(e) => {
                tracing::warn!(target: "cases", case_id, error = %e, "invalid rubric, using default");
                Ok(Rubric::default())
            }
        }
    }
}

#[async_trait]
impl QuestionProvider for CaseDirectory {
    async fn load_questions(&self, case_id: &str) -> Result<Vec<Question>> {
        let dir = self.case_dir(case_id).await?;
        match Self::read_json::<QuestionsFile>(&dir.join("questions.json")).await {
            Ok(Some(file)) => Ok(file
                .questions
                .into_iter()
                .enumerate()
                .map(|(i, entry)| entry.into_question(i))
                .collect()),
            Ok(None) => Ok(generic_questions()),
            Err(e) => {
                tracing::warn!(
                    target: "cases",
                    case_id,
                    error = %e,
                    "invalid questions file, using generic questions"
                );
                Ok(generic_questions())
            }
        }
    }

    async fn generate_follow_up(
        &self,
        category: &str,
        context: &WeakAnswerContext,
    ) -> Result<Question> {
        Ok(template_follow_up(category, &context.weak_areas))
    }
}
