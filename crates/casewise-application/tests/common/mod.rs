//! Test doubles shared by the orchestrator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use casewise_application::{ActionOutcome, SessionAction, SessionOrchestrator};
use casewise_core::case::{CaseInfo, CaseProvider, Rubric, RubricCategory};
use casewise_core::config::OrchestratorConfig;
use casewise_core::grading::{GradingProvider, GradingRequest, GradingResult};
use casewise_core::question::{
    Question, QuestionProvider, WeakAnswerContext, generic_questions, template_follow_up,
};
use casewise_core::session::SessionRepository;
use casewise_core::teaching::{TeachingContext, TeachingPoint, TeachingProvider};
use casewise_core::{CasewiseError, Result};
use casewise_infrastructure::InMemorySessionRepository;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const CASE_ID: &str = "case001";
pub const EMPTY_CASE_ID: &str = "case_without_questions";

/// Knows `case001` and `case_without_questions`; everything else is missing.
///
/// Each rubric load returns a new revision, described as `revision <n>`.
#[derive(Default)]
pub struct MockCases {
    rubric_loads: AtomicUsize,
}

#[async_trait]
impl CaseProvider for MockCases {
    async fn load_case(&self, case_id: &str) -> Result<CaseInfo> {
        match case_id {
            CASE_ID | EMPTY_CASE_ID => Ok(CaseInfo::placeholder(case_id)),
            _ => Err(CasewiseError::case_not_found(case_id)),
        }
    }

    async fn load_rubric(&self, _case_id: &str) -> Result<Rubric> {
        let revision = self.rubric_loads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Rubric {
            categories: vec![RubricCategory {
                name: "Image Interpretation".to_string(),
                weight: 1.0,
                description: format!("revision {revision}"),
                criteria: Vec::new(),
            }],
        })
    }
}

/// Serves the first `count` generic questions; follow-ups come from templates.
pub struct MockQuestions {
    pub count: usize,
    pub fail_follow_ups: bool,
}

impl MockQuestions {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            fail_follow_ups: false,
        }
    }
}

#[async_trait]
impl QuestionProvider for MockQuestions {
    async fn load_questions(&self, case_id: &str) -> Result<Vec<Question>> {
        if case_id == EMPTY_CASE_ID {
            return Ok(Vec::new());
        }
        Ok(generic_questions().into_iter().take(self.count).collect())
    }

    async fn generate_follow_up(
        &self,
        category: &str,
        context: &WeakAnswerContext,
    ) -> Result<Question> {
        if self.fail_follow_ups {
            return Err(CasewiseError::agent("mock_questions", "generator offline"));
        }
        Ok(template_follow_up(category, &context.weak_areas))
    }
}

/// Scores an answer with the number it starts with, e.g. `"0.4 because..."`.
pub struct ScoreFromText;

#[async_trait]
impl GradingProvider for ScoreFromText {
    fn name(&self) -> &str {
        "score_from_text"
    }

    async fn grade(&self, request: &GradingRequest<'_>) -> Result<GradingResult> {
        let score = request
            .answer
            .text
            .split_whitespace()
            .next()
            .and_then(|token| token.parse::<f64>().ok())
            .ok_or_else(|| CasewiseError::agent("score_from_text", "no leading score"))?;
        let mut result = GradingResult::new(
            &request.question.id,
            &request.answer.id,
            score,
            format!("graded {score}"),
        );
        result
            .rubric_scores
            .insert(request.category().to_string(), score);
        Ok(result)
    }
}

pub struct MockTeaching {
    pub fail: bool,
}

#[async_trait]
impl TeachingProvider for MockTeaching {
    async fn get_teaching_point(
        &self,
        question_id: &str,
        context: &TeachingContext,
    ) -> Result<TeachingPoint> {
        if self.fail {
            return Err(CasewiseError::agent("mock_teaching", "no lessons today"));
        }
        Ok(TeachingPoint {
            id: format!("teaching_{question_id}"),
            related_question_id: Some(question_id.to_string()),
            topic: context.category.clone(),
            content: format!("Review {}", context.category),
            references: vec!["Reference 1".to_string()],
            difficulty_level: "intermediate".to_string(),
            metadata: HashMap::new(),
        })
    }
}

pub struct Harness {
    pub orchestrator: SessionOrchestrator,
    pub repository: Arc<dyn SessionRepository>,
}

pub fn harness_with(
    questions: MockQuestions,
    teaching: MockTeaching,
    repository: Arc<dyn SessionRepository>,
) -> Harness {
    let orchestrator = SessionOrchestrator::builder()
        .case_provider(Arc::new(MockCases::default()))
        .question_provider(Arc::new(questions))
        .grading_provider(Arc::new(ScoreFromText))
        .teaching_provider(Arc::new(teaching))
        .session_repository(repository.clone())
        .config(OrchestratorConfig::default())
        .build()
        .expect("all collaborators provided");
    Harness {
        orchestrator,
        repository,
    }
}

pub fn harness(question_count: usize) -> Harness {
    harness_with(
        MockQuestions::new(question_count),
        MockTeaching { fail: false },
        Arc::new(InMemorySessionRepository::new()),
    )
}

/// Asks for the next question and returns its id.
pub async fn next_question_id(orchestrator: &SessionOrchestrator, session_id: &str) -> String {
    match orchestrator
        .process_action(session_id, SessionAction::GetQuestion)
        .await
        .expect("get_question")
    {
        ActionOutcome::Question { question, .. } => question.id,
        other => panic!("expected a question, got {other:?}"),
    }
}

pub async fn answer(
    orchestrator: &SessionOrchestrator,
    session_id: &str,
    question_id: &str,
    text: &str,
) -> ActionOutcome {
    orchestrator
        .process_action(session_id, SessionAction::submit(question_id, text))
        .await
        .expect("submit_answer")
}
