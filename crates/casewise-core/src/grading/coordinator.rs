//! Primary/fallback grading with skip handling.

use super::content_scorer::ContentScorer;
use super::model::{GradingMethod, GradingProvider, GradingRequest, GradingResult};
use crate::error::CasewiseError;
use std::sync::Arc;
use std::time::Duration;

/// Grades answers through an optional primary provider, falling back to the
/// deterministic [`ContentScorer`].
///
/// Grading through the coordinator never fails.
#[derive(Clone)]
pub struct GradingCoordinator {
    primary: Option<Arc<dyn GradingProvider>>,
    fallback: ContentScorer,
    timeout: Duration,
    follow_up_threshold: f64,
}

impl GradingCoordinator {
    pub fn new(
        primary: Option<Arc<dyn GradingProvider>>,
        timeout: Duration,
        follow_up_threshold: f64,
    ) -> Self {
        Self {
            primary,
            fallback: ContentScorer::new(),
            timeout,
            follow_up_threshold,
        }
    }

    /// A coordinator that only uses the content scorer.
    pub fn fallback_only(follow_up_threshold: f64) -> Self {
        Self::new(None, Duration::from_secs(0), follow_up_threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.follow_up_threshold
    }

    pub async fn grade(&self, request: &GradingRequest<'_>) -> GradingResult {
        let mut result = if request.answer.is_skipped() {
            self.skipped(request)
        } else {
            match self.try_primary(request).await {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(
                        target: "grading",
                        question_id = %request.question.id,
                        error = %err,
                        "primary grading unavailable, using content scorer"
                    );
                    self.fallback.grade_request(request)
                }
            }
        };

        if result.needs_follow_up.is_none() {
            result.needs_follow_up = Some(result.score < self.follow_up_threshold);
        }
        result
    }

    async fn try_primary(
        &self,
        request: &GradingRequest<'_>,
    ) -> Result<GradingResult, CasewiseError> {
        let Some(primary) = &self.primary else {
            return Err(CasewiseError::agent("grading", "no primary grader configured"));
        };

        let result = tokio::time::timeout(self.timeout, primary.grade(request))
            .await
            .map_err(|_| {
                CasewiseError::agent(
                    primary.name(),
                    format!("timed out after {}s", self.timeout.as_secs_f64()),
                )
            })??;

        if !result.score.is_finite() || !(0.0..=1.0).contains(&result.score) {
            return Err(CasewiseError::agent(
                primary.name(),
                format!("score {} outside [0, 1]", result.score),
            ));
        }

        let mut result = result;
        if result.grading_method().is_none() {
            result = result.with_method(GradingMethod::Ai);
        }
        Ok(result)
    }

    fn skipped(&self, request: &GradingRequest<'_>) -> GradingResult {
        let category = request.category();
        let mut result = GradingResult::new(
            &request.question.id,
            &request.answer.id,
            0.0,
            format!("The question was skipped, so no credit was given for {category}."),
        )
        .with_method(GradingMethod::Skipped);
        result.rubric_scores.insert(category.to_string(), 0.0);
        result
            .weaknesses
            .push("Question was skipped".to_string());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::grading::model::Answer;
    use crate::question::{Question, QuestionKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGrader {
        score: f64,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GradingProvider for FixedGrader {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn grade(&self, request: &GradingRequest<'_>) -> Result<GradingResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GradingResult::new(
                &request.question.id,
                &request.answer.id,
                self.score,
                "fixed",
            ))
        }
    }

    struct FailingGrader;

    #[async_trait]
    impl GradingProvider for FailingGrader {
        fn name(&self) -> &str {
            "failing"
        }

        async fn grade(&self, _request: &GradingRequest<'_>) -> Result<GradingResult> {
            Err(CasewiseError::agent("failing", "service unavailable"))
        }
    }

    struct SlowGrader;

    #[async_trait]
    impl GradingProvider for SlowGrader {
        fn name(&self) -> &str {
            "slow"
        }

        async fn grade(&self, request: &GradingRequest<'_>) -> Result<GradingResult> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(GradingResult::new(&request.question.id, &request.answer.id, 1.0, ""))
        }
    }

    fn question() -> Question {
        Question::new("q_1", QuestionKind::Diagnostic, "Image Interpretation", "Describe.")
    }

    fn coordinator(primary: Arc<dyn GradingProvider>) -> GradingCoordinator {
        GradingCoordinator::new(Some(primary), Duration::from_secs(5), 0.7)
    }

    #[tokio::test]
    async fn test_primary_result_is_used() {
        let question = question();
        let answer = Answer::new("q_1", "s", "A detailed answer.");
        let grader = Arc::new(FixedGrader {
            score: 0.9,
            calls: AtomicUsize::new(0),
        });
        let result = coordinator(grader.clone())
            .grade(&GradingRequest {
                question: &question,
                answer: &answer,
                case_id: "case",
                criteria: None,
            })
            .await;

        assert_eq!(result.score, 0.9);
        assert_eq!(result.grading_method(), Some("ai"));
        assert_eq!(result.needs_follow_up, Some(false));
        assert_eq!(grader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_skipped_answer_scores_zero_without_calling_primary() {
        let question = question();
        let answer = Answer::new("q_1", "s", " [Skipped] ");
        let grader = Arc::new(FixedGrader {
            score: 1.0,
            calls: AtomicUsize::new(0),
        });
        let result = coordinator(grader.clone())
            .grade(&GradingRequest {
                question: &question,
                answer: &answer,
                case_id: "case",
                criteria: None,
            })
            .await;

        assert_eq!(result.score, 0.0);
        assert!(result.feedback.contains("skipped"));
        assert_eq!(result.grading_method(), Some("skipped"));
        assert_eq!(grader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_skipped_answer_scores_zero_on_fallback_path() {
        let question = question();
        let answer = Answer::new("q_1", "s", "[skipped]");
        let result = GradingCoordinator::fallback_only(0.7)
            .grade(&GradingRequest {
                question: &question,
                answer: &answer,
                case_id: "case",
                criteria: None,
            })
            .await;
        assert_eq!(result.score, 0.0);
        assert!(result.feedback.contains("skipped"));
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_content_scorer() {
        let question = question();
        let answer = Answer::new("q_1", "s", "ovarian mass with ascites");
        let result = coordinator(Arc::new(FailingGrader))
            .grade(&GradingRequest {
                question: &question,
                answer: &answer,
                case_id: "case",
                criteria: None,
            })
            .await;

        assert_eq!(result.score, 0.25);
        assert_eq!(result.grading_method(), Some("fallback_content_analysis"));
        assert_eq!(result.needs_follow_up, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back_to_content_scorer() {
        let question = question();
        let answer = Answer::new("q_1", "s", "ovarian mass with ascites");
        let result = coordinator(Arc::new(SlowGrader))
            .grade(&GradingRequest {
                question: &question,
                answer: &answer,
                case_id: "case",
                criteria: None,
            })
            .await;

        assert_eq!(result.grading_method(), Some("fallback_content_analysis"));
    }

    #[tokio::test]
    async fn test_out_of_range_primary_score_is_rejected() {
        struct WildGrader;

        #[async_trait]
        impl GradingProvider for WildGrader {
            fn name(&self) -> &str {
                "wild"
            }

            async fn grade(&self, request: &GradingRequest<'_>) -> Result<GradingResult> {
                let mut result =
                    GradingResult::new(&request.question.id, &request.answer.id, 0.5, "");
                result.score = 7.0;
                Ok(result)
            }
        }

        let question = question();
        let answer = Answer::new("q_1", "s", "ovarian mass with ascites");
        let result = coordinator(Arc::new(WildGrader))
            .grade(&GradingRequest {
                question: &question,
                answer: &answer,
                case_id: "case",
                criteria: None,
            })
            .await;
        assert_eq!(result.grading_method(), Some("fallback_content_analysis"));
    }
}
