//! Grading provider backed by a chat model.

use crate::agent::{ChatAgent, ChatRequest, extract_json_object};
use async_trait::async_trait;
use casewise_core::grading::{GradingMethod, GradingProvider, GradingRequest, GradingResult};
use casewise_core::{CasewiseError, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const AGENT_NAME: &str = "ai_grader";

const SYSTEM_PROMPT: &str = "You are an experienced radiology attending grading a resident's \
answer to a board-style diagnostic question. Grade strictly against the rubric category. \
Respond with a single JSON object and nothing else.";

/// Shape the model must return. Every field except `needs_follow_up` is required.
#[derive(Debug, Deserialize)]
struct RawGrade {
    score: f64,
    feedback: String,
    strengths: Vec<String>,
    weaknesses: Vec<String>,
    suggestions: Vec<String>,
    #[serde(default)]
    needs_follow_up: Option<bool>,
}

pub struct AiGradingProvider {
    agent: Arc<dyn ChatAgent>,
    temperature: f32,
    max_tokens: u32,
}

impl AiGradingProvider {
    pub fn new(agent: Arc<dyn ChatAgent>) -> Self {
        Self {
            agent,
            temperature: 0.3,
            max_tokens: 2000,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn build_prompt(request: &GradingRequest<'_>) -> String {
        let mut prompt = format!(
            "Case: {}\nRubric category: {}\n\nQuestion:\n{}\n\nStudent answer:\n{}\n",
            request.case_id,
            request.category(),
            request.question.text,
            request.answer.text,
        );

        if let Some(criteria) = request.criteria {
            if !criteria.description.is_empty() {
                prompt.push_str(&format!("\nCategory focus: {}\n", criteria.description));
            }
            if !criteria.criteria.is_empty() {
                prompt.push_str("Grading criteria:\n");
                for item in &criteria.criteria {
                    prompt.push_str(&format!("- {item}\n"));
                }
            }
        }

        prompt.push_str(
            "\nReturn JSON with keys: \"score\" (number between 0 and 1), \"feedback\" (string), \
\"strengths\" (array of strings), \"weaknesses\" (array of strings), \"suggestions\" \
(array of strings), \"needs_follow_up\" (boolean).",
        );
        prompt
    }

    fn parse_reply(&self, reply: &str, request: &GradingRequest<'_>) -> Result<GradingResult> {
        let body = extract_json_object(reply)
            .ok_or_else(|| CasewiseError::agent(AGENT_NAME, "reply contains no JSON object"))?;
        let raw: RawGrade = serde_json::from_str(body)
            .map_err(|e| CasewiseError::agent(AGENT_NAME, format!("malformed grade: {e}")))?;

        if !(0.0..=1.0).contains(&raw.score) {
            return Err(CasewiseError::agent(
                AGENT_NAME,
                format!("score {} outside [0, 1]", raw.score),
            ));
        }

        let category = request.category().to_string();
        let mut result = GradingResult::new(
            &request.question.id,
            &request.answer.id,
            raw.score,
            raw.feedback,
        )
        .with_method(GradingMethod::Ai);
        result.strengths = raw.strengths;
        result.weaknesses = raw.weaknesses;
        result.suggestions = raw.suggestions;
        result.needs_follow_up = raw.needs_follow_up;
        result.rubric_scores.insert(category, raw.score);
        result
            .metadata
            .insert("agent".to_string(), json!(self.agent.name()));
        Ok(result)
    }
}

#[async_trait]
impl GradingProvider for AiGradingProvider {
    fn name(&self) -> &str {
        AGENT_NAME
    }

    async fn grade(&self, request: &GradingRequest<'_>) -> Result<GradingResult> {
        let chat = ChatRequest::new(Self::build_prompt(request))
            .with_system(SYSTEM_PROMPT)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .json();

        let reply = self
            .agent
            .complete(chat)
            .await
            .map_err(|e| e.into_casewise(AGENT_NAME))?;

        self.parse_reply(&reply, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentError;
    use casewise_core::case::RubricCategory;
    use casewise_core::grading::Answer;
    use casewise_core::question::{Question, QuestionKind};
    use std::sync::Mutex;

    struct ScriptedAgent {
        reply: std::result::Result<String, String>,
        last_prompt: Mutex<Option<ChatRequest>>,
    }

    impl ScriptedAgent {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                last_prompt: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err("connection refused".to_string()),
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ChatAgent for ScriptedAgent {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: ChatRequest,
        ) -> std::result::Result<String, AgentError> {
            *self.last_prompt.lock().unwrap() = Some(request);
            self.reply.clone().map_err(AgentError::ExecutionFailed)
        }
    }

    fn fixtures() -> (Question, Answer, RubricCategory) {
        let question = Question::new(
            "q_1",
            QuestionKind::Diagnostic,
            "Differential Diagnosis",
            "What is your differential?",
        );
        let answer = Answer::new("q_1", "s1", "Appendicitis, then mesenteric adenitis.");
        let criteria = RubricCategory {
            name: "Differential Diagnosis".to_string(),
            weight: 0.2,
            description: "Prioritised differential".to_string(),
            criteria: vec!["Lists the most likely diagnosis first".to_string()],
        };
        (question, answer, criteria)
    }

    #[tokio::test]
    async fn test_grades_from_json_reply() {
        let agent = Arc::new(ScriptedAgent::replying(
            "```json\n{\"score\": 0.8, \"feedback\": \"Solid\", \"strengths\": [\"ordered\"], \
             \"weaknesses\": [], \"suggestions\": [\"mention ultrasound\"]}\n```",
        ));
        let provider = AiGradingProvider::new(agent.clone());
        let (question, answer, criteria) = fixtures();
        let request = GradingRequest {
            question: &question,
            answer: &answer,
            case_id: "case-7",
            criteria: Some(&criteria),
        };

        let result = provider.grade(&request).await.unwrap();
        assert_eq!(result.score, 0.8);
        assert_eq!(result.feedback, "Solid");
        assert_eq!(result.grading_method(), Some("ai"));
        assert_eq!(result.rubric_scores.get("Differential Diagnosis"), Some(&0.8));
        assert_eq!(result.needs_follow_up, None);

        let sent = agent.last_prompt.lock().unwrap().clone().unwrap();
        assert!(sent.json_mode);
        assert_eq!(sent.temperature, Some(0.3));
        assert!(sent.prompt.contains("Lists the most likely diagnosis first"));
        assert!(sent.prompt.contains("case-7"));
    }

    #[tokio::test]
    async fn test_missing_keys_fail() {
        let provider =
            AiGradingProvider::new(Arc::new(ScriptedAgent::replying("{\"score\": 0.5}")));
        let (question, answer, _) = fixtures();
        let request = GradingRequest {
            question: &question,
            answer: &answer,
            case_id: "case-7",
            criteria: None,
        };
        let err = provider.grade(&request).await.unwrap_err();
        assert!(err.is_agent_execution());
    }

    #[tokio::test]
    async fn test_out_of_range_score_fails() {
        let provider = AiGradingProvider::new(Arc::new(ScriptedAgent::replying(
            "{\"score\": 7, \"feedback\": \"\", \"strengths\": [], \"weaknesses\": [], \"suggestions\": []}",
        )));
        let (question, answer, _) = fixtures();
        let request = GradingRequest {
            question: &question,
            answer: &answer,
            case_id: "case-7",
            criteria: None,
        };
        assert!(provider.grade(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_agent_failure_is_agent_execution() {
        let provider = AiGradingProvider::new(Arc::new(ScriptedAgent::failing()));
        let (question, answer, _) = fixtures();
        let request = GradingRequest {
            question: &question,
            answer: &answer,
            case_id: "case-7",
            criteria: None,
        };
        let err = provider.grade(&request).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
