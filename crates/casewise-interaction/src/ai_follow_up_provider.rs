//! Socratic follow-up generation layered over another question provider.

use crate::agent::{ChatAgent, ChatRequest, extract_json_object};
use async_trait::async_trait;
use casewise_core::question::{
    Question, QuestionKind, QuestionProvider, WeakAnswerContext, follow_up_id,
};
use casewise_core::{CasewiseError, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const AGENT_NAME: &str = "ai_follow_up";

const SYSTEM_PROMPT: &str = "You are a radiology educator using the Socratic method. \
Ask exactly one probing question that helps the resident discover the gap in their \
reasoning without giving away the answer. Respond with a single JSON object.";

#[derive(Debug, Deserialize)]
struct RawFollowUp {
    question: String,
    #[serde(default)]
    guidance: Option<String>,
    #[serde(default)]
    learning_objectives: Vec<String>,
}

/// Delegates question loading to `inner` and asks a chat model for follow-ups.
///
/// Any model failure, including a timeout, falls back to `inner`'s own
/// follow-up generation.
pub struct AiFollowUpProvider {
    inner: Arc<dyn QuestionProvider>,
    agent: Arc<dyn ChatAgent>,
    timeout: Duration,
}

impl AiFollowUpProvider {
    pub fn new(
        inner: Arc<dyn QuestionProvider>,
        agent: Arc<dyn ChatAgent>,
        timeout: Duration,
    ) -> Self {
        Self {
            inner,
            agent,
            timeout,
        }
    }

    fn build_prompt(category: &str, context: &WeakAnswerContext) -> String {
        let weak_areas = if context.weak_areas.is_empty() {
            "not specified".to_string()
        } else {
            context.weak_areas.join(", ")
        };
        format!(
            "Case: {case}\nWeak category: {category}\n\nOriginal question:\n{question}\n\n\
Resident answer (score {score:.2}):\n{answer}\n\nGrader feedback:\n{feedback}\n\n\
Identified weak areas: {weak_areas}\n\n\
Return JSON with keys \"question\" (string), \"guidance\" (string) and \
\"learning_objectives\" (array of strings).",
            case = context.case_id,
            question = context.question_text,
            score = context.score,
            answer = context.answer_text,
            feedback = context.feedback,
        )
    }

    async fn generate(&self, category: &str, context: &WeakAnswerContext) -> Result<Question> {
        let chat = ChatRequest::new(Self::build_prompt(category, context))
            .with_system(SYSTEM_PROMPT)
            .with_temperature(0.7)
            .json();

        let reply = tokio::time::timeout(self.timeout, self.agent.complete(chat))
            .await
            .map_err(|_| CasewiseError::agent(AGENT_NAME, "follow-up generation timed out"))?
            .map_err(|e| e.into_casewise(AGENT_NAME))?;

        let body = extract_json_object(&reply)
            .ok_or_else(|| CasewiseError::agent(AGENT_NAME, "reply contains no JSON object"))?;
        let raw: RawFollowUp = serde_json::from_str(body)
            .map_err(|e| CasewiseError::agent(AGENT_NAME, format!("malformed follow-up: {e}")))?;
        if raw.question.trim().is_empty() {
            return Err(CasewiseError::agent(AGENT_NAME, "empty follow-up question"));
        }

        let mut question = Question::new(
            follow_up_id(category),
            QuestionKind::FollowUp,
            category,
            raw.question.trim(),
        )
        .with_rubric_category(category)
        .with_metadata("original_category", json!(category))
        .with_metadata("weak_areas", json!(context.weak_areas))
        .with_metadata("learning_objectives", json!(raw.learning_objectives))
        .with_metadata("generated_by", json!("ai"));
        if let Some(guidance) = raw.guidance {
            question = question.with_metadata("guidance", json!(guidance));
        }
        Ok(question)
    }
}

#[async_trait]
impl QuestionProvider for AiFollowUpProvider {
    async fn load_questions(&self, case_id: &str) -> Result<Vec<Question>> {
        self.inner.load_questions(case_id).await
    }

    async fn generate_follow_up(
        &self,
        category: &str,
        context: &WeakAnswerContext,
    ) -> Result<Question> {
        match self.generate(category, context).await {
            Ok(question) => Ok(question),
            Err(err) => {
                tracing::warn!(
                    target: "follow_up",
                    category,
                    error = %err,
                    "AI follow-up generation failed, using template"
                );
                self.inner.generate_follow_up(category, context).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentError;
    use casewise_core::config::OrchestratorConfig;
    use casewise_core::question::{generic_questions, template_follow_up};

    struct TemplateQuestions;

    #[async_trait]
    impl QuestionProvider for TemplateQuestions {
        async fn load_questions(&self, _case_id: &str) -> Result<Vec<Question>> {
            Ok(generic_questions())
        }

        async fn generate_follow_up(
            &self,
            category: &str,
            context: &WeakAnswerContext,
        ) -> Result<Question> {
            Ok(template_follow_up(category, &context.weak_areas))
        }
    }

    enum Behaviour {
        Reply(&'static str),
        Fail,
        Hang,
    }

    struct MockAgent(Behaviour);

    #[async_trait]
    impl ChatAgent for MockAgent {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            _request: ChatRequest,
        ) -> std::result::Result<String, AgentError> {
            match self.0 {
                Behaviour::Reply(text) => Ok(text.to_string()),
                Behaviour::Fail => Err(AgentError::Other("boom".into())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(String::new())
                }
            }
        }
    }

    fn provider(behaviour: Behaviour) -> AiFollowUpProvider {
        AiFollowUpProvider::new(
            Arc::new(TemplateQuestions),
            Arc::new(MockAgent(behaviour)),
            Duration::from_secs(10),
        )
    }

    fn context() -> WeakAnswerContext {
        WeakAnswerContext {
            case_id: "case-1".into(),
            question_text: "What is your differential?".into(),
            answer_text: "Maybe a mass".into(),
            feedback: "Too vague".into(),
            score: 0.3,
            weak_areas: vec!["lesion characterisation".into()],
        }
    }

    #[tokio::test]
    async fn test_generated_follow_up() {
        let provider = provider(Behaviour::Reply(
            r#"{"question": "What enhancement pattern would favour abscess?", "guidance": "think rim", "learning_objectives": ["enhancement"]}"#,
        ));
        let question = provider
            .generate_follow_up("Differential Diagnosis", &context())
            .await
            .unwrap();

        assert!(question.is_follow_up());
        assert_eq!(question.text, "What enhancement pattern would favour abscess?");
        assert_eq!(question.scoring_category(), "Differential Diagnosis");
        assert_eq!(question.metadata["generated_by"], "ai");
        assert_eq!(question.metadata["guidance"], "think rim");
    }

    #[tokio::test]
    async fn test_agent_failure_uses_template() {
        let question = provider(Behaviour::Fail)
            .generate_follow_up("Differential Diagnosis", &context())
            .await
            .unwrap();
        assert_eq!(question.metadata["generated_by"], "template");
        assert!(question.text.contains("lesion characterisation"));
    }

    #[tokio::test]
    async fn test_unparseable_reply_uses_template() {
        let question = provider(Behaviour::Reply("I would ask about enhancement."))
            .generate_follow_up("Safety Considerations", &context())
            .await
            .unwrap();
        assert_eq!(question.metadata["generated_by"], "template");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_uses_template() {
        let question = provider(Behaviour::Hang)
            .generate_follow_up("Clinical Correlation", &context())
            .await
            .unwrap();
        assert_eq!(question.metadata["generated_by"], "template");
    }

    #[tokio::test(start_paused = true)]
    async fn test_template_arrives_within_outer_deadline() {
        let config = OrchestratorConfig {
            provider_timeout_secs: 1,
            ..OrchestratorConfig::default()
        };
        let provider = AiFollowUpProvider::new(
            Arc::new(TemplateQuestions),
            Arc::new(MockAgent(Behaviour::Hang)),
            config.generation_timeout(),
        );

        let question = tokio::time::timeout(
            config.provider_timeout(),
            provider.generate_follow_up("Safety Considerations", &context()),
        )
        .await
        .expect("fallback beats the outer deadline")
        .unwrap();
        assert_eq!(question.metadata["generated_by"], "template");
    }

    #[tokio::test]
    async fn test_load_questions_delegates() {
        let questions = provider(Behaviour::Fail).load_questions("any").await.unwrap();
        assert_eq!(questions.len(), 7);
    }
}
