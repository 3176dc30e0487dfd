//! The chat-completion seam shared by every AI-backed provider.

use async_trait::async_trait;
use casewise_core::CasewiseError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),

    #[error("API error (status {status_code:?}): {message}")]
    ProcessError {
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
        retry_after: Option<Duration>,
    },

    #[error("Invalid agent response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

impl AgentError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::ProcessError { is_retryable: true, .. })
    }

    /// Wraps the error as a provider failure attributed to `agent`.
    pub fn into_casewise(self, agent: &str) -> CasewiseError {
        CasewiseError::agent(agent, self.to_string())
    }
}

/// One prompt sent to a chat model.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Asks the model to answer with a single JSON object.
    pub json_mode: bool,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// A chat model that turns a prompt into text.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: ChatRequest) -> Result<String, AgentError>;
}

/// Returns the outermost `{...}` span of a model reply.
///
/// Models often wrap JSON in prose or code fences; everything before the first
/// `{` and after the last `}` is dropped.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
