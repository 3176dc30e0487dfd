//! AI-backed providers and the chat agent they talk through.

pub mod agent;
pub mod ai_follow_up_provider;
pub mod ai_grading_provider;
pub mod openai_api_agent;
pub mod stub_teaching_provider;

pub use agent::{AgentError, ChatAgent, ChatRequest};
pub use ai_follow_up_provider::AiFollowUpProvider;
pub use ai_grading_provider::AiGradingProvider;
pub use openai_api_agent::OpenAIApiAgent;
pub use stub_teaching_provider::StubTeachingProvider;
