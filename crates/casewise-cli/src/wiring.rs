//! Builds the orchestrator and its collaborators from configuration.

use anyhow::{Context, Result};
use casewise_application::SessionOrchestrator;
use casewise_core::config::{AppConfig, StorageBackend};
use casewise_core::question::QuestionProvider;
use casewise_core::session::SessionRepository;
use casewise_infrastructure::{CaseDirectory, FileSessionRepository, InMemorySessionRepository};
use casewise_interaction::{
    AiFollowUpProvider, AiGradingProvider, ChatAgent, OpenAIApiAgent, StubTeachingProvider,
};
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_CASES_DIR: &str = "cases";

pub fn cases_root(config: &AppConfig) -> PathBuf {
    config
        .cases
        .root
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CASES_DIR))
}

pub async fn session_repository(config: &AppConfig) -> Result<Arc<dyn SessionRepository>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemorySessionRepository::new())),
        StorageBackend::File => {
            let repository = match &config.storage.sessions_dir {
                Some(dir) => FileSessionRepository::new(dir).await,
                None => FileSessionRepository::default_location().await,
            }
            .context("Failed to open session store")?;
            tracing::debug!(
                target: "casewise",
                dir = %repository.sessions_dir().display(),
                "using file session store"
            );
            Ok(Arc::new(repository))
        }
    }
}

fn chat_agent(config: &AppConfig) -> Option<Arc<dyn ChatAgent>> {
    if !config.grading.ai_enabled {
        return None;
    }
    let agent = OpenAIApiAgent::from_config(&config.grading)?;
    Some(Arc::new(agent))
}

pub async fn orchestrator(config: &AppConfig) -> Result<SessionOrchestrator> {
    let cases = Arc::new(CaseDirectory::new(cases_root(config)));
    let repository = session_repository(config).await?;

    let mut questions: Arc<dyn QuestionProvider> = cases.clone();
    let mut builder = SessionOrchestrator::builder()
        .case_provider(cases)
        .teaching_provider(Arc::new(StubTeachingProvider::new()))
        .session_repository(repository)
        .config(config.orchestrator.clone());

    match chat_agent(config) {
        Some(agent) => {
            tracing::info!(target: "casewise", model = %config.grading.model, "AI grading enabled");
            builder = builder.grading_provider(Arc::new(
                AiGradingProvider::new(agent.clone())
                    .with_temperature(config.grading.temperature)
                    .with_max_tokens(config.grading.max_tokens),
            ));
            questions = Arc::new(AiFollowUpProvider::new(
                questions,
                agent,
                config.orchestrator.generation_timeout(),
            ));
        }
        None => {
            tracing::info!(target: "casewise", "no API key configured, using content scoring only");
        }
    }

    builder
        .question_provider(questions)
        .build()
        .context("Failed to assemble orchestrator")
}
